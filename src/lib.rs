// src/lib.rs — Library root for habitual

pub mod cli;
pub mod core;
pub mod infra;
pub mod memory;
pub mod patterns;

pub use crate::core::engine::Engine;
