// src/core/mod.rs — Engine facade

pub mod engine;

pub use engine::Engine;
