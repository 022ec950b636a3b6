// src/infra/paths.rs — XDG-compliant path management
//
// HABITUAL_HOME overrides everything: config and data both live under it.
// When unset, config uses ~/.habitual/ and data uses XDG_DATA_HOME/habitual.

use directories::ProjectDirs;
use std::path::PathBuf;

fn habitual_home() -> Option<PathBuf> {
    std::env::var_os("HABITUAL_HOME").map(PathBuf::from)
}

fn home_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Configuration directory: $HABITUAL_HOME/ or ~/.habitual/
pub fn config_dir() -> PathBuf {
    if let Some(home) = habitual_home() {
        return home;
    }
    home_dir().join(".habitual")
}

/// Data directory: $HABITUAL_HOME/data/ or ~/.local/share/habitual/
pub fn data_dir() -> PathBuf {
    if let Some(home) = habitual_home() {
        return home.join("data");
    }
    match ProjectDirs::from("", "", "habitual") {
        Some(dirs) => dirs.data_local_dir().to_path_buf(),
        None => config_dir().join("data"),
    }
}

/// Database holding the event log and the pattern checkpoint.
pub fn db_path() -> PathBuf {
    data_dir().join("habitual.db")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub async fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        tokio::fs::create_dir_all(&dir).await?;
    }
    Ok(())
}
