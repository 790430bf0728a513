//! Default paths for ronda
//!
//! Paths are user-writable by default:
//! - Config: `$XDG_CONFIG_HOME/ronda/config.toml` or `~/.config/ronda/config.toml`
//! - Data: `$XDG_DATA_HOME/ronda` or `~/.local/share/ronda`

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const RONDA_DATA_DIR_ENV: &str = "RONDA_DATA_DIR";

/// Environment variable for overriding the config file path
pub const RONDA_CONFIG_ENV: &str = "RONDA_CONFIG";

/// Application subdirectory name
const APP_DIR: &str = "ronda";

/// Database filename within the data directory
pub const DATABASE_FILENAME: &str = "ronda.db";

/// Ledger journal filename within the data directory
pub const LEDGER_JOURNAL_FILENAME: &str = "ledger.jsonl";

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$RONDA_CONFIG`
/// 2. `$XDG_CONFIG_HOME/ronda/config.toml`
/// 3. `~/.config/ronda/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(RONDA_CONFIG_ENV) {
        return PathBuf::from(path);
    }

    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join("config.toml");
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml");
    }

    PathBuf::from("/etc").join(APP_DIR).join("config.toml")
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$RONDA_DATA_DIR`
/// 2. `$XDG_DATA_HOME/ronda`
/// 3. `~/.local/share/ronda`
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(RONDA_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking `RONDA_DATA_DIR`.
/// Used for config defaults where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    if let Ok(data_home) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(data_home).join(APP_DIR);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join(APP_DIR);
    }

    PathBuf::from("/tmp").join(APP_DIR).join("data")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_contains_ronda() {
        let path = data_dir_without_env();
        assert!(path.to_string_lossy().contains("ronda"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
