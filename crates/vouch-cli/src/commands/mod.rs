//! CLI subcommands.

pub mod config;
pub mod output;
pub mod page;
pub mod parse;

use std::path::{Path, PathBuf};

use vouch_core::VouchConfig;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vouch")
        .join("config.json")
}

/// Load the configuration from an explicit path, the default file, or defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<VouchConfig> {
    if let Some(path) = path {
        return Ok(VouchConfig::from_file(Path::new(path))?);
    }

    let default_path = default_config_path();
    if default_path.exists() {
        Ok(VouchConfig::from_file(&default_path)?)
    } else {
        Ok(VouchConfig::default())
    }
}
