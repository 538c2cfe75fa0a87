use crate::{coordinator::ImportSettings, executor::MAX_CONSECUTIVE_ERRORS};
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub store_dir: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub recursive: bool,
    #[serde(default = "default_max_errors")]
    pub max_consecutive_errors: usize,
    #[serde(default = "default_true")]
    pub write_log_file: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_dir: None,
            recursive: true,
            max_consecutive_errors: MAX_CONSECUTIVE_ERRORS,
            write_log_file: true,
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        Self::load_or_create_in(&base_data_dir()?)
    }

    pub fn load_or_create_in(base_dir: &Path) -> Result<Self> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save_in(base_dir)?;
        Ok(config)
    }

    pub fn save_in(&self, base_dir: &Path) -> Result<()> {
        fs::create_dir_all(base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }

    pub fn import_settings(&self) -> ImportSettings {
        ImportSettings {
            max_consecutive_errors: self.max_consecutive_errors,
            ..ImportSettings::default()
        }
    }

    /// Configured store folder, or `media` under the data dir.
    pub fn store_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(base_data_dir()?.join("media")),
        }
    }
}

pub fn log_path() -> Result<PathBuf> {
    Ok(base_data_dir()?.join("import.log"))
}

fn default_true() -> bool {
    true
}

fn default_max_errors() -> usize {
    MAX_CONSECUTIVE_ERRORS
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("media-import"))
}
