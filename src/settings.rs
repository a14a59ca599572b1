use anyhow::{Context, Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use dirs_next::{config_dir, data_dir};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

pub const APP_NAME: &str = "anishelf";
const ENV_PREFIX: &str = "ANISHELF";

const DEFAULT_CATALOG_URL: &str = "https://api.consumet.org/anime/gogoanime/";
const DEFAULT_WATCH_URL: &str = "https://anishelf.app/watch/{id}?ep={episode}";
const DEFAULT_EXPORT_FILE_NAME: &str = "anishelf-favorites.csv";
const DEFAULT_LOG_FILTER: &str = "anishelf=warn";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub catalog_url: String,
    /// Player page link with `{id}` and `{episode}` placeholders.
    pub watch_url: String,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    pub export_file_name: String,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Settings {
    /// Defaults, then `<config dir>/anishelf/config.toml`, then `ANISHELF_*` variables.
    pub fn load() -> Result<Self> {
        Self::load_from(config_file_path().as_deref())
    }

    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("catalog_url", DEFAULT_CATALOG_URL)?
            .set_default("watch_url", DEFAULT_WATCH_URL)?
            .set_default("export_file_name", DEFAULT_EXPORT_FILE_NAME)?
            .set_default("request_timeout_secs", 15)?
            .set_default("log_filter", DEFAULT_LOG_FILTER)?;
        if let Some(path) = file {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("failed to read settings")?
            .try_deserialize::<Settings>()
            .context("invalid settings")?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Directory holding the favorites and bookmarks files.
    pub fn storage_dir(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        if let Some(dir) = override_dir.or(self.data_dir.as_deref()) {
            return Ok(dir.to_path_buf());
        }
        let base = data_dir().ok_or_else(|| anyhow!("Could not determine data directory"))?;
        Ok(base.join(APP_NAME))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render settings")
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    config_dir().map(|base| base.join(APP_NAME).join("config.toml"))
}
