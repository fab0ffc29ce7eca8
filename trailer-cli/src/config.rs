use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use trailers_parser::credentials::PersistencePolicy;

use crate::error::{AppError, Result};

const APP_DIR: &str = "trailr";
const CONFIG_FILE: &str = "config.toml";
const REGISTRY_FILE: &str = "providers.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Provider registry file
    pub registry: Option<PathBuf>,
    /// Directory holding cached provider credentials
    pub cache_dir: Option<PathBuf>,
    pub timeout_secs: u64,
    pub max_concurrent: usize,
    pub persistence: PersistencePolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry: None,
            cache_dir: None,
            timeout_secs: 10,
            max_concurrent: 5,
            persistence: PersistencePolicy::Immediate,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the configuration. An explicit path must exist; a missing default
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => Self::from_toml_str(&content).map_err(|message| {
                AppError::InvalidConfig {
                    path: path.clone(),
                    message,
                }
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    fn from_toml_str(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Write the defaults to `path` (or the default location).
    pub fn reset(path: Option<&Path>) -> Result<PathBuf> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or_else(|| AppError::InvalidInput("no configuration directory".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, Self::default().show()?)?;
        Ok(path)
    }

    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::InvalidInput(e.to_string()))
    }

    /// The registry to load: the configured one, else `providers.toml` next
    /// to the configuration file.
    pub fn registry_path(&self) -> Option<PathBuf> {
        self.registry.clone().or_else(|| {
            dirs::config_dir().map(|dir| dir.join(APP_DIR).join(REGISTRY_FILE))
        })
    }

    pub fn cache_dir(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|dir| dir.join(APP_DIR)))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}
