//! Host settings: optional YAML file, then environment overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use sim_core::EngineConfig;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE: &str = "storage";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub engine: EngineConfig,
    pub storage_path: PathBuf,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            storage_path: PathBuf::from(DEFAULT_STORAGE),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_yaml(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        settings.apply_env(|name| std::env::var(name).ok())?;
        settings.engine = settings.engine.validated()?;
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// `PREVIEW_CAP`, `STORAGE_PATH` and `LOG_LEVEL` win over file values.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(cap) = var("PREVIEW_CAP") {
            self.engine.preview_cap = cap
                .trim()
                .parse()
                .with_context(|| format!("PREVIEW_CAP must be a positive integer (got '{cap}')"))?;
        }
        if let Some(dir) = var("STORAGE_PATH") {
            self.storage_path = PathBuf::from(dir);
        }
        if let Some(level) = var("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        Ok(())
    }
}
