use crate::report::{Format, Section};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration loaded from oquare.toml.
#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub sections: Vec<Section>,
    pub format: Format,
    pub pretty: bool,
    /// Destination file; stdout when unset.
    pub output: Option<PathBuf>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sections: Section::ALL.to_vec(),
            format: Format::Json,
            pretty: true,
            output: None,
        }
    }
}

/// Load config from `path`, or defaults if the file is absent or unusable.
pub fn load_config(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", path.display());
                Config::default()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(e) => {
            tracing::warn!("failed to read {}: {e}", path.display());
            Config::default()
        }
    }
}
