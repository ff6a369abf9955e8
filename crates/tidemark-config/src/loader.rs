use std::path::{Path, PathBuf};

use tidemark_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File names probed, in order, when no explicit config path is given.
const CANDIDATES: &[&str] = &["tidemark.yml", "tidemark.yaml", "tidemark.toml"];

/// Loads `AppConfig` from a YAML or TOML file and layers `TIDEMARK_*`
/// environment overrides on top.
pub struct ConfigLoader {
    path: Option<PathBuf>,
    search_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            search_dir: PathBuf::from("."),
        }
    }

    /// Use this file instead of probing. A missing explicit file is an error.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Directory probed for `tidemark.{yml,yaml,toml}`.
    pub fn with_search_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_dir = dir.into();
        self
    }

    pub fn load(&self) -> Result<AppConfig> {
        let config = match self.resolve_path()? {
            Some(path) => {
                info!("loading config from {}", path.display());
                read_config(&path)?
            }
            None => {
                debug!("no config file found, using defaults");
                AppConfig::default()
            }
        };

        Ok(apply_env_overrides(config, |key| std::env::var(key).ok()))
    }

    fn resolve_path(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }

        Ok(CANDIDATES
            .iter()
            .map(|name| self.search_dir.join(name))
            .find(|candidate| candidate.is_file()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn read_config(path: &Path) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(&contents)
            .map_err(|e| Error::Config(format!("YAML parse error in {}: {e}", path.display()))),
        "toml" => toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("TOML parse error in {}: {e}", path.display()))),
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

/// Apply `TIDEMARK_DIALECT`, `TIDEMARK_DATABASE`, `TIDEMARK_DIR` and
/// `TIDEMARK_TABLE` from `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> AppConfig
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(dialect) = get("TIDEMARK_DIALECT") {
        config.database.dialect = dialect;
    }
    if let Some(dsn) = get("TIDEMARK_DATABASE") {
        config.database.dsn = dsn;
    }
    if let Some(dir) = get("TIDEMARK_DIR") {
        config.migrations.dir = PathBuf::from(dir);
    }
    if let Some(table) = get("TIDEMARK_TABLE") {
        config.migrations.table = table;
    }
    config
}
