use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LEDGER_TABLE: &str = "tidemark_db_version";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
    pub log: LogConfig,
}

/// Which backend to talk to and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Dialect name, e.g. `sqlite3` or `postgres`. Parsed at startup.
    pub dialect: String,
    /// Driver-specific connection string. For sqlite3 this is a file path.
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            dialect: "sqlite3".to_string(),
            dsn: "tidemark.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub dir: PathBuf,
    pub table: String,
    /// Inclusive lower bound on collected migration versions.
    pub min_version: i64,
    /// Inclusive upper bound on collected migration versions.
    pub max_version: i64,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("migrations"),
            table: DEFAULT_LEDGER_TABLE.to_string(),
            min_version: 0,
            max_version: i64::MAX,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
