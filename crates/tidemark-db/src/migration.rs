use std::fmt;
use std::sync::Arc;

use tidemark_common::Result;

use crate::handle::Database;

/// Native migration step: receives the handle and the ledger table name.
pub type NativeFn = dyn Fn(&dyn Database, &str) -> Result<()> + Send + Sync;

/// One direction of a migration.
#[derive(Clone)]
pub enum Action {
    /// SQL run as a single batch. An empty body does nothing.
    Sql(String),
    Native(Arc<NativeFn>),
}

impl Action {
    pub fn native<F>(f: F) -> Self
    where
        F: Fn(&dyn Database, &str) -> Result<()> + Send + Sync + 'static,
    {
        Action::Native(Arc::new(f))
    }

    pub fn noop() -> Self {
        Action::Sql(String::new())
    }

    pub fn run(&self, db: &dyn Database, table: &str) -> Result<()> {
        match self {
            Action::Sql(sql) if sql.trim().is_empty() => Ok(()),
            Action::Sql(sql) => db.execute_batch(sql),
            Action::Native(f) => f(db, table),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
            Action::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A versioned schema change with forward and backward actions.
///
/// Built once at collection time and never mutated.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    /// Where the migration came from; only used for display.
    pub source: String,
    pub up: Action,
    pub down: Action,
}

impl Migration {
    pub fn new(version: i64, source: impl Into<String>, up: Action, down: Action) -> Self {
        Self {
            version,
            source: source.into(),
            up,
            down,
        }
    }

    pub fn sql(
        version: i64,
        source: impl Into<String>,
        up: impl Into<String>,
        down: impl Into<String>,
    ) -> Self {
        Self::new(version, source, Action::Sql(up.into()), Action::Sql(down.into()))
    }

    /// Final path component of `source`, as shown in status output.
    pub fn source_name(&self) -> &str {
        self.source
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.source)
    }
}

impl fmt::Display for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.version, self.source_name())
    }
}
