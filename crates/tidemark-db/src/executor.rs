use tidemark_common::Result;
use tracing::{info, warn};

use crate::handle::Database;
use crate::ledger::Ledger;
use crate::migration::Migration;

/// Runs a single migration action and records it in the ledger.
///
/// The action and the ledger append are two separate calls. Unless the
/// caller wraps both in one transaction, a crash between them leaves the
/// schema changed but the ledger stale.
#[derive(Debug, Clone)]
pub struct Executor {
    ledger: Ledger,
}

impl Executor {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run `migration.up`, then append `(version, applied = true)`.
    pub fn apply_up(&self, db: &dyn Database, migration: &Migration) -> Result<()> {
        self.apply(db, migration, true)
    }

    /// Run `migration.down`, then append `(version, applied = false)`.
    pub fn apply_down(&self, db: &dyn Database, migration: &Migration) -> Result<()> {
        self.apply(db, migration, false)
    }

    fn apply(&self, db: &dyn Database, migration: &Migration, up: bool) -> Result<()> {
        let (action, direction) = if up {
            (&migration.up, "up")
        } else {
            (&migration.down, "down")
        };

        action.run(db, self.ledger.table()).inspect_err(|e| {
            warn!("FAIL {} ({direction}): {e}", migration.source_name());
        })?;
        self.ledger.append(db, migration.version, up)?;

        info!("OK    {} ({direction})", migration.source_name());
        Ok(())
    }
}
