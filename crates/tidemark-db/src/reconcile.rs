//! Latest-event-wins reconciliation of the ledger.
//!
//! The ledger is an unbounded append-only log. For each version, the most
//! recent row decides whether it is applied; older rows are history. Rows
//! must arrive most-recent-first, which every `Dialect` query guarantees.

use std::collections::BTreeMap;
use std::ops::ControlFlow;

use tidemark_common::Result;
use tracing::debug;

use crate::handle::Database;
use crate::ledger::{Ledger, LedgerRow};

/// Per-version applied flag derived from the ledger. Never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciledState {
    versions: BTreeMap<i64, bool>,
}

impl ReconciledState {
    /// Fold in the next row of a most-recent-first walk. The first row seen
    /// for a version wins; later (older) rows for it are ignored.
    pub fn record(&mut self, row: &LedgerRow) {
        self.versions.entry(row.version).or_insert(row.applied);
    }

    /// Whether `version` is currently applied. Unknown versions are not.
    pub fn is_applied(&self, version: i64) -> bool {
        self.versions.get(&version).copied().unwrap_or(false)
    }

    /// Greatest applied version, or `0` when nothing is applied.
    pub fn database_version(&self) -> i64 {
        self.versions
            .iter()
            .rev()
            .find(|(_, applied)| **applied)
            .map(|(version, _)| *version)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Reads the ledger and reconciles it, bootstrapping the table if needed.
#[derive(Debug, Clone)]
pub struct Reconciler {
    ledger: Ledger,
}

impl Reconciler {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }

    /// Reconcile in a single walk over the ledger. A row that fails to
    /// decode stops the walk and its error is returned.
    pub fn state(&self, db: &dyn Database) -> Result<ReconciledState> {
        let mut state = ReconciledState::default();
        let mut failure = None;
        self.ledger.scan(db, &mut |row| match row {
            Ok(row) => {
                state.record(&row);
                ControlFlow::Continue(())
            }
            Err(e) => {
                failure = Some(e);
                ControlFlow::Break(())
            }
        })?;
        if let Some(e) = failure {
            return Err(e);
        }

        debug!(
            "reconciled {} versions from {}",
            state.len(),
            self.ledger.table()
        );
        Ok(state)
    }

    pub fn database_version(&self, db: &dyn Database) -> Result<i64> {
        Ok(self.state(db)?.database_version())
    }
}
