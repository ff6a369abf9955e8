use std::ops::ControlFlow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark_common::{Error, Result};
use tracing::{debug, info, warn};

use crate::dialect::Dialect;
use crate::handle::Database;
use crate::identifier::validate_table_name;

/// One apply or rollback event. Rows are appended, never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub version: i64,
    pub applied: bool,
    pub tstamp: Option<DateTime<Utc>>,
}

impl LedgerRow {
    pub fn new(version: i64, applied: bool) -> Self {
        Self {
            version,
            applied,
            tstamp: None,
        }
    }
}

/// The append-only version table of one database, accessed through its
/// dialect's statements.
#[derive(Debug, Clone)]
pub struct Ledger {
    dialect: Dialect,
    table: String,
}

impl Ledger {
    pub fn new(dialect: Dialect, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { dialect, table })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table if it does not exist yet.
    pub fn ensure(&self, db: &dyn Database) -> Result<()> {
        db.execute_batch(&self.dialect.create_ledger_sql(&self.table))
            .map_err(|e| {
                Error::Bootstrap(format!("failed to create ledger table {}: {e}", self.table))
            })
    }

    /// Walk every ledger row, most recent first, without timestamps.
    ///
    /// A failing query is taken to mean the table is missing: the table is
    /// created and the query retried once. A fresh table yields no rows.
    pub fn scan(
        &self,
        db: &dyn Database,
        visit: &mut dyn FnMut(Result<LedgerRow>) -> ControlFlow<()>,
    ) -> Result<()> {
        let sql = self.dialect.ledger_rows_sql(&self.table);
        match db.scan_ledger_rows(&sql, &mut *visit) {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("ledger query failed ({e}), bootstrapping {}", self.table);
                self.ensure(db)?;
                info!("created ledger table {}", self.table);
                db.scan_ledger_rows(&sql, visit).inspect_err(|e| {
                    warn!("ledger query still failing after bootstrap: {e}");
                })
            }
        }
    }

    /// The most recent row for `version`, if any.
    pub fn latest(&self, db: &dyn Database, version: i64) -> Result<Option<LedgerRow>> {
        db.query_latest_row(&self.dialect.latest_row_sql(&self.table), version)
    }

    pub fn append(&self, db: &dyn Database, version: i64, applied: bool) -> Result<()> {
        if let Some(delay) = self.dialect.append_delay() {
            std::thread::sleep(delay);
        }
        db.insert_ledger_row(&self.dialect.insert_ledger_sql(&self.table), version, applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn row_count(ledger: &Ledger, conn: &Connection) -> usize {
        let mut count = 0;
        ledger
            .scan(conn, &mut |row| {
                row.unwrap();
                count += 1;
                ControlFlow::Continue(())
            })
            .unwrap();
        count
    }

    fn table_exists(conn: &Connection, name: &str) -> bool {
        conn.query_row(
            "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
            [name],
            |row| row.get(0),
        )
        .unwrap()
    }

    #[test]
    fn rejects_invalid_table_names() {
        let err = Ledger::new(Dialect::Sqlite3, "bad name").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn scan_bootstraps_a_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new(Dialect::Sqlite3, "tidemark_db_version").unwrap();

        assert!(!table_exists(&conn, "tidemark_db_version"));
        assert_eq!(row_count(&ledger, &conn), 0);
        assert!(table_exists(&conn, "tidemark_db_version"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new(Dialect::Sqlite3, "ledger").unwrap();
        ledger.ensure(&conn).unwrap();
        ledger.append(&conn, 1, true).unwrap();
        ledger.ensure(&conn).unwrap();

        assert_eq!(row_count(&ledger, &conn), 1);
    }

    #[test]
    fn latest_returns_most_recent_event() {
        let conn = Connection::open_in_memory().unwrap();
        let ledger = Ledger::new(Dialect::Sqlite3, "ledger").unwrap();
        ledger.ensure(&conn).unwrap();
        ledger.append(&conn, 4, true).unwrap();
        ledger.append(&conn, 4, false).unwrap();
        ledger.append(&conn, 5, true).unwrap();

        let row = ledger.latest(&conn, 4).unwrap().unwrap();
        assert_eq!(row.version, 4);
        assert!(!row.applied);
        assert!(ledger.latest(&conn, 6).unwrap().is_none());
    }
}
