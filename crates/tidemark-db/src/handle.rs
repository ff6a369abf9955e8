use std::ops::ControlFlow;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tidemark_common::{Error, Result};

use crate::ledger::LedgerRow;

/// Blocking database handle passed to every command and migration action.
///
/// Implementations only move SQL text and values; statements come from the
/// `Dialect`, ordering guarantees come from the SQL itself.
pub trait Database {
    /// Run one or more `;`-separated statements.
    fn execute_batch(&self, sql: &str) -> Result<()>;

    /// Run a parameterized insert with `(version_id, is_applied)`.
    fn insert_ledger_row(&self, sql: &str, version: i64, applied: bool) -> Result<()>;

    /// Run the ledger scan and hand each row to `visit` as it is read. The
    /// returned error means the query itself failed (typically a missing
    /// table). Per-row decode failures go to `visit` as
    /// `Error::ReconciliationScan` and end the walk.
    fn scan_ledger_rows(
        &self,
        sql: &str,
        visit: &mut dyn FnMut(Result<LedgerRow>) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Run the latest-row lookup for one version.
    fn query_latest_row(&self, sql: &str, version: i64) -> Result<Option<LedgerRow>>;
}

impl Database for Connection {
    fn execute_batch(&self, sql: &str) -> Result<()> {
        Connection::execute_batch(self, sql)
            .map_err(|e| Error::Execution(format!("statement failed: {e}")))
    }

    fn insert_ledger_row(&self, sql: &str, version: i64, applied: bool) -> Result<()> {
        self.execute(sql, params![version, applied])
            .map_err(|e| Error::Execution(format!("failed to append ledger row: {e}")))?;
        Ok(())
    }

    fn scan_ledger_rows(
        &self,
        sql: &str,
        visit: &mut dyn FnMut(Result<LedgerRow>) -> ControlFlow<()>,
    ) -> Result<()> {
        let mut stmt = self
            .prepare(sql)
            .map_err(|e| Error::Execution(format!("failed to prepare ledger query: {e}")))?;

        let mut rows = stmt
            .query([])
            .map_err(|e| Error::Execution(format!("failed to query ledger: {e}")))?;

        let scan_error = |row: usize, e: rusqlite::Error| Error::ReconciliationScan {
            row,
            reason: e.to_string(),
        };
        let mut index = 0;
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let decoded = decode_event(row).map_err(|e| scan_error(index, e));
                    if visit(decoded).is_break() {
                        return Ok(());
                    }
                }
                Ok(None) => return Ok(()),
                Err(e) => {
                    let _ = visit(Err(scan_error(index, e)));
                    return Ok(());
                }
            }
            index += 1;
        }
    }

    fn query_latest_row(&self, sql: &str, version: i64) -> Result<Option<LedgerRow>> {
        let mut stmt = self
            .prepare(sql)
            .map_err(|e| Error::Execution(format!("failed to prepare latest-row query: {e}")))?;

        stmt.query_row(params![version], decode_row)
            .optional()
            .map_err(|e| Error::Execution(format!("failed to read ledger row for {version}: {e}")))
    }
}

/// `(version_id, is_applied)`, as selected by the reconciliation scan.
fn decode_event(row: &Row<'_>) -> rusqlite::Result<LedgerRow> {
    Ok(LedgerRow::new(row.get(0)?, row.get(1)?))
}

/// `(version_id, is_applied, tstamp)`, as selected by the latest-row lookup.
fn decode_row(row: &Row<'_>) -> rusqlite::Result<LedgerRow> {
    let tstamp = match row.get::<_, Option<String>>(2)? {
        Some(raw) => Some(parse_timestamp(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(LedgerRow {
        version: row.get(0)?,
        applied: row.get(1)?,
        tstamp,
    })
}

/// Accepts RFC 3339 and sqlite's `datetime('now')` form (`YYYY-MM-DD HH:MM:SS`,
/// always UTC), with or without fractional seconds.
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Ok(dt.with_timezone(&Utc)),
        Err(_) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|n| n.and_utc()),
    }
}
