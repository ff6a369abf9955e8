//! Traversal commands over the reconciled database version.
//!
//! Every command re-reads the ledger before deciding what to run, except
//! `reset`, which works from a single snapshot taken up front. Only one
//! runner per database and ledger table is assumed; there is no locking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tidemark_common::{Error, Result};
use tracing::info;

use crate::dialect::Dialect;
use crate::executor::Executor;
use crate::handle::Database;
use crate::ledger::Ledger;
use crate::migration_set::MigrationSet;
use crate::reconcile::Reconciler;

/// One line of the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub version: i64,
    pub source: String,
    /// Timestamp of the applying ledger row; `None` while pending.
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    pub fn is_pending(&self) -> bool {
        self.applied_at.is_none()
    }
}

pub struct Migrator {
    migrations: MigrationSet,
    reconciler: Reconciler,
    executor: Executor,
}

impl Migrator {
    pub fn new(dialect: Dialect, table: &str, migrations: MigrationSet) -> Result<Self> {
        let ledger = Ledger::new(dialect, table)?;
        Ok(Self {
            migrations,
            reconciler: Reconciler::new(ledger.clone()),
            executor: Executor::new(ledger),
        })
    }

    pub fn ledger(&self) -> &Ledger {
        self.executor.ledger()
    }

    /// Current database version, creating the ledger table if needed.
    pub fn version(&self, db: &dyn Database) -> Result<i64> {
        let version = self.reconciler.database_version(db)?;
        info!("version {version}");
        Ok(version)
    }

    /// Apply the first migration above the current version.
    pub fn up_by_one(&self, db: &dyn Database) -> Result<Option<i64>> {
        let current = self.reconciler.database_version(db)?;
        let Some(next) = self.migrations.next_after(current) else {
            info!("no migrations to run. current version: {current}");
            return Ok(None);
        };
        self.executor.apply_up(db, next)?;
        Ok(Some(next.version))
    }

    /// Apply migrations in ascending order until `target` is reached.
    /// Returns the versions applied.
    pub fn up_to(&self, db: &dyn Database, target: i64) -> Result<Vec<i64>> {
        let mut applied = Vec::new();
        loop {
            let current = self.reconciler.database_version(db)?;
            let next = match self.migrations.next_after(current) {
                Some(next) if next.version <= target => next,
                _ => {
                    info!("no migrations to run. current version: {current}");
                    return Ok(applied);
                }
            };
            self.executor.apply_up(db, next)?;
            applied.push(next.version);
        }
    }

    /// Apply every pending migration above the current version.
    pub fn up(&self, db: &dyn Database) -> Result<Vec<i64>> {
        self.up_to(db, i64::MAX)
    }

    /// Roll back the migration at the current version.
    pub fn down(&self, db: &dyn Database) -> Result<i64> {
        let current = self.reconciler.database_version(db)?;
        let migration = self.migrations.current(current)?;
        self.executor.apply_down(db, migration)?;
        Ok(migration.version)
    }

    /// Roll back one migration at a time while the current version is above
    /// `target`. Returns the versions rolled back, newest first.
    pub fn down_to(&self, db: &dyn Database, target: i64) -> Result<Vec<i64>> {
        let mut rolled_back = Vec::new();
        loop {
            let current = self.reconciler.database_version(db)?;
            let migration = match self.migrations.current(current) {
                Ok(m) if m.version > target => m,
                _ => {
                    info!("no migrations to run. current version: {current}");
                    return Ok(rolled_back);
                }
            };
            self.executor.apply_down(db, migration)?;
            rolled_back.push(migration.version);
        }
    }

    /// Roll back the current migration and apply it again. If the second
    /// step fails the version stays recorded as rolled back.
    pub fn redo(&self, db: &dyn Database) -> Result<i64> {
        let current = self.reconciler.database_version(db)?;
        let migration = self.migrations.current(current)?;
        self.executor.apply_down(db, migration)?;
        self.executor.apply_up(db, migration)?;
        Ok(migration.version)
    }

    /// Roll back every applied migration, newest first. The applied set is
    /// read once before the first rollback.
    pub fn reset(&self, db: &dyn Database) -> Result<Vec<i64>> {
        let state = self.reconciler.state(db)?;
        let mut rolled_back = Vec::new();
        for migration in self
            .migrations
            .descending()
            .filter(|m| state.is_applied(m.version))
        {
            self.executor.apply_down(db, migration)?;
            rolled_back.push(migration.version);
        }
        if rolled_back.is_empty() {
            info!("no migrations to run. nothing is applied");
        }
        Ok(rolled_back)
    }

    /// Latest ledger event for every known migration, ascending.
    pub fn status(&self, db: &dyn Database) -> Result<Vec<MigrationStatus>> {
        let ledger = self.ledger();
        ledger.ensure(db)?;

        self.migrations
            .iter()
            .map(|migration| -> Result<MigrationStatus> {
                let applied_at = match ledger.latest(db, migration.version)? {
                    Some(row) if row.applied => Some(row.tstamp.ok_or_else(|| {
                        Error::Execution(format!(
                            "ledger row for version {} has no timestamp",
                            migration.version
                        ))
                    })?),
                    _ => None,
                };
                Ok(MigrationStatus {
                    version: migration.version,
                    source: migration.source_name().to_string(),
                    applied_at,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::Migration;
    use rusqlite::Connection;

    fn migrator(versions: &[i64]) -> Migrator {
        let set = MigrationSet::new(
            versions
                .iter()
                .map(|&v| {
                    Migration::sql(
                        v,
                        format!("migrations/{v:05}_t{v}.sql"),
                        format!("CREATE TABLE t{v} (id INTEGER);"),
                        format!("DROP TABLE t{v};"),
                    )
                })
                .collect(),
        )
        .unwrap();
        Migrator::new(Dialect::Sqlite3, "tidemark_db_version", set).unwrap()
    }

    #[test]
    fn up_by_one_advances_a_single_step() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1, 2, 3]);

        assert_eq!(m.up_by_one(&conn).unwrap(), Some(1));
        assert_eq!(m.up_by_one(&conn).unwrap(), Some(2));
        assert_eq!(m.version(&conn).unwrap(), 2);
    }

    #[test]
    fn up_by_one_at_the_top_is_not_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1]);
        m.up(&conn).unwrap();
        assert_eq!(m.up_by_one(&conn).unwrap(), None);
    }

    #[test]
    fn up_to_stops_at_target_inclusive() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1, 2, 5, 8]);

        assert_eq!(m.up_to(&conn, 5).unwrap(), vec![1, 2, 5]);
        assert_eq!(m.version(&conn).unwrap(), 5);
        assert_eq!(m.up_to(&conn, 7).unwrap(), Vec::<i64>::new());
        assert_eq!(m.up(&conn).unwrap(), vec![8]);
    }

    #[test]
    fn down_without_applied_migrations_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1, 2]);
        let err = m.down(&conn).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn redo_without_applied_migrations_is_not_found() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1, 2]);
        assert!(m.redo(&conn).unwrap_err().is_not_found());
    }

    #[test]
    fn status_reports_pending_and_applied() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1, 2]);
        m.up_by_one(&conn).unwrap();

        let status = m.status(&conn).unwrap();
        assert_eq!(status.len(), 2);
        assert_eq!(status[0].version, 1);
        assert_eq!(status[0].source, "00001_t1.sql");
        assert!(!status[0].is_pending());
        assert!(status[1].is_pending());
    }

    #[test]
    fn status_reads_fractional_timestamps() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1]);
        m.up(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO tidemark_db_version (version_id, is_applied, tstamp)
             VALUES (1, 1, '2024-03-05 10:11:12.345');",
        )
        .unwrap();

        let applied_at = m.status(&conn).unwrap()[0].applied_at.unwrap();
        assert_eq!(applied_at.to_rfc3339(), "2024-03-05T10:11:12.345+00:00");
    }

    #[test]
    fn applied_row_without_timestamp_fails_status() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1]);
        m.up(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO tidemark_db_version (version_id, is_applied, tstamp) VALUES (1, 1, NULL);",
        )
        .unwrap();

        let err = m.status(&conn).unwrap_err();
        assert!(matches!(err, Error::Execution(_)), "{err}");
    }

    #[test]
    fn status_treats_rolled_back_as_pending() {
        let conn = Connection::open_in_memory().unwrap();
        let m = migrator(&[1]);
        m.up(&conn).unwrap();
        m.down(&conn).unwrap();
        assert!(m.status(&conn).unwrap()[0].is_pending());
    }
}
