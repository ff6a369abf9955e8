use rusqlite::Connection;
use tidemark_common::{Error, Result};
use tidemark_db::Dialect;
use tracing::info;

/// Open a blocking connection for `dialect`. Only sqlite3 has a driver in
/// this build; the other dialects fail with a configuration error.
pub fn open(dialect: Dialect, dsn: &str) -> Result<Connection> {
    match dialect {
        Dialect::Sqlite3 => {
            info!("opening sqlite database at {dsn}");
            let conn = Connection::open(dsn)
                .map_err(|e| Error::Execution(format!("failed to open database {dsn}: {e}")))?;
            conn.execute_batch("PRAGMA foreign_keys=ON;")
                .map_err(|e| Error::Execution(format!("failed to set pragmas: {e}")))?;
            Ok(conn)
        }
        other => Err(Error::Config(format!(
            "no driver linked for dialect {other}; this build connects to sqlite3 only"
        ))),
    }
}
