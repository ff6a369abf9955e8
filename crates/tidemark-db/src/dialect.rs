use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tidemark_common::Error;

/// SQL backend supplying the ledger statements.
///
/// Selected once at startup and passed by value into the ledger and migrator.
/// Every variant creates the same four logical columns (`id`, `version_id`,
/// `is_applied`, `tstamp`) and returns ledger rows most-recent-first; only the
/// SQL syntax differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite3,
    Redshift,
    TiDb,
    ClickHouse,
}

impl Dialect {
    pub const ALL: [Dialect; 6] = [
        Dialect::Postgres,
        Dialect::MySql,
        Dialect::Sqlite3,
        Dialect::Redshift,
        Dialect::TiDb,
        Dialect::ClickHouse,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
            Dialect::Sqlite3 => "sqlite3",
            Dialect::Redshift => "redshift",
            Dialect::TiDb => "tidb",
            Dialect::ClickHouse => "clickhouse",
        }
    }

    pub fn create_ledger_sql(self, table: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id serial NOT NULL,
                    version_id bigint NOT NULL,
                    is_applied boolean NOT NULL,
                    tstamp timestamp NULL default now(),
                    PRIMARY KEY(id)
                );"
            ),
            Dialect::Sqlite3 => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    version_id INTEGER NOT NULL,
                    is_applied INTEGER NOT NULL,
                    tstamp TIMESTAMP DEFAULT (datetime('now'))
                );"
            ),
            Dialect::Redshift => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id integer NOT NULL identity(1, 1),
                    version_id bigint NOT NULL,
                    is_applied boolean NOT NULL,
                    tstamp timestamp NULL default sysdate,
                    PRIMARY KEY(id)
                );"
            ),
            Dialect::TiDb => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT UNIQUE,
                    version_id bigint NOT NULL,
                    is_applied boolean NOT NULL,
                    tstamp timestamp NULL default now(),
                    PRIMARY KEY(id)
                );"
            ),
            // No monotonic id: ordering relies on tstamp, see `append_delay`.
            Dialect::ClickHouse => format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    version_id Int64,
                    is_applied UInt8 DEFAULT 0,
                    tstamp DateTime DEFAULT now(),
                    date Date DEFAULT toDate(tstamp)
                ) engine=MergeTree(date, (version_id, tstamp), 8192)"
            ),
        }
    }

    /// Parameterized by `(version_id, is_applied)`.
    pub fn insert_ledger_sql(self, table: &str) -> String {
        let (first, second) = self.placeholders();
        format!("INSERT INTO {table} (version_id, is_applied) VALUES ({first}, {second});")
    }

    /// All ledger rows, most recent first. Only the columns reconciliation
    /// needs are selected.
    pub fn ledger_rows_sql(self, table: &str) -> String {
        format!(
            "SELECT version_id, is_applied FROM {table} ORDER BY {}",
            self.recency_order()
        )
    }

    /// The most recent row for one version, parameterized by `version_id`.
    pub fn latest_row_sql(self, table: &str) -> String {
        let (first, _) = self.placeholders();
        format!(
            "SELECT version_id, is_applied, tstamp FROM {table} WHERE version_id = {first} ORDER BY {} LIMIT 1",
            self.recency_order()
        )
    }

    /// Pause required before each ledger insert. ClickHouse stores
    /// second-resolution timestamps and has no insertion id, so two rows
    /// written within the same second would be unordered.
    pub fn append_delay(self) -> Option<Duration> {
        match self {
            Dialect::ClickHouse => Some(Duration::from_secs(1)),
            _ => None,
        }
    }

    fn placeholders(self) -> (&'static str, &'static str) {
        match self {
            Dialect::Postgres | Dialect::Redshift | Dialect::ClickHouse => ("$1", "$2"),
            Dialect::MySql | Dialect::Sqlite3 | Dialect::TiDb => ("?", "?"),
        }
    }

    fn recency_order(self) -> &'static str {
        match self {
            Dialect::ClickHouse => "tstamp DESC",
            _ => "id DESC",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "sqlite3" | "sqlite" => Ok(Dialect::Sqlite3),
            "redshift" => Ok(Dialect::Redshift),
            "tidb" => Ok(Dialect::TiDb),
            "clickhouse" => Ok(Dialect::ClickHouse),
            other => Err(Error::Config(format!("{other:?}: unknown dialect"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_known_name() {
        for dialect in Dialect::ALL {
            assert_eq!(dialect.name().parse::<Dialect>().unwrap(), dialect);
        }
        assert_eq!("sqlite".parse::<Dialect>().unwrap(), Dialect::Sqlite3);
    }

    #[test]
    fn unknown_dialect_is_a_config_error() {
        let err = "oracle".parse::<Dialect>().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(
            err.to_string(),
            "configuration error: \"oracle\": unknown dialect"
        );
    }

    #[test]
    fn every_dialect_creates_the_logical_columns_idempotently() {
        for dialect in Dialect::ALL {
            let sql = dialect.create_ledger_sql("ledger");
            assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS ledger"), "{dialect}");
            for column in ["version_id", "is_applied", "tstamp"] {
                assert!(sql.contains(column), "{dialect} missing {column}");
            }
        }
    }

    #[test]
    fn placeholders_follow_backend_syntax() {
        assert_eq!(
            Dialect::Postgres.insert_ledger_sql("t"),
            "INSERT INTO t (version_id, is_applied) VALUES ($1, $2);"
        );
        assert_eq!(
            Dialect::MySql.insert_ledger_sql("t"),
            "INSERT INTO t (version_id, is_applied) VALUES (?, ?);"
        );
        assert!(Dialect::Sqlite3.latest_row_sql("t").contains("version_id = ?"));
        assert!(Dialect::Redshift.latest_row_sql("t").contains("version_id = $1"));
    }

    #[test]
    fn rows_are_ordered_most_recent_first() {
        for dialect in Dialect::ALL {
            let sql = dialect.ledger_rows_sql("t");
            let expected = if dialect == Dialect::ClickHouse {
                "ORDER BY tstamp DESC"
            } else {
                "ORDER BY id DESC"
            };
            assert!(sql.ends_with(expected), "{dialect}: {sql}");
            assert!(sql.starts_with("SELECT version_id, is_applied FROM t "), "{dialect}");
        }
    }

    #[test]
    fn only_clickhouse_delays_appends() {
        for dialect in Dialect::ALL {
            assert_eq!(
                dialect.append_delay().is_some(),
                dialect == Dialect::ClickHouse
            );
        }
    }
}
