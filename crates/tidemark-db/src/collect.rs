//! Loads migrations from a directory of annotated SQL files.
//!
//! A migration file is named `<version>_<description>.sql` and split into
//! sections by annotation comments:
//!
//! ```sql
//! -- +tidemark Up
//! CREATE TABLE users (id INTEGER PRIMARY KEY);
//!
//! -- +tidemark Down
//! DROP TABLE users;
//! ```
//!
//! The `Down` section is optional; without it a rollback only records the
//! ledger row.

use std::path::Path;

use tidemark_common::{Error, Result};
use tracing::debug;

use crate::migration::Migration;
use crate::migration_set::MigrationSet;

const UP_ANNOTATION: &str = "-- +tidemark Up";
const DOWN_ANNOTATION: &str = "-- +tidemark Down";

/// Collect the `.sql` migrations in `dir` whose version lies in
/// `min..=max`.
pub fn collect(dir: &Path, min: i64, max: i64) -> Result<MigrationSet> {
    collect_with(dir, min, max, Vec::new())
}

/// Like [`collect`], also merging natively defined migrations. The same
/// range filter applies to `native`.
pub fn collect_with(
    dir: &Path,
    min: i64,
    max: i64,
    native: Vec<Migration>,
) -> Result<MigrationSet> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        Error::Collection(format!(
            "failed to read migrations directory {}: {e}",
            dir.display()
        ))
    })?;

    let mut migrations = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| Error::Collection(format!("failed to read directory entry: {e}")))?
            .path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "sql") {
            continue;
        }

        let version = parse_version(&path)?;
        if version < min || version > max {
            debug!("skipping {} outside {min}..={max}", path.display());
            continue;
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            Error::Collection(format!("failed to read {}: {e}", path.display()))
        })?;
        let (up, down) = split_sections(&contents)
            .map_err(|reason| Error::Collection(format!("{}: {reason}", path.display())))?;

        migrations.push(Migration::sql(
            version,
            path.to_string_lossy().into_owned(),
            up,
            down,
        ));
    }

    migrations.extend(
        native
            .into_iter()
            .filter(|m| m.version >= min && m.version <= max),
    );

    let set = MigrationSet::new(migrations)?;
    debug!("collected {} migrations from {}", set.len(), dir.display());
    Ok(set)
}

/// Numeric prefix of the file name, before the first `_`.
fn parse_version(path: &Path) -> Result<i64> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    let prefix = stem.split('_').next().unwrap_or("");

    let version: i64 = prefix.parse().map_err(|_| {
        Error::Collection(format!(
            "malformed migration file name {}: expected <version>_<description>.sql",
            path.display()
        ))
    })?;
    if version <= 0 {
        return Err(Error::Collection(format!(
            "migration version must be positive: {}",
            path.display()
        )));
    }
    Ok(version)
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Preamble,
    Up,
    Down,
}

fn split_sections(contents: &str) -> std::result::Result<(String, String), String> {
    let mut section = Section::Preamble;
    let mut seen_up = false;
    let mut seen_down = false;
    let mut up = String::new();
    let mut down = String::new();

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed == UP_ANNOTATION {
            if seen_up {
                return Err("duplicate Up annotation".into());
            }
            seen_up = true;
            section = Section::Up;
            continue;
        }
        if trimmed == DOWN_ANNOTATION {
            if seen_down {
                return Err("duplicate Down annotation".into());
            }
            seen_down = true;
            section = Section::Down;
            continue;
        }

        match section {
            Section::Preamble => {
                if !trimmed.is_empty() && !trimmed.starts_with("--") {
                    return Err("statement before the Up annotation".into());
                }
            }
            Section::Up => {
                up.push_str(line);
                up.push('\n');
            }
            Section::Down => {
                down.push_str(line);
                down.push('\n');
            }
        }
    }

    if !seen_up {
        return Err(format!("missing `{UP_ANNOTATION}` annotation"));
    }
    Ok((up, down))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_up_and_down_sections() {
        let (up, down) = split_sections(
            "-- create users\n-- +tidemark Up\nCREATE TABLE users (id INT);\n\n-- +tidemark Down\nDROP TABLE users;\n",
        )
        .unwrap();
        assert_eq!(up.trim(), "CREATE TABLE users (id INT);");
        assert_eq!(down.trim(), "DROP TABLE users;");
    }

    #[test]
    fn down_section_is_optional() {
        let (up, down) = split_sections("-- +tidemark Up\nSELECT 1;\n").unwrap();
        assert_eq!(up.trim(), "SELECT 1;");
        assert!(down.is_empty());
    }

    #[test]
    fn rejects_unannotated_or_misplaced_sql() {
        assert!(split_sections("CREATE TABLE t (id INT);").is_err());
        assert!(split_sections("SELECT 1;\n-- +tidemark Up\nSELECT 2;").is_err());
        assert!(split_sections("-- +tidemark Up\n-- +tidemark Up\n").is_err());
        assert!(split_sections("-- +tidemark Up\n-- +tidemark Down\n-- +tidemark Down\n").is_err());
    }

    #[test]
    fn version_comes_from_the_file_name_prefix() {
        assert_eq!(parse_version(Path::new("db/00042_add_email.sql")).unwrap(), 42);
        assert_eq!(parse_version(Path::new("20240101120000_init.sql")).unwrap(), 20240101120000);
        assert!(parse_version(Path::new("init.sql")).is_err());
        assert!(parse_version(Path::new("0_zero.sql")).is_err());
    }
}
