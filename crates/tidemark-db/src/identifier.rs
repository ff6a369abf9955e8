use std::sync::LazyLock;

use regex::Regex;
use tidemark_common::{Error, Result};

/// Optional `schema.` prefix followed by a plain identifier.
static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z_][A-Za-z0-9_]*\.)?[A-Za-z_][A-Za-z0-9_]*$")
        .expect("table name pattern is valid")
});

/// Longest identifier accepted by every supported backend (postgres: 63).
const MAX_IDENTIFIER_LEN: usize = 63;

/// Check that a ledger table name can be interpolated into SQL as-is.
pub fn validate_table_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::Config("ledger table name cannot be empty".into()));
    }
    if name.split('.').any(|part| part.len() > MAX_IDENTIFIER_LEN) {
        return Err(Error::Config(format!(
            "ledger table name too long: {name}"
        )));
    }
    if !TABLE_NAME.is_match(name) {
        return Err(Error::Config(format!(
            "invalid ledger table name: {name:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::validate_table_name;

    #[test]
    fn accepts_plain_and_schema_qualified_names() {
        assert!(validate_table_name("tidemark_db_version").is_ok());
        assert!(validate_table_name("public.ledger").is_ok());
        assert!(validate_table_name("_ledger2").is_ok());
    }

    #[test]
    fn rejects_names_that_would_break_sql() {
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("ledger; DROP TABLE users").is_err());
        assert!(validate_table_name("2ledger").is_err());
        assert!(validate_table_name("a.b.c").is_err());
        assert!(validate_table_name("led ger").is_err());
    }

    #[test]
    fn rejects_overlong_identifiers() {
        let too_long = "a".repeat(64);
        assert!(validate_table_name(&too_long).is_err());
        assert!(validate_table_name(&"a".repeat(63)).is_ok());
    }
}
