use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("execution error: {0}")]
    Execution(String),

    /// The ledger table could not be created. Nothing else can proceed.
    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    /// A ledger row could not be decoded. `row` is the zero-based position in
    /// the dialect-ordered scan.
    #[error("ledger scan error at row {row}: {reason}")]
    ReconciliationScan { row: usize, reason: String },

    #[error("collection error: {0}")]
    Collection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error means "no such migration" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("\"oracle\": unknown dialect".into());
        assert_eq!(
            e.to_string(),
            "configuration error: \"oracle\": unknown dialect"
        );

        let e = Error::NotFound("no migration 3".into());
        assert_eq!(e.to_string(), "not found: no migration 3");

        let e = Error::Bootstrap("permission denied".into());
        assert_eq!(e.to_string(), "bootstrap error: permission denied");

        let e = Error::ReconciliationScan {
            row: 4,
            reason: "invalid type".into(),
        };
        assert_eq!(e.to_string(), "ledger scan error at row 4: invalid type");
    }

    #[test]
    fn only_not_found_reports_not_found() {
        assert!(Error::NotFound("x".into()).is_not_found());
        assert!(!Error::Execution("x".into()).is_not_found());
    }
}
