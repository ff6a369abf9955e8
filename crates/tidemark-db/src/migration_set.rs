use tidemark_common::{Error, Result};

use crate::migration::Migration;

/// Migrations ordered by ascending version, unique by version.
#[derive(Debug, Clone, Default)]
pub struct MigrationSet {
    migrations: Vec<Migration>,
}

impl MigrationSet {
    /// Sort `migrations` ascending and reject duplicate or non-positive
    /// versions. Version `0` is reserved for "nothing applied".
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        if let Some(m) = migrations.iter().find(|m| m.version <= 0) {
            return Err(Error::Collection(format!(
                "migration version must be positive: {} has version {}",
                m.source, m.version
            )));
        }
        migrations.sort_by_key(|m| m.version);
        if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
            return Err(Error::Collection(format!(
                "duplicate migration version {}: {} and {}",
                pair[0].version, pair[0].source, pair[1].source
            )));
        }
        Ok(Self { migrations })
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Migration> {
        self.migrations.iter()
    }

    /// All migrations, descending.
    pub fn descending(&self) -> impl Iterator<Item = &Migration> {
        self.migrations.iter().rev()
    }

    /// The migration whose version is exactly `version`.
    pub fn current(&self, version: i64) -> Result<&Migration> {
        self.migrations
            .binary_search_by_key(&version, |m| m.version)
            .map(|idx| &self.migrations[idx])
            .map_err(|_| Error::NotFound(format!("no migration {version}")))
    }

    /// First migration strictly above `version`.
    pub fn next_after(&self, version: i64) -> Option<&Migration> {
        let idx = self.migrations.partition_point(|m| m.version <= version);
        self.migrations.get(idx)
    }
}

impl<'a> IntoIterator for &'a MigrationSet {
    type Item = &'a Migration;
    type IntoIter = std::slice::Iter<'a, Migration>;

    fn into_iter(self) -> Self::IntoIter {
        self.migrations.iter()
    }
}
