pub mod collect;
pub mod dialect;
pub mod executor;
pub mod handle;
pub mod identifier;
pub mod ledger;
pub mod migration;
pub mod migration_set;
pub mod migrator;
pub mod reconcile;

pub use collect::{collect, collect_with};
pub use dialect::Dialect;
pub use executor::Executor;
pub use handle::Database;
pub use ledger::{Ledger, LedgerRow};
pub use migration::{Action, Migration};
pub use migration_set::MigrationSet;
pub use migrator::{MigrationStatus, Migrator};
pub use reconcile::{ReconciledState, Reconciler};
