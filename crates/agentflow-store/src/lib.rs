pub mod migrate;
pub mod store;

pub use migrate::{migrate_legacy_store, MigrationReport};
pub use store::SqliteStore;
