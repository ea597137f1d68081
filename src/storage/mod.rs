// Storage module - ordered record store and database file ingestion

mod record_store;
pub mod loader;

pub use record_store::RecordStore;
pub use loader::{load_database, read_database, LoadReport};
