// Module declarations
pub mod error;
pub mod value;
pub mod record;
pub mod query;

// Re-exports for convenience
pub use error::QueryError;
pub use value::Literal;
pub use record::{Attribute, CarRecord, FieldRef};
pub use query::Query;
