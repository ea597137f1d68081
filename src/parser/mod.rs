// Module declarations
mod common;
pub mod predicate;
pub mod query_file;

pub use predicate::{parse_predicate, CompareOp, Predicate};
pub use query_file::{load_queries, parse_query_line, read_queries, MalformedQuery};
