// carquery - car inventory query engine
// Sequential, shared-memory and distributed execution over one record store

// Clippy configuration - allow non-critical warnings for a small engine
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::type_complexity)]

// Core structures (records, queries, literals, errors)
pub mod core;

// Re-export all core types as types module
pub mod types {
    pub use crate::core::*;
}

// Query file and WHERE clause parsing
pub mod parser;

// Record store and database file ingestion
pub mod storage;

// Execution strategies, evaluation and output
pub mod executor;

// Participant messaging (in-process channels, TCP)
pub mod network;

// Layered runtime settings
pub mod config;

// Re-export commonly used types for convenience
pub use crate::core::{Attribute, CarRecord, Literal, Query, QueryError};
pub use parser::{load_queries, parse_predicate, parse_query_line, Predicate};
pub use storage::{load_database, RecordStore};
pub use executor::{
    FlushMode, SequentialExecutor, SharedEmitter, SharedMemoryExecutor, TimingSummary,
};
pub use network::{Communicator, CoordinatorListener, TcpCommunicator};
pub use config::Settings;
