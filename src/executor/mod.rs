/// Executor module - runs parsed queries over the record store
///
/// Structure:
/// - conditions: WHERE clause evaluation against one record
/// - projection: SELECT list rendering
/// - compiled: predicate and projection prepared once per query
/// - emitter: shared output stream and per-rank staging buffers
/// - sequential / shared / distributed: the three execution strategies
/// - partition: contiguous record split across distributed participants
/// - timing: run counters and the trailing timing summary

pub mod conditions;
pub mod projection;
pub mod compiled;
pub mod emitter;
pub mod timing;
pub mod sequential;
pub mod shared;
pub mod partition;
pub mod distributed;

pub use conditions::ConditionEvaluator;
pub use projection::Projection;
pub use compiled::CompiledQuery;
pub use emitter::{OutputBuffer, SharedEmitter};
pub use timing::{RunStats, TimingSummary};
pub use sequential::SequentialExecutor;
pub use shared::{SharedMemoryExecutor, DEFAULT_CHUNK_ROWS};
pub use partition::Partition;
pub use distributed::{
    run_in_process, run_participant, run_world, CoordinatorInput, FlushMode, ParticipantReport,
};
