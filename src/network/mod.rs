// Network module - participant messaging for distributed runs

pub mod communicator;
pub mod collective;
pub mod local;
pub mod tcp;

pub use communicator::{Communicator, Rank, Tag, COORDINATOR, DEFAULT_MAX_MESSAGE_BYTES, MIN_MESSAGE_BYTES};
pub use collective::{barrier, broadcast, broadcast_value, recv_chunked, send_chunked};
pub use local::{local_world, LocalCommunicator};
pub use tcp::{CoordinatorListener, TcpCommunicator};
