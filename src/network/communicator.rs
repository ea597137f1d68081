use crate::types::QueryError;
use bytes::Bytes;
use std::future::Future;

/// Participant index, `0..size`
pub type Rank = usize;

/// Rank that owns file I/O and coordinates collectives
pub const COORDINATOR: Rank = 0;

/// Smallest per-message bound a transport accepts; the chunk header must fit
pub const MIN_MESSAGE_BYTES: usize = 16;

/// Default per-message bound (1 MiB)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Message kinds; a receive only matches a message with the same tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Tag {
    Hello = 0,
    Broadcast = 1,
    RecordCount = 2,
    RecordData = 3,
    BarrierArrive = 4,
    BarrierRelease = 5,
    Gather = 6,
}

impl Tag {
    #[must_use]
    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Hello),
            1 => Some(Self::Broadcast),
            2 => Some(Self::RecordCount),
            3 => Some(Self::RecordData),
            4 => Some(Self::BarrierArrive),
            5 => Some(Self::BarrierRelease),
            6 => Some(Self::Gather),
            _ => None,
        }
    }
}

/// Reliable point-to-point messaging between participants.
///
/// A single message may carry at most `max_message_bytes()`; larger payloads
/// go through the chunked helpers in `collective`. Messages from one source
/// with one tag arrive in send order.
pub trait Communicator: Send {
    fn rank(&self) -> Rank;

    fn size(&self) -> usize;

    fn max_message_bytes(&self) -> usize;

    fn send(
        &mut self,
        dest: Rank,
        tag: Tag,
        payload: Bytes,
    ) -> impl Future<Output = Result<(), QueryError>> + Send;

    fn recv(&mut self, src: Rank, tag: Tag) -> impl Future<Output = Result<Bytes, QueryError>> + Send;

    fn is_coordinator(&self) -> bool {
        self.rank() == COORDINATOR
    }
}

/// Reject payloads above the transport bound
pub(crate) fn check_payload(len: usize, max: usize) -> Result<(), QueryError> {
    if len > max {
        return Err(QueryError::Transport(format!(
            "message of {len} bytes exceeds the {max} byte limit"
        )));
    }
    Ok(())
}
