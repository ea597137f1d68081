/// Collective operations built on point-to-point messaging
///
/// - chunked transfer: a payload of any size is sent as an 8-byte length
///   header followed by pieces no larger than the transport bound
/// - broadcast: the root pushes one payload to every other participant
/// - barrier: all participants arrive at the coordinator before any leaves
///
/// Everything here only needs `send`/`recv`, so every transport gets the
/// same collectives.

use super::communicator::{Communicator, Rank, Tag, COORDINATOR};
use crate::types::QueryError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

const LENGTH_HEADER_BYTES: usize = 8;

/// Send `payload` to `dest` in pieces of at most `max_message_bytes`
pub async fn send_chunked<C: Communicator>(
    comm: &mut C,
    dest: Rank,
    tag: Tag,
    payload: Bytes,
) -> Result<(), QueryError> {
    let mut header = BytesMut::with_capacity(LENGTH_HEADER_BYTES);
    header.put_u64(payload.len() as u64);
    comm.send(dest, tag, header.freeze()).await?;

    let chunk = comm.max_message_bytes().max(1);
    let mut offset = 0;
    while offset < payload.len() {
        let end = (offset + chunk).min(payload.len());
        comm.send(dest, tag, payload.slice(offset..end)).await?;
        offset = end;
    }
    Ok(())
}

/// Receive a payload written by `send_chunked`
pub async fn recv_chunked<C: Communicator>(
    comm: &mut C,
    src: Rank,
    tag: Tag,
) -> Result<Bytes, QueryError> {
    let mut header = comm.recv(src, tag).await?;
    if header.len() != LENGTH_HEADER_BYTES {
        return Err(QueryError::Protocol(format!(
            "expected {LENGTH_HEADER_BYTES}-byte length header from rank {src}, got {} bytes",
            header.len()
        )));
    }
    let total = usize::try_from(header.get_u64())
        .map_err(|_| QueryError::OutOfMemory(format!("payload from rank {src} too large")))?;

    let mut data = Vec::new();
    data.try_reserve_exact(total)?;
    while data.len() < total {
        let piece = comm.recv(src, tag).await?;
        if piece.is_empty() || data.len() + piece.len() > total {
            return Err(QueryError::Protocol(format!(
                "chunk of {} bytes from rank {src} does not fit the announced {total} bytes",
                piece.len()
            )));
        }
        data.extend_from_slice(&piece);
    }
    Ok(Bytes::from(data))
}

/// Deliver the root's payload to every participant.
///
/// The root passes `Some(payload)`; everyone else passes `None` and gets the
/// root's bytes back.
pub async fn broadcast<C: Communicator>(
    comm: &mut C,
    root: Rank,
    payload: Option<Bytes>,
) -> Result<Bytes, QueryError> {
    if comm.rank() == root {
        let payload = payload.ok_or_else(|| {
            QueryError::Protocol(format!("broadcast root {root} has no payload"))
        })?;
        for dest in (0..comm.size()).filter(|&r| r != root) {
            send_chunked(comm, dest, Tag::Broadcast, payload.clone()).await?;
        }
        Ok(payload)
    } else {
        recv_chunked(comm, root, Tag::Broadcast).await
    }
}

/// Broadcast a serializable value
pub async fn broadcast_value<C, T>(
    comm: &mut C,
    root: Rank,
    value: Option<T>,
) -> Result<T, QueryError>
where
    C: Communicator,
    T: Serialize + DeserializeOwned,
{
    if comm.rank() == root {
        let value = value.ok_or_else(|| {
            QueryError::Protocol(format!("broadcast root {root} has no value"))
        })?;
        let bytes = Bytes::from(bincode::serialize(&value)?);
        broadcast(comm, root, Some(bytes)).await?;
        Ok(value)
    } else {
        let bytes = broadcast(comm, root, None).await?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

/// Block until every participant has entered the barrier
pub async fn barrier<C: Communicator>(comm: &mut C) -> Result<(), QueryError> {
    if comm.size() <= 1 {
        return Ok(());
    }
    if comm.is_coordinator() {
        for src in 1..comm.size() {
            comm.recv(src, Tag::BarrierArrive).await?;
        }
        for dest in 1..comm.size() {
            comm.send(dest, Tag::BarrierRelease, Bytes::new()).await?;
        }
    } else {
        comm.send(COORDINATOR, Tag::BarrierArrive, Bytes::new()).await?;
        comm.recv(COORDINATOR, Tag::BarrierRelease).await?;
    }
    Ok(())
}
