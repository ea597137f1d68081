/// In-process transport: every participant is a task in one process and each
/// ordered pair of ranks has its own unbounded channel.

use super::communicator::{check_payload, Communicator, Rank, Tag, MIN_MESSAGE_BYTES};
use crate::types::QueryError;
use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

type Envelope = (Tag, Bytes);

pub struct LocalCommunicator {
    rank: Rank,
    max_message_bytes: usize,
    /// Indexed by destination rank
    outboxes: Vec<UnboundedSender<Envelope>>,
    /// Indexed by source rank
    inboxes: Vec<UnboundedReceiver<Envelope>>,
    /// Messages that arrived ahead of a receive for their tag
    stash: HashMap<(Rank, Tag), VecDeque<Bytes>>,
}

/// Create `size` connected communicators, ordered by rank
#[must_use]
pub fn local_world(size: usize, max_message_bytes: usize) -> Vec<LocalCommunicator> {
    let max_message_bytes = max_message_bytes.max(MIN_MESSAGE_BYTES);
    let size = size.max(1);

    // senders[src][dest], receivers[dest][src]
    let mut senders: Vec<Vec<UnboundedSender<Envelope>>> = (0..size).map(|_| Vec::new()).collect();
    let mut receivers: Vec<Vec<UnboundedReceiver<Envelope>>> =
        (0..size).map(|_| Vec::new()).collect();
    for outboxes in &mut senders {
        for inboxes in &mut receivers {
            let (tx, rx) = mpsc::unbounded_channel();
            outboxes.push(tx);
            inboxes.push(rx);
        }
    }

    senders
        .into_iter()
        .zip(receivers)
        .enumerate()
        .map(|(rank, (outboxes, inboxes))| LocalCommunicator {
            rank,
            max_message_bytes,
            outboxes,
            inboxes,
            stash: HashMap::new(),
        })
        .collect()
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.outboxes.len()
    }

    fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    async fn send(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> Result<(), QueryError> {
        check_payload(payload.len(), self.max_message_bytes)?;
        let outbox = self.outboxes.get(dest).ok_or_else(|| {
            QueryError::Transport(format!("rank {dest} is outside a world of {}", self.size()))
        })?;
        outbox
            .send((tag, payload))
            .map_err(|_| QueryError::Transport(format!("rank {dest} has disconnected")))
    }

    async fn recv(&mut self, src: Rank, tag: Tag) -> Result<Bytes, QueryError> {
        if let Some(payload) = self.stash.get_mut(&(src, tag)).and_then(VecDeque::pop_front) {
            return Ok(payload);
        }
        let size = self.inboxes.len();
        let inbox = self.inboxes.get_mut(src).ok_or_else(|| {
            QueryError::Transport(format!("rank {src} is outside a world of {size}"))
        })?;
        loop {
            match inbox.recv().await {
                Some((got, payload)) if got == tag => return Ok(payload),
                Some((got, payload)) => {
                    self.stash.entry((src, got)).or_default().push_back(payload);
                }
                None => {
                    return Err(QueryError::Transport(format!("rank {src} has disconnected")));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_with_other_tags_are_held_back() {
        let mut world = local_world(2, 64);
        let mut b = world.pop().unwrap();
        let mut a = world.pop().unwrap();

        a.send(1, Tag::RecordCount, Bytes::from_static(b"count")).await.unwrap();
        a.send(1, Tag::RecordData, Bytes::from_static(b"first")).await.unwrap();
        a.send(1, Tag::RecordData, Bytes::from_static(b"second")).await.unwrap();

        assert_eq!(b.recv(0, Tag::RecordData).await.unwrap().as_ref(), b"first");
        assert_eq!(b.recv(0, Tag::RecordCount).await.unwrap().as_ref(), b"count");
        assert_eq!(b.recv(0, Tag::RecordData).await.unwrap().as_ref(), b"second");
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected() {
        let mut world = local_world(2, 16);
        let mut a = world.remove(0);
        let err = a
            .send(1, Tag::Broadcast, Bytes::from(vec![0u8; 17]))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_dropped_peer_surfaces_as_transport_error() {
        let mut world = local_world(2, 64);
        let peer = world.pop().unwrap();
        let mut a = world.pop().unwrap();
        drop(peer);

        let err = a.recv(1, Tag::Gather).await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
        let err = a.send(1, Tag::Gather, Bytes::new()).await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)));
    }
}
