/// TCP transport for participants in separate processes
///
/// Star topology: every worker holds one connection to the coordinator and
/// nothing else. Frame layout on the wire:
///
/// ```text
/// u32 tag | u32 payload length | payload
/// ```
///
/// Integers are big-endian. Connection setup: the worker sends `Hello` with
/// its rank, the coordinator answers `Hello` with the world size and its
/// per-message bound once every worker has checked in. Workers adopt that
/// bound so both ends of a link agree on it.

use super::communicator::{check_payload, Communicator, Rank, Tag, COORDINATOR, MIN_MESSAGE_BYTES};
use crate::types::QueryError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, info};

const FRAME_HEADER_BYTES: usize = 8;
const WELCOME_BYTES: usize = 8;

struct Link {
    /// Peer description used in errors
    peer: String,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Link {
    fn new(stream: TcpStream, peer: String) -> Result<Self, QueryError> {
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            peer,
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn write_frame(&mut self, tag: Tag, payload: &[u8]) -> Result<(), QueryError> {
        let len = u32::try_from(payload.len())
            .map_err(|_| QueryError::Transport(format!("frame of {} bytes", payload.len())))?;
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_BYTES + payload.len());
        buf.put_u32(tag as u32);
        buf.put_u32(len);
        buf.put_slice(payload);
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn read_frame(&mut self, max: usize) -> Result<(Tag, Bytes), QueryError> {
        let raw_tag = match self.reader.read_u32().await {
            Ok(tag) => tag,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(QueryError::Transport(format!("{} has disconnected", self.peer)));
            }
            Err(e) => return Err(e.into()),
        };
        let tag = Tag::from_u32(raw_tag)
            .ok_or_else(|| QueryError::Protocol(format!("unknown tag {raw_tag} from {}", self.peer)))?;
        let len = self.reader.read_u32().await? as usize;
        if len > max {
            return Err(QueryError::Protocol(format!(
                "frame of {len} bytes from {} exceeds the {max} byte limit",
                self.peer
            )));
        }
        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload).await?;
        Ok((tag, Bytes::from(payload)))
    }
}

pub struct TcpCommunicator {
    rank: Rank,
    size: usize,
    max_message_bytes: usize,
    /// Indexed by peer rank; `None` where no route exists
    links: Vec<Option<Link>>,
    stash: HashMap<(Rank, Tag), VecDeque<Bytes>>,
}

/// Listening side of the coordinator, bound before any worker connects
pub struct CoordinatorListener {
    listener: TcpListener,
}

impl CoordinatorListener {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, QueryError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, QueryError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for ranks `1..world_size` to connect, then release them all
    pub async fn accept(
        self,
        world_size: usize,
        max_message_bytes: usize,
    ) -> Result<TcpCommunicator, QueryError> {
        let world_size = world_size.max(1);
        let max_message_bytes = max_message_bytes.max(MIN_MESSAGE_BYTES);
        let mut links: Vec<Option<Link>> = (0..world_size).map(|_| None).collect();

        info!(
            "Waiting for {} workers on {}",
            world_size - 1,
            self.listener.local_addr()?
        );
        let mut joined = 1;
        while joined < world_size {
            let (stream, peer_addr) = self.listener.accept().await?;
            let mut link = Link::new(stream, peer_addr.to_string())?;
            let (tag, mut payload) = link.read_frame(MIN_MESSAGE_BYTES).await?;
            if tag != Tag::Hello || payload.len() != 4 {
                return Err(QueryError::Protocol(format!(
                    "expected hello from {peer_addr}, got {tag:?} with {} bytes",
                    payload.len()
                )));
            }
            let rank = payload.get_u32() as usize;
            if rank == COORDINATOR || rank >= world_size {
                return Err(QueryError::Protocol(format!(
                    "{peer_addr} claims rank {rank} in a world of {world_size}"
                )));
            }
            if links[rank].is_some() {
                return Err(QueryError::Protocol(format!(
                    "rank {rank} connected twice (second from {peer_addr})"
                )));
            }
            debug!("rank {} connected from {}", rank, peer_addr);
            link.peer = format!("rank {rank}");
            links[rank] = Some(link);
            joined += 1;
        }

        let mut welcome = BytesMut::with_capacity(WELCOME_BYTES);
        welcome.put_u32(
            u32::try_from(world_size)
                .map_err(|_| QueryError::Protocol(format!("world size {world_size}")))?,
        );
        welcome.put_u32(u32::try_from(max_message_bytes).map_err(|_| {
            QueryError::Protocol(format!("message bound {max_message_bytes}"))
        })?);
        for link in links.iter_mut().flatten() {
            link.write_frame(Tag::Hello, &welcome).await?;
        }

        Ok(TcpCommunicator {
            rank: COORDINATOR,
            size: world_size,
            max_message_bytes,
            links,
            stash: HashMap::new(),
        })
    }
}

impl TcpCommunicator {
    /// Join the coordinator at `addr` as `rank`; returns once every worker has
    /// joined. The per-message bound is the coordinator's.
    pub async fn connect<A: ToSocketAddrs>(addr: A, rank: Rank) -> Result<Self, QueryError> {
        if rank == COORDINATOR {
            return Err(QueryError::Protocol(
                "rank 0 is the coordinator and cannot connect as a worker".to_string(),
            ));
        }
        let wire_rank = u32::try_from(rank)
            .map_err(|_| QueryError::Protocol(format!("rank {rank} is out of range")))?;

        let mut link = Link::new(TcpStream::connect(addr).await?, "coordinator".to_string())?;
        link.write_frame(Tag::Hello, &wire_rank.to_be_bytes()).await?;

        let (tag, mut payload) = link.read_frame(MIN_MESSAGE_BYTES).await?;
        if tag != Tag::Hello || payload.len() != WELCOME_BYTES {
            return Err(QueryError::Protocol(format!(
                "expected welcome from coordinator, got {tag:?} with {} bytes",
                payload.len()
            )));
        }
        let size = payload.get_u32() as usize;
        let max_message_bytes = payload.get_u32() as usize;
        if rank >= size {
            return Err(QueryError::Protocol(format!(
                "rank {rank} is outside a world of {size}"
            )));
        }
        if max_message_bytes < MIN_MESSAGE_BYTES {
            return Err(QueryError::Protocol(format!(
                "coordinator announced a {max_message_bytes} byte message bound"
            )));
        }

        let mut links: Vec<Option<Link>> = (0..size).map(|_| None).collect();
        links[COORDINATOR] = Some(link);
        info!(
            "Joined a world of {} as rank {} ({} byte messages)",
            size, rank, max_message_bytes
        );

        Ok(Self {
            rank,
            size,
            max_message_bytes,
            links,
            stash: HashMap::new(),
        })
    }
}

fn no_route(from: Rank, to: Rank) -> QueryError {
    QueryError::Transport(format!("no route from rank {from} to rank {to}"))
}

impl Communicator for TcpCommunicator {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn max_message_bytes(&self) -> usize {
        self.max_message_bytes
    }

    async fn send(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> Result<(), QueryError> {
        check_payload(payload.len(), self.max_message_bytes)?;
        if dest == self.rank {
            self.stash.entry((dest, tag)).or_default().push_back(payload);
            return Ok(());
        }
        let rank = self.rank;
        let link = self
            .links
            .get_mut(dest)
            .and_then(Option::as_mut)
            .ok_or_else(|| no_route(rank, dest))?;
        link.write_frame(tag, &payload).await
    }

    async fn recv(&mut self, src: Rank, tag: Tag) -> Result<Bytes, QueryError> {
        if let Some(payload) = self.stash.get_mut(&(src, tag)).and_then(VecDeque::pop_front) {
            return Ok(payload);
        }
        let (rank, max) = (self.rank, self.max_message_bytes);
        let link = self
            .links
            .get_mut(src)
            .and_then(Option::as_mut)
            .ok_or_else(|| no_route(rank, src))?;
        loop {
            let (got, payload) = link.read_frame(max).await?;
            if got == tag {
                return Ok(payload);
            }
            self.stash.entry((src, got)).or_default().push_back(payload);
        }
    }
}
