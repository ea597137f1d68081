/// Distributed execution
///
/// Participants run the same lockstep protocol over a `Communicator`:
///
/// 1. the coordinator broadcasts the record count (negative when it failed
///    to load its input, which ends the run on every rank)
/// 2. each rank computes its `Partition`; the coordinator sends every other
///    rank a record count followed by its records, chunked
/// 3. the coordinator broadcasts the query plan (queries plus flush mode)
/// 4. per query, each rank evaluates its slice into a private buffer, and the
///    buffers are written out in rank order
///
/// Rank order is kept either with barrier-fenced turns (`RankOrdered`) or by
/// shipping every buffer to the coordinator (`Gather`). Since partitions are
/// contiguous in ID order, both yield exactly the sequential output.

use super::compiled::CompiledQuery;
use super::emitter::{OutputBuffer, SharedEmitter};
use super::partition::Partition;
use crate::network::{
    barrier, broadcast_value, local_world, recv_chunked, send_chunked, Communicator, Rank, Tag,
    COORDINATOR,
};
use crate::types::{CarRecord, Query, QueryError};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

/// How per-query result buffers reach the output stream
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum FlushMode {
    /// Every rank writes its own buffer during its barrier-fenced turn
    #[default]
    RankOrdered,
    /// Workers send buffers to the coordinator, which writes them in rank order
    Gather,
}

/// What the coordinator loaded from disk
#[derive(Debug, Clone, Default)]
pub struct CoordinatorInput {
    /// All records, ascending by ID
    pub records: Vec<CarRecord>,
    pub queries: Vec<Query>,
    pub flush: FlushMode,
}

#[derive(Debug, Serialize, Deserialize)]
struct QueryPlan {
    queries: Vec<Query>,
    flush: FlushMode,
}

/// Outcome of one participant's run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticipantReport {
    pub rank: Rank,
    pub participants: usize,
    pub local_records: usize,
    pub queries: usize,
    /// Matches found in this rank's partition
    pub matches: usize,
}

/// Run the protocol as `comm.rank()`.
///
/// The coordinator passes `Some(input)`, or `None` when loading failed so the
/// other ranks can be told to stop. Workers pass `None`.
pub async fn run_participant<C, W>(
    comm: &mut C,
    input: Option<CoordinatorInput>,
    emitter: &SharedEmitter<W>,
) -> Result<ParticipantReport, QueryError>
where
    C: Communicator,
    W: Write + Send,
{
    let rank = comm.rank();
    let participants = comm.size();
    let is_coordinator = comm.is_coordinator();

    let (mut records, coordinator_plan) = match (is_coordinator, input) {
        (true, Some(input)) => (
            input.records,
            Some(QueryPlan {
                queries: input.queries,
                flush: input.flush,
            }),
        ),
        _ => (Vec::new(), None),
    };

    // Step 1: record count
    let announced = if is_coordinator {
        let count = if coordinator_plan.is_some() {
            i64::try_from(records.len())
                .map_err(|_| QueryError::Protocol(format!("{} records", records.len())))?
        } else {
            -1
        };
        broadcast_value(comm, COORDINATOR, Some(count)).await?
    } else {
        broadcast_value::<C, i64>(comm, COORDINATOR, None).await?
    };
    let total = usize::try_from(announced).map_err(|_| {
        QueryError::Aborted("coordinator failed to load its input".to_string())
    })?;

    // Step 2: partitions
    let own = Partition::for_rank(total, participants, rank);
    if is_coordinator {
        for dest in 1..participants {
            let part = Partition::for_rank(total, participants, dest);
            let count = bincode::serialize(&(part.len() as u64))?;
            comm.send(dest, Tag::RecordCount, Bytes::from(count)).await?;
            let data = bincode::serialize(&records[part.range()])?;
            send_chunked(comm, dest, Tag::RecordData, Bytes::from(data)).await?;
            debug!("sent {} records to rank {}", part.len(), dest);
        }
        records.truncate(own.end);
    } else {
        let count_bytes = comm.recv(COORDINATOR, Tag::RecordCount).await?;
        let count: u64 = bincode::deserialize(&count_bytes)?;
        let data = recv_chunked(comm, COORDINATOR, Tag::RecordData).await?;
        records = bincode::deserialize(&data)?;
        if count != records.len() as u64 || records.len() != own.len() {
            return Err(QueryError::Protocol(format!(
                "rank {rank} expected {} records, announced {count}, received {}",
                own.len(),
                records.len()
            )));
        }
    }
    debug!(
        "rank {} holds records [{}, {}) of {}",
        rank, own.start, own.end, total
    );

    // Step 3: query plan
    let plan = if is_coordinator {
        broadcast_value(comm, COORDINATOR, coordinator_plan).await?
    } else {
        broadcast_value::<C, QueryPlan>(comm, COORDINATOR, None).await?
    };

    // Step 4: evaluate and flush, one query at a time
    let mut matches = 0;
    let mut line = String::new();
    for (idx, query) in plan.queries.iter().enumerate() {
        let compiled = CompiledQuery::compile(query);
        let mut buffer = OutputBuffer::new();
        let mut found = 0;
        for record in &records {
            line.clear();
            if compiled.select_into(record, &mut line) {
                buffer.append(line.as_bytes())?;
                found += 1;
            }
        }
        debug!("rank {} query {} matched {} records", rank, idx, found);
        matches += found;

        match plan.flush {
            FlushMode::RankOrdered => {
                barrier(comm).await?;
                for turn in 0..participants {
                    if turn == rank {
                        emitter.emit(buffer.as_bytes())?;
                        emitter.flush()?;
                    }
                    barrier(comm).await?;
                }
            }
            FlushMode::Gather => {
                if is_coordinator {
                    emitter.emit(buffer.as_bytes())?;
                    for src in 1..participants {
                        let remote = recv_chunked(comm, src, Tag::Gather).await?;
                        emitter.emit(&remote)?;
                    }
                    emitter.flush()?;
                } else {
                    let bytes = Bytes::from(buffer.into_bytes());
                    send_chunked(comm, COORDINATOR, Tag::Gather, bytes).await?;
                }
            }
        }
    }

    Ok(ParticipantReport {
        rank,
        participants,
        local_records: records.len(),
        queries: plan.queries.len(),
        matches,
    })
}

/// Run `ranks` participants as tasks in this process and return the
/// coordinator's report. The first failure aborts every remaining task.
pub async fn run_in_process<W>(
    input: CoordinatorInput,
    ranks: usize,
    max_message_bytes: usize,
    emitter: Arc<SharedEmitter<W>>,
) -> Result<ParticipantReport, QueryError>
where
    W: Write + Send + 'static,
{
    run_world(local_world(ranks, max_message_bytes), input, emitter).await
}

/// Drive one task per communicator, ordered by rank, and return the
/// coordinator's report. The first failure aborts every remaining task.
pub async fn run_world<C, W>(
    comms: Vec<C>,
    input: CoordinatorInput,
    emitter: Arc<SharedEmitter<W>>,
) -> Result<ParticipantReport, QueryError>
where
    C: Communicator + 'static,
    W: Write + Send + 'static,
{
    let participants = comms.len();
    let mut input = Some(input);
    let mut tasks = JoinSet::new();
    for mut comm in comms {
        let emitter = Arc::clone(&emitter);
        let input = if comm.is_coordinator() { input.take() } else { None };
        tasks.spawn(async move { run_participant(&mut comm, input, &emitter).await });
    }
    info!("Started {} participants", participants);

    let mut coordinator = None;
    let mut failure: Option<QueryError> = None;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(report)) => {
                if report.rank == COORDINATOR {
                    coordinator = Some(report);
                }
            }
            Ok(Err(e)) => {
                if failure.is_none() {
                    error!("participant failed: {}", e);
                    tasks.abort_all();
                    failure = Some(e);
                }
            }
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                if failure.is_none() {
                    tasks.abort_all();
                    failure = Some(QueryError::ParticipantFailed(e.to_string()));
                }
            }
        }
    }

    if let Some(e) = failure {
        return Err(e);
    }
    coordinator.ok_or_else(|| {
        QueryError::ParticipantFailed("coordinator finished without a report".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SequentialExecutor;
    use crate::network::{LocalCommunicator, MIN_MESSAGE_BYTES};
    use crate::storage::RecordStore;

    /// Local transport whose first receive with `fail_on` errors out
    struct FailingRecv {
        inner: LocalCommunicator,
        fail_on: Option<Tag>,
    }

    impl Communicator for FailingRecv {
        fn rank(&self) -> Rank {
            self.inner.rank()
        }

        fn size(&self) -> usize {
            self.inner.size()
        }

        fn max_message_bytes(&self) -> usize {
            self.inner.max_message_bytes()
        }

        async fn send(&mut self, dest: Rank, tag: Tag, payload: Bytes) -> Result<(), QueryError> {
            self.inner.send(dest, tag, payload).await
        }

        async fn recv(&mut self, src: Rank, tag: Tag) -> Result<Bytes, QueryError> {
            if self.fail_on == Some(tag) {
                self.fail_on = None;
                return Err(QueryError::Transport(format!(
                    "rank {} lost its link to rank {src}",
                    self.inner.rank()
                )));
            }
            self.inner.recv(src, tag).await
        }
    }

    fn generated_store(n: i32) -> RecordStore {
        let models = ["Civic", "Camry", "Accord"];
        let colors = ["Blue", "Red", "Black", "White"];
        (1..=n)
            .map(|i| {
                CarRecord::new(
                    i * 3,
                    models[(i % 3) as usize],
                    2005 + i % 20,
                    colors[(i % 4) as usize],
                    12_000 + (i * 53) % 15_000,
                    "Ganley",
                )
            })
            .collect()
    }

    fn queries() -> Vec<Query> {
        vec![
            Query::new(vec!["ID".to_string(), "Price".to_string()], "Model = \"Civic\" AND Price > 15000"),
            Query::new(vec!["*".to_string()], "Color != \"Blue\" OR YearMake >= 2021"),
            Query::new(vec!["Dealer".to_string(), "Bogus".to_string()], ""),
            Query::new(vec![], "Price <"),
        ]
    }

    async fn distributed_output(
        store: &RecordStore,
        ranks: usize,
        max_message_bytes: usize,
        flush: FlushMode,
    ) -> (Vec<u8>, ParticipantReport) {
        let input = CoordinatorInput {
            records: store.snapshot().unwrap(),
            queries: queries(),
            flush,
        };
        let emitter = Arc::new(SharedEmitter::new(Vec::new()));
        let report = run_in_process(input, ranks, max_message_bytes, Arc::clone(&emitter))
            .await
            .unwrap();
        let emitter = Arc::try_unwrap(emitter).ok().unwrap();
        (emitter.into_inner(), report)
    }

    #[tokio::test]
    async fn test_output_equals_sequential_for_every_world_size() {
        let store = generated_store(257);
        let mut expected = Vec::new();
        SequentialExecutor::run(&store, &queries(), &mut expected).unwrap();

        for flush in [FlushMode::RankOrdered, FlushMode::Gather] {
            for ranks in [1, 2, 3, 5, 8] {
                let (output, report) =
                    distributed_output(&store, ranks, MIN_MESSAGE_BYTES * 4, flush).await;
                assert_eq!(
                    String::from_utf8(output).unwrap(),
                    String::from_utf8(expected.clone()).unwrap(),
                    "ranks={ranks} flush={flush:?}"
                );
                assert_eq!(report.participants, ranks);
                assert_eq!(report.queries, 4);
                assert_eq!(
                    report.local_records,
                    Partition::for_rank(257, ranks, 0).len()
                );
            }
        }
    }

    #[tokio::test]
    async fn test_more_ranks_than_records() {
        let store = generated_store(2);
        let mut expected = Vec::new();
        SequentialExecutor::run(&store, &queries(), &mut expected).unwrap();

        let (output, _) = distributed_output(&store, 4, 64, FlushMode::RankOrdered).await;
        assert_eq!(output, expected);
    }

    #[tokio::test]
    async fn test_empty_database() {
        let (output, report) =
            distributed_output(&RecordStore::new(), 3, 64, FlushMode::Gather).await;
        assert!(output.is_empty());
        assert_eq!(report.matches, 0);
    }

    #[tokio::test]
    async fn test_coordinator_load_failure_stops_every_rank() {
        let mut tasks = JoinSet::new();
        for mut comm in local_world(3, 64) {
            tasks.spawn(async move {
                let emitter = SharedEmitter::new(Vec::new());
                run_participant(&mut comm, None, &emitter).await
            });
        }
        while let Some(joined) = tasks.join_next().await {
            let err = joined.unwrap().unwrap_err();
            assert!(matches!(err, QueryError::Aborted(_)));
        }
    }

    #[tokio::test]
    async fn test_failed_rank_aborts_the_world_before_any_output() {
        let store = generated_store(40);
        let comms: Vec<FailingRecv> = local_world(4, 64)
            .into_iter()
            .map(|inner| {
                let fail_on = (inner.rank() == 2).then_some(Tag::RecordCount);
                FailingRecv { inner, fail_on }
            })
            .collect();
        let input = CoordinatorInput {
            records: store.snapshot().unwrap(),
            queries: queries(),
            flush: FlushMode::RankOrdered,
        };
        let emitter = Arc::new(SharedEmitter::new(Vec::new()));

        let err = run_world(comms, input, Arc::clone(&emitter)).await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)), "{err:?}");

        // Rank 2 never reaches the first flush barrier, so nobody writes
        let emitter = Arc::try_unwrap(emitter).ok().unwrap();
        assert!(emitter.into_inner().is_empty());
    }
}
