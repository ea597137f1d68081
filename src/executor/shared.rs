/// Shared-memory parallel execution
///
/// The store is copied once into a flat snapshot so workers never touch the
/// tree. A fixed-size rayon pool runs queries in parallel, and inside each
/// query workers claim small chunks of the snapshot from a shared cursor until
/// it is exhausted (dynamic scheduling, so expensive predicates on one region
/// do not stall a static slice). Matches go straight to the shared emitter.
///
/// Line order across workers is unspecified; the set of lines is the same as
/// the sequential strategy produces.

use super::compiled::CompiledQuery;
use super::emitter::SharedEmitter;
use super::timing::RunStats;
use crate::storage::RecordStore;
use crate::types::{CarRecord, Query, QueryError};
use rayon::prelude::*;
use std::io::Write;
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error, warn};

/// Default number of records claimed per chunk
pub const DEFAULT_CHUNK_ROWS: usize = 64;

/// Shared cursor handing out `[start, end)` ranges on demand
#[derive(Debug)]
pub struct ChunkCursor {
    next: AtomicUsize,
    len: usize,
    chunk: usize,
}

impl ChunkCursor {
    #[must_use]
    pub fn new(len: usize, chunk: usize) -> Self {
        Self {
            next: AtomicUsize::new(0),
            len,
            chunk: chunk.max(1),
        }
    }

    /// Claim the next unprocessed range, or `None` when everything is handed out
    pub fn claim(&self) -> Option<Range<usize>> {
        let start = self.next.fetch_add(self.chunk, Ordering::Relaxed);
        if start >= self.len {
            return None;
        }
        Some(start..(start + self.chunk).min(self.len))
    }
}

pub struct SharedMemoryExecutor {
    pool: rayon::ThreadPool,
    chunk_rows: usize,
}

impl SharedMemoryExecutor {
    pub fn new(threads: usize, chunk_rows: usize) -> Result<Self, QueryError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("carquery-worker-{i}"))
            .build()
            .map_err(|e| QueryError::ThreadPool(e.to_string()))?;
        Ok(Self {
            pool,
            chunk_rows: chunk_rows.max(1),
        })
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run every query; queries themselves are spread across the pool
    pub fn run<W: Write + Send>(
        &self,
        store: &RecordStore,
        queries: &[Query],
        emitter: &SharedEmitter<W>,
    ) -> Result<RunStats, QueryError> {
        let snapshot = match store.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Not fatal: report and skip the queries
                error!("failed to snapshot {} records: {}", store.count(), e);
                for idx in 0..queries.len() {
                    warn!("query {} skipped", idx);
                }
                return Ok(RunStats {
                    queries: queries.len(),
                    matches: 0,
                    skipped: queries.len(),
                });
            }
        };

        let per_query: Vec<usize> = self.pool.install(|| {
            queries
                .par_iter()
                .enumerate()
                .map(|(idx, query)| {
                    let matches = self.execute_query(&snapshot, query, emitter)?;
                    debug!("query {} matched {} records", idx, matches);
                    Ok(matches)
                })
                .collect::<Result<Vec<usize>, QueryError>>()
        })?;

        emitter.flush()?;
        Ok(RunStats {
            queries: queries.len(),
            matches: per_query.iter().sum(),
            skipped: 0,
        })
    }

    /// Evaluate one query over the snapshot with dynamic chunk claiming.
    ///
    /// Must be called from inside the pool so nested work shares its workers.
    fn execute_query<W: Write + Send>(
        &self,
        snapshot: &[CarRecord],
        query: &Query,
        emitter: &SharedEmitter<W>,
    ) -> Result<usize, QueryError> {
        let compiled = CompiledQuery::compile(query);
        let cursor = ChunkCursor::new(snapshot.len(), self.chunk_rows);
        let workers = rayon::current_num_threads();

        let counts = (0..workers)
            .into_par_iter()
            .map(|_worker| {
                let mut matches = 0;
                let mut line = String::new();
                while let Some(range) = cursor.claim() {
                    for record in &snapshot[range] {
                        line.clear();
                        if compiled.select_into(record, &mut line) {
                            emitter.emit_line(&line)?;
                            matches += 1;
                        }
                    }
                }
                Ok(matches)
            })
            .collect::<Result<Vec<usize>, QueryError>>()?;

        Ok(counts.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SequentialExecutor;

    fn generated_store(n: i32) -> RecordStore {
        let models = ["Civic", "Camry", "Accord", "Corolla"];
        let colors = ["Blue", "Red", "Black", "White", "Gray"];
        (1..=n)
            .map(|i| {
                CarRecord::new(
                    i,
                    models[(i % 4) as usize],
                    2000 + i % 25,
                    colors[(i % 5) as usize],
                    10_000 + (i * 37) % 20_000,
                    "Dealer",
                )
            })
            .collect()
    }

    fn sorted_lines(bytes: Vec<u8>) -> Vec<String> {
        let mut lines: Vec<String> = String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        lines.sort();
        lines
    }

    #[test]
    fn test_chunk_cursor_covers_range_once() {
        let cursor = ChunkCursor::new(10, 3);
        let mut claimed = Vec::new();
        while let Some(range) = cursor.claim() {
            claimed.push(range);
        }
        assert_eq!(claimed, vec![0..3, 3..6, 6..9, 9..10]);
        assert!(cursor.claim().is_none());
    }

    #[test]
    fn test_matches_sequential_multiset() {
        let store = generated_store(2_000);
        let queries = vec![
            Query::new(vec!["*".to_string()], "Model = \"Civic\" OR Price < 12000"),
            Query::new(vec!["ID".to_string(), "Color".to_string()], "Color != \"red\" AND YearMake >= 2010"),
            Query::new(vec![], ""),
        ];

        let mut expected = Vec::new();
        SequentialExecutor::run(&store, &queries, &mut expected).unwrap();

        let executor = SharedMemoryExecutor::new(4, 16).unwrap();
        let emitter = SharedEmitter::new(Vec::new());
        let stats = executor.run(&store, &queries, &emitter).unwrap();

        assert_eq!(stats.queries, 3);
        assert_eq!(stats.skipped, 0);
        assert_eq!(sorted_lines(emitter.into_inner()), sorted_lines(expected));
    }

    #[test]
    fn test_pool_size_is_configurable() {
        let executor = SharedMemoryExecutor::new(3, DEFAULT_CHUNK_ROWS).unwrap();
        assert_eq!(executor.threads(), 3);
    }

    #[test]
    fn test_empty_store() {
        let executor = SharedMemoryExecutor::new(2, 8).unwrap();
        let emitter = SharedEmitter::new(Vec::new());
        let stats = executor
            .run(&RecordStore::new(), &[Query::new(vec![], "")], &emitter)
            .unwrap();
        assert_eq!(stats.matches, 0);
        assert!(emitter.into_inner().is_empty());
    }

    #[test]
    fn test_deeply_nested_predicate_on_pool_threads() {
        let store = generated_store(100);
        let deep = format!("{}Price > 0", "(".repeat(100_000));
        let executor = SharedMemoryExecutor::new(2, 8).unwrap();
        let emitter = SharedEmitter::new(Vec::new());
        let stats = executor.run(&store, &[Query::new(vec![], deep)], &emitter).unwrap();
        assert_eq!(stats.matches, 0);
        assert!(emitter.into_inner().is_empty());
    }
}
