/// Single-threaded execution
///
/// Walks the record store in ascending ID order for each query and writes
/// every match immediately, so output order is exactly reproducible.

use super::compiled::CompiledQuery;
use super::timing::RunStats;
use crate::storage::RecordStore;
use crate::types::{Query, QueryError};
use std::io::Write;
use std::ops::ControlFlow;
use tracing::debug;

pub struct SequentialExecutor;

impl SequentialExecutor {
    /// Run every query in order
    pub fn run<W: Write>(
        store: &RecordStore,
        queries: &[Query],
        out: &mut W,
    ) -> Result<RunStats, QueryError> {
        let mut stats = RunStats::default();
        for (idx, query) in queries.iter().enumerate() {
            let matches = Self::execute_query(store, query, out)?;
            debug!("query {} matched {} records", idx, matches);
            stats.queries += 1;
            stats.matches += matches;
        }
        out.flush()?;
        Ok(stats)
    }

    /// Evaluate one query over the whole store; returns the number of matches
    pub fn execute_query<W: Write>(
        store: &RecordStore,
        query: &Query,
        out: &mut W,
    ) -> Result<usize, QueryError> {
        let compiled = CompiledQuery::compile(query);
        let mut matches = 0;
        let mut line = String::new();

        let flow = store.ascend(|record| {
            line.clear();
            if !compiled.select_into(record, &mut line) {
                return ControlFlow::Continue(());
            }
            matches += 1;
            match out.write_all(line.as_bytes()) {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => ControlFlow::Break(e),
            }
        });

        match flow {
            ControlFlow::Continue(()) => Ok(matches),
            ControlFlow::Break(e) => Err(e.into()),
        }
    }
}
