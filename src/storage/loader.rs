/// Database file ingestion
///
/// Format: one header line (ignored), then one record per line:
/// `ID Model YearMake Color Price Dealer`, whitespace separated.
/// Ingestion stops at the first line that does not scan as six fields;
/// everything read before it is kept. A line with extra tokens still yields
/// its first six fields, and ingestion stops right after it.

use super::record_store::RecordStore;
use crate::types::{CarRecord, QueryError};
use crate::core::value::is_c_space;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Databases at or below this size are dumped at debug level after loading
const DEBUG_DUMP_LIMIT: usize = 10;

/// Outcome of reading a database stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Record lines accepted (duplicates included)
    pub accepted: usize,
    /// 1-based line number of the malformed line that stopped ingestion
    pub stopped_at_line: Option<usize>,
    /// Set when that line still produced a record from its leading fields
    pub trailing_fields: bool,
}

/// Load the database file at `path` into a new store
pub fn load_database(path: &Path) -> Result<RecordStore, QueryError> {
    let file = File::open(path).map_err(|e| QueryError::from_io(path, e))?;
    let (store, report) = read_database(BufReader::new(file))
        .map_err(|e| match e {
            QueryError::MissingHeader(_) => QueryError::MissingHeader(path.to_path_buf()),
            other => other,
        })?;

    if let Some(line) = report.stopped_at_line {
        if report.trailing_fields {
            warn!(
                "extra fields on line {} of {}; kept its first six and stopped",
                line,
                path.display()
            );
        } else {
            warn!("malformed line {} encountered in {}", line, path.display());
        }
    }
    info!("Loaded {} tuples from {}", store.count(), path.display());

    if store.count() <= DEBUG_DUMP_LIMIT {
        let _: ControlFlow<()> = store.ascend(|record| {
            debug!("{}", record);
            ControlFlow::Continue(())
        });
    }

    Ok(store)
}

/// Read a database from any buffered source
pub fn read_database<R: BufRead>(reader: R) -> Result<(RecordStore, LoadReport), QueryError> {
    let mut lines = reader.lines();
    match lines.next() {
        Some(header) => {
            header?;
        }
        None => return Err(QueryError::MissingHeader(PathBuf::new())),
    }

    let mut store = RecordStore::new();
    let mut report = LoadReport::default();

    for (idx, line) in lines.enumerate() {
        let line = line?;
        if line.trim_matches(is_c_space).is_empty() {
            continue;
        }
        match parse_record_line(&line) {
            Some(record) => {
                store.upsert(record);
                report.accepted += 1;
                if record_fields(&line).nth(6).is_some() {
                    report.stopped_at_line = Some(idx + 2);
                    report.trailing_fields = true;
                    break;
                }
            }
            None => {
                // +2: header is line 1 and enumerate starts at 0
                report.stopped_at_line = Some(idx + 2);
                break;
            }
        }
    }

    Ok((store, report))
}

fn record_fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(is_c_space).filter(|f| !f.is_empty())
}

/// Scan the first six fields; integer columns must parse as `i32`.
/// Tokens past the sixth are left to the caller.
#[must_use]
pub fn parse_record_line(line: &str) -> Option<CarRecord> {
    let mut fields = record_fields(line);
    let (Some(id), Some(model), Some(year_make), Some(color), Some(price), Some(dealer)) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        return None;
    };

    Some(CarRecord::new(
        id.parse().ok()?,
        model,
        year_make.parse().ok()?,
        color,
        price.parse().ok()?,
        dealer,
    ))
}
