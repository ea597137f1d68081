/// Query file loader
///
/// One query per line: `SELECT <attrs> FROM <table> WHERE <predicate>[;]`.
/// Keywords are located by plain substring search (case-sensitive, first
/// occurrence). Lines that fail the keyword checks are skipped with a warning.

use super::common::trim_clause;
use crate::core::query::{MAX_ATTR_LEN, MAX_PROJECTION};
use crate::core::value::is_c_space;
use crate::types::{Query, QueryError};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

const SELECT: &str = "SELECT";
const FROM: &str = "FROM";
const WHERE: &str = "WHERE";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedQuery {
    #[error("missing {0} keyword")]
    MissingKeyword(&'static str),
    #[error("FROM does not follow the SELECT list")]
    ProjectionOrder,
}

/// Load every well-formed query in the file at `path`
pub fn load_queries(path: &Path) -> Result<Vec<Query>, QueryError> {
    let file = File::open(path).map_err(|e| QueryError::from_io(path, e))?;
    let (queries, skipped) = read_queries(BufReader::new(file))?;
    if skipped > 0 {
        warn!("{} malformed queries skipped in {}", skipped, path.display());
    }
    info!("Processing {} queries from {}", queries.len(), path.display());
    Ok(queries)
}

/// Read queries from any buffered source; returns the queries and the number of skipped lines
pub fn read_queries<R: BufRead>(reader: R) -> Result<(Vec<Query>, usize), QueryError> {
    let mut queries = Vec::new();
    let mut skipped = 0;

    for line in reader.lines() {
        let line = line?;
        if line.trim_matches(is_c_space).is_empty() {
            continue;
        }
        match parse_query_line(&line) {
            Ok(query) => queries.push(query),
            Err(reason) => {
                warn!("skipping malformed query ({}): {}", reason, line);
                skipped += 1;
            }
        }
    }

    Ok((queries, skipped))
}

pub fn parse_query_line(line: &str) -> Result<Query, MalformedQuery> {
    let select_pos = line.find(SELECT).ok_or(MalformedQuery::MissingKeyword(SELECT))?;
    let from_pos = line.find(FROM).ok_or(MalformedQuery::MissingKeyword(FROM))?;
    let where_pos = line.find(WHERE).ok_or(MalformedQuery::MissingKeyword(WHERE))?;

    let after_select = &line[select_pos + SELECT.len()..];
    let projection_start = line.len() - after_select.trim_start_matches(is_c_space).len();
    if from_pos <= projection_start {
        return Err(MalformedQuery::ProjectionOrder);
    }

    let projection = parse_projection(&line[projection_start..from_pos]);
    let predicate = trim_clause(&line[where_pos + WHERE.len()..]);

    Ok(Query::new(projection, predicate))
}

/// Comma-separated attribute list; empty pieces vanish, at most six are kept
fn parse_projection(text: &str) -> Vec<String> {
    trim_clause(text)
        .split(',')
        .filter(|token| !token.is_empty())
        .take(MAX_PROJECTION)
        .map(|token| trim_clause(token).chars().take(MAX_ATTR_LEN).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_basic_query() {
        let q = parse_query_line("SELECT ID, Price FROM cars WHERE Model = \"Civic\" AND Price > 15000;").unwrap();
        assert_eq!(q.projection, vec!["ID", "Price"]);
        assert_eq!(q.predicate, "Model = \"Civic\" AND Price > 15000");
    }

    #[test]
    fn test_wildcard_projection() {
        let q = parse_query_line("SELECT * FROM cars WHERE Color != \"Blue\"").unwrap();
        assert!(q.selects_all());
    }

    #[test]
    fn test_projection_is_capped_at_six() {
        let q = parse_query_line("SELECT ID,Model,YearMake,Color,Price,Dealer,ID,Model FROM cars WHERE ID > 0").unwrap();
        assert_eq!(q.projection.len(), MAX_PROJECTION);
        assert_eq!(q.projection[5], "Dealer");
    }

    #[test]
    fn test_empty_projection_pieces_are_dropped() {
        let q = parse_query_line("SELECT ,,ID,, Price , FROM cars WHERE").unwrap();
        assert_eq!(q.projection, vec!["ID", "Price"]);
        assert_eq!(q.predicate, "");
    }

    #[test]
    fn test_missing_keyword() {
        assert_eq!(
            parse_query_line("SELECT ID FROM cars"),
            Err(MalformedQuery::MissingKeyword("WHERE"))
        );
        assert_eq!(
            parse_query_line("select ID FROM cars WHERE ID = 1"),
            Err(MalformedQuery::MissingKeyword("SELECT"))
        );
    }

    #[test]
    fn test_from_must_follow_projection() {
        assert_eq!(
            parse_query_line("SELECT FROM cars WHERE ID = 1"),
            Err(MalformedQuery::ProjectionOrder)
        );
        assert_eq!(
            parse_query_line("FROM cars SELECT ID WHERE ID = 1"),
            Err(MalformedQuery::ProjectionOrder)
        );
    }

    #[test]
    fn test_read_skips_blank_and_malformed_lines() {
        let data = "SELECT * FROM cars WHERE ID = 1\n\
                    \n\
                    garbage line\n\
                    SELECT ID FROM cars WHERE Price < 100;\n";
        let (queries, skipped) = read_queries(Cursor::new(data)).unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(skipped, 1);
        assert_eq!(queries[1].predicate, "Price < 100");
    }
}
