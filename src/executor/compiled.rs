use super::conditions::ConditionEvaluator;
use super::projection::Projection;
use crate::parser::{parse_predicate, Predicate};
use crate::types::{CarRecord, Query};

/// A query with its WHERE clause parsed and SELECT list resolved, ready to
/// run against many records
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    pub predicate: Predicate,
    pub projection: Projection,
}

impl CompiledQuery {
    #[must_use]
    pub fn compile(query: &Query) -> Self {
        Self {
            predicate: parse_predicate(&query.predicate),
            projection: Projection::from_query(query),
        }
    }

    #[must_use]
    pub fn matches(&self, record: &CarRecord) -> bool {
        ConditionEvaluator::evaluate(record, &self.predicate)
    }

    /// Render `record` into `line` when it matches; returns whether it did
    pub fn select_into(&self, record: &CarRecord, line: &mut String) -> bool {
        if self.matches(record) {
            self.projection.render_into(record, line);
            true
        } else {
            false
        }
    }
}
