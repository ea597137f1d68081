use serde::{Deserialize, Serialize};

/// At most this many attributes are kept from a SELECT list
pub const MAX_PROJECTION: usize = 6;

/// Longest attribute name kept from a SELECT list
pub const MAX_ATTR_LEN: usize = 19;

/// A loaded `SELECT <attrs> FROM <table> WHERE <predicate>` line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Requested attribute names, as written (may contain `*` or unknown names)
    pub projection: Vec<String>,
    /// Raw WHERE text, trimmed
    pub predicate: String,
}

impl Query {
    #[must_use]
    pub fn new(projection: Vec<String>, predicate: impl Into<String>) -> Self {
        Self {
            projection,
            predicate: predicate.into(),
        }
    }

    /// True for an empty projection or the single wildcard `*`
    #[must_use]
    pub fn selects_all(&self) -> bool {
        match self.projection.as_slice() {
            [] => true,
            [only] => only == "*",
            _ => false,
        }
    }
}
