/// SELECT list rendering
///
/// A matching record becomes one text line: either all six columns in schema
/// order, or the requested columns in the requested order. Unknown names
/// render as an empty token.

use crate::types::{Attribute, CarRecord, Query};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Columns(Vec<Option<Attribute>>),
}

impl Projection {
    #[must_use]
    pub fn from_query(query: &Query) -> Self {
        if query.selects_all() {
            Self::All
        } else {
            Self::Columns(
                query
                    .projection
                    .iter()
                    .map(|name| Attribute::resolve(name))
                    .collect(),
            )
        }
    }

    /// Append the rendered line, including the trailing newline, to `out`
    pub fn render_into(&self, record: &CarRecord, out: &mut String) {
        // Writing into a String cannot fail
        match self {
            Self::All => {
                let _ = writeln!(out, "{record}");
            }
            Self::Columns(columns) => {
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    if let Some(attribute) = column {
                        let _ = write!(out, "{}", record.field(*attribute));
                    }
                }
                out.push('\n');
            }
        }
    }

    #[must_use]
    pub fn render(&self, record: &CarRecord) -> String {
        let mut line = String::new();
        self.render_into(record, &mut line);
        line
    }
}
