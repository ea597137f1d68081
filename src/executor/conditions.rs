/// Condition evaluation for WHERE clauses
///
/// Integer columns (ID, YearMake, Price) compare numerically and coerce text
/// literals with `atoi`. Text columns (Model, Color, Dealer) compare ASCII
/// case-insensitively; an integer literal compares as the empty string.
/// A column outside the schema compares equal to every literal.

use crate::parser::Predicate;
use crate::types::{Attribute, CarRecord, FieldRef, Literal};
use std::cmp::Ordering;

pub struct ConditionEvaluator;

impl ConditionEvaluator {
    /// Evaluate a parsed predicate against one record
    ///
    /// Every operand of AND/OR is evaluated; there is no short-circuit.
    #[must_use]
    pub fn evaluate(record: &CarRecord, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::MatchAll => true,
            Predicate::Malformed => false,
            Predicate::Or(terms) => terms
                .iter()
                .fold(false, |acc, term| Self::evaluate(record, term) | acc),
            Predicate::And(factors) => factors
                .iter()
                .fold(true, |acc, factor| Self::evaluate(record, factor) & acc),
            Predicate::Compare {
                attribute,
                op,
                literal,
                ..
            } => op.holds(Self::compare(record, *attribute, literal)),
        }
    }

    /// Three-way comparison of a record column against a literal
    #[must_use]
    pub fn compare(record: &CarRecord, attribute: Option<Attribute>, literal: &Literal) -> Ordering {
        // Unknown columns always compare equal (legacy behaviour, kept as-is)
        let Some(attribute) = attribute else {
            return Ordering::Equal;
        };

        match record.field(attribute) {
            FieldRef::Int(lhs) => lhs.cmp(&literal.as_int()),
            FieldRef::Text(lhs) => compare_ignore_ascii_case(lhs, literal.as_text()),
        }
    }
}

/// `strcasecmp` ordering
#[must_use]
pub fn compare_ignore_ascii_case(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}
