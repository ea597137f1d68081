/// WHERE clause parser
///
/// Recursive descent over:
///
/// ```text
/// Expr       := Term (OR Term)*
/// Term       := Factor (AND Factor)*
/// Factor     := '(' Expr [')'] | Comparison
/// Comparison := Identifier Op Literal
/// ```
///
/// Parsing never fails. A comparison that does not parse becomes
/// `Predicate::Malformed` (always false) and leaves the cursor where it was, so
/// only an `AND`/`OR` right at that spot continues the expression. Text left
/// after the expression is ignored. Parentheses nested deeper than
/// `MAX_NESTING` stop the descent the same way a bad comparison does.

use super::common::{identifier, literal, space0, ws};
use crate::core::value::is_c_space;
use crate::types::{Attribute, Literal};
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::char,
    combinator::{map, opt, success, value},
    error::{Error, ErrorKind},
    sequence::{preceded, tuple},
    IResult,
};
use std::cmp::Ordering;
use tracing::trace;

/// Deepest parenthesis nesting parsed; a group opened past it is `Malformed`
pub const MAX_NESTING: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    GtEq,
    LtEq,
}

impl CompareOp {
    /// Map a three-way comparison result onto this operator
    #[must_use]
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering.is_eq(),
            Self::NotEq => ordering.is_ne(),
            Self::Gt => ordering.is_gt(),
            Self::Lt => ordering.is_lt(),
            Self::GtEq => ordering.is_ge(),
            Self::LtEq => ordering.is_le(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Empty WHERE clause
    MatchAll,
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
    Compare {
        column: String,
        /// `None` when `column` is not part of the schema
        attribute: Option<Attribute>,
        op: CompareOp,
        literal: Literal,
    },
    /// Unparsable comparison, evaluates to false
    Malformed,
}

impl Predicate {
    fn any_of(mut terms: Vec<Self>) -> Self {
        if terms.len() == 1 {
            terms.remove(0)
        } else {
            Self::Or(terms)
        }
    }

    fn all_of(mut factors: Vec<Self>) -> Self {
        if factors.len() == 1 {
            factors.remove(0)
        } else {
            Self::And(factors)
        }
    }
}

/// Parse a WHERE clause once; the result is evaluated per record
#[must_use]
pub fn parse_predicate(text: &str) -> Predicate {
    let text = text.trim_start_matches(is_c_space);
    if text.is_empty() {
        return Predicate::MatchAll;
    }

    match expr(text, 0) {
        Ok((rest, predicate)) => {
            if !rest.is_empty() {
                trace!("ignoring unparsed predicate text: {:?}", rest);
            }
            predicate
        }
        Err(_) => Predicate::Malformed,
    }
}

fn compare_op(input: &str) -> IResult<&str, CompareOp> {
    alt((
        value(CompareOp::NotEq, tag("!=")),
        value(CompareOp::GtEq, tag(">=")),
        value(CompareOp::LtEq, tag("<=")),
        value(CompareOp::Gt, tag(">")),
        value(CompareOp::Lt, tag("<")),
        value(CompareOp::Eq, tag("=")),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Predicate> {
    map(
        tuple((ws(identifier), ws(compare_op), ws(literal))),
        |(column, op, literal)| Predicate::Compare {
            column: column.to_string(),
            attribute: Attribute::resolve(column),
            op,
            literal,
        },
    )(input)
}

fn group(input: &str, depth: usize) -> IResult<&str, Predicate> {
    if depth >= MAX_NESTING {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::TooLarge)));
    }
    let (input, _) = char('(')(input)?;
    let (input, inner) = expr(input, depth + 1)?;
    let (input, _) = preceded(space0, opt(char(')')))(input)?;
    Ok((input, inner))
}

fn factor(input: &str, depth: usize) -> IResult<&str, Predicate> {
    let (input, _) = space0(input)?;
    match group(input, depth) {
        Err(nom::Err::Error(_)) => alt((comparison, success(Predicate::Malformed)))(input),
        parsed => parsed,
    }
}

// AND binds tighter than OR
fn term(input: &str, depth: usize) -> IResult<&str, Predicate> {
    let (mut input, first) = factor(input, depth)?;
    let mut factors = vec![first];
    loop {
        let (rest, keyword) = preceded(space0, opt(tag_no_case("AND")))(input)?;
        input = rest;
        if keyword.is_none() {
            break;
        }
        let (rest, next) = factor(input, depth)?;
        factors.push(next);
        input = rest;
    }
    Ok((input, Predicate::all_of(factors)))
}

fn expr(input: &str, depth: usize) -> IResult<&str, Predicate> {
    let (mut input, first) = term(input, depth)?;
    let mut terms = vec![first];
    loop {
        let (rest, keyword) = preceded(space0, opt(tag_no_case("OR")))(input)?;
        input = rest;
        if keyword.is_none() {
            break;
        }
        let (rest, next) = term(input, depth)?;
        terms.push(next);
        input = rest;
    }
    Ok((input, Predicate::any_of(terms)))
}
