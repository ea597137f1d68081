use crate::core::value::{is_c_space, parse_leading_int};
use crate::types::Literal;
use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::char,
    combinator::{map, opt},
    error::{Error, ErrorKind},
    sequence::{preceded, terminated},
    IResult,
};

/// Skip C whitespace
pub fn space0(input: &str) -> IResult<&str, &str> {
    take_while(is_c_space)(input)
}

/// Run `inner` after skipping leading whitespace
pub fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    preceded(space0, inner)
}

/// `[A-Za-z0-9_]+`
pub fn identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_')(input)
}

/// Optional sign and decimal digits (`strtol` base 10)
pub fn integer_literal(input: &str) -> IResult<&str, i32> {
    match parse_leading_int(input) {
        Some((value, consumed)) => Ok((&input[consumed..], value)),
        None => Err(nom::Err::Error(Error::new(input, ErrorKind::Digit))),
    }
}

/// Double-quoted text; a missing closing quote runs to the end of input
pub fn string_literal(input: &str) -> IResult<&str, &str> {
    terminated(preceded(char('"'), take_while(|c| c != '"')), opt(char('"')))(input)
}

pub fn literal(input: &str) -> IResult<&str, Literal> {
    alt((
        map(string_literal, |s: &str| Literal::Text(s.to_string())),
        map(integer_literal, Literal::Integer),
    ))(input)
}

/// Strip surrounding whitespace and any trailing semicolons
#[must_use]
pub fn trim_clause(s: &str) -> &str {
    s.trim_start_matches(is_c_space)
        .trim_end_matches(|c: char| is_c_space(c) || c == ';')
}
