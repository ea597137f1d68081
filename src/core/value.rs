use std::fmt;

/// Right-hand side of a WHERE comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(i32),
    Text(String),
}

impl Literal {
    /// Numeric view; text goes through `atoi` coercion (non-numeric -> 0)
    #[must_use]
    pub fn as_int(&self) -> i32 {
        match self {
            Self::Integer(i) => *i,
            Self::Text(s) => atoi(s),
        }
    }

    /// Text view; integer literals compare as the empty string
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Integer(_) => "",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// C whitespace class (`isspace`)
#[must_use]
pub const fn is_c_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

/// Parse an optional sign followed by decimal digits at the start of `s`.
///
/// Returns the value and the number of bytes consumed, or `None` when no digit
/// follows the sign. Overflow saturates at the 64-bit range and is then
/// narrowed to `i32` by truncation.
#[must_use]
pub fn parse_leading_int(s: &str) -> Option<(i32, usize)> {
    let bytes = s.as_bytes();
    let mut pos = 0;
    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    let digits_start = pos;
    let mut acc: i64 = 0;
    while let Some(b) = bytes.get(pos).filter(|b| b.is_ascii_digit()) {
        let digit = i64::from(b - b'0');
        acc = if negative {
            acc.saturating_mul(10).saturating_sub(digit)
        } else {
            acc.saturating_mul(10).saturating_add(digit)
        };
        pos += 1;
    }

    if pos == digits_start {
        None
    } else {
        Some((acc as i32, pos))
    }
}

/// `atoi`: skip leading whitespace, parse the integer prefix, 0 otherwise
#[must_use]
pub fn atoi(s: &str) -> i32 {
    parse_leading_int(s.trim_start_matches(is_c_space)).map_or(0, |(value, _)| value)
}
