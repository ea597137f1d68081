use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest text field kept from the database file; longer tokens are truncated
pub const MAX_TEXT_LEN: usize = 19;

/// One car-inventory tuple keyed by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarRecord {
    pub id: i32,
    pub model: String,
    pub year_make: i32,
    pub color: String,
    pub price: i32,
    pub dealer: String,
}

impl CarRecord {
    #[must_use]
    pub fn new(id: i32, model: &str, year_make: i32, color: &str, price: i32, dealer: &str) -> Self {
        Self {
            id,
            model: truncate_text(model),
            year_make,
            color: truncate_text(color),
            price,
            dealer: truncate_text(dealer),
        }
    }

    #[must_use]
    pub fn field(&self, attribute: Attribute) -> FieldRef<'_> {
        match attribute {
            Attribute::Id => FieldRef::Int(self.id),
            Attribute::Model => FieldRef::Text(&self.model),
            Attribute::YearMake => FieldRef::Int(self.year_make),
            Attribute::Color => FieldRef::Text(&self.color),
            Attribute::Price => FieldRef::Int(self.price),
            Attribute::Dealer => FieldRef::Text(&self.dealer),
        }
    }
}

impl fmt::Display for CarRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.id, self.model, self.year_make, self.color, self.price, self.dealer
        )
    }
}

fn truncate_text(s: &str) -> String {
    s.chars().take(MAX_TEXT_LEN).collect()
}

/// The fixed schema, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Id,
    Model,
    YearMake,
    Color,
    Price,
    Dealer,
}

impl Attribute {
    pub const ALL: [Self; 6] = [
        Self::Id,
        Self::Model,
        Self::YearMake,
        Self::Color,
        Self::Price,
        Self::Dealer,
    ];

    /// Case-insensitive lookup of a column name
    #[must_use]
    pub fn resolve(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|attr| attr.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Id => "ID",
            Self::Model => "Model",
            Self::YearMake => "YearMake",
            Self::Color => "Color",
            Self::Price => "Price",
            Self::Dealer => "Dealer",
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Id | Self::YearMake | Self::Price)
    }
}

/// Borrowed view of a single field value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRef<'a> {
    Int(i32),
    Text(&'a str),
}

impl fmt::Display for FieldRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}
