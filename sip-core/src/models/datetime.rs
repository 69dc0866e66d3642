use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// A settlement period within a day, 1-based.
///
/// Days have 48 periods, except on clock-change days (46 or 50). The
/// settlement calendar itself is an external concern; this crate only
/// validates the representable range.
pub type SettlementPeriod = u8;

const MAX_PERIODS_PER_DAY: SettlementPeriod = 50;

/// A settlement date.
///
/// Dates arrive from external collaborators as `YYYY-MM-DD` strings; they are
/// normalized to this type once at the ingestion edge, so the engine never
/// branches on a string representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SettlementDate(Date);

impl SettlementDate {
    /// Parse a `YYYY-MM-DD` date string.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        Date::parse(input, DATE_FORMAT)
            .map(Self)
            .map_err(|_| ParseError::InvalidDate(input.to_owned()))
    }
}

impl From<Date> for SettlementDate {
    fn from(value: Date) -> Self {
        Self(value)
    }
}

impl From<SettlementDate> for Date {
    fn from(value: SettlementDate) -> Self {
        value.0
    }
}

impl std::fmt::Display for SettlementDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let formatted = self.0.format(DATE_FORMAT).map_err(|_| std::fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl TryFrom<String> for SettlementDate {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SettlementDate> for String {
    fn from(value: SettlementDate) -> Self {
        value.to_string()
    }
}

/// The composite key identifying one settlement period of one day.
///
/// Every per-period table in the system is keyed by this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SettlementKey {
    /// The settlement date.
    pub date: SettlementDate,
    /// The 1-based settlement period within that date.
    pub period: SettlementPeriod,
}

impl SettlementKey {
    /// Create a key, validating the period is within the representable range.
    pub fn new(date: SettlementDate, period: SettlementPeriod) -> Result<Self, ParseError> {
        if period == 0 || period > MAX_PERIODS_PER_DAY {
            return Err(ParseError::InvalidPeriod(period));
        }
        Ok(Self { date, period })
    }
}

impl std::fmt::Display for SettlementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} P{}", self.date, self.period)
    }
}

/// The ways in which ingested date and period data may be malformed.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A settlement date string that is not of the form `YYYY-MM-DD`.
    #[error("invalid settlement date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    /// A settlement period outside 1..=50.
    #[error("invalid settlement period {0}, expected 1..=50")]
    InvalidPeriod(SettlementPeriod),
}
