//! Remote Result Source Abstraction
//!
//! The draw record model and the query vocabulary understood by remote
//! back-ends. Back-ends only need to support what is expressed here: an exact
//! count, a range-paginated fetch ordered by date descending, comparison
//! filters on the date, equality filters on integer columns and substring
//! filters on the numbers column.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::Result;

/// Hard per-request row cap of the remote store. Bulk reads must paginate.
pub const MAX_REMOTE_PAGE_SIZE: usize = 1000;

const NUMBERS_DELIMITER: char = '|';

/// Ordered drawn numbers, stored remotely as a `|`-joined string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DrawNumbers(Vec<String>);

impl DrawNumbers {
    pub fn new(numbers: Vec<String>) -> Self {
        Self(numbers)
    }

    /// Split a delimited string, dropping empty segments.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(NUMBERS_DELIMITER)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The wire form, e.g. `05|12|23|34|45`.
    pub fn joined(&self) -> String {
        self.0.join("|")
    }
}

impl fmt::Display for DrawNumbers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

impl Serialize for DrawNumbers {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.joined())
    }
}

impl<'de> Deserialize<'de> for DrawNumbers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(DrawNumbers::parse(&raw))
    }
}

/// A single lottery draw.
///
/// Identity is the `(draw_num, date)` pair; draw numbers alone are not unique
/// in the source data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LottoResult {
    /// Calendar date of the draw, no timezone.
    pub date: NaiveDate,
    pub draw_num: i64,
    pub numbers: DrawNumbers,
    pub power_ball: i64,
    pub multiplier: i64,
    /// Jackpot in whole currency units.
    pub jackpot: i64,
    pub wins: i64,
}

impl LottoResult {
    pub fn identity(&self) -> (i64, NaiveDate) {
        (self.draw_num, self.date)
    }
}

/// Integer columns that accept equality filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntField {
    DrawNum,
    PowerBall,
    Multiplier,
}

impl IntField {
    pub fn column(self) -> &'static str {
        match self {
            IntField::DrawNum => "draw_num",
            IntField::PowerBall => "power_ball",
            IntField::Multiplier => "multiplier",
        }
    }

    fn value_of(self, result: &LottoResult) -> i64 {
        match self {
            IntField::DrawNum => result.draw_num,
            IntField::PowerBall => result.power_ball,
            IntField::Multiplier => result.multiplier,
        }
    }
}

/// Text columns that accept case-insensitive substring filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Numbers,
}

impl TextField {
    pub fn column(self) -> &'static str {
        match self {
            TextField::Numbers => "numbers",
        }
    }
}

/// A single filter predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    DateEq(NaiveDate),
    DateGt(NaiveDate),
    DateGte(NaiveDate),
    DateLt(NaiveDate),
    IntEq(IntField, i64),
    /// Case-insensitive substring match.
    TextContains(TextField, String),
    /// Disjunction of the nested conditions.
    AnyOf(Vec<Condition>),
}

impl Condition {
    /// Evaluate the predicate against an in-memory record.
    ///
    /// Used when a query has to be answered from locally held results.
    pub fn matches(&self, result: &LottoResult) -> bool {
        match self {
            Condition::DateEq(date) => result.date == *date,
            Condition::DateGt(date) => result.date > *date,
            Condition::DateGte(date) => result.date >= *date,
            Condition::DateLt(date) => result.date < *date,
            Condition::IntEq(field, value) => field.value_of(result) == *value,
            Condition::TextContains(TextField::Numbers, needle) => result
                .numbers
                .joined()
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Condition::AnyOf(any) => any.iter().any(|c| c.matches(result)),
        }
    }
}

/// A page request against the remote store.
///
/// All conditions are combined with AND. Results are always ordered by date,
/// newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultQuery {
    pub conditions: Vec<Condition>,
    pub offset: usize,
    pub limit: usize,
}

impl ResultQuery {
    pub fn page(offset: usize, limit: usize) -> Self {
        Self {
            conditions: Vec::new(),
            offset,
            limit: limit.min(MAX_REMOTE_PAGE_SIZE),
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn matches(&self, result: &LottoResult) -> bool {
        self.conditions.iter().all(|c| c.matches(result))
    }
}

/// Remote store of draw records
///
/// Implemented by back-end providers (e.g. `provider-supabase`). Errors are
/// transport or query failures; an empty page is not an error.
#[async_trait]
pub trait RemoteResultSource: Send + Sync {
    /// Exact number of records matching all `conditions`.
    async fn count(&self, conditions: &[Condition]) -> Result<u64>;

    /// One page of records, newest first. Never returns more than
    /// `min(query.limit, MAX_REMOTE_PAGE_SIZE)` rows.
    async fn fetch(&self, query: &ResultQuery) -> Result<Vec<LottoResult>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(draw_num: i64, date: &str, numbers: &str) -> LottoResult {
        LottoResult {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            draw_num,
            numbers: DrawNumbers::parse(numbers),
            power_ball: 7,
            multiplier: 2,
            jackpot: 1_000_000,
            wins: 0,
        }
    }

    #[test]
    fn test_numbers_parse_drops_empty_segments() {
        let numbers = DrawNumbers::parse("05||12|23|");
        assert_eq!(numbers.as_slice(), &["05", "12", "23"]);
        assert_eq!(numbers.joined(), "05|12|23");
    }

    #[test]
    fn test_result_wire_format() {
        let json = r#"{"date":"2024-01-03","draw_num":3,"numbers":"01|02|03","power_ball":9,"multiplier":3,"jackpot":5000000,"wins":1}"#;
        let result: LottoResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.draw_num, 3);
        assert_eq!(result.numbers.len(), 3);
        assert_eq!(serde_json::to_string(&result).unwrap(), json);
    }

    #[test]
    fn test_condition_matches() {
        let result = draw(42, "2024-02-10", "05|12|33");
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mar = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        assert!(Condition::DateGte(feb).matches(&result));
        assert!(Condition::DateLt(mar).matches(&result));
        assert!(!Condition::DateGt(result.date).matches(&result));
        assert!(Condition::IntEq(IntField::DrawNum, 42).matches(&result));
        assert!(Condition::TextContains(TextField::Numbers, "2|3".into()).matches(&result));
        assert!(Condition::AnyOf(vec![
            Condition::IntEq(IntField::PowerBall, 1),
            Condition::IntEq(IntField::Multiplier, 2),
        ])
        .matches(&result));
    }

    #[test]
    fn test_query_combines_with_and() {
        let result = draw(1, "2024-01-01", "01|02");
        let query = ResultQuery::page(0, 10)
            .filter(Condition::IntEq(IntField::DrawNum, 1))
            .filter(Condition::IntEq(IntField::PowerBall, 99));

        assert!(!query.matches(&result));
        assert_eq!(ResultQuery::page(0, 5000).limit, MAX_REMOTE_PAGE_SIZE);
    }
}
