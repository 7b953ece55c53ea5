//! Search query classification
//!
//! Turns free-form user input into remote filter conditions:
//!
//! | Input | Meaning |
//! |---|---|
//! | empty | every record |
//! | `YYYY` | draws in that year |
//! | `YYYY-MM` | draws in that month |
//! | `YYYY-MM-DD` | draws on that day |
//! | other integer | draw number, power ball or multiplier equal to it, or numbers containing it |
//! | anything else | numbers containing the text |
//!
//! Date-shaped input that is not a real calendar date is searched as text.

use bridge_traits::remote::{Condition, IntField, TextField};
use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    All,
    Year(i32),
    Month { year: i32, month: u32 },
    Day(NaiveDate),
    Numeric(i64),
    Text(String),
}

impl SearchQuery {
    pub fn parse(input: &str) -> Self {
        let query = input.trim().to_lowercase();
        if query.is_empty() {
            return SearchQuery::All;
        }

        if let Some(parsed) = Self::parse_date(&query) {
            return parsed;
        }

        match query.parse::<i64>() {
            Ok(n) => SearchQuery::Numeric(n),
            Err(_) => SearchQuery::Text(query),
        }
    }

    fn parse_date(query: &str) -> Option<Self> {
        let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        let parts: Vec<&str> = query.split('-').collect();

        match parts.as_slice() {
            [y] if digits(y, 4) => y.parse().ok().map(SearchQuery::Year),
            [y, m] if digits(y, 4) && digits(m, 2) => {
                let year = y.parse().ok()?;
                let month = m.parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, 1).map(|_| SearchQuery::Month { year, month })
            }
            [_, _, _] => NaiveDate::parse_from_str(query, "%Y-%m-%d")
                .ok()
                .filter(|_| query.len() == 10)
                .map(SearchQuery::Day),
            _ => None,
        }
    }

    /// Remote filter conditions, combined with AND.
    pub fn conditions(&self) -> Vec<Condition> {
        match self {
            SearchQuery::All => Vec::new(),
            SearchQuery::Year(year) => Self::range(
                NaiveDate::from_ymd_opt(*year, 1, 1),
                NaiveDate::from_ymd_opt(year + 1, 1, 1),
            ),
            SearchQuery::Month { year, month } => {
                let start = NaiveDate::from_ymd_opt(*year, *month, 1);
                let end = start.and_then(|s| {
                    if s.month() == 12 {
                        NaiveDate::from_ymd_opt(s.year() + 1, 1, 1)
                    } else {
                        NaiveDate::from_ymd_opt(s.year(), s.month() + 1, 1)
                    }
                });
                Self::range(start, end)
            }
            SearchQuery::Day(day) => vec![Condition::DateEq(*day)],
            SearchQuery::Numeric(n) => vec![Condition::AnyOf(vec![
                Condition::IntEq(IntField::DrawNum, *n),
                Condition::IntEq(IntField::PowerBall, *n),
                Condition::IntEq(IntField::Multiplier, *n),
                Condition::TextContains(TextField::Numbers, n.to_string()),
            ])],
            SearchQuery::Text(text) => vec![Condition::TextContains(TextField::Numbers, text.clone())],
        }
    }

    fn range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<Condition> {
        start
            .into_iter()
            .map(Condition::DateGte)
            .chain(end.map(Condition::DateLt))
            .collect()
    }
}
