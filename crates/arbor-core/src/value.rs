//! Node value types and type-aware comparison
//!
//! Every node value is stored as text. A ruleset's `type` rule names one of
//! the [`ValueType`]s below, and the checks here decide whether a value (or a
//! `max`/`min` bound) is well formed for that type.

use crate::vocabulary::Vocabulary;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Type a ruleset can enforce on node values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Text,
    Integer,
    Boolean,
    Decimal,
    Date,
    Time,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::Text,
        ValueType::Integer,
        ValueType::Boolean,
        ValueType::Decimal,
        ValueType::Date,
        ValueType::Time,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::Time => "time",
        }
    }

    /// Whether `value` is well formed for this type. Empty values always pass.
    pub fn accepts(&self, value: &str, vocab: &Vocabulary) -> bool {
        if value.is_empty() {
            return true;
        }
        match self {
            Self::Text => true,
            Self::Integer => parse_integer(value).is_some(),
            Self::Boolean => value == "true" || value == "false",
            Self::Decimal => parse_decimal(value).is_some(),
            Self::Date => parse_date(value, vocab).is_some(),
            Self::Time => parse_time(value, vocab).is_some(),
        }
    }

    /// Whether `bound` can be used as a `max`/`min` rule for this type
    ///
    /// Text bounds are lengths, so they must be non-negative integers.
    /// Booleans admit no bound at all.
    pub fn accepts_bound(&self, bound: &str, vocab: &Vocabulary) -> bool {
        if bound.is_empty() {
            return true;
        }
        match self {
            Self::Text => parse_integer(bound).is_some_and(|n| n >= 0),
            Self::Boolean => false,
            _ => self.accepts(bound, vocab),
        }
    }

    /// Compare a node value with a bound
    ///
    /// Text compares the value's length with the integer bound. Returns `None`
    /// when either side does not parse, or for booleans.
    pub fn compare(&self, value: &str, bound: &str, vocab: &Vocabulary) -> Option<Ordering> {
        match self {
            Self::Text => {
                let bound = parse_integer(bound)?;
                Some(i64::try_from(value.chars().count()).ok()?.cmp(&i64::from(bound)))
            }
            Self::Integer => Some(parse_integer(value)?.cmp(&parse_integer(bound)?)),
            Self::Decimal => parse_decimal(value)?.partial_cmp(&parse_decimal(bound)?),
            Self::Date => Some(parse_date(value, vocab)?.cmp(&parse_date(bound, vocab)?)),
            Self::Time => Some(parse_time(value, vocab)?.cmp(&parse_time(bound, vocab)?)),
            Self::Boolean => None,
        }
    }

    /// Whether `min <= max`, treating empty or incomparable bounds as ordered
    pub fn bounds_ordered(&self, min: &str, max: &str, vocab: &Vocabulary) -> bool {
        if min.is_empty() || max.is_empty() {
            return true;
        }
        let ordering = match self {
            Self::Text => parse_integer(min).zip(parse_integer(max)).map(|(a, b)| a.cmp(&b)),
            _ => self.compare(min, max, vocab),
        };
        ordering != Some(Ordering::Greater)
    }
}

impl FromStr for ValueType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether every character is in the Basic Latin block (U+0000..U+007F)
pub fn is_basic_latin(text: &str) -> bool {
    text.is_ascii()
}

fn parse_integer(value: &str) -> Option<i32> {
    value.trim().parse().ok()
}

fn parse_decimal(value: &str) -> Option<f64> {
    value.trim().parse().ok()
}

/// Strict date parse: the value must re-format to exactly the same text
fn parse_date(value: &str, vocab: &Vocabulary) -> Option<NaiveDate> {
    let date = NaiveDate::parse_from_str(value, &vocab.date_format).ok()?;
    (date.format(&vocab.date_format).to_string() == value).then_some(date)
}

fn parse_time(value: &str, vocab: &Vocabulary) -> Option<NaiveTime> {
    let time = NaiveTime::parse_from_str(value, &vocab.time_format).ok()?;
    (time.format(&vocab.time_format).to_string() == value).then_some(time)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        let vocab = Vocabulary::default();
        assert!(ValueType::Integer.accepts("-42", &vocab));
        assert!(ValueType::Integer.accepts("", &vocab));
        assert!(!ValueType::Integer.accepts("4.2", &vocab));
        assert!(!ValueType::Integer.accepts("3000000000", &vocab));
        assert!(ValueType::Decimal.accepts("4.25", &vocab));
        assert!(ValueType::Boolean.accepts("false", &vocab));
        assert!(!ValueType::Boolean.accepts("yes", &vocab));
        assert!(ValueType::Date.accepts("02/29/2000", &vocab));
        assert!(!ValueType::Date.accepts("02/30/2000", &vocab));
        assert!(!ValueType::Date.accepts("2/3/2000", &vocab));
        assert!(ValueType::Time.accepts("23:59:59", &vocab));
        assert!(!ValueType::Time.accepts("24:00:00", &vocab));
        assert!(ValueType::Text.accepts("anything at all", &vocab));
    }

    #[test]
    fn test_accepts_bound() {
        let vocab = Vocabulary::default();
        assert!(ValueType::Text.accepts_bound("5", &vocab));
        assert!(!ValueType::Text.accepts_bound("-1", &vocab));
        assert!(!ValueType::Text.accepts_bound("abc", &vocab));
        assert!(!ValueType::Boolean.accepts_bound("true", &vocab));
        assert!(ValueType::Boolean.accepts_bound("", &vocab));
        assert!(ValueType::Date.accepts_bound("01/01/1990", &vocab));
    }

    #[test]
    fn test_compare() {
        let vocab = Vocabulary::default();
        assert_eq!(
            ValueType::Text.compare("hello", "3", &vocab),
            Some(Ordering::Greater)
        );
        assert_eq!(
            ValueType::Integer.compare("9", "10", &vocab),
            Some(Ordering::Less)
        );
        assert_eq!(
            ValueType::Date.compare("12/31/1999", "01/01/2000", &vocab),
            Some(Ordering::Less)
        );
        assert_eq!(ValueType::Boolean.compare("true", "false", &vocab), None);
        assert_eq!(ValueType::Integer.compare("x", "10", &vocab), None);
    }

    #[test]
    fn test_bounds_ordered() {
        let vocab = Vocabulary::default();
        assert!(ValueType::Integer.bounds_ordered("1", "10", &vocab));
        assert!(!ValueType::Integer.bounds_ordered("11", "10", &vocab));
        assert!(ValueType::Text.bounds_ordered("2", "10", &vocab));
        assert!(ValueType::Integer.bounds_ordered("", "10", &vocab));
        assert!(!ValueType::Time.bounds_ordered("12:00:00", "08:00:00", &vocab));
    }

    #[test]
    fn test_basic_latin() {
        assert!(is_basic_latin("read a.b where c = 'd'"));
        assert!(!is_basic_latin("café"));
    }
}
