//! WMTS time dimensions and the date selection policy.
//!
//! Values are compared at day granularity: sub-daily products (half-hourly
//! IMERG) still resolve to whole calendar days.

use crate::core::{constants::DEFAULT_TIME, context::format_date};
use chrono::NaiveDate;

/// One declared `<Value>` of a time dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeValue {
    /// A single instant, e.g. `2024-01-15`
    Instant { raw: String, date: NaiveDate },
    /// `start/end/period`, both ends inclusive
    Range {
        start: NaiveDate,
        end: NaiveDate,
        raw_end: String,
        period: Option<String>,
    },
}

impl TimeValue {
    /// Parses one declared value; `None` for anything without a leading date.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let mut parts = value.split('/');
        let first = parts.next()?;
        match parts.next() {
            None => Some(Self::Instant {
                raw: value.to_string(),
                date: leading_date(first)?,
            }),
            Some(second) => {
                let start = leading_date(first)?;
                let end = leading_date(second)?;
                if end < start {
                    return None;
                }
                Some(Self::Range {
                    start,
                    end,
                    raw_end: second.to_string(),
                    period: parts.next().map(str::to_string),
                })
            }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self {
            Self::Instant { date: d, .. } => *d == date,
            Self::Range { start, end, .. } => *start <= date && date <= *end,
        }
    }
}

fn leading_date(value: &str) -> Option<NaiveDate> {
    let day = value.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// The `<Dimension>` block of one WMTS layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeDimension {
    pub values: Vec<TimeValue>,
    pub default: Option<String>,
}

impl TimeDimension {
    pub fn new(values: Vec<TimeValue>, default: Option<String>) -> Self {
        Self { values, default }
    }

    /// Builds a dimension from raw `<Value>` strings, skipping unparsable ones
    pub fn from_raw<'a>(values: impl IntoIterator<Item = &'a str>, default: Option<&str>) -> Self {
        let values = values
            .into_iter()
            .filter_map(|raw| {
                let parsed = TimeValue::parse(raw);
                if parsed.is_none() {
                    log::debug!("ignoring time value {:?}", raw);
                }
                parsed
            })
            .collect();
        let default = default
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Self::new(values, default)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.default.is_none()
    }
}

/// Picks the time value to request for `requested`.
///
/// An exact instant wins, then any declared range containing the date (both
/// returned verbatim as the requested date), then the declared default, then
/// the end of the last declared range, then the literal `default`.
pub fn select_date(requested: NaiveDate, dimension: &TimeDimension) -> String {
    let exact = dimension
        .values
        .iter()
        .any(|v| matches!(v, TimeValue::Instant { date, .. } if *date == requested));
    if exact {
        return format_date(requested);
    }

    let in_range = dimension
        .values
        .iter()
        .any(|v| matches!(v, TimeValue::Range { .. }) && v.contains(requested));
    if in_range {
        return format_date(requested);
    }

    if let Some(default) = &dimension.default {
        return default.clone();
    }

    let last_end = dimension.values.iter().rev().find_map(|v| match v {
        TimeValue::Range { raw_end, .. } => Some(raw_end.clone()),
        TimeValue::Instant { .. } => None,
    });

    last_end.unwrap_or_else(|| DEFAULT_TIME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(
            TimeValue::parse("2024-01-15"),
            Some(TimeValue::Instant {
                raw: "2024-01-15".to_string(),
                date: date("2024-01-15")
            })
        );

        let range = TimeValue::parse("2024-01-01T00:00:00Z/2024-01-31T23:30:00Z/PT30M").unwrap();
        assert!(range.contains(date("2024-01-31")));
        assert!(!range.contains(date("2024-02-01")));

        assert!(TimeValue::parse("yesterday").is_none());
        assert!(TimeValue::parse("2024-02-01/2024-01-01/P1D").is_none());
    }

    #[test]
    fn test_date_inside_range_is_kept() {
        let dimension = TimeDimension::from_raw(["2024-01-01/2024-01-31/P1D"], None);
        assert_eq!(select_date(date("2024-01-15"), &dimension), "2024-01-15");
    }

    #[test]
    fn test_out_of_range_uses_default() {
        let dimension =
            TimeDimension::from_raw(["2024-01-01/2024-01-31/P1D"], Some("2024-01-31"));
        assert_eq!(select_date(date("2023-12-01"), &dimension), "2024-01-31");
    }

    #[test]
    fn test_exact_instant_wins_over_default() {
        let dimension =
            TimeDimension::from_raw(["2023-05-01", "2023-06-01"], Some("2023-06-01"));
        assert_eq!(select_date(date("2023-05-01"), &dimension), "2023-05-01");
    }

    #[test]
    fn test_last_range_end_without_default() {
        let dimension = TimeDimension::from_raw(
            ["2001-01-01/2001-12-31/P1D", "2010-01-01/2019-12-31/P8D"],
            Some("  "),
        );
        assert_eq!(select_date(date("2022-06-01"), &dimension), "2019-12-31");
    }

    #[test]
    fn test_nothing_declared() {
        let dimension = TimeDimension::from_raw(["2020-01-01"], None);
        assert_eq!(select_date(date("2022-06-01"), &dimension), "default");
        assert!(TimeDimension::default().is_empty());
    }
}
