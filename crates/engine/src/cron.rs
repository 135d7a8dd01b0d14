//! Five-field cron expressions: `minute hour day-of-month month day-of-week`.
//!
//! Fields accept `*`, single values, `a-b` ranges, `/step` suffixes and comma
//! lists. Months and weekdays also take three-letter names; weekday `7` is
//! Sunday. When both day fields are restricted a time matches if either one
//! does, as in classic cron. All times are UTC.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CronError;

/// How far ahead [`CronExpression::next_after`] searches before giving up,
/// e.g. for `0 0 30 2 *`.
const SEARCH_HORIZON_YEARS: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CronField {
    any: bool,
    values: BTreeSet<u32>,
}

impl CronField {
    fn matches(&self, value: u32) -> bool {
        self.any || self.values.contains(&value)
    }
}

/// A parsed, validated cron schedule. Serialises as its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronExpression {
    raw: String,
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasKind {
    None,
    Month,
    Weekday,
}

impl CronExpression {
    pub fn parse(raw: &str) -> Result<Self, CronError> {
        let invalid = |reason: String| CronError {
            expression: raw.to_owned(),
            reason,
        };

        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(invalid(
                "expected 5 fields: minute hour day_of_month month day_of_week".into(),
            ));
        }

        Ok(Self {
            raw: fields.join(" "),
            minute: parse_field(fields[0], 0, 59, AliasKind::None).map_err(invalid)?,
            hour: parse_field(fields[1], 0, 23, AliasKind::None).map_err(invalid)?,
            day_of_month: parse_field(fields[2], 1, 31, AliasKind::None).map_err(invalid)?,
            month: parse_field(fields[3], 1, 12, AliasKind::Month).map_err(invalid)?,
            day_of_week: parse_field(fields[4], 0, 7, AliasKind::Weekday).map_err(invalid)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the minute containing `at` is a firing time.
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        self.minute.matches(at.minute())
            && self.hour.matches(at.hour())
            && self.month.matches(at.month())
            && self.day_matches(at)
    }

    fn day_matches(&self, at: DateTime<Utc>) -> bool {
        let dom = self.day_of_month.matches(at.day());
        let dow = self.day_of_week.matches(at.weekday().num_days_from_sunday());
        if self.day_of_month.any || self.day_of_week.any {
            dom && dow
        } else {
            dom || dow
        }
    }

    /// The first firing time strictly after `after`, at minute precision.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let horizon = start.year() + SEARCH_HORIZON_YEARS;
        let mut t = start;

        while t.year() <= horizon {
            if !self.month.matches(t.month()) {
                t = start_of_next_month(t)?;
            } else if !self.day_matches(t) {
                t = start_of_day(t)? + Duration::days(1);
            } else if !self.hour.matches(t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
            } else if !self.minute.matches(t.minute()) {
                t += Duration::minutes(1);
            } else {
                return Some(t);
            }
        }
        None
    }
}

fn start_of_day(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(t.year(), t.month(), t.day(), 0, 0, 0).single()
}

fn start_of_next_month(t: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

impl FromStr for CronExpression {
    type Err = CronError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CronExpression {
    type Error = CronError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CronExpression> for String {
    fn from(expr: CronExpression) -> Self {
        expr.raw
    }
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_field(raw: &str, min: u32, max: u32, aliases: AliasKind) -> Result<CronField, String> {
    if raw == "*" {
        return Ok(CronField {
            any: true,
            values: BTreeSet::new(),
        });
    }

    let mut values = BTreeSet::new();
    for segment in raw.split(',') {
        parse_segment(segment, min, max, aliases, &mut values)?;
    }
    if values.is_empty() {
        return Err(format!("invalid field `{raw}`"));
    }
    Ok(CronField { any: false, values })
}

fn parse_segment(
    raw: &str,
    min: u32,
    max: u32,
    aliases: AliasKind,
    values: &mut BTreeSet<u32>,
) -> Result<(), String> {
    let (range_raw, step) = match raw.split_once('/') {
        Some((range, step_raw)) => {
            let step = step_raw
                .parse::<u32>()
                .map_err(|_| format!("invalid step `{step_raw}`"))?;
            if step == 0 {
                return Err("step must be >= 1".to_string());
            }
            (range, step)
        }
        None => (raw, 1),
    };

    let (start, end) = if range_raw == "*" {
        (min, max)
    } else if let Some((start_raw, end_raw)) = range_raw.split_once('-') {
        (
            parse_atom(start_raw, min, max, aliases)?,
            parse_atom(end_raw, min, max, aliases)?,
        )
    } else {
        let value = parse_atom(range_raw, min, max, aliases)?;
        // `5/15` means "from 5 to the end, every 15".
        (value, if step > 1 { max } else { value })
    };

    if start > end {
        return Err(format!("invalid range `{raw}`"));
    }

    let mut value = start;
    while value <= end {
        let normalized = if aliases == AliasKind::Weekday && value == 7 {
            0
        } else {
            value
        };
        values.insert(normalized);
        match value.checked_add(step) {
            Some(next) => value = next,
            None => break,
        }
    }
    Ok(())
}

fn parse_atom(raw: &str, min: u32, max: u32, aliases: AliasKind) -> Result<u32, String> {
    const MONTHS: [&str; 12] = [
        "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    ];
    const WEEKDAYS: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

    let lower = raw.to_ascii_lowercase();
    let alias = match aliases {
        AliasKind::None => None,
        AliasKind::Month => MONTHS.iter().position(|m| *m == lower).map(|i| i as u32 + 1),
        AliasKind::Weekday => WEEKDAYS.iter().position(|d| *d == lower).map(|i| i as u32),
    };
    let value = match alias {
        Some(v) => v,
        None => lower
            .parse::<u32>()
            .map_err(|_| format!("invalid value `{raw}`"))?,
    };

    if value < min || value > max {
        return Err(format!("value `{raw}` is out of bounds ({min}..={max})"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn accepts_common_expressions() {
        for expr in ["0 0 * * *", "*/15 * * * *", "30 14 * * 1", "0 9 1-5 jan,JUL mon-fri"] {
            assert!(CronExpression::parse(expr).is_ok(), "{expr} should parse");
        }
    }

    #[test]
    fn rejects_out_of_range_and_malformed_expressions() {
        for expr in ["60 0 * * *", "0 25 * * *", "0 0 32 * *", "0 0 * 13 *", "* * * *", "*/0 * * * *", "5-1 * * * *"] {
            assert!(CronExpression::parse(expr).is_err(), "{expr} should be rejected");
        }
    }

    #[test]
    fn matching_respects_each_field() {
        let expr = CronExpression::parse("30 14 * * 1").unwrap();
        // 2024-01-01 was a Monday.
        assert!(expr.matches(at(2024, 1, 1, 14, 30)));
        assert!(!expr.matches(at(2024, 1, 1, 14, 31)));
        assert!(!expr.matches(at(2024, 1, 2, 14, 30)));
    }

    #[test]
    fn restricted_day_fields_are_ored() {
        let expr = CronExpression::parse("0 0 13 * 5").unwrap();
        assert!(expr.matches(at(2024, 3, 13, 0, 0))); // the 13th, a Wednesday
        assert!(expr.matches(at(2024, 3, 15, 0, 0))); // a Friday
        assert!(!expr.matches(at(2024, 3, 14, 0, 0)));
    }

    #[test]
    fn sunday_can_be_written_as_seven() {
        let expr = CronExpression::parse("0 12 * * 7").unwrap();
        assert!(expr.matches(at(2024, 1, 7, 12, 0)));
    }

    #[test]
    fn next_after_finds_the_following_firing() {
        let expr = CronExpression::parse("0 2 * * *").unwrap();
        assert_eq!(expr.next_after(at(2024, 5, 10, 1, 59)), Some(at(2024, 5, 10, 2, 0)));
        assert_eq!(expr.next_after(at(2024, 5, 10, 2, 0)), Some(at(2024, 5, 11, 2, 0)));

        let every_quarter = CronExpression::parse("*/15 * * * *").unwrap();
        assert_eq!(every_quarter.next_after(at(2024, 12, 31, 23, 50)), Some(at(2025, 1, 1, 0, 0)));
    }

    #[test]
    fn impossible_dates_have_no_next_firing() {
        let expr = CronExpression::parse("0 0 30 2 *").unwrap();
        assert_eq!(expr.next_after(at(2024, 1, 1, 0, 0)), None);
    }

    #[test]
    fn serialises_as_its_text() {
        let expr = CronExpression::parse("0  2 * * *").unwrap();
        assert_eq!(serde_json::to_value(&expr).unwrap(), serde_json::json!("0 2 * * *"));
        let err = serde_json::from_value::<CronExpression>(serde_json::json!("0 25 * * *"));
        assert!(err.is_err());
    }
}
