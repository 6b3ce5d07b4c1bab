//! Cell-level parsers for dates and amounts.

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;
use statera_core::Direction;

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_direction_marker, r"(?i)\s*(cr|dr)\.?$");
re!(re_currency, r"(?i)\b(?:inr|usd|eur|gbp|rs)\b\.?|[₹$€£¥]");
re!(re_plain_number, r"^\d+(?:\.\d+)?$");
re!(re_time_suffix,
    r"(?i)^(.+?)(?:[T ]\d{1,2}:\d{2}(?::\d{2}(?:\.\d+)?)?\s*(?:am|pm)?(?:z|[+-]\d{2}:?\d{2})?)$");
re!(re_spaces, r"\s+");

/// Years outside this window mean a pattern matched the wrong digits
/// (`%Y` happily reads "24" as the year 24).
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1900..=2100;

/// A parsed amount cell: signed value plus an explicit `Cr`/`Dr` marker if present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedAmount {
    pub value: Decimal,
    pub marker: Option<Direction>,
}

impl ParsedAmount {
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

/// Parse an amount cell such as `₹1,23,456.00`, `(75.25)`, `42.00-` or `500.00 Cr`.
pub(crate) fn parse_amount(raw: &str) -> Option<ParsedAmount> {
    let mut s = raw.trim().to_string();

    let mut marker = None;
    if let Some(caps) = re_direction_marker().captures(&s) {
        marker = Some(if caps[1].eq_ignore_ascii_case("cr") {
            Direction::Income
        } else {
            Direction::Expense
        });
        let cut = caps.get(0).map_or(s.len(), |m| m.start());
        s.truncate(cut);
    }

    let s = re_currency().replace_all(&s, "");
    let mut s = s.trim();

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|x| x.strip_suffix(')')) {
        negative = true;
        s = inner.trim();
    }
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    } else if let Some(rest) = s.strip_suffix('-') {
        negative = true;
        s = rest;
    }

    let digits = with_decimal_point(s);
    if !re_plain_number().is_match(&digits) {
        return None;
    }

    let value = Decimal::from_str(&digits).ok()?;
    Some(ParsedAmount {
        value: if negative { -value } else { value },
        marker,
    })
}

/// Drop grouping separators and leave `.` as the decimal point.
///
/// A comma is the decimal separator when it comes after every `.` (`1.234,56`)
/// or when it is the only separator and is followed by one or two digits
/// (`-850,00`). Otherwise commas group, as in `1,234.56` or `1,23,456`.
fn with_decimal_point(s: &str) -> String {
    let compact: String = s
        .chars()
        .filter(|c| !matches!(c, '\'' | '_') && !c.is_whitespace())
        .collect();

    let decimal_comma = match (compact.rfind(','), compact.rfind('.')) {
        (Some(comma), Some(dot)) => comma > dot,
        (Some(comma), None) => {
            let fraction = &compact[comma + 1..];
            compact.matches(',').count() == 1
                && (1..=2).contains(&fraction.len())
                && fraction.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    };
    let dots_group = !decimal_comma && !compact.contains(',') && compact.matches('.').count() > 1;

    compact
        .chars()
        .filter_map(|c| match c {
            ',' if decimal_comma => Some('.'),
            ',' => None,
            '.' if decimal_comma || dots_group => None,
            other => Some(other),
        })
        .collect()
}

/// Parse a date cell with the first matching pattern, ignoring a trailing time.
pub(crate) fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let collapsed = re_spaces().replace_all(raw.trim(), " ");
    if collapsed.is_empty() {
        return None;
    }
    let date_part = re_time_suffix()
        .captures(&collapsed)
        .and_then(|c| c.get(1))
        .map_or(&*collapsed, |m| m.as_str());

    formats.iter().find_map(|format| {
        NaiveDate::parse_from_str(date_part, format)
            .ok()
            .filter(|d| PLAUSIBLE_YEARS.contains(&d.year()))
    })
}
