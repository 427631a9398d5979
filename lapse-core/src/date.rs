//! Date token normalization.
//!
//! Registries print dates in many layouts; four are recognized here:
//! `YYYY-MM-DD`, `DD-MM-YYYY`, `MM/DD/YYYY` and `YYYY.MM.DD`. Layout is
//! decided purely by the token's shape. A dashed token with the year last
//! is always read day-first, so a US-style `12-31-2025` is rejected as out
//! of range and `03-04-2025` is read as the 3rd of April, never March 4th.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{LapseError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateLayout {
    /// `YYYY-MM-DD`
    IsoDash,
    /// `DD-MM-YYYY`
    DayMonthYear,
    /// `MM/DD/YYYY`
    MonthDayYear,
    /// `YYYY.MM.DD`
    IsoDot,
}

/// Layouts in the order a line is searched.
pub const LAYOUTS: [DateLayout; 4] = [
    DateLayout::IsoDash,
    DateLayout::DayMonthYear,
    DateLayout::MonthDayYear,
    DateLayout::IsoDot,
];

static ISO_DASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})$").expect("Invalid ISO dash regex")
});
static DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{2})-([0-9]{2})-([0-9]{4})$").expect("Invalid day-month-year regex")
});
static MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{2})/([0-9]{2})/([0-9]{4})$").expect("Invalid month/day/year regex")
});
static ISO_DOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})\.([0-9]{2})\.([0-9]{2})$").expect("Invalid ISO dot regex")
});

// Unanchored variants for locating a token inside a line. The token must not
// be glued to further digits, so `12025-01-01` does not yield a date. All
// patterns spell out `[0-9]` since `\d` also matches non-ASCII digits.
static FIND_ISO_DASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{4}-[0-9]{2}-[0-9]{2})(?:[^0-9]|$)")
        .expect("Invalid ISO dash search regex")
});
static FIND_DAY_MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{2}-[0-9]{2}-[0-9]{4})(?:[^0-9]|$)")
        .expect("Invalid day-month-year search regex")
});
static FIND_MONTH_DAY_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{2}/[0-9]{2}/[0-9]{4})(?:[^0-9]|$)")
        .expect("Invalid month/day/year search regex")
});
static FIND_ISO_DOT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9])([0-9]{4}\.[0-9]{2}\.[0-9]{2})(?:[^0-9]|$)")
        .expect("Invalid ISO dot search regex")
});

impl DateLayout {
    fn exact(self) -> &'static Regex {
        match self {
            DateLayout::IsoDash => &ISO_DASH,
            DateLayout::DayMonthYear => &DAY_MONTH_YEAR,
            DateLayout::MonthDayYear => &MONTH_DAY_YEAR,
            DateLayout::IsoDot => &ISO_DOT,
        }
    }

    fn search(self) -> &'static Regex {
        match self {
            DateLayout::IsoDash => &FIND_ISO_DASH,
            DateLayout::DayMonthYear => &FIND_DAY_MONTH_YEAR,
            DateLayout::MonthDayYear => &FIND_MONTH_DAY_YEAR,
            DateLayout::IsoDot => &FIND_ISO_DOT,
        }
    }

    /// Positions of (year, month, day) among the three captures.
    fn field_order(self) -> (usize, usize, usize) {
        match self {
            DateLayout::IsoDash | DateLayout::IsoDot => (1, 2, 3),
            DateLayout::DayMonthYear => (3, 2, 1),
            DateLayout::MonthDayYear => (3, 1, 2),
        }
    }

    /// Finds the first token of this layout in `text`.
    pub fn find_in(self, text: &str) -> Option<&str> {
        self.search()
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Parses a date token in any of the four known layouts.
pub fn normalize_date(token: &str) -> Result<NaiveDate> {
    let token = token.trim();

    for layout in LAYOUTS {
        if let Some(caps) = layout.exact().captures(token) {
            let (y, m, d) = layout.field_order();
            let field = |i: usize| {
                caps[i].parse::<u32>().map_err(|_| {
                    LapseError::FormatError(format!("{} has a non-numeric date field", token))
                })
            };
            let year = field(y)? as i32;
            return NaiveDate::from_ymd_opt(year, field(m)?, field(d)?).ok_or_else(|| {
                LapseError::FormatError(format!("{} is not a valid calendar date", token))
            });
        }
    }

    Err(LapseError::FormatError(format!(
        "{} does not match a known date layout",
        token
    )))
}

/// Returns the first date token on `line`, trying layouts in priority order.
pub fn find_date_token(line: &str) -> Option<&str> {
    LAYOUTS.iter().find_map(|layout| layout.find_in(line))
}
