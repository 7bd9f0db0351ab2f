//! Scheduling timestamps and the date windows used by list filters.
//!
//! `scheduled_at`, `started_at` and `completed_at` are stored as naive local
//! date-times in [`TIMESTAMP_FORMAT`] so string comparison in SQL follows
//! chronological order.

use chrono::{Datelike, Days, Local, NaiveDate, NaiveDateTime, NaiveTime};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const DISPLAY_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn format_timestamp(value: NaiveDateTime) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts the canonical form as well as the `datetime-local` input form
/// (`YYYY-MM-DDTHH:MM`) and a space separator.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Renders a stored timestamp for humans, falling back to the raw value.
pub fn display_timestamp(value: &str) -> String {
    parse_timestamp(value)
        .map(|parsed| parsed.format(DISPLAY_FORMAT).to_string())
        .unwrap_or_else(|| value.to_string())
}

/// Value for an `<input type="datetime-local">`.
pub fn input_timestamp(value: &str) -> String {
    parse_timestamp(value)
        .map(|parsed| parsed.format("%Y-%m-%dT%H:%M").to_string())
        .unwrap_or_default()
}

/// Whole minutes between two stored timestamps, 0 when either is missing or
/// the end comes first.
pub fn minutes_between(start: Option<&str>, end: Option<&str>) -> i64 {
    match (start.and_then(parse_timestamp), end.and_then(parse_timestamp)) {
        (Some(start), Some(end)) => (end - start).num_minutes().max(0),
        _ => 0,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DateRange {
    #[default]
    All,
    Today,
    Week,
    LastWeek,
    Custom,
}

impl DateRange {
    pub const ALL: [DateRange; 5] = [
        DateRange::All,
        DateRange::Today,
        DateRange::Week,
        DateRange::LastWeek,
        DateRange::Custom,
    ];

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "today" => DateRange::Today,
            "week" => DateRange::Week,
            "last_week" => DateRange::LastWeek,
            "custom" => DateRange::Custom,
            _ => DateRange::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DateRange::All => "all",
            DateRange::Today => "today",
            DateRange::Week => "week",
            DateRange::LastWeek => "last_week",
            DateRange::Custom => "custom",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DateRange::All => "All",
            DateRange::Today => "Today",
            DateRange::Week => "This week",
            DateRange::LastWeek => "Last week",
            DateRange::Custom => "Custom",
        }
    }
}

/// Inclusive window of stored timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    pub fn days(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        Some(Self {
            start: first.and_time(NaiveTime::from_hms_opt(0, 0, 0)?),
            end: last.and_time(NaiveTime::from_hms_opt(23, 59, 59)?),
        })
    }

    pub fn start_bound(&self) -> String {
        format_timestamp(self.start)
    }

    pub fn end_bound(&self) -> String {
        format_timestamp(self.end)
    }
}

/// Resolves a range against `now`. Weeks run Sunday to Saturday. A custom
/// range only applies when both ends are given.
pub fn resolve_window(
    range: DateRange,
    custom_start: Option<NaiveDate>,
    custom_end: Option<NaiveDate>,
    now: NaiveDateTime,
) -> Option<Window> {
    let today = now.date();
    match range {
        DateRange::All => None,
        DateRange::Today => Window::days(today, today),
        DateRange::Week => {
            let first = week_start(today)?;
            Window::days(first, first.checked_add_days(Days::new(6))?)
        }
        DateRange::LastWeek => {
            let first = week_start(today)?.checked_sub_days(Days::new(7))?;
            Window::days(first, first.checked_add_days(Days::new(6))?)
        }
        DateRange::Custom => match (custom_start, custom_end) {
            (Some(first), Some(last)) => Window::days(first, last),
            _ => None,
        },
    }
}

fn week_start(day: NaiveDate) -> Option<NaiveDate> {
    let offset = day.weekday().num_days_from_sunday();
    day.checked_sub_days(Days::new(u64::from(offset)))
}
