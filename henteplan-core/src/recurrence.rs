//! Expansion of "next date + frequency" schedules into concrete dates.

use std::sync::LazyLock;

use chrono::{Days, NaiveDate};
use regex::Regex;

/// How far ahead synthesized and windowed schedules reach.
pub const HORIZON_DAYS: u64 = 180;

static NUMBERED_WEEK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.\s*uke").expect("valid frequency pattern"));

/// Last date inside the schedule horizon counted from `today`.
#[must_use]
pub fn horizon(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_days(Days::new(HORIZON_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

/// Interval in whole weeks described by a frequency text.
///
/// `"2. uke"` (every second week) yields 2, a text mentioning `uke` without a
/// number yields 1, anything else is treated as biweekly.
#[must_use]
pub fn interval_weeks(descriptor: &str) -> u32 {
    let lowered = descriptor.to_lowercase();
    if let Some(weeks) = NUMBERED_WEEK
        .captures(&lowered)
        .and_then(|caps| caps.get(1))
        .and_then(|digits| digits.as_str().parse::<u32>().ok())
    {
        return weeks.max(1);
    }
    if lowered.contains("uke") { 1 } else { 2 }
}

/// Every occurrence from `next` (inclusive) stepping `weeks` weeks at a time,
/// up to and including `until`.
#[must_use]
pub fn recurring_dates(next: NaiveDate, weeks: u32, until: NaiveDate) -> Vec<NaiveDate> {
    let step = Days::new(u64::from(weeks.max(1)) * 7);
    let mut dates = Vec::new();
    let mut current = Some(next);
    while let Some(date) = current.filter(|date| *date <= until) {
        dates.push(date);
        current = date.checked_add_days(step);
    }
    dates
}
