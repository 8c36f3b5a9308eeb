//! Calendar aggregation: merges the computed schedule with persisted
//! completion marks into one [`CalendarDay`] per date.
//!
//! Like [`crate::schedule`], nothing here touches storage or suspends.
//! Callers fetch records first (see [`crate::repository::PlanRepository`])
//! and hand them in.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use chrono::{Datelike, Local, Months, NaiveDate, TimeDelta};
use serde::Serialize;
use tracing::warn;

use brace_db::models::{DailyRecord, Direction, Plan};

use crate::schedule::phase_for_optional;

/// Background hint for forward days (warm red).
pub const FORWARD_COLOR: &str = "#FFCDD2";
/// Background hint for backward days (cool green).
pub const BACKWARD_COLOR: &str = "#C8E6C9";

/// Months of records preloaded on either side of today.
const VISIBLE_MONTHS: u32 = 3;

/// One rendered day cell. Built on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub phase: Direction,
    pub completed: bool,
    pub is_today: bool,
    /// Background hint; `None` means the renderer's default.
    pub color: Option<String>,
}

/// Color hint for a phase.
pub fn phase_color(phase: Direction) -> Option<&'static str> {
    match phase {
        Direction::Forward => Some(FORWARD_COLOR),
        Direction::Backward => Some(BACKWARD_COLOR),
        Direction::None => None,
    }
}

/// The current local date.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Build one [`CalendarDay`] per date in `[from, to]`, in ascending order.
///
/// `is_today` is evaluated against the local date at call time. See
/// [`build_range_at`] for the record matching rules.
pub fn build_range(
    plan: Option<&Plan>,
    records: &[DailyRecord],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<CalendarDay> {
    build_range_at(plan, records, from, to, today())
}

/// [`build_range`] with an explicit "today".
///
/// Records are matched by date. When `plan` is given, only records with that
/// plan's id count; with no plan, every record is eligible and the one with
/// the greatest plan id wins a date. An empty range (`from > to`) yields no
/// days.
pub fn build_range_at(
    plan: Option<&Plan>,
    records: &[DailyRecord],
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    if from > to {
        return Vec::new();
    }

    let mut by_date: HashMap<NaiveDate, &DailyRecord> = HashMap::new();
    for record in records {
        if plan.is_some_and(|p| p.id != record.plan_id) {
            continue;
        }
        match by_date.entry(record.date) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                if record.plan_id > slot.get().plan_id {
                    slot.insert(record);
                }
            }
        }
    }

    let len = usize::try_from((to - from).num_days() + 1).unwrap_or(0);
    let mut days = Vec::with_capacity(len);
    for date in from.iter_days().take_while(|d| *d <= to) {
        let phase = phase_for_optional(plan, date);
        let record = by_date.get(&date);
        let color = record
            .and_then(|r| r.color.clone())
            .or_else(|| phase_color(phase).map(str::to_owned));

        days.push(CalendarDay {
            date,
            phase,
            completed: record.is_some_and(|r| r.completed),
            is_today: date == today,
            color,
        });
    }
    days
}

/// The safe range shown when records could not be read: today alone, with
/// no phase.
pub fn fallback_today() -> Vec<CalendarDay> {
    fallback_at(today())
}

fn fallback_at(today: NaiveDate) -> Vec<CalendarDay> {
    vec![CalendarDay {
        date: today,
        phase: Direction::None,
        completed: false,
        is_today: true,
        color: None,
    }]
}

/// [`build_range`] over the outcome of a record read.
///
/// A failed read degrades to [`fallback_today`] instead of surfacing the
/// error.
pub fn build_range_or_fallback<E: fmt::Display>(
    plan: Option<&Plan>,
    records: Result<Vec<DailyRecord>, E>,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<CalendarDay> {
    build_range_or_fallback_at(plan, records, from, to, today())
}

/// [`build_range_or_fallback`] with an explicit "today".
pub fn build_range_or_fallback_at<E: fmt::Display>(
    plan: Option<&Plan>,
    records: Result<Vec<DailyRecord>, E>,
    from: NaiveDate,
    to: NaiveDate,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    match records {
        Ok(records) => build_range_at(plan, &records, from, to, today),
        Err(e) => {
            warn!(error = %e, %from, %to, "record read failed, showing today only");
            fallback_at(today)
        }
    }
}

/// Whole-week span covering the month that contains `anchor`.
///
/// Starts on the Monday on or before the 1st and ends on the Sunday on or
/// after the last day, so the span is always a multiple of 7 days.
pub fn month_grid_range(anchor: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = anchor - TimeDelta::days(i64::from(anchor.day0()));
    let last = last_of_month(first);

    let lead = i64::from(first.weekday().num_days_from_monday());
    let tail = 6 - i64::from(last.weekday().num_days_from_monday());

    (first - TimeDelta::days(lead), last + TimeDelta::days(tail))
}

/// Every day of the month grid around `anchor`.
pub fn month_grid(
    plan: Option<&Plan>,
    records: &[DailyRecord],
    anchor: NaiveDate,
    today: NaiveDate,
) -> Vec<CalendarDay> {
    let (start, end) = month_grid_range(anchor);
    build_range_at(plan, records, start, end, today)
}

/// Default record window: three months either side of `today`.
pub fn visible_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let months = Months::new(VISIBLE_MONTHS);
    (
        today.checked_sub_months(months).unwrap_or(NaiveDate::MIN),
        today.checked_add_months(months).unwrap_or(NaiveDate::MAX),
    )
}

fn last_of_month(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}
