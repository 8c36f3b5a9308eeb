//! Phase scheduling: which [`Direction`] applies to a plan on a given date.
//!
//! Everything here is pure and synchronous. The repository, the calendar
//! and the CLI all go through [`phase_for`]; nothing else derives a phase.

use chrono::NaiveDate;

use brace_db::models::{Direction, Plan};

/// Position of `date` within the plan's cycle, in `[0, cycle_length)`.
///
/// `None` before the start date and for plans whose cycle length is not
/// positive.
pub fn cycle_position(plan: &Plan, date: NaiveDate) -> Option<i64> {
    if date < plan.start_date {
        return None;
    }

    let cycle_length = plan.cycle_length();
    if cycle_length <= 0 {
        return None;
    }

    let days_since_start = (date - plan.start_date).num_days();
    Some(days_since_start.rem_euclid(cycle_length))
}

/// The phase of `plan` on `date`.
///
/// ```text
/// date < start                   -> None
/// forward + backward <= 0        -> None
/// (date - start) % cycle < fwd   -> Forward
/// otherwise                      -> Backward
/// ```
pub fn phase_for(plan: &Plan, date: NaiveDate) -> Direction {
    match cycle_position(plan, date) {
        None => Direction::None,
        Some(pos) if pos < i64::from(plan.forward_count) => Direction::Forward,
        Some(_) => Direction::Backward,
    }
}

/// [`phase_for`], treating a missing plan as unscheduled.
pub fn phase_for_optional(plan: Option<&Plan>, date: NaiveDate) -> Direction {
    plan.map_or(Direction::None, |p| phase_for(p, date))
}
