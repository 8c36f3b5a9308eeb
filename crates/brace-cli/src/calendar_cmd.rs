//! `brace calendar`: text month grid, Monday first.

use std::fmt::Write as _;

use anyhow::Result;
use chrono::{Datelike, NaiveDate};

use brace_core::calendar::CalendarDay;
use brace_core::repository::PlanRepository;
use brace_db::models::Direction;

const WEEKDAYS: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

/// Error returned for a `--month` value that is not `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MonthParseError {
    #[error("expected YYYY-MM, got {0:?}")]
    Format(String),
    #[error("month must be between 1 and 12, got {0}")]
    Month(u32),
}

/// Parse `YYYY-MM` into the first day of that month.
pub fn parse_month(s: &str) -> Result<NaiveDate, MonthParseError> {
    let format_err = || MonthParseError::Format(s.to_owned());

    let (year, month) = s.trim().split_once('-').ok_or_else(format_err)?;
    if year.len() != 4 || month.is_empty() || month.len() > 2 {
        return Err(format_err());
    }
    let year: i32 = year.parse().map_err(|_| format_err())?;
    let month: u32 = month.parse().map_err(|_| format_err())?;

    NaiveDate::from_ymd_opt(year, month, 1).ok_or(MonthParseError::Month(month))
}

pub async fn run_calendar(
    repo: &PlanRepository,
    anchor: NaiveDate,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let days = repo.month_at(anchor, today).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&days)?);
        return Ok(());
    }

    if repo.current_plan().is_none() {
        println!("No active plan. Use `brace plan create` to create one.");
        println!();
    }
    print!("{}", render_month(&days, anchor));
    Ok(())
}

/// Render the grid for the month containing `anchor`.
///
/// `days` should be whole weeks starting on a Monday, as produced by
/// `month_grid`. Days outside the anchor month are left blank. Each cell is
/// `[>]dd[F|B][*]`: `>` marks today, `*` a completed day.
pub fn render_month(days: &[CalendarDay], anchor: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", anchor.format("%B %Y"));

    let header: Vec<String> = WEEKDAYS.iter().map(|d| format!(" {d:<4}")).collect();
    let _ = writeln!(out, "{}", header.join(" ").trim_end());

    for week in days.chunks(7) {
        let cells: Vec<String> = week
            .iter()
            .map(|day| {
                if day.date.month() != anchor.month() || day.date.year() != anchor.year() {
                    return " ".repeat(5);
                }
                format_cell(day)
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join(" ").trim_end());
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "F forward  B backward  * done  > today");
    out
}

fn format_cell(day: &CalendarDay) -> String {
    let today = if day.is_today { '>' } else { ' ' };
    let phase = match day.phase {
        Direction::Forward => 'F',
        Direction::Backward => 'B',
        Direction::None => ' ',
    };
    let done = if day.completed { '*' } else { ' ' };
    format!("{today}{:>2}{phase}{done}", day.date.day())
}
