//! `brace today`, `brace direction` and `brace check-in`.

use anyhow::Result;
use chrono::NaiveDate;

use brace_core::repository::PlanRepository;
use brace_db::models::{DailyRecord, Direction};

/// Print the phase for `date` with its completion status.
pub async fn run_today(repo: &PlanRepository, date: NaiveDate) -> Result<()> {
    if repo.current_plan().is_none() {
        println!("No active plan. Use `brace plan create` to create one.");
        return Ok(());
    }

    let direction = repo.direction_for(date);
    let record = repo.record_for_date(date).await;
    println!("{}", describe_day(date, direction, record.as_ref()));
    Ok(())
}

/// Print only the phase name, for scripting.
pub fn run_direction(repo: &PlanRepository, date: NaiveDate) -> Result<()> {
    println!("{}", repo.direction_for(date));
    Ok(())
}

/// Mark `date` completed under the active plan.
pub async fn run_check_in(repo: &PlanRepository, date: NaiveDate) -> Result<()> {
    match repo.check_in(date).await? {
        Some(record) => println!(
            "Checked in {} ({}) for plan {}.",
            record.date, record.direction, record.plan_id
        ),
        None if repo.current_plan().is_none() => {
            println!("Nothing to check in: no active plan.");
        }
        None => println!("Nothing to check in: no phase is scheduled on {date}."),
    }
    Ok(())
}

/// One-line summary of a day.
pub fn describe_day(date: NaiveDate, direction: Direction, record: Option<&DailyRecord>) -> String {
    let phase = match direction {
        Direction::Forward => "forward",
        Direction::Backward => "backward",
        Direction::None => "no phase scheduled",
    };
    let status = match record {
        Some(r) if r.completed => "done",
        _ if direction == Direction::None => return format!("{date}: {phase}"),
        _ => "not done",
    };
    format!("{date}: {phase} ({status})")
}
