//! CLI handlers for `brace plan` subcommands.
//!
//! Implements:
//! - `brace plan create --start D --forward N --backward N`
//! - `brace plan show`          -- the active plan
//! - `brace plan list [--json]` -- every plan, latest start first
//! - `brace plan delete <id>`

use std::fmt::Write as _;

use anyhow::{Result, bail};
use chrono::NaiveDate;

use brace_core::repository::PlanRepository;
use brace_core::schedule::{cycle_position, phase_for};
use brace_db::models::Plan;

use crate::PlanCommands;

// -----------------------------------------------------------------------
// Public entry point
// -----------------------------------------------------------------------

/// Dispatch a `PlanCommands` variant to the appropriate handler.
pub async fn run_plan_command(
    command: PlanCommands,
    repo: &PlanRepository,
    today: NaiveDate,
) -> Result<()> {
    match command {
        PlanCommands::Create {
            start,
            forward,
            backward,
        } => cmd_create(repo, start.unwrap_or(today), forward, backward).await,
        PlanCommands::Show => cmd_show(repo, today),
        PlanCommands::List { json } => cmd_list(repo, json).await,
        PlanCommands::Delete { id } => cmd_delete(repo, id).await,
    }
}

// -----------------------------------------------------------------------
// brace plan create
// -----------------------------------------------------------------------

async fn cmd_create(
    repo: &PlanRepository,
    start: NaiveDate,
    forward: i32,
    backward: i32,
) -> Result<()> {
    let plan = repo.create_plan(start, forward, backward).await?;

    println!("Plan created.");
    println!();
    print!("{}", format_plan(&plan, None));

    if plan.cycle_length() <= 0 {
        println!();
        println!("Warning: forward + backward is not positive; this plan schedules no days.");
    }

    Ok(())
}

// -----------------------------------------------------------------------
// brace plan show
// -----------------------------------------------------------------------

fn cmd_show(repo: &PlanRepository, today: NaiveDate) -> Result<()> {
    let Some(plan) = repo.current_plan() else {
        println!("No active plan. Use `brace plan create` to create one.");
        return Ok(());
    };

    println!("Active plan:");
    print!("{}", format_plan(&plan, Some(today)));
    Ok(())
}

/// Key/value summary of one plan. With `today`, the current cycle position
/// is included.
pub fn format_plan(plan: &Plan, today: Option<NaiveDate>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Plan ID:   {}", plan.id);
    let _ = writeln!(out, "  Start:     {}", plan.start_date);
    let _ = writeln!(out, "  Forward:   {} day(s)", plan.forward_count);
    let _ = writeln!(out, "  Backward:  {} day(s)", plan.backward_count);
    let _ = writeln!(out, "  Cycle:     {} day(s)", plan.cycle_length());

    if let Some(today) = today {
        match cycle_position(plan, today) {
            Some(pos) => {
                let _ = writeln!(
                    out,
                    "  Today:     {} (day {} of {})",
                    phase_for(plan, today),
                    pos + 1,
                    plan.cycle_length()
                );
            }
            None => {
                let _ = writeln!(out, "  Today:     not scheduled");
            }
        }
    }
    out
}

// -----------------------------------------------------------------------
// brace plan list
// -----------------------------------------------------------------------

async fn cmd_list(repo: &PlanRepository, json: bool) -> Result<()> {
    let plans = repo.all_plans().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    if plans.is_empty() {
        println!("No plans found. Use `brace plan create` to create one.");
        return Ok(());
    }

    let active = repo.current_plan().map(|p| p.id);
    print!("{}", format_plan_table(&plans, active));
    Ok(())
}

/// Aligned table of plans; the active plan is marked with `*`.
pub fn format_plan_table(plans: &[Plan], active: Option<i64>) -> String {
    let id_w = plans
        .iter()
        .map(|p| p.id.to_string().len())
        .max()
        .unwrap_or(2)
        .max(2);
    let start_w = 10;
    let count_w = 8;

    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:<id_w$}  {:<start_w$}  {:>count_w$}  {:>count_w$}",
        "ID", "START", "FORWARD", "BACKWARD",
    );
    for plan in plans {
        let marker = if Some(plan.id) == active { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{marker} {:<id_w$}  {:<start_w$}  {:>count_w$}  {:>count_w$}",
            plan.id,
            plan.start_date.to_string(),
            plan.forward_count,
            plan.backward_count,
        );
    }
    out
}

// -----------------------------------------------------------------------
// brace plan delete <id>
// -----------------------------------------------------------------------

async fn cmd_delete(repo: &PlanRepository, id: i64) -> Result<()> {
    if !repo.delete_plan(id).await? {
        bail!("plan {id} not found");
    }

    println!("Plan {id} deleted.");
    match repo.current_plan() {
        Some(plan) => println!("Active plan is now {}.", plan.id),
        None => println!("No active plan remains."),
    }
    Ok(())
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
