//! Database query functions for the `plans` table.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::models::{NewPlan, Plan, check_storable};

const PLAN_COLUMNS: &str = "id, start_date, forward_count, backward_count";

/// Insert a new plan row. Returns the id SQLite assigned.
///
/// `AUTOINCREMENT` guarantees ids are never reused, so a later insert
/// always has a greater id than every earlier one.
pub async fn insert_plan(pool: &SqlitePool, plan: &NewPlan) -> Result<i64> {
    check_storable(plan.start_date)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO plans (start_date, forward_count, backward_count) \
         VALUES (?1, ?2, ?3) \
         RETURNING id",
    )
    .bind(plan.start_date)
    .bind(plan.forward_count)
    .bind(plan.backward_count)
    .fetch_one(pool)
    .await
    .context("failed to insert plan")?;

    Ok(id)
}

/// Insert or replace a plan by id. Returns the plan's id.
pub async fn upsert_plan(pool: &SqlitePool, plan: &Plan) -> Result<i64> {
    check_storable(plan.start_date)?;
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO plans (id, start_date, forward_count, backward_count) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (id) DO UPDATE SET \
             start_date = excluded.start_date, \
             forward_count = excluded.forward_count, \
             backward_count = excluded.backward_count \
         RETURNING id",
    )
    .bind(plan.id)
    .bind(plan.start_date)
    .bind(plan.forward_count)
    .bind(plan.backward_count)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to upsert plan {}", plan.id))?;

    Ok(id)
}

/// Fetch the most recently created plan (greatest id, later start date on
/// a tie).
pub async fn get_latest_plan(pool: &SqlitePool) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans ORDER BY id DESC, start_date DESC LIMIT 1"
    ))
    .fetch_optional(pool)
    .await
    .context("failed to fetch latest plan")?;

    Ok(plan)
}

/// Fetch a plan by its ID.
pub async fn get_plan(pool: &SqlitePool, id: i64) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch plan")?;

    Ok(plan)
}

/// List all plans, ordered by start date (latest first).
pub async fn list_plans(pool: &SqlitePool) -> Result<Vec<Plan>> {
    let plans = sqlx::query_as::<_, Plan>(&format!(
        "SELECT {PLAN_COLUMNS} FROM plans ORDER BY start_date DESC, id DESC"
    ))
    .fetch_all(pool)
    .await
    .context("failed to list plans")?;

    Ok(plans)
}

/// Delete a plan row. Returns `false` when no such plan existed.
///
/// Daily records referencing the plan are left in place.
pub async fn delete_plan(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM plans WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete plan {id}"))?;

    Ok(result.rows_affected() > 0)
}
