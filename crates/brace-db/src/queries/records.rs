//! Database query functions for the `daily_records` table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::SqlitePool;

use crate::models::{DailyRecord, check_storable, clamp_stored_range};

const RECORD_COLUMNS: &str = "date, plan_id, completed, direction, notes, color";

/// Insert a record, replacing any existing record for the same
/// `(date, plan_id)`. Dates outside years 0000..=9999 are rejected.
pub async fn upsert_record(pool: &SqlitePool, record: &DailyRecord) -> Result<()> {
    check_storable(record.date)?;
    sqlx::query(
        "INSERT INTO daily_records (date, plan_id, completed, direction, notes, color) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT (date, plan_id) DO UPDATE SET \
             completed = excluded.completed, \
             direction = excluded.direction, \
             notes = excluded.notes, \
             color = excluded.color",
    )
    .bind(record.date)
    .bind(record.plan_id)
    .bind(record.completed)
    .bind(record.direction.as_str())
    .bind(&record.notes)
    .bind(&record.color)
    .execute(pool)
    .await
    .with_context(|| {
        format!(
            "failed to save record for {} (plan {})",
            record.date, record.plan_id
        )
    })?;

    Ok(())
}

/// Fetch the record for one `(date, plan_id)` pair.
pub async fn get_record(
    pool: &SqlitePool,
    date: NaiveDate,
    plan_id: i64,
) -> Result<Option<DailyRecord>> {
    let record = sqlx::query_as::<_, DailyRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM daily_records WHERE date = ?1 AND plan_id = ?2"
    ))
    .bind(date)
    .bind(plan_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch record")?;

    Ok(record)
}

/// Fetch a record for a date regardless of plan.
///
/// When several plans have a record that day, the one belonging to the
/// most recent plan wins.
pub async fn get_record_by_date(pool: &SqlitePool, date: NaiveDate) -> Result<Option<DailyRecord>> {
    let record = sqlx::query_as::<_, DailyRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM daily_records WHERE date = ?1 \
         ORDER BY plan_id DESC LIMIT 1"
    ))
    .bind(date)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("failed to fetch record for {date}"))?;

    Ok(record)
}

/// List all records of a plan, oldest first.
pub async fn list_records_for_plan(pool: &SqlitePool, plan_id: i64) -> Result<Vec<DailyRecord>> {
    let records = sqlx::query_as::<_, DailyRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM daily_records WHERE plan_id = ?1 ORDER BY date"
    ))
    .bind(plan_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list records for plan {plan_id}"))?;

    Ok(records)
}

/// List records with `from <= date <= to`, ordered by date then plan.
///
/// Dates are stored as ISO `YYYY-MM-DD` text, which sorts chronologically
/// within the storable years, so the bounds are clamped to them first.
pub async fn list_records_in_range(
    pool: &SqlitePool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<DailyRecord>> {
    let Some((lo, hi)) = clamp_stored_range(from, to) else {
        return Ok(Vec::new());
    };
    let records = sqlx::query_as::<_, DailyRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM daily_records \
         WHERE date >= ?1 AND date <= ?2 \
         ORDER BY date, plan_id"
    ))
    .bind(lo)
    .bind(hi)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list records between {from} and {to}"))?;

    Ok(records)
}

/// Delete one record. Returns `false` when none matched.
pub async fn delete_record(pool: &SqlitePool, date: NaiveDate, plan_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM daily_records WHERE date = ?1 AND plan_id = ?2")
        .bind(date)
        .bind(plan_id)
        .execute(pool)
        .await
        .with_context(|| format!("failed to delete record for {date} (plan {plan_id})"))?;

    Ok(result.rows_affected() > 0)
}
