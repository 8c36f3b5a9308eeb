//! [`PlanStore`] backed by a SQLite pool.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqlitePool;

use brace_db::models::{DailyRecord, NewPlan, Plan};
use brace_db::queries::{plans as plan_db, records as record_db};

use super::PlanStore;

/// Thin adapter from the trait to the `brace-db` query functions.
///
/// Cloning is cheap; clones share the pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl PlanStore for SqliteStore {
    async fn insert_plan(&self, plan: &NewPlan) -> Result<i64> {
        plan_db::insert_plan(&self.pool, plan).await
    }

    async fn upsert_plan(&self, plan: &Plan) -> Result<i64> {
        plan_db::upsert_plan(&self.pool, plan).await
    }

    async fn latest_plan(&self) -> Result<Option<Plan>> {
        plan_db::get_latest_plan(&self.pool).await
    }

    async fn plan_by_id(&self, id: i64) -> Result<Option<Plan>> {
        plan_db::get_plan(&self.pool, id).await
    }

    async fn all_plans(&self) -> Result<Vec<Plan>> {
        plan_db::list_plans(&self.pool).await
    }

    async fn delete_plan(&self, id: i64) -> Result<bool> {
        plan_db::delete_plan(&self.pool, id).await
    }

    async fn insert_record(&self, record: &DailyRecord) -> Result<()> {
        record_db::upsert_record(&self.pool, record).await
    }

    async fn record(&self, date: NaiveDate, plan_id: i64) -> Result<Option<DailyRecord>> {
        record_db::get_record(&self.pool, date, plan_id).await
    }

    async fn record_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>> {
        record_db::get_record_by_date(&self.pool, date).await
    }

    async fn records_by_plan(&self, plan_id: i64) -> Result<Vec<DailyRecord>> {
        record_db::list_records_for_plan(&self.pool, plan_id).await
    }

    async fn records_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyRecord>> {
        record_db::list_records_in_range(&self.pool, from, to).await
    }

    async fn delete_record(&self, date: NaiveDate, plan_id: i64) -> Result<bool> {
        record_db::delete_record(&self.pool, date, plan_id).await
    }
}
