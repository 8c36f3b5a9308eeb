//! The `PlanStore` trait -- the persistence gateway behind
//! [`crate::repository::PlanRepository`].
//!
//! Two implementations ship with the crate: [`SqliteStore`] over the
//! `brace-db` queries, and [`MemoryStore`] for tests and throw-away sessions.
//! The trait is object safe so the repository can hold an
//! `Arc<dyn PlanStore>`.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

use brace_db::models::{DailyRecord, NewPlan, Plan};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Durable storage for plans and daily records.
///
/// Every method may suspend. Implementations must uphold:
///
/// - ids returned by [`insert_plan`](Self::insert_plan) strictly increase,
///   and inserting fails once `i64::MAX` is in use;
/// - dates outside years 0000..=9999 are rejected on write;
/// - [`latest_plan`](Self::latest_plan) is the plan with the greatest id,
///   the later start date breaking ties;
/// - at most one record exists per `(date, plan_id)`.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Store a new plan and return its assigned id.
    async fn insert_plan(&self, plan: &NewPlan) -> Result<i64>;

    /// Insert or replace a plan by id. Returns the id.
    async fn upsert_plan(&self, plan: &Plan) -> Result<i64>;

    /// The most recently created plan.
    async fn latest_plan(&self) -> Result<Option<Plan>>;

    async fn plan_by_id(&self, id: i64) -> Result<Option<Plan>>;

    /// Every plan, latest start date first.
    async fn all_plans(&self) -> Result<Vec<Plan>>;

    /// Returns `false` if no plan had that id. Records are left in place.
    async fn delete_plan(&self, id: i64) -> Result<bool>;

    /// Insert a record, replacing any existing one for `(date, plan_id)`.
    async fn insert_record(&self, record: &DailyRecord) -> Result<()>;

    async fn record(&self, date: NaiveDate, plan_id: i64) -> Result<Option<DailyRecord>>;

    /// A record on `date` under any plan; the greatest plan id wins.
    async fn record_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>>;

    /// Records of one plan, oldest first.
    async fn records_by_plan(&self, plan_id: i64) -> Result<Vec<DailyRecord>>;

    /// Records with `from <= date <= to`, ordered by date then plan id.
    async fn records_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyRecord>>;

    async fn delete_record(&self, date: NaiveDate, plan_id: i64) -> Result<bool>;
}

// Compile-time assertion: PlanStore must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn PlanStore) {}
};
