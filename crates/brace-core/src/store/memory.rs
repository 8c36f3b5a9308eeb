//! Process-local [`PlanStore`]. Contents are lost when the store drops.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use brace_db::models::{DailyRecord, NewPlan, Plan, check_storable};

use super::PlanStore;

#[derive(Debug)]
struct Inner {
    plans: BTreeMap<i64, Plan>,
    /// Keyed by `(date, plan_id)`, which keeps range scans in date order.
    records: BTreeMap<(NaiveDate, i64), DailyRecord>,
    /// Greatest id ever handed out or upserted. Never decreases, matching
    /// `AUTOINCREMENT`.
    last_id: i64,
}

/// In-memory store with the same ordering and uniqueness rules as
/// [`super::SqliteStore`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                plans: BTreeMap::new(),
                records: BTreeMap::new(),
                last_id: 0,
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanStore for MemoryStore {
    async fn insert_plan(&self, plan: &NewPlan) -> Result<i64> {
        check_storable(plan.start_date)?;
        let mut inner = self.inner.lock().await;
        // Like SQLite, once the greatest id is in use no new id is handed out.
        let id = inner
            .last_id
            .checked_add(1)
            .context("failed to insert plan: plan ids exhausted")?;
        inner.last_id = id;
        inner.plans.insert(id, plan.with_id(id));
        Ok(id)
    }

    async fn upsert_plan(&self, plan: &Plan) -> Result<i64> {
        check_storable(plan.start_date)?;
        let mut inner = self.inner.lock().await;
        inner.last_id = inner.last_id.max(plan.id);
        inner.plans.insert(plan.id, plan.clone());
        Ok(plan.id)
    }

    async fn latest_plan(&self) -> Result<Option<Plan>> {
        let inner = self.inner.lock().await;
        // Ids are unique keys, so the greatest key is the latest plan.
        Ok(inner.plans.values().next_back().cloned())
    }

    async fn plan_by_id(&self, id: i64) -> Result<Option<Plan>> {
        Ok(self.inner.lock().await.plans.get(&id).cloned())
    }

    async fn all_plans(&self) -> Result<Vec<Plan>> {
        let inner = self.inner.lock().await;
        let mut plans: Vec<Plan> = inner.plans.values().cloned().collect();
        plans.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(plans)
    }

    async fn delete_plan(&self, id: i64) -> Result<bool> {
        Ok(self.inner.lock().await.plans.remove(&id).is_some())
    }

    async fn insert_record(&self, record: &DailyRecord) -> Result<()> {
        check_storable(record.date)?;
        self.inner
            .lock()
            .await
            .records
            .insert((record.date, record.plan_id), record.clone());
        Ok(())
    }

    async fn record(&self, date: NaiveDate, plan_id: i64) -> Result<Option<DailyRecord>> {
        Ok(self.inner.lock().await.records.get(&(date, plan_id)).cloned())
    }

    async fn record_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .range((date, i64::MIN)..=(date, i64::MAX))
            .next_back()
            .map(|(_, r)| r.clone()))
    }

    async fn records_by_plan(&self, plan_id: i64) -> Result<Vec<DailyRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .values()
            .filter(|r| r.plan_id == plan_id)
            .cloned()
            .collect())
    }

    async fn records_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyRecord>> {
        if from > to {
            return Ok(Vec::new());
        }
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .range((from, i64::MIN)..=(to, i64::MAX))
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn delete_record(&self, date: NaiveDate, plan_id: i64) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .records
            .remove(&(date, plan_id))
            .is_some())
    }
}
