//! The plan repository: sole owner of the active plan.
//!
//! All persistence goes through a [`PlanStore`]. The active plan is held in
//! a [`tokio::sync::watch`] channel and is only ever replaced by an
//! authoritative re-read of the store:
//!
//! ```text
//! create/upsert/delete  -> take write lock -> write -> reload -> publish
//! refresh / construction                             -> reload -> publish
//! ```
//!
//! Writes are serialized through one async mutex held across write and
//! reload, so two racing writers finish in lock order and the last reload
//! sees both. Every reload takes a sequence number before reading; a result
//! is published only if no later-started reload has published already, so
//! a slow, stale read can never replace a newer value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tokio::sync::{Mutex, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use brace_db::models::{DailyRecord, Direction, NewPlan, Plan};

use crate::calendar::{self, CalendarDay};
use crate::schedule::{phase_for, phase_for_optional};
use crate::store::PlanStore;

/// Observable state of the active plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ActivePlan {
    /// The first load has not completed yet.
    #[default]
    Unloaded,
    /// Result of the latest load. `None` when no plan exists or the load
    /// failed.
    Loaded(Option<Plan>),
}

impl ActivePlan {
    pub fn plan(&self) -> Option<&Plan> {
        match self {
            Self::Loaded(plan) => plan.as_ref(),
            Self::Unloaded => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

struct Inner {
    store: Arc<dyn PlanStore>,
    state: watch::Sender<ActivePlan>,
    /// Last sequence number handed to a reload.
    started: AtomicU64,
    /// Sequence number of the reload whose result is published. Only
    /// touched inside `send_if_modified`, which holds the channel lock.
    published: AtomicU64,
    writes: Mutex<()>,
}

/// Handle to the repository. Clones share the same state.
#[derive(Clone)]
pub struct PlanRepository {
    inner: Arc<Inner>,
}

impl PlanRepository {
    fn unloaded(store: Arc<dyn PlanStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                state: watch::Sender::new(ActivePlan::Unloaded),
                started: AtomicU64::new(0),
                published: AtomicU64::new(0),
                writes: Mutex::new(()),
            }),
        }
    }

    /// Create the repository and start the initial load in the background.
    ///
    /// The active plan reads as [`ActivePlan::Unloaded`] until the load
    /// completes. Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn PlanStore>) -> Self {
        let repo = Self::unloaded(store);
        let loader = repo.clone();
        tokio::spawn(async move {
            loader.reload().await;
        });
        repo
    }

    /// Create the repository and wait for the initial load.
    pub async fn open(store: Arc<dyn PlanStore>) -> Self {
        let repo = Self::unloaded(store);
        repo.reload().await;
        repo
    }

    // -------------------------------------------------------------------
    // Active plan
    // -------------------------------------------------------------------

    /// Snapshot of the current state.
    pub fn active_plan(&self) -> ActivePlan {
        self.inner.state.borrow().clone()
    }

    /// The active plan, if one is loaded.
    pub fn current_plan(&self) -> Option<Plan> {
        self.inner.state.borrow().plan().cloned()
    }

    /// Receiver that observes every published change. Dropping it
    /// unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<ActivePlan> {
        self.inner.state.subscribe()
    }

    /// Stream of states: yields the current state first, then each change.
    pub fn changes(&self) -> WatchStream<ActivePlan> {
        WatchStream::new(self.subscribe())
    }

    /// Wait for the first load to complete and return the active plan.
    pub async fn loaded(&self) -> Option<Plan> {
        let mut rx = self.subscribe();
        match rx.wait_for(ActivePlan::is_loaded).await {
            Ok(state) => state.plan().cloned(),
            // The sender lives in `self`, so the channel cannot close here.
            Err(_) => None,
        }
    }

    /// Re-read the active plan from the store and publish it.
    ///
    /// A failed read publishes "no active plan". Returns the state after
    /// this reload, which may be newer than what the reload itself read.
    pub async fn refresh(&self) -> Option<Plan> {
        self.reload().await;
        self.current_plan()
    }

    async fn reload(&self) {
        let seq = self.inner.started.fetch_add(1, Ordering::SeqCst) + 1;

        let plan = match self.inner.store.latest_plan().await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to load active plan");
                None
            }
        };

        self.publish(seq, plan);
    }

    fn publish(&self, seq: u64, plan: Option<Plan>) {
        let published = &self.inner.published;
        self.inner.state.send_if_modified(|state| {
            let newest = published.load(Ordering::SeqCst);
            if seq <= newest {
                debug!(seq, newest, "discarding stale plan load");
                return false;
            }
            published.store(seq, Ordering::SeqCst);

            let next = ActivePlan::Loaded(plan);
            if *state == next {
                return false;
            }
            debug!(seq, plan_id = next.plan().map(|p| p.id), "publishing active plan");
            *state = next;
            true
        });
    }

    /// Phase of the active plan on `date`; [`Direction::None`] when no plan
    /// is loaded.
    pub fn direction_for(&self, date: NaiveDate) -> Direction {
        phase_for_optional(self.inner.state.borrow().plan(), date)
    }

    // -------------------------------------------------------------------
    // Plan writes
    // -------------------------------------------------------------------

    /// Persist a new plan, then reload and publish the active plan.
    ///
    /// The counts are stored as given; a plan with a non-positive cycle
    /// simply schedules nothing. Returns the plan as stored.
    pub async fn create_plan(
        &self,
        start_date: NaiveDate,
        forward_count: i32,
        backward_count: i32,
    ) -> Result<Plan> {
        let _guard = self.inner.writes.lock().await;

        let new_plan = NewPlan::new(start_date, forward_count, backward_count);
        let id = self
            .inner
            .store
            .insert_plan(&new_plan)
            .await
            .context("failed to save plan")?;
        info!(plan_id = id, %start_date, forward_count, backward_count, "plan created");

        self.reload().await;
        Ok(new_plan.with_id(id))
    }

    /// Insert or replace a full plan value, then reload and publish.
    pub async fn upsert_plan(&self, plan: &Plan) -> Result<i64> {
        let _guard = self.inner.writes.lock().await;

        let id = self
            .inner
            .store
            .upsert_plan(plan)
            .await
            .with_context(|| format!("failed to save plan {}", plan.id))?;
        info!(plan_id = id, "plan upserted");

        self.reload().await;
        Ok(id)
    }

    /// Delete a plan, then reload and publish. Its records are kept.
    pub async fn delete_plan(&self, id: i64) -> Result<bool> {
        let _guard = self.inner.writes.lock().await;

        let deleted = self
            .inner
            .store
            .delete_plan(id)
            .await
            .with_context(|| format!("failed to delete plan {id}"))?;
        info!(plan_id = id, deleted, "plan delete");

        self.reload().await;
        Ok(deleted)
    }

    // -------------------------------------------------------------------
    // Record writes
    // -------------------------------------------------------------------

    /// Save a record, replacing any existing one for `(date, plan_id)`.
    ///
    /// Records never change which plan is active, so nothing is republished.
    pub async fn record_completion(&self, record: &DailyRecord) -> Result<()> {
        let _guard = self.inner.writes.lock().await;

        self.inner
            .store
            .insert_record(record)
            .await
            .context("failed to save record")?;
        debug!(date = %record.date, plan_id = record.plan_id, completed = record.completed, "record saved");
        Ok(())
    }

    /// Mark `date` as completed under the active plan.
    ///
    /// Does nothing and returns `None` when no plan is active or the plan
    /// schedules no phase that day.
    pub async fn check_in(&self, date: NaiveDate) -> Result<Option<DailyRecord>> {
        let Some(plan) = self.current_plan() else {
            return Ok(None);
        };
        let direction = phase_for(&plan, date);
        if direction == Direction::None {
            return Ok(None);
        }

        let record = DailyRecord::new(date, plan.id, true, direction);
        self.record_completion(&record).await?;
        Ok(Some(record))
    }

    pub async fn delete_record(&self, date: NaiveDate, plan_id: i64) -> Result<bool> {
        let _guard = self.inner.writes.lock().await;

        self.inner
            .store
            .delete_record(date, plan_id)
            .await
            .context("failed to delete record")
    }

    // -------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------

    /// Every plan, latest start date first. Empty if the read fails.
    pub async fn all_plans(&self) -> Vec<Plan> {
        self.inner.store.all_plans().await.unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "failed to list plans");
            Vec::new()
        })
    }

    pub async fn plan_by_id(&self, id: i64) -> Option<Plan> {
        self.inner.store.plan_by_id(id).await.unwrap_or_else(|e| {
            warn!(plan_id = id, error = %format!("{e:#}"), "failed to fetch plan");
            None
        })
    }

    /// Records in `[from, to]`, propagating store errors.
    pub async fn try_records_in_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyRecord>> {
        self.inner.store.records_in_range(from, to).await
    }

    /// Records in `[from, to]`. Empty if the read fails.
    pub async fn records_in_range(&self, from: NaiveDate, to: NaiveDate) -> Vec<DailyRecord> {
        self.try_records_in_range(from, to)
            .await
            .unwrap_or_else(|e| {
                warn!(%from, %to, error = %format!("{e:#}"), "failed to read records");
                Vec::new()
            })
    }

    /// Records of one plan, oldest first. Empty if the read fails.
    pub async fn records_for_plan(&self, plan_id: i64) -> Vec<DailyRecord> {
        self.inner
            .store
            .records_by_plan(plan_id)
            .await
            .unwrap_or_else(|e| {
                warn!(plan_id, error = %format!("{e:#}"), "failed to read records");
                Vec::new()
            })
    }

    /// The record for `date` under the active plan, or under any plan when
    /// none is loaded.
    pub async fn record_for_date(&self, date: NaiveDate) -> Option<DailyRecord> {
        let result = match self.current_plan() {
            Some(plan) => self.inner.store.record(date, plan.id).await,
            None => self.inner.store.record_by_date(date).await,
        };
        result.unwrap_or_else(|e| {
            warn!(%date, error = %format!("{e:#}"), "failed to read record");
            None
        })
    }

    // -------------------------------------------------------------------
    // Calendar
    // -------------------------------------------------------------------

    /// Calendar days for `[from, to]` under the active plan.
    ///
    /// Falls back to a single "today" cell if the records cannot be read.
    pub async fn calendar(&self, from: NaiveDate, to: NaiveDate) -> Vec<CalendarDay> {
        self.calendar_at(from, to, calendar::today()).await
    }

    /// [`Self::calendar`] with an explicit "today".
    pub async fn calendar_at(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        today: NaiveDate,
    ) -> Vec<CalendarDay> {
        let plan = self.current_plan();
        let records = self.try_records_in_range(from, to).await;
        calendar::build_range_or_fallback_at(plan.as_ref(), records, from, to, today)
    }

    /// The whole-week month grid around `anchor`.
    pub async fn month_at(&self, anchor: NaiveDate, today: NaiveDate) -> Vec<CalendarDay> {
        let (from, to) = calendar::month_grid_range(anchor);
        self.calendar_at(from, to, today).await
    }
}
