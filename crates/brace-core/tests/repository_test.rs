//! Behavioural tests for `PlanRepository` over an in-memory store.
//!
//! A scripted store wraps `MemoryStore` to inject read/write failures and to
//! park a `latest_plan` call mid-flight, which lets the tests force
//! out-of-order reloads deterministically.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Notify;
use tokio_stream::StreamExt;

use brace_core::calendar::{BACKWARD_COLOR, FORWARD_COLOR};
use brace_core::repository::{ActivePlan, PlanRepository};
use brace_core::store::{MemoryStore, PlanStore};
use brace_db::models::{DailyRecord, Direction, NewPlan, Plan};

// -----------------------------------------------------------------------
// Scripted store
// -----------------------------------------------------------------------

#[derive(Default)]
struct ScriptedStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    /// When set, the next `latest_plan` call snapshots its result, signals
    /// `entered`, and waits for `release` before returning the snapshot.
    gate_armed: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl ScriptedStore {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn arm_gate(&self) {
        self.gate_armed.store(true, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("injected read failure");
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("injected write failure");
        }
        Ok(())
    }
}

#[async_trait]
impl PlanStore for ScriptedStore {
    async fn insert_plan(&self, plan: &NewPlan) -> Result<i64> {
        self.check_write()?;
        self.inner.insert_plan(plan).await
    }

    async fn upsert_plan(&self, plan: &Plan) -> Result<i64> {
        self.check_write()?;
        self.inner.upsert_plan(plan).await
    }

    async fn latest_plan(&self) -> Result<Option<Plan>> {
        self.check_read()?;
        let snapshot = self.inner.latest_plan().await?;
        if self.gate_armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(snapshot)
    }

    async fn plan_by_id(&self, id: i64) -> Result<Option<Plan>> {
        self.check_read()?;
        self.inner.plan_by_id(id).await
    }

    async fn all_plans(&self) -> Result<Vec<Plan>> {
        self.check_read()?;
        self.inner.all_plans().await
    }

    async fn delete_plan(&self, id: i64) -> Result<bool> {
        self.check_write()?;
        self.inner.delete_plan(id).await
    }

    async fn insert_record(&self, record: &DailyRecord) -> Result<()> {
        self.check_write()?;
        self.inner.insert_record(record).await
    }

    async fn record(&self, date: NaiveDate, plan_id: i64) -> Result<Option<DailyRecord>> {
        self.check_read()?;
        self.inner.record(date, plan_id).await
    }

    async fn record_by_date(&self, date: NaiveDate) -> Result<Option<DailyRecord>> {
        self.check_read()?;
        self.inner.record_by_date(date).await
    }

    async fn records_by_plan(&self, plan_id: i64) -> Result<Vec<DailyRecord>> {
        self.check_read()?;
        self.inner.records_by_plan(plan_id).await
    }

    async fn records_in_range(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DailyRecord>> {
        self.check_read()?;
        self.inner.records_in_range(from, to).await
    }

    async fn delete_record(&self, date: NaiveDate, plan_id: i64) -> Result<bool> {
        self.check_write()?;
        self.inner.delete_record(date, plan_id).await
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

// -----------------------------------------------------------------------
// Loading and observation
// -----------------------------------------------------------------------

#[tokio::test]
async fn open_on_empty_store_loads_no_plan() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    assert_eq!(repo.active_plan(), ActivePlan::Loaded(None));
    assert_eq!(repo.direction_for(date(2024, 1, 1)), Direction::None);
}

#[tokio::test]
async fn spawn_starts_unloaded_until_first_load() {
    let store = ScriptedStore::new();
    store
        .inner
        .insert_plan(&NewPlan::new(date(2024, 1, 1), 2, 3))
        .await
        .unwrap();
    store.arm_gate();

    let repo = PlanRepository::spawn(store.clone());
    assert_eq!(repo.active_plan(), ActivePlan::Unloaded);
    assert_eq!(repo.direction_for(date(2024, 1, 1)), Direction::None);

    store.release.notify_one();
    let plan = repo.loaded().await.expect("plan should load");
    assert_eq!(plan.start_date, date(2024, 1, 1));
    assert_eq!(repo.direction_for(date(2024, 1, 1)), Direction::Forward);
}

#[tokio::test]
async fn create_then_read_observes_the_write() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;

    let created = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();

    let active = repo.current_plan().expect("plan should be active");
    assert_eq!(active, created);
    assert_eq!(active.forward_count, 2);
    assert_eq!(active.backward_count, 3);
    assert_eq!(repo.direction_for(date(2024, 1, 3)), Direction::Backward);
}

#[tokio::test]
async fn most_recently_created_plan_governs() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;

    repo.create_plan(date(2024, 6, 1), 1, 1).await.unwrap();
    let newer = repo.create_plan(date(2024, 1, 1), 3, 1).await.unwrap();

    assert_eq!(repo.current_plan(), Some(newer));
    // Phase follows the newer plan only, with no blending.
    assert_eq!(repo.direction_for(date(2024, 6, 2)), Direction::Forward);
}

#[tokio::test]
async fn subscribers_see_each_published_change() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let mut rx = repo.subscribe();
    assert!(!rx.has_changed().unwrap());

    let plan = repo.create_plan(date(2024, 1, 1), 2, 2).await.unwrap();

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().plan(), Some(&plan));

    // A refresh that reads the same plan does not notify.
    repo.refresh().await;
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn change_stream_yields_current_then_updates() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let mut changes = repo.changes();

    assert_eq!(changes.next().await, Some(ActivePlan::Loaded(None)));

    let plan = repo.create_plan(date(2024, 2, 1), 1, 2).await.unwrap();
    assert_eq!(changes.next().await, Some(ActivePlan::Loaded(Some(plan))));
}

#[tokio::test]
async fn dropped_subscriber_does_not_block_writes() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    drop(repo.subscribe());
    drop(repo.changes());

    repo.create_plan(date(2024, 1, 1), 1, 1).await.unwrap();
    assert!(repo.current_plan().is_some());
}

// -----------------------------------------------------------------------
// Ordering
// -----------------------------------------------------------------------

#[tokio::test]
async fn stale_reload_does_not_overwrite_newer_publish() {
    let store = ScriptedStore::new();
    let repo = PlanRepository::open(store.clone()).await;

    // Start a reload that reads "no plan" and then parks.
    store.arm_gate();
    let stale = tokio::spawn({
        let repo = repo.clone();
        async move { repo.refresh().await }
    });
    store.entered.notified().await;

    // A later write publishes the new plan while the stale read is parked.
    let plan = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();
    assert_eq!(repo.current_plan(), Some(plan.clone()));

    store.release.notify_one();
    stale.await.unwrap();

    assert_eq!(repo.current_plan(), Some(plan));
}

#[tokio::test]
async fn concurrent_creates_leave_the_last_insert_active() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;

    let (a, b) = tokio::join!(
        repo.create_plan(date(2024, 1, 1), 1, 1),
        repo.create_plan(date(2024, 2, 1), 2, 2),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let last = if a.id > b.id { a } else { b };
    assert_eq!(repo.current_plan(), Some(last));
    assert_eq!(repo.all_plans().await.len(), 2);
}

// -----------------------------------------------------------------------
// Failure handling
// -----------------------------------------------------------------------

#[tokio::test]
async fn load_failure_resolves_to_no_plan() {
    let store = ScriptedStore::new();
    store
        .inner
        .insert_plan(&NewPlan::new(date(2024, 1, 1), 2, 3))
        .await
        .unwrap();
    store.set_fail_reads(true);

    let repo = PlanRepository::open(store.clone()).await;
    assert_eq!(repo.active_plan(), ActivePlan::Loaded(None));

    store.set_fail_reads(false);
    assert!(repo.refresh().await.is_some());
}

#[tokio::test]
async fn failed_write_leaves_active_plan_unchanged() {
    let store = ScriptedStore::new();
    let repo = PlanRepository::open(store.clone()).await;
    let plan = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();

    store.set_fail_writes(true);
    let err = repo.create_plan(date(2024, 5, 1), 1, 1).await.unwrap_err();
    assert!(format!("{err:#}").contains("injected write failure"));
    assert_eq!(repo.current_plan(), Some(plan.clone()));

    let rec = DailyRecord::new(date(2024, 1, 1), plan.id, true, Direction::Forward);
    assert!(repo.record_completion(&rec).await.is_err());
    assert!(repo.check_in(date(2024, 1, 1)).await.is_err());
}

#[tokio::test]
async fn reads_degrade_to_safe_defaults() {
    let store = ScriptedStore::new();
    let repo = PlanRepository::open(store.clone()).await;
    let plan = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();
    repo.check_in(date(2024, 1, 1)).await.unwrap();

    store.set_fail_reads(true);
    assert!(repo.all_plans().await.is_empty());
    assert!(repo.plan_by_id(plan.id).await.is_none());
    assert!(repo.records_in_range(date(2024, 1, 1), date(2024, 1, 31)).await.is_empty());
    assert!(repo.records_for_plan(plan.id).await.is_empty());
    assert!(repo.record_for_date(date(2024, 1, 1)).await.is_none());
    assert!(repo.try_records_in_range(date(2024, 1, 1), date(2024, 1, 31)).await.is_err());
}

#[tokio::test]
async fn calendar_falls_back_to_today_on_read_failure() {
    let store = ScriptedStore::new();
    let repo = PlanRepository::open(store.clone()).await;
    repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();

    store.set_fail_reads(true);
    let today = date(2024, 1, 10);
    let days = repo.calendar_at(date(2024, 1, 1), date(2024, 1, 31), today).await;

    assert_eq!(days.len(), 1);
    assert_eq!(days[0].date, today);
    assert!(days[0].is_today);
    assert_eq!(days[0].phase, Direction::None);
    assert!(!days[0].completed);
}

// -----------------------------------------------------------------------
// Records and calendar
// -----------------------------------------------------------------------

#[tokio::test]
async fn check_in_marks_scheduled_days_only() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;

    // No plan yet.
    assert_eq!(repo.check_in(date(2024, 1, 1)).await.unwrap(), None);

    let plan = repo.create_plan(date(2024, 1, 5), 2, 3).await.unwrap();

    // Before the start date there is no phase to check in under.
    assert_eq!(repo.check_in(date(2024, 1, 4)).await.unwrap(), None);

    let rec = repo
        .check_in(date(2024, 1, 7))
        .await
        .unwrap()
        .expect("scheduled day should be recorded");
    assert_eq!(rec.plan_id, plan.id);
    assert!(rec.completed);
    assert_eq!(rec.direction, Direction::Backward);

    assert_eq!(repo.record_for_date(date(2024, 1, 7)).await, Some(rec));
    assert_eq!(repo.records_for_plan(plan.id).await.len(), 1);
}

#[tokio::test]
async fn recording_twice_keeps_one_latest_record() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let plan = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();
    let mut rx = repo.subscribe();

    let first = DailyRecord::new(date(2024, 1, 2), plan.id, false, Direction::Forward);
    let second = first.clone().with_notes("finished in the evening");
    // Flip completion on the second write.
    let second = DailyRecord {
        completed: true,
        ..second
    };
    repo.record_completion(&first).await.unwrap();
    repo.record_completion(&second).await.unwrap();

    let stored = repo.records_in_range(date(2024, 1, 1), date(2024, 1, 31)).await;
    assert_eq!(stored, vec![second]);
    // Records do not republish the active plan.
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn calendar_merges_active_plan_records() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let old = repo.create_plan(date(2023, 12, 1), 1, 1).await.unwrap();
    let plan = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();

    let old_rec = DailyRecord::new(date(2024, 1, 3), old.id, true, Direction::Forward);
    repo.record_completion(&old_rec).await.unwrap();
    repo.check_in(date(2024, 1, 2)).await.unwrap();

    let days = repo
        .calendar_at(date(2024, 1, 1), date(2024, 1, 7), date(2024, 1, 2))
        .await;

    assert_eq!(days.len(), 7);
    let completed: Vec<bool> = days.iter().map(|d| d.completed).collect();
    // Only the active plan's record on the 2nd counts, not the old plan's
    // record on the 3rd.
    assert_eq!(completed, vec![false, true, false, false, false, false, false]);
    assert!(days[1].is_today);
    assert_eq!(days[0].color.as_deref(), Some(FORWARD_COLOR));
    assert_eq!(days[2].color.as_deref(), Some(BACKWARD_COLOR));
    assert_eq!(repo.current_plan().map(|p| p.id), Some(plan.id));
}

#[tokio::test]
async fn month_grid_spans_whole_weeks() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    repo.create_plan(date(2024, 3, 1), 2, 3).await.unwrap();

    let days = repo.month_at(date(2024, 3, 15), date(2024, 3, 15)).await;
    assert_eq!(days.len(), 35);
    assert_eq!(days.first().unwrap().date, date(2024, 2, 26));
    assert_eq!(days.last().unwrap().date, date(2024, 3, 31));
    assert_eq!(days[0].phase, Direction::None);
    assert_eq!(days[4].phase, Direction::Forward);
}

// -----------------------------------------------------------------------
// Plan edits and deletes
// -----------------------------------------------------------------------

#[tokio::test]
async fn upsert_republishes_edited_plan() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let plan = repo.create_plan(date(2024, 1, 1), 2, 3).await.unwrap();

    let edited = Plan {
        forward_count: 5,
        ..plan.clone()
    };
    assert_eq!(repo.upsert_plan(&edited).await.unwrap(), plan.id);
    assert_eq!(repo.current_plan(), Some(edited));
    assert_eq!(repo.direction_for(date(2024, 1, 5)), Direction::Forward);
}

#[tokio::test]
async fn deleting_active_plan_falls_back_to_previous() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let first = repo.create_plan(date(2024, 1, 1), 1, 1).await.unwrap();
    let second = repo.create_plan(date(2024, 2, 1), 2, 2).await.unwrap();
    repo.check_in(date(2024, 2, 1)).await.unwrap();

    assert!(repo.delete_plan(second.id).await.unwrap());
    assert_eq!(repo.current_plan(), Some(first));

    // Records of the deleted plan are kept.
    assert_eq!(repo.records_for_plan(second.id).await.len(), 1);
    assert!(repo.delete_record(date(2024, 2, 1), second.id).await.unwrap());
    assert!(repo.records_for_plan(second.id).await.is_empty());
}

#[tokio::test]
async fn malformed_plan_is_accepted_but_schedules_nothing() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let plan = repo.create_plan(date(2024, 1, 1), 0, 0).await.unwrap();

    assert_eq!(repo.current_plan(), Some(plan));
    assert_eq!(repo.direction_for(date(2024, 1, 1)), Direction::None);
    assert_eq!(repo.check_in(date(2024, 1, 1)).await.unwrap(), None);
}

#[tokio::test]
async fn exhausted_plan_ids_keep_the_greatest_plan_active() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let top = Plan {
        id: i64::MAX,
        start_date: date(2024, 1, 1),
        forward_count: 1,
        backward_count: 1,
    };
    repo.upsert_plan(&top).await.unwrap();

    assert!(repo.create_plan(date(2024, 2, 1), 2, 2).await.is_err());
    assert_eq!(repo.current_plan(), Some(top));
}

#[tokio::test]
async fn unstorable_dates_fail_the_write_only() {
    let repo = PlanRepository::open(ScriptedStore::new()).await;
    let plan = repo.create_plan(date(9999, 12, 30), 2, 2).await.unwrap();

    assert!(repo.create_plan(date(10_000, 1, 1), 1, 1).await.is_err());
    assert!(repo.check_in(date(10_000, 1, 2)).await.is_err());
    assert_eq!(repo.current_plan(), Some(plan.clone()));

    let rec = repo.check_in(date(9999, 12, 31)).await.unwrap().unwrap();
    let found = repo.records_in_range(date(9999, 12, 1), date(10_000, 2, 1)).await;
    assert_eq!(found, vec![rec]);
}
