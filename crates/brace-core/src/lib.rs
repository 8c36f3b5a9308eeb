//! Core of brace: phase scheduling, calendar aggregation, the persistence
//! gateway trait and the plan repository.

pub mod calendar;
pub mod repository;
pub mod schedule;
pub mod store;

pub use calendar::{CalendarDay, build_range, month_grid_range};
pub use repository::{ActivePlan, PlanRepository};
pub use schedule::{cycle_position, phase_for, phase_for_optional};
pub use store::{MemoryStore, PlanStore, SqliteStore};
