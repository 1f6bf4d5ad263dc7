mod clock;
mod core;
mod executor;
mod lock;
mod manager;
mod migration;
mod schedule;
mod store;
mod types;

pub(crate) use executor::snippet;

pub use clock::{Clock, SystemClock};
pub use core::{PlanRunner, SweepOutcome, PLAN_LOCK_STALENESS};
pub use executor::{AgentExecutor, AgentIdentity, ExecutionContext, TaskExecutor};
pub use lock::{ExecutionLock, LockGuard};
pub use manager::{NewPlan, PlanManager, PlanUpdate, StatusFilter};
pub use schedule::{is_due, next_execution_after};
pub use store::PlanStore;
pub use types::{
    ActionPlan, ExecutionRecord, ExecutionStatus, PlanError, PlanState, Schedule,
    DEFAULT_TIMEZONE,
};
