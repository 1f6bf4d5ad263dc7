pub mod autopilot;
pub mod service;

mod plans;

pub use plans::{
    is_due, next_execution_after, ActionPlan, AgentExecutor, AgentIdentity, Clock,
    ExecutionContext, ExecutionLock, ExecutionRecord, ExecutionStatus, LockGuard, NewPlan,
    PlanError, PlanManager, PlanRunner, PlanState, PlanStore, PlanUpdate, Schedule, StatusFilter,
    SweepOutcome, SystemClock, TaskExecutor, DEFAULT_TIMEZONE, PLAN_LOCK_STALENESS,
};
