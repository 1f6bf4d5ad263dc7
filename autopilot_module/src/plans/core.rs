//! One scheduling sweep: take the execution lock, reload the enabled
//! plans, execute whatever is due, and commit each outcome as a single
//! atomic plan update plus a history record. Per-plan failures never
//! abort the sweep; only lock or store failures do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::executor::{
    build_plan_instruction, stopping_condition_met, AgentIdentity, ExecutionContext, TaskExecutor,
};
use super::lock::ExecutionLock;
use super::manager::{PlanManager, PlanUpdate, StatusFilter};
use super::schedule::{self, format_timestamp};
use super::types::{ActionPlan, ExecutionRecord, ExecutionStatus, PlanError};

/// A plan-sweep lock older than this belongs to a crashed holder.
pub const PLAN_LOCK_STALENESS: Duration = Duration::from_secs(300);

/// How many history entries the executor sees as context.
const RECENT_HISTORY_LIMIT: usize = 3;

#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Absent for sweep-fatal synthetic outcomes.
    pub plan_id: Option<String>,
    pub plan_name: Option<String>,
    pub status: ExecutionStatus,
    pub detail: String,
    pub timestamp: String,
}

pub struct PlanRunner<E: TaskExecutor> {
    manager: PlanManager,
    lock: ExecutionLock,
    executor: E,
    clock: Arc<dyn Clock>,
    identity: AgentIdentity,
    timezone: Tz,
}

impl<E: TaskExecutor> PlanRunner<E> {
    pub fn new(
        manager: PlanManager,
        lock: ExecutionLock,
        executor: E,
        clock: Arc<dyn Clock>,
        identity: AgentIdentity,
        timezone: Tz,
    ) -> Self {
        Self {
            manager,
            lock,
            executor,
            clock,
            identity,
            timezone,
        }
    }

    pub fn manager(&self) -> &PlanManager {
        &self.manager
    }

    /// Run one sweep. An empty result means nothing was due or another
    /// sweep already holds the lock. The optional stop flag is checked
    /// between plans so a manual sweep can abandon the remainder without
    /// touching already-committed updates.
    pub fn run_sweep(&self, hands_free: bool, stop: Option<&AtomicBool>) -> Vec<SweepOutcome> {
        let _guard = match self.lock.try_acquire() {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                debug!("another plan sweep in progress, skipping");
                return Vec::new();
            }
            Err(err) => {
                error!("failed to acquire plan execution lock: {err}");
                return vec![self.fatal(format!("failed to acquire execution lock: {err}"))];
            }
        };

        // One clock read serves every due-ness check in this sweep.
        let now = self.clock.now_in(self.timezone);

        let plans = match self.manager.list_plans(Some(StatusFilter::Enabled)) {
            Ok(plans) => plans,
            Err(err) => {
                error!("failed to load action plans: {err}");
                return vec![self.fatal(format!("failed to load action plans: {err}"))];
            }
        };
        if plans.is_empty() {
            debug!("no enabled action plans");
            return Vec::new();
        }
        info!(
            "checking {} enabled plans at {}",
            plans.len(),
            now.format("%H:%M:%S")
        );

        let mut outcomes = Vec::new();
        for plan in &plans {
            if let Some(stop) = stop {
                if stop.load(Ordering::Relaxed) {
                    info!("stop requested, aborting remaining plans");
                    break;
                }
            }
            match self.process_plan(plan, now, hands_free) {
                Ok(Some(outcome)) => outcomes.push(outcome),
                Ok(None) => {}
                Err(err) => {
                    error!("error processing plan '{}': {err}", plan.name);
                    outcomes.push(SweepOutcome {
                        plan_id: Some(plan.id.clone()),
                        plan_name: Some(plan.name.clone()),
                        status: ExecutionStatus::Error,
                        detail: err.to_string(),
                        timestamp: format_timestamp(now),
                    });
                }
            }
        }

        if !outcomes.is_empty() {
            info!("sweep completed: {} plans executed", outcomes.len());
        }
        outcomes
    }

    fn process_plan(
        &self,
        plan: &ActionPlan,
        now: DateTime<Tz>,
        hands_free: bool,
    ) -> Result<Option<SweepOutcome>, PlanError> {
        if !schedule::is_due(plan, now) {
            debug!(
                "plan '{}' not due (next: {})",
                plan.name,
                plan.next_execution.as_deref().unwrap_or("none")
            );
            return Ok(None);
        }

        info!("executing plan: {} ({})", plan.name, plan.id);
        let recent_history = self
            .manager
            .execution_history(Some(&plan.id), RECENT_HISTORY_LIMIT)?;
        let instruction = build_plan_instruction(
            plan,
            &ExecutionContext {
                identity: &self.identity,
                now,
                recent_history: &recent_history,
                hands_free,
            },
        );

        let outcome = match self.executor.execute(&instruction) {
            Ok(final_answer) => {
                if plan.stopping_condition.is_some() && stopping_condition_met(&final_answer) {
                    self.retire_stopped_plan(plan)?;
                } else {
                    let updated = apply_success(plan, now);
                    self.manager.replace_plan(&updated)?;
                    info!(
                        "plan '{}' executed successfully (next: {})",
                        plan.name,
                        updated.next_execution.as_deref().unwrap_or("never")
                    );
                }
                self.manager.record_execution(ExecutionRecord {
                    plan_id: plan.id.clone(),
                    timestamp: format_timestamp(now),
                    status: ExecutionStatus::Success,
                    result: Some(final_answer.clone()),
                    error: None,
                    hands_free,
                })?;
                SweepOutcome {
                    plan_id: Some(plan.id.clone()),
                    plan_name: Some(plan.name.clone()),
                    status: ExecutionStatus::Success,
                    detail: final_answer,
                    timestamp: format_timestamp(now),
                }
            }
            Err(err) => {
                let reason = err.to_string();
                let updated = apply_failure(plan, now, &reason);
                if updated.current_retries > 0 {
                    warn!(
                        "plan '{}' failed (retry {}/{}), retrying at {}",
                        plan.name,
                        updated.current_retries,
                        updated.max_retries,
                        updated.next_execution.as_deref().unwrap_or("unknown")
                    );
                } else {
                    error!(
                        "plan '{}' failed after {} retries, next attempt: {}",
                        plan.name,
                        plan.max_retries,
                        updated.next_execution.as_deref().unwrap_or("never")
                    );
                }
                self.manager.replace_plan(&updated)?;
                self.manager.record_execution(ExecutionRecord {
                    plan_id: plan.id.clone(),
                    timestamp: format_timestamp(now),
                    status: ExecutionStatus::Failed,
                    result: None,
                    error: Some(reason.clone()),
                    hands_free,
                })?;
                SweepOutcome {
                    plan_id: Some(plan.id.clone()),
                    plan_name: Some(plan.name.clone()),
                    status: ExecutionStatus::Failed,
                    detail: reason,
                    timestamp: format_timestamp(now),
                }
            }
        };
        Ok(Some(outcome))
    }

    /// The executor decided the stopping condition is met; the core
    /// carries out the configured action.
    fn retire_stopped_plan(&self, plan: &ActionPlan) -> Result<(), PlanError> {
        if plan.auto_delete_on_stop {
            self.manager.delete_plan(&plan.id)?;
            info!("plan '{}' stopping condition met, deleted", plan.name);
        } else {
            self.manager.update_plan(
                &plan.id,
                PlanUpdate {
                    enabled: Some(false),
                    ..PlanUpdate::default()
                },
            )?;
            info!("plan '{}' stopping condition met, disabled", plan.name);
        }
        Ok(())
    }

    fn fatal(&self, detail: String) -> SweepOutcome {
        SweepOutcome {
            plan_id: None,
            plan_name: None,
            status: ExecutionStatus::Error,
            detail,
            timestamp: format_timestamp(self.clock.now_in(self.timezone)),
        }
    }
}

/// Updated copy of a plan after a successful run. `next_execution` is
/// derived from the record that already carries the new `last_executed`;
/// deriving it from the stale record is the classic drift bug.
pub(crate) fn apply_success(plan: &ActionPlan, now: DateTime<Tz>) -> ActionPlan {
    let mut updated = plan.clone();
    updated.last_executed = Some(format_timestamp(now));
    updated.execution_count = plan.execution_count + 1;
    updated.current_retries = 0;
    updated.updated_at = Some(format_timestamp(now));
    updated.next_execution =
        schedule::next_execution_after(&updated, now).map(format_timestamp);
    updated
}

/// Updated copy of a plan after a failed run. While retries remain the
/// next attempt lands at `now + retry_delay_minutes` and `last_executed`
/// stays untouched; once retries are exhausted the counter resets and
/// the regular schedule takes over, computed from the failure instant.
pub(crate) fn apply_failure(plan: &ActionPlan, now: DateTime<Tz>, reason: &str) -> ActionPlan {
    let mut updated = plan.clone();
    updated.failure_count = plan.failure_count + 1;
    updated.last_failure = Some(format_timestamp(now));
    updated.last_failure_reason = Some(reason.to_string());
    updated.updated_at = Some(format_timestamp(now));

    let retries = plan.current_retries + 1;
    if retries < plan.max_retries {
        updated.current_retries = retries;
        updated.next_execution =
            Some(format_timestamp(now + chrono::Duration::minutes(plan.retry_delay_minutes)));
    } else {
        updated.current_retries = 0;
        updated.next_execution =
            schedule::next_execution_after(&updated, now).map(format_timestamp);
    }
    updated
}
