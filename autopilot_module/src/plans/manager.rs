//! CRUD over the plan document. The manager holds no state between
//! calls: every operation reloads from the store, mutates, and saves, so
//! the store stays the single owner of the canonical record.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::{info, warn};
use uuid::Uuid;

use super::clock::Clock;
use super::migration::normalize_legacy_plans;
use super::schedule::{format_timestamp, next_execution_after, validate_schedule};
use super::store::PlanStore;
use super::types::{
    ActionPlan, ExecutionRecord, PlanError, Schedule, HISTORY_LIMIT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Enabled,
    Disabled,
}

/// Everything needed to create a plan; tracking fields start at zero.
pub struct NewPlan {
    pub name: String,
    pub task: String,
    pub schedule: Schedule,
    pub timezone: Option<String>,
    pub stopping_condition: Option<String>,
    pub auto_delete_on_stop: bool,
    pub enabled: bool,
    /// "agent", "user", or "migration".
    pub created_by: String,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Default, Clone)]
pub struct PlanUpdate {
    pub name: Option<String>,
    pub task: Option<String>,
    pub enabled: Option<bool>,
    pub schedule: Option<Schedule>,
    pub timezone: Option<String>,
    pub stopping_condition: Option<String>,
    pub auto_delete_on_stop: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_minutes: Option<i64>,
}

pub struct PlanManager {
    store: PlanStore,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl PlanManager {
    /// Opens the manager and migrates any legacy plan records found in
    /// the store (persisting the normalised document when anything
    /// changed).
    pub fn new(
        store: PlanStore,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Result<Self, PlanError> {
        let manager = Self {
            store,
            clock,
            timezone,
        };
        let mut state = manager.store.load()?;
        let migrated = normalize_legacy_plans(&mut state);
        if migrated > 0 {
            manager.store.save(&state)?;
            info!("migrated {migrated} legacy action plans");
        }
        Ok(manager)
    }

    pub fn create_plan(&self, new: NewPlan) -> Result<ActionPlan, PlanError> {
        let timezone = new
            .timezone
            .unwrap_or_else(|| self.timezone.name().to_string());
        validate_schedule(&new.schedule, &timezone)?;
        let plan_tz: Tz = timezone
            .parse()
            .map_err(|_| PlanError::InvalidTimezone(timezone.clone()))?;
        let now = self.clock.now_in(plan_tz);

        let hex = Uuid::new_v4().simple().to_string();
        let mut plan = ActionPlan {
            id: format!("plan_{}", &hex[..12]),
            name: new.name.trim().to_string(),
            task: new.task.trim().to_string(),
            enabled: new.enabled,
            schedule: new.schedule,
            timezone,
            last_executed: None,
            next_execution: None,
            execution_count: 0,
            failure_count: 0,
            last_failure: None,
            last_failure_reason: None,
            max_retries: 3,
            retry_delay_minutes: 15,
            current_retries: 0,
            stopping_condition: new.stopping_condition,
            auto_delete_on_stop: new.auto_delete_on_stop,
            created_at: Some(format_timestamp(now)),
            created_by: new.created_by,
            updated_at: None,
        };
        plan.next_execution = next_execution_after(&plan, now).map(format_timestamp);

        let mut state = self.store.load()?;
        state.action_plans.push(plan.clone());
        self.store.save(&state)?;

        info!(
            "created {} plan '{}' ({}) by {}",
            plan.schedule.label(),
            plan.name,
            plan.id,
            plan.created_by
        );
        Ok(plan)
    }

    pub fn list_plans(
        &self,
        filter: Option<StatusFilter>,
    ) -> Result<Vec<ActionPlan>, PlanError> {
        let state = self.store.load()?;
        let plans = state
            .action_plans
            .into_iter()
            .filter(|plan| match filter {
                Some(StatusFilter::Enabled) => plan.enabled,
                Some(StatusFilter::Disabled) => !plan.enabled,
                None => true,
            })
            .collect();
        Ok(plans)
    }

    pub fn get_plan(&self, plan_id: &str) -> Result<Option<ActionPlan>, PlanError> {
        let state = self.store.load()?;
        Ok(state
            .action_plans
            .into_iter()
            .find(|plan| plan.id == plan_id))
    }

    /// Apply a partial update; recomputes `next_execution` when the
    /// schedule, timezone, or enabled flag changed.
    pub fn update_plan(
        &self,
        plan_id: &str,
        update: PlanUpdate,
    ) -> Result<ActionPlan, PlanError> {
        let mut state = self.store.load()?;
        let updated = {
            let plan = state
                .action_plans
                .iter_mut()
                .find(|plan| plan.id == plan_id)
                .ok_or_else(|| PlanError::PlanNotFound(plan_id.to_string()))?;

            let schedule_changed = update.schedule.is_some()
                || update.timezone.is_some()
                || update.enabled.is_some();

            if let Some(name) = update.name {
                plan.name = name;
            }
            if let Some(task) = update.task {
                plan.task = task;
            }
            if let Some(enabled) = update.enabled {
                plan.enabled = enabled;
            }
            if let Some(schedule) = update.schedule {
                plan.schedule = schedule;
            }
            if let Some(timezone) = update.timezone {
                plan.timezone = timezone;
            }
            if let Some(condition) = update.stopping_condition {
                plan.stopping_condition = Some(condition);
            }
            if let Some(auto_delete) = update.auto_delete_on_stop {
                plan.auto_delete_on_stop = auto_delete;
            }
            if let Some(max_retries) = update.max_retries {
                plan.max_retries = max_retries;
            }
            if let Some(delay) = update.retry_delay_minutes {
                plan.retry_delay_minutes = delay;
            }

            validate_schedule(&plan.schedule, &plan.timezone)?;
            let now = self.clock.now_in(plan.tz());
            plan.updated_at = Some(format_timestamp(now));
            if schedule_changed {
                plan.next_execution = next_execution_after(plan, now).map(format_timestamp);
            }
            plan.clone()
        };
        self.store.save(&state)?;
        info!("updated plan {plan_id}");
        Ok(updated)
    }

    /// Replace a plan record wholesale in a single store write. The
    /// sweep uses this to commit all outcome fields atomically.
    pub fn replace_plan(&self, updated: &ActionPlan) -> Result<(), PlanError> {
        let mut state = self.store.load()?;
        let slot = state
            .action_plans
            .iter_mut()
            .find(|plan| plan.id == updated.id)
            .ok_or_else(|| PlanError::PlanNotFound(updated.id.clone()))?;
        *slot = updated.clone();
        self.store.save(&state)
    }

    pub fn delete_plan(&self, plan_id: &str) -> Result<bool, PlanError> {
        let mut state = self.store.load()?;
        let initial = state.action_plans.len();
        state.action_plans.retain(|plan| plan.id != plan_id);
        if state.action_plans.len() < initial {
            self.store.save(&state)?;
            info!("deleted plan {plan_id}");
            Ok(true)
        } else {
            warn!("plan {plan_id} not found for deletion");
            Ok(false)
        }
    }

    /// Append to the execution history (newest first, capped globally).
    pub fn record_execution(&self, record: ExecutionRecord) -> Result<(), PlanError> {
        let mut state = self.store.load()?;
        state.execution_history.insert(0, record);
        state.execution_history.truncate(HISTORY_LIMIT);
        self.store.save(&state)
    }

    pub fn execution_history(
        &self,
        plan_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<ExecutionRecord>, PlanError> {
        let state = self.store.load()?;
        let records = state
            .execution_history
            .into_iter()
            .filter(|record| plan_id.map_or(true, |id| record.plan_id == id))
            .take(limit)
            .collect();
        Ok(records)
    }
}
