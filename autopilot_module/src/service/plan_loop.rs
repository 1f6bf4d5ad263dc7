//! Long-running loop driving the action-plan sweep. A failed iteration
//! is logged and the loop continues to the next tick; only a failure to
//! construct the runner aborts the service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::plans::{
    AgentExecutor, Clock, ExecutionLock, ExecutionStatus, PlanError, PlanManager, PlanRunner,
    PlanStore, SystemClock,
};

use super::config::ServiceConfig;
use super::sleep_interruptible;

pub fn run_plan_service(config: &ServiceConfig, stop: Arc<AtomicBool>) -> Result<(), PlanError> {
    info!(
        "action plan service starting (interval {}s, hands-free {})",
        config.plan_sweep_interval.as_secs(),
        config.plan_hands_free
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = PlanStore::new(&config.plan_state_path, &config.plan_backup_dir);
    let manager = PlanManager::new(store, clock.clone(), config.timezone)?;
    let lock = ExecutionLock::new(&config.plan_lock_path, config.plan_lock_staleness);
    let executor = AgentExecutor {
        model_name: config.agent_model.clone(),
        max_iterations: config.agent_max_iterations,
    };
    let runner = PlanRunner::new(
        manager,
        lock,
        executor,
        clock,
        config.identity.clone(),
        config.timezone,
    );

    let mut iteration = 0u64;
    while !stop.load(Ordering::Relaxed) {
        iteration += 1;
        debug!("[iteration {iteration}] checking scheduled plans");

        let outcomes = runner.run_sweep(config.plan_hands_free, None);
        if outcomes.is_empty() {
            debug!("[iteration {iteration}] no plans due for execution");
        } else {
            info!(
                "[iteration {iteration}] executed {} action plan(s)",
                outcomes.len()
            );
            for outcome in &outcomes {
                let name = outcome.plan_name.as_deref().unwrap_or("unknown");
                match outcome.status {
                    ExecutionStatus::Success => info!("  [ok] {name}"),
                    _ => warn!("  [fail] {name}: {}", outcome.detail),
                }
            }
        }

        sleep_interruptible(config.plan_sweep_interval, &stop);
    }

    info!("action plan service stopped after {iteration} iterations");
    Ok(())
}
