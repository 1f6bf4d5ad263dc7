//! Long-running loop driving the mail-triage sweep. Unlike the plan
//! service this one is additionally gated by the `service_enabled`
//! switch in the autopilot state document, re-checked on a short cadence
//! while disabled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::autopilot::{
    AutopilotStateStore, CommandMailbox, ProcessedLedger, StopFlag, TriageRunner,
};
use crate::plans::{
    AgentExecutor, Clock, ExecutionLock, ExecutionStatus, PlanError, SystemClock,
};

use super::config::ServiceConfig;
use super::sleep_interruptible;

/// Re-check cadence while the service switch is off.
const DISABLED_RECHECK: Duration = Duration::from_secs(30);

pub fn run_autopilot_service(
    config: &ServiceConfig,
    stop: Arc<AtomicBool>,
) -> Result<(), PlanError> {
    info!(
        "autopilot service starting (interval {}s, hands-free {}, max actions {})",
        config.autopilot_sweep_interval.as_secs(),
        config.autopilot_hands_free,
        config.autopilot_max_actions
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stop_flag = StopFlag::new(&config.stop_flag_path);
    let runner = TriageRunner::new(
        AutopilotStateStore::new(&config.autopilot_state_path),
        ProcessedLedger::new(&config.processed_ids_path),
        ExecutionLock::new(&config.autopilot_lock_path, config.autopilot_lock_staleness),
        StopFlag::new(&config.stop_flag_path),
        CommandMailbox::new(config.mail_client_command.clone()),
        AgentExecutor {
            model_name: config.agent_model.clone(),
            max_iterations: config.agent_max_iterations,
        },
        config.identity.clone(),
        clock.clone(),
        config.timezone,
    );

    // A stale stop flag from an interrupted manual run must not linger
    // into the first sweep.
    stop_flag.clear();

    let mut iteration = 0u64;
    while !stop.load(Ordering::Relaxed) {
        iteration += 1;

        if !runner.state().is_service_enabled() {
            debug!("[iteration {iteration}] service disabled in state file, skipping");
            sleep_interruptible(
                DISABLED_RECHECK.min(config.autopilot_sweep_interval),
                &stop,
            );
            continue;
        }
        stop_flag.clear();

        let outcomes = runner.run_sweep(
            config.autopilot_max_actions,
            config.autopilot_hands_free,
            true,
        );
        if outcomes.is_empty() {
            debug!("[iteration {iteration}] no messages to process");
        } else {
            info!(
                "[iteration {iteration}] autopilot processed {} message(s)",
                outcomes.len()
            );
            for outcome in &outcomes {
                match outcome.status {
                    ExecutionStatus::Success => info!("  [ok] {}", outcome.subject),
                    _ => warn!("  [fail] {}: {}", outcome.subject, outcome.detail),
                }
            }
            runner
                .state()
                .stamp_last_run(&clock.now_in(config.timezone).to_rfc3339());
        }

        sleep_interruptible(config.autopilot_sweep_interval, &stop);
    }

    info!("autopilot service stopped after {iteration} iterations");
    Ok(())
}
