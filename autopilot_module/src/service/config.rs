//! Environment-variable control surface for the background services.
//! Everything has a default so a bare `.env` still yields a runnable
//! service.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;

use crate::autopilot::TRIAGE_LOCK_STALENESS;
use crate::plans::{AgentIdentity, PlanError, DEFAULT_TIMEZONE, PLAN_LOCK_STALENESS};

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub plan_sweep_interval: Duration,
    pub plan_hands_free: bool,
    pub autopilot_sweep_interval: Duration,
    pub autopilot_hands_free: bool,
    pub autopilot_max_actions: usize,
    pub timezone: Tz,
    pub identity: AgentIdentity,

    pub plan_lock_staleness: Duration,
    pub autopilot_lock_staleness: Duration,

    pub plan_state_path: PathBuf,
    pub plan_backup_dir: PathBuf,
    pub plan_lock_path: PathBuf,
    pub autopilot_state_path: PathBuf,
    pub processed_ids_path: PathBuf,
    pub autopilot_lock_path: PathBuf,
    pub stop_flag_path: PathBuf,

    pub agent_model: String,
    pub agent_max_iterations: u32,
    pub mail_client_command: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, PlanError> {
        dotenvy::dotenv().ok();

        let timezone_name = env_trimmed("SCHEDULER_TIMEZONE")
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|_| PlanError::InvalidTimezone(timezone_name.clone()))?;

        Ok(Self {
            plan_sweep_interval: Duration::from_secs(env_u64(
                "ACTION_PLAN_SERVICE_INTERVAL",
                30,
            )),
            plan_hands_free: env_enabled("ACTION_PLAN_SERVICE_HANDS_FREE"),
            autopilot_sweep_interval: Duration::from_secs(env_u64(
                "AUTOPILOT_SERVICE_INTERVAL",
                200,
            )),
            autopilot_hands_free: env_enabled("AUTOPILOT_SERVICE_HANDS_FREE"),
            autopilot_max_actions: env_u64("AUTOPILOT_MAX_ACTIONS", 3) as usize,
            plan_lock_staleness: Duration::from_secs(env_u64(
                "ACTION_PLANS_LOCK_STALENESS_SECS",
                PLAN_LOCK_STALENESS.as_secs(),
            )),
            autopilot_lock_staleness: Duration::from_secs(env_u64(
                "AUTOPILOT_LOCK_STALENESS_SECS",
                TRIAGE_LOCK_STALENESS.as_secs(),
            )),
            timezone,
            identity: AgentIdentity {
                name: env_trimmed("AGENT_USER_NAME")
                    .unwrap_or_else(|| "Sales Agent".to_string()),
                email: env_trimmed("AGENT_USER_EMAIL").unwrap_or_default(),
            },
            plan_state_path: env_path("ACTION_PLANS_STATE_FILE", "action_plans_state.json"),
            plan_backup_dir: env_path("ACTION_PLANS_BACKUP_DIR", "action_plans_backups"),
            plan_lock_path: env_path(
                "ACTION_PLANS_LOCK_FILE",
                "action_plans_execution.lock",
            ),
            autopilot_state_path: env_path("AUTOPILOT_STATE_FILE", "autopilot_state.json"),
            processed_ids_path: env_path("PROCESSED_MAIL_IDS_FILE", "processed_mails.json"),
            autopilot_lock_path: env_path("AUTOPILOT_LOCK_FILE", "autopilot.lock"),
            stop_flag_path: env_path("AUTOPILOT_STOP_FLAG_FILE", "autopilot_stop.flag"),
            agent_model: env_trimmed("AGENT_MODEL").unwrap_or_default(),
            agent_max_iterations: env_u64("AGENT_MAX_ITERATIONS", 20) as u32,
            mail_client_command: env_trimmed("MAIL_CLIENT_BIN")
                .unwrap_or_else(|| "mail-client".to_string()),
        })
    }
}

fn env_trimmed(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_enabled(key: &str) -> bool {
    env::var(key)
        .map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env_trimmed(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
