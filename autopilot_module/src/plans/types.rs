use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Fallback zone for plans created before per-plan timezones existed.
pub const DEFAULT_TIMEZONE: &str = "Asia/Kolkata";

pub(crate) const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "frequency", rename_all = "snake_case")]
pub enum Schedule {
    /// Runs a single time, then never again once an execution is recorded.
    Once,
    #[serde(alias = "every_sweep")]
    Hourly,
    Daily {
        #[serde(default = "default_single_window")]
        time_windows: Vec<String>,
    },
    TwiceDaily {
        #[serde(default = "default_double_window")]
        time_windows: Vec<String>,
    },
    Weekly {
        /// 0 = Monday .. 6 = Sunday.
        #[serde(default)]
        days_of_week: Vec<u8>,
        #[serde(default = "default_single_window")]
        time_windows: Vec<String>,
    },
    Custom {
        #[serde(default)]
        custom_interval_days: Option<u32>,
        #[serde(default)]
        custom_interval_minutes: Option<u32>,
        #[serde(default)]
        custom_interval_hours: Option<u32>,
    },
}

impl Schedule {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Schedule::Once => "once",
            Schedule::Hourly => "hourly",
            Schedule::Daily { .. } => "daily",
            Schedule::TwiceDaily { .. } => "twice_daily",
            Schedule::Weekly { .. } => "weekly",
            Schedule::Custom { .. } => "custom",
        }
    }
}

fn default_single_window() -> Vec<String> {
    vec!["09:00".to_string()]
}

fn default_double_window() -> Vec<String> {
    vec!["09:00".to_string(), "17:00".to_string()]
}

/// A recurring unit of work. The `task` text is opaque to the scheduling
/// core and is handed verbatim to the executor.
///
/// `last_executed` / `next_execution` keep their on-disk string form:
/// legacy documents carry naive timestamps that can only be interpreted
/// once the plan's timezone is known, so parsing happens lazily in the
/// evaluator (see `schedule::parse_timestamp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub id: String,
    pub name: String,
    pub task: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(flatten)]
    pub schedule: Schedule,
    #[serde(default = "default_timezone")]
    pub timezone: String,

    #[serde(default)]
    pub last_executed: Option<String>,
    #[serde(default)]
    pub next_execution: Option<String>,
    #[serde(default)]
    pub execution_count: u32,

    #[serde(default)]
    pub failure_count: u32,
    #[serde(default)]
    pub last_failure: Option<String>,
    #[serde(default)]
    pub last_failure_reason: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_minutes")]
    pub retry_delay_minutes: i64,
    #[serde(default)]
    pub current_retries: u32,

    /// Natural-language stopping condition, interpreted by the executor.
    #[serde(default)]
    pub stopping_condition: Option<String>,
    /// When the stopping condition is met: delete the plan if true,
    /// disable it otherwise.
    #[serde(default)]
    pub auto_delete_on_stop: bool,

    #[serde(default)]
    pub created_at: Option<String>,
    /// "agent", "user", or "migration".
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl ActionPlan {
    /// The plan's IANA zone; unparsable legacy values fall back to the
    /// default zone rather than failing the whole sweep.
    pub fn tz(&self) -> Tz {
        self.timezone.parse().unwrap_or(chrono_tz::Asia::Kolkata)
    }
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_minutes() -> i64 {
    15
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Error,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Immutable history entry appended after every sweep attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub plan_id: String,
    pub timestamp: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub hands_free: bool,
}

/// The canonical on-disk document owned by the plan store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanState {
    #[serde(default)]
    pub action_plans: Vec<ActionPlan>,
    #[serde(default)]
    pub execution_history: Vec<ExecutionRecord>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("datetime parse error: {0}")]
    DateTimeParse(#[from] chrono::ParseError),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
    #[error("action plan not found: {0}")]
    PlanNotFound(String),
    #[error("task execution failed: {0}")]
    TaskFailed(String),
    #[error("mail client error: {0}")]
    Mail(String),
}
