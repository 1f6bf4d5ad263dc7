//! The autopilot state document: triage rules, the service-enabled
//! switch, and a rolling window of triage summaries.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::plans::PlanError;

const SUMMARY_LIMIT: usize = 200;

/// A natural-language triage rule. The prompt text is opaque to the
/// core; it is concatenated into the instruction the executor receives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageRule {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub prompt: String,
    /// 1 is the highest priority; ties in conflicting rules resolve to
    /// the lower number.
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub builtin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageSummary {
    pub time: String,
    pub subject: String,
    #[serde(rename = "from")]
    pub sender: String,
    pub action: String,
    pub read_snippet: String,
    pub outgoing_snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutopilotState {
    #[serde(default = "default_rules")]
    pub autopilot_rules: Vec<TriageRule>,
    #[serde(default)]
    pub service_enabled: bool,
    #[serde(default)]
    pub service_last_run: Option<String>,
    #[serde(default)]
    pub autopilot_summaries: Vec<TriageSummary>,
}

impl Default for AutopilotState {
    fn default() -> Self {
        Self {
            autopilot_rules: default_rules(),
            service_enabled: false,
            service_last_run: None,
            autopilot_summaries: Vec::new(),
        }
    }
}

pub struct AutopilotStateStore {
    path: PathBuf,
}

impl AutopilotStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing file seeds the default rule set; a corrupt one is
    /// logged and replaced by defaults rather than failing the sweep.
    pub fn load(&self) -> AutopilotState {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return AutopilotState::default(),
            Err(err) => {
                warn!("failed to read autopilot state: {err}");
                return AutopilotState::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(err) => {
                warn!("failed to parse autopilot state: {err}");
                AutopilotState::default()
            }
        }
    }

    pub fn save(&self, state: &AutopilotState) -> Result<(), PlanError> {
        fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        Ok(())
    }

    pub fn is_service_enabled(&self) -> bool {
        self.load().service_enabled
    }

    pub fn stamp_last_run(&self, timestamp: &str) {
        let mut state = self.load();
        state.service_last_run = Some(timestamp.to_string());
        if let Err(err) = self.save(&state) {
            warn!("failed to update last run timestamp: {err}");
        }
    }

    /// Prepend a triage summary, keeping the newest entries only.
    pub fn record_summary(&self, summary: TriageSummary) -> Result<(), PlanError> {
        let mut state = self.load();
        state.autopilot_summaries.insert(0, summary);
        state.autopilot_summaries.truncate(SUMMARY_LIMIT);
        self.save(&state)
    }
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u32 {
    999
}

fn default_rules() -> Vec<TriageRule> {
    let rules = [
        (
            "external_interest",
            "Handle external interest or sales inquiries",
            "If the email is from an external sender asking for demos, pricing, meetings, or \
             collaborations - first gather relevant information from the knowledge base and web \
             search, then prepare a polite, informative sales reply using accurate information.",
        ),
        (
            "pricing_queries",
            "Pricing and product information queries",
            "If the customer asks about pricing, product details, or technical specifications, \
             always consult the knowledge base and web search first, then answer based on the \
             results. Never guess pricing or product details.",
        ),
        (
            "internal_greet",
            "Internal greetings handler",
            "If the email is just greetings, wishes, or thanks, acknowledge politely and take no \
             further action.",
        ),
        (
            "followups",
            "Follow-ups",
            "If the sender has already been replied to but the customer has not responded, follow \
             up in-thread politely, refreshing any pricing or product information first.",
        ),
        (
            "spam_filter",
            "Spam or newsletters",
            "Ignore or archive messages that appear to be newsletters, spam, or automated \
             notifications.",
        ),
    ];
    rules
        .into_iter()
        .enumerate()
        .map(|(index, (id, name, prompt))| TriageRule {
            id: id.to_string(),
            name: name.to_string(),
            enabled: true,
            prompt: prompt.to_string(),
            priority: index as u32 + 1,
            builtin: true,
        })
        .collect()
}
