//! New-mail triage sweep. Structurally a sibling of the plan sweep with
//! its own lock and an at-most-once ledger: messages stay visible until
//! marked read, so every handled id is recorded before the sweep moves
//! on.

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono_tz::Tz;
use tracing::{debug, error, info, warn};

use crate::plans::{
    snippet, AgentIdentity, Clock, ExecutionLock, ExecutionStatus, TaskExecutor,
};

use super::control::StopFlag;
use super::ledger::ProcessedLedger;
use super::mailbox::{InboundMessage, Mailbox};
use super::state::{AutopilotStateStore, TriageRule, TriageSummary};

/// A triage lock older than this belongs to a crashed holder. Triage
/// sweeps run the agent per message, so the threshold is looser than the
/// plan sweep's.
pub const TRIAGE_LOCK_STALENESS: Duration = Duration::from_secs(600);

const FETCH_BATCH: usize = 10;
const SNIPPET_LIMIT: usize = 300;

#[derive(Debug, Clone)]
pub struct TriageOutcome {
    /// Empty for sweep-fatal synthetic outcomes.
    pub message_id: String,
    pub subject: String,
    pub status: ExecutionStatus,
    pub detail: String,
}

pub struct TriageRunner<M: Mailbox, E: TaskExecutor> {
    state: AutopilotStateStore,
    ledger: ProcessedLedger,
    lock: ExecutionLock,
    stop_flag: StopFlag,
    mailbox: M,
    executor: E,
    identity: AgentIdentity,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl<M: Mailbox, E: TaskExecutor> TriageRunner<M, E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: AutopilotStateStore,
        ledger: ProcessedLedger,
        lock: ExecutionLock,
        stop_flag: StopFlag,
        mailbox: M,
        executor: E,
        identity: AgentIdentity,
        clock: Arc<dyn Clock>,
        timezone: Tz,
    ) -> Self {
        Self {
            state,
            ledger,
            lock,
            stop_flag,
            mailbox,
            executor,
            identity,
            clock,
            timezone,
        }
    }

    pub fn state(&self) -> &AutopilotStateStore {
        &self.state
    }

    /// Process up to `max_actions` new messages. The stop flag is only
    /// honoured for manual sweeps (`ignore_stop_flag = false`); the
    /// background service has its own enable switch.
    pub fn run_sweep(
        &self,
        max_actions: usize,
        hands_free: bool,
        ignore_stop_flag: bool,
    ) -> Vec<TriageOutcome> {
        let _guard = match self.lock.try_acquire() {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                info!("another triage sweep in progress, skipping");
                return Vec::new();
            }
            Err(err) => {
                error!("failed to acquire triage lock: {err}");
                return vec![fatal(format!("failed to acquire triage lock: {err}"))];
            }
        };

        let state = self.state.load();
        let mut rules: Vec<TriageRule> = state
            .autopilot_rules
            .iter()
            .filter(|rule| rule.enabled)
            .cloned()
            .collect();
        rules.sort_by_key(|rule| rule.priority);
        if rules.is_empty() {
            info!("no triage rules enabled");
            return Vec::new();
        }

        let mut processed = self.ledger.load();
        info!("loaded {} already-processed message ids", processed.len());

        let unread = match self.mailbox.fetch_unread(FETCH_BATCH) {
            Ok(unread) => unread,
            Err(err) => {
                error!("failed to fetch unread messages: {err}");
                return vec![fatal(format!("failed to fetch unread messages: {err}"))];
            }
        };
        info!("fetched {} unread messages", unread.len());

        let new_mail: Vec<InboundMessage> = unread
            .into_iter()
            .filter(|mail| !processed.contains(&mail.id))
            .collect();
        if new_mail.is_empty() {
            debug!("no new unread messages to process");
            return Vec::new();
        }

        let rules_context = rules
            .iter()
            .map(|rule| format!("- [priority {}] {}", rule.priority, rule.prompt))
            .collect::<Vec<_>>()
            .join("\n");
        let now = self.clock.now_in(self.timezone);

        let mut outcomes = Vec::new();
        for mail in new_mail.into_iter().take(max_actions) {
            if !ignore_stop_flag && self.stop_flag.is_set() {
                info!("stop flag detected, terminating sweep");
                break;
            }
            // Safety net: the ledger may have grown since the filter.
            if processed.contains(&mail.id) {
                warn!("skipping already processed message: {}", mail.id);
                continue;
            }

            let instruction =
                build_triage_instruction(&mail, &rules_context, &self.identity, now, hands_free);
            match self.executor.execute(&instruction) {
                Ok(final_answer) => {
                    if let Err(err) = self.state.record_summary(TriageSummary {
                        time: now.to_rfc3339(),
                        subject: mail.subject.clone(),
                        sender: mail.sender.clone(),
                        action: "agent-processed".to_string(),
                        read_snippet: snippet(&mail.summary, SNIPPET_LIMIT),
                        outgoing_snippet: snippet(&final_answer, SNIPPET_LIMIT),
                    }) {
                        warn!("failed to persist triage summary: {err}");
                    }
                    if let Err(err) = self.mailbox.mark_read(&mail.id) {
                        warn!("failed to mark '{}' as read: {err}", mail.subject);
                    }
                    processed.insert(mail.id.clone());
                    match self.ledger.save(&processed) {
                        Ok(()) => info!("marked {} as processed", mail.id),
                        Err(err) => warn!("failed to save processed-mail ledger: {err}"),
                    }
                    outcomes.push(TriageOutcome {
                        message_id: mail.id,
                        subject: mail.subject,
                        status: ExecutionStatus::Success,
                        detail: final_answer,
                    });
                }
                Err(err) => {
                    // The message stays out of the ledger and is retried
                    // on the next sweep.
                    error!("triage failed for '{}': {err}", mail.subject);
                    outcomes.push(TriageOutcome {
                        message_id: mail.id,
                        subject: mail.subject,
                        status: ExecutionStatus::Failed,
                        detail: err.to_string(),
                    });
                }
            }
        }

        if let Err(err) = self.ledger.save(&processed) {
            warn!("failed to save processed-mail ledger: {err}");
        }
        outcomes
    }
}

fn build_triage_instruction(
    mail: &InboundMessage,
    rules_context: &str,
    identity: &AgentIdentity,
    now: DateTime<Tz>,
    hands_free: bool,
) -> String {
    let time_str = now.format("%A, %B %d, %Y at %I:%M %p %Z");
    let hands_free_section = if hands_free {
        "**HANDS-FREE MODE: ON** - You may send replies directly."
    } else {
        "**HANDS-FREE MODE: OFF** - Save every reply as a draft, never send directly."
    };
    format!(
        "AUTOPILOT MODE - Process this email by evaluating ALL rules below.\n\n\
         **CURRENT TIME:** {time_str}\n\
         **IDENTITY:** You act on behalf of {name} ({email}).\n\
         {hands_free_section}\n\n\
         RULES (lower priority number wins a conflict):\n\
         {rules_context}\n\n\
         EMAIL DETAILS:\n\
         Subject: {subject}\n\
         From: {sender}\n\
         Received: {received}\n\
         ID: {id}\n\n\
         EMAIL CONTENT:\n\
         {summary}\n\n\
         Evaluate every rule and apply all that match; when rules conflict, follow\n\
         the one with the lower priority number. Send at most ONE reply, ending\n\
         with the signature \"Best regards, {name} ({email})\", and finish with a\n\
         one-line summary of the action taken.\n",
        name = identity.name,
        email = identity.email,
        subject = mail.subject,
        sender = mail.sender,
        received = mail.received,
        id = mail.id,
        summary = mail.summary,
    )
}

fn fatal(detail: String) -> TriageOutcome {
    TriageOutcome {
        message_id: String::new(),
        subject: String::new(),
        status: ExecutionStatus::Error,
        detail,
    }
}
