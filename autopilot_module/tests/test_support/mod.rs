#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;

use autopilot_module::autopilot::{InboundMessage, Mailbox};
use autopilot_module::{ActionPlan, Clock, PlanError, Schedule, TaskExecutor};

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn starting_at(raw: &str) -> Arc<Self> {
        let now = DateTime::parse_from_rfc3339(raw)
            .expect("clock timestamp")
            .with_timezone(&Utc);
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().expect("clock poisoned");
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now_in(&self, tz: Tz) -> DateTime<Tz> {
        self.now.lock().expect("clock poisoned").with_timezone(&tz)
    }
}

/// Executor returning scripted results; clones share one script so a
/// test can keep a handle for assertions after moving a clone into a
/// runner.
#[derive(Clone)]
pub struct ScriptedExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    default_answer: String,
    responses: Mutex<VecDeque<Result<String, String>>>,
    instructions: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn answering(default_answer: &str) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                default_answer: default_answer.to_string(),
                responses: Mutex::new(VecDeque::new()),
                instructions: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn push_success(&self, answer: &str) {
        self.inner
            .responses
            .lock()
            .expect("executor poisoned")
            .push_back(Ok(answer.to_string()));
    }

    pub fn push_failure(&self, reason: &str) {
        self.inner
            .responses
            .lock()
            .expect("executor poisoned")
            .push_back(Err(reason.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.inner
            .instructions
            .lock()
            .expect("executor poisoned")
            .len()
    }

    pub fn instructions(&self) -> Vec<String> {
        self.inner
            .instructions
            .lock()
            .expect("executor poisoned")
            .clone()
    }
}

impl TaskExecutor for ScriptedExecutor {
    fn execute(&self, instruction: &str) -> Result<String, PlanError> {
        self.inner
            .instructions
            .lock()
            .expect("executor poisoned")
            .push(instruction.to_string());
        match self
            .inner
            .responses
            .lock()
            .expect("executor poisoned")
            .pop_front()
        {
            Some(Ok(answer)) => Ok(answer),
            Some(Err(reason)) => Err(PlanError::TaskFailed(reason)),
            None => Ok(self.inner.default_answer.clone()),
        }
    }
}

/// Mailbox whose unread list never shrinks (messages stay visible until
/// marked read on the real server too; the ledger is what prevents
/// reprocessing).
#[derive(Clone)]
pub struct FakeMailbox {
    inner: Arc<MailboxInner>,
}

struct MailboxInner {
    unread: Mutex<Vec<InboundMessage>>,
    marked_read: Mutex<Vec<String>>,
}

impl FakeMailbox {
    pub fn with_unread(messages: Vec<InboundMessage>) -> Self {
        Self {
            inner: Arc::new(MailboxInner {
                unread: Mutex::new(messages),
                marked_read: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn marked_read(&self) -> Vec<String> {
        self.inner
            .marked_read
            .lock()
            .expect("mailbox poisoned")
            .clone()
    }
}

impl Mailbox for FakeMailbox {
    fn fetch_unread(&self, limit: usize) -> Result<Vec<InboundMessage>, PlanError> {
        let unread = self.inner.unread.lock().expect("mailbox poisoned");
        Ok(unread.iter().take(limit).cloned().collect())
    }

    fn mark_read(&self, message_id: &str) -> Result<(), PlanError> {
        self.inner
            .marked_read
            .lock()
            .expect("mailbox poisoned")
            .push(message_id.to_string());
        Ok(())
    }
}

pub fn message(id: &str, subject: &str) -> InboundMessage {
    InboundMessage {
        id: id.to_string(),
        subject: subject.to_string(),
        sender: "customer@example.com".to_string(),
        received: "2025-06-02T08:55:00+05:30".to_string(),
        summary: "Hello, could you share pricing for the enterprise tier?".to_string(),
    }
}

pub fn sample_plan(id: &str, name: &str) -> ActionPlan {
    ActionPlan {
        id: id.to_string(),
        name: name.to_string(),
        task: "Check unanswered threads and send a polite follow-up.".to_string(),
        enabled: true,
        schedule: Schedule::Hourly,
        timezone: "Asia/Kolkata".to_string(),
        last_executed: None,
        next_execution: None,
        execution_count: 0,
        failure_count: 0,
        last_failure: None,
        last_failure_reason: None,
        max_retries: 3,
        retry_delay_minutes: 15,
        current_retries: 0,
        stopping_condition: None,
        auto_delete_on_stop: false,
        created_at: Some("2025-06-01T08:00:00+05:30".to_string()),
        created_by: "user".to_string(),
        updated_at: None,
    }
}
