//! Narrow seam to the email client. The protocol implementation lives
//! outside this crate; `CommandMailbox` bridges to it over a CLI the
//! same way the agent executor does.

use std::process::Command;

use serde::Deserialize;

use crate::plans::PlanError;

#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub received: String,
    /// Body or thread summary prepared by the mail client.
    #[serde(default)]
    pub summary: String,
}

pub trait Mailbox {
    fn fetch_unread(&self, limit: usize) -> Result<Vec<InboundMessage>, PlanError>;
    fn mark_read(&self, message_id: &str) -> Result<(), PlanError>;
}

/// Invokes the configured mail-client CLI: `fetch-unread --limit N`
/// prints a JSON array of messages on stdout, `mark-read <id>` flags a
/// message as read.
pub struct CommandMailbox {
    command: String,
}

impl CommandMailbox {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Mailbox for CommandMailbox {
    fn fetch_unread(&self, limit: usize) -> Result<Vec<InboundMessage>, PlanError> {
        let output = Command::new(&self.command)
            .arg("fetch-unread")
            .arg("--limit")
            .arg(limit.to_string())
            .output()?;
        if !output.status.success() {
            return Err(PlanError::Mail(format!(
                "fetch-unread failed (status {:?}): {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let messages = serde_json::from_str(&stdout)?;
        Ok(messages)
    }

    fn mark_read(&self, message_id: &str) -> Result<(), PlanError> {
        let output = Command::new(&self.command)
            .arg("mark-read")
            .arg(message_id)
            .output()?;
        if !output.status.success() {
            return Err(PlanError::Mail(format!(
                "mark-read failed for {message_id} (status {:?})",
                output.status.code()
            )));
        }
        Ok(())
    }
}
