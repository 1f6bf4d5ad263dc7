use std::fmt;
use std::io;

#[derive(Debug)]
pub enum RunAgentError {
    Io(io::Error),
    MissingEnv {
        key: &'static str,
    },
    AgentNotFound {
        command: String,
    },
    AgentFailed {
        status: Option<i32>,
        output: String,
    },
    CommandTimeout {
        timeout_secs: u64,
        output: String,
    },
    EmptyAnswer,
}

impl fmt::Display for RunAgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunAgentError::Io(err) => write!(f, "I/O error: {}", err),
            RunAgentError::MissingEnv { key } => {
                write!(f, "Missing environment variable: {}", key)
            }
            RunAgentError::AgentNotFound { command } => {
                write!(f, "Agent CLI not found on PATH: {}", command)
            }
            RunAgentError::AgentFailed { status, output } => write!(
                f,
                "Agent run failed (status: {:?}). Output tail:\n{}",
                status, output
            ),
            RunAgentError::CommandTimeout {
                timeout_secs,
                output,
            } => write!(
                f,
                "Agent run timed out after {}s. Output tail:\n{}",
                timeout_secs, output
            ),
            RunAgentError::EmptyAnswer => {
                write!(f, "Agent produced no final answer on stdout.")
            }
        }
    }
}

impl std::error::Error for RunAgentError {}

impl From<io::Error> for RunAgentError {
    fn from(err: io::Error) -> Self {
        RunAgentError::Io(err)
    }
}
