use std::process::{Child, Output};
use std::thread;
use std::time::{Duration, Instant};

use super::errors::RunAgentError;

pub(super) fn tail_string(input: &str, max_len: usize) -> String {
    let trimmed = input.trim();
    if trimmed.len() <= max_len {
        return trimmed.to_string();
    }
    let mut start = trimmed.len().saturating_sub(max_len);
    while start < trimmed.len() && !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

pub(super) fn agent_timeout() -> Duration {
    let timeout_secs = std::env::var("AGENT_CLI_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(1800);
    Duration::from_secs(timeout_secs)
}

/// Poll the child until it exits or the timeout passes; a timed-out
/// child is killed and its combined output returned in the error.
pub(super) fn wait_with_timeout(
    mut child: Child,
    timeout: Duration,
) -> Result<Output, RunAgentError> {
    let start = Instant::now();
    loop {
        if child.try_wait().map_err(RunAgentError::Io)?.is_some() {
            return child.wait_with_output().map_err(RunAgentError::Io);
        }

        if start.elapsed() >= timeout {
            let _ = child.kill();
            let output = child.wait_with_output().map_err(RunAgentError::Io)?;
            let mut combined = String::new();
            combined.push_str(&String::from_utf8_lossy(&output.stdout));
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(RunAgentError::CommandTimeout {
                timeout_secs: timeout.as_secs(),
                output: tail_string(&combined, 2000),
            });
        }

        thread::sleep(Duration::from_millis(200));
    }
}
