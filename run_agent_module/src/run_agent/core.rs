use std::io::Write;
use std::process::{Command, Stdio};

use super::env::{read_env_list, read_env_trimmed};
use super::errors::RunAgentError;
use super::types::{AgentEnvelope, RunAgentOutput, RunAgentParams};
use super::utils::{agent_timeout, tail_string, wait_with_timeout};

const OUTPUT_TAIL: usize = 2000;

/// Run the configured agent CLI synchronously: the instruction goes in
/// on stdin, the final answer comes back on stdout. The binary is named
/// by `AGENT_CLI_BIN`, with optional fixed arguments in
/// `AGENT_CLI_ARGS`.
pub fn run_agent(params: &RunAgentParams) -> Result<RunAgentOutput, RunAgentError> {
    let command = read_env_trimmed("AGENT_CLI_BIN").ok_or(RunAgentError::MissingEnv {
        key: "AGENT_CLI_BIN",
    })?;
    let extra_args = read_env_list("AGENT_CLI_ARGS");

    let mut cmd = Command::new(&command);
    cmd.args(&extra_args);
    if !params.model_name.trim().is_empty() {
        cmd.arg("--model").arg(params.model_name.trim());
    }
    cmd.arg("--max-iterations")
        .arg(params.max_iterations.to_string());
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            RunAgentError::AgentNotFound {
                command: command.clone(),
            }
        } else {
            RunAgentError::Io(err)
        }
    })?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(params.instruction.as_bytes())?;
    }

    let output = wait_with_timeout(child, agent_timeout())?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        let mut combined = String::new();
        combined.push_str(&stdout);
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(RunAgentError::AgentFailed {
            status: output.status.code(),
            output: tail_string(&combined, OUTPUT_TAIL),
        });
    }

    let final_answer = extract_final_answer(&stdout);
    if final_answer.is_empty() {
        return Err(RunAgentError::EmptyAnswer);
    }
    Ok(RunAgentOutput { final_answer })
}

/// The agent CLI may print a JSON envelope as its last non-empty stdout
/// line; otherwise the whole stdout is the answer.
fn extract_final_answer(stdout: &str) -> String {
    if let Some(last_line) = stdout.lines().rev().find(|line| !line.trim().is_empty()) {
        if let Ok(envelope) = serde_json::from_str::<AgentEnvelope>(last_line.trim()) {
            return envelope.final_answer.trim().to_string();
        }
    }
    stdout.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::extract_final_answer;

    #[test]
    fn extract_final_answer_prefers_json_envelope() {
        let stdout = "agent log line\n{\"final_answer\": \"Sent follow-up to acme\"}\n";
        assert_eq!(extract_final_answer(stdout), "Sent follow-up to acme");
    }

    #[test]
    fn extract_final_answer_falls_back_to_raw_stdout() {
        let stdout = "Replied to the customer and archived the thread.\n";
        assert_eq!(
            extract_final_answer(stdout),
            "Replied to the customer and archived the thread."
        );
    }
}
