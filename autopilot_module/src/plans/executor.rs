//! Executor seam. The core never performs the work itself: a due plan's
//! instruction is handed to a [`TaskExecutor`] which returns the agent's
//! final answer, or an error when the run failed. `AgentExecutor` is the
//! production implementation bridging to the external agent CLI.

use chrono::DateTime;
use chrono_tz::Tz;

use super::types::{ActionPlan, ExecutionRecord, PlanError};

#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub name: String,
    pub email: String,
}

pub trait TaskExecutor {
    /// Run one task synchronously. `Ok` carries the final answer, `Err`
    /// the failure reason; the caller applies the retry policy.
    fn execute(&self, instruction: &str) -> Result<String, PlanError>;
}

/// Delegates execution to the configured autonomous-agent CLI.
#[derive(Debug, Clone)]
pub struct AgentExecutor {
    pub model_name: String,
    pub max_iterations: u32,
}

impl TaskExecutor for AgentExecutor {
    fn execute(&self, instruction: &str) -> Result<String, PlanError> {
        let params = run_agent_module::RunAgentParams {
            instruction: instruction.to_string(),
            model_name: self.model_name.clone(),
            max_iterations: self.max_iterations,
        };
        let output = run_agent_module::run_agent(&params)
            .map_err(|err| PlanError::TaskFailed(err.to_string()))?;
        Ok(output.final_answer)
    }
}

/// Agents report a met stopping condition by opening their final answer
/// with this phrase; the sweep then deletes or disables the plan.
const STOPPING_CONDITION_MARKER: &str = "stopping condition met";

pub(crate) fn stopping_condition_met(final_answer: &str) -> bool {
    final_answer
        .trim_start()
        .to_ascii_lowercase()
        .starts_with(STOPPING_CONDITION_MARKER)
}

pub struct ExecutionContext<'a> {
    pub identity: &'a AgentIdentity,
    pub now: DateTime<Tz>,
    pub recent_history: &'a [ExecutionRecord],
    pub hands_free: bool,
}

pub(crate) fn build_plan_instruction(plan: &ActionPlan, context: &ExecutionContext<'_>) -> String {
    let time_str = context.now.format("%A, %B %d, %Y at %I:%M %p %Z");
    let hands_free_mode = if context.hands_free {
        "ON - Can send emails directly"
    } else {
        "OFF - Save all as drafts"
    };

    let created = plan
        .created_at
        .as_deref()
        .map(|value| snippet(value, 10))
        .unwrap_or_else(|| "Unknown".to_string());
    let last_run = plan
        .last_executed
        .as_deref()
        .map(|value| snippet(value, 16))
        .unwrap_or_else(|| "Never".to_string());

    let mut instruction = format!(
        "SCHEDULED ACTION PLAN EXECUTION\n\n\
         **TIME:** {time_str}\n\
         **IDENTITY:** {name} ({email})\n\
         **HANDS-FREE:** {hands_free_mode}\n\n\
         **PLAN METADATA:**\n\
         - Plan ID: {id}\n\
         - Executions: {executions} times\n\
         - Created: {created}\n\
         - Last Run: {last_run}\n\
         - Failures: {failures}\n",
        name = context.identity.name,
        email = context.identity.email,
        id = plan.id,
        executions = plan.execution_count,
        failures = plan.failure_count,
    );

    if !context.recent_history.is_empty() {
        instruction.push_str(&format!(
            "\n**RECENT HISTORY (last {} runs):**\n",
            context.recent_history.len()
        ));
        for (index, record) in context.recent_history.iter().enumerate() {
            let outcome = record
                .result
                .as_deref()
                .or(record.error.as_deref())
                .unwrap_or("");
            instruction.push_str(&format!(
                "{}. {} | {} | {}...\n",
                index + 1,
                snippet(&record.timestamp, 16),
                record.status,
                snippet(outcome, 80),
            ));
        }
    }

    instruction.push_str(&format!("\n**TASK:** {}\n", plan.task));

    if let Some(condition) = plan.stopping_condition.as_deref() {
        let auto_action = if plan.auto_delete_on_stop {
            "deleted"
        } else {
            "disabled"
        };
        instruction.push_str(&format!(
            "\n**STOPPING CONDITION:** {condition}\n\n\
             Evaluate whether the stopping condition is met BEFORE executing the task,\n\
             using the plan metadata and recent history above. If it IS met, do NOT\n\
             execute the task; reply with a single line starting with\n\
             \"STOPPING CONDITION MET:\" followed by the reason, and the plan will be\n\
             {auto_action} automatically. If it is not met, proceed with the task.\n",
        ));
    }

    instruction.push_str(
        "\nUse real recipient addresses taken from the task description, never\n\
         placeholders. Execute the task now and finish with a short summary of\n\
         what was done.\n",
    );
    instruction
}

/// First `max` characters of `text`, respecting char boundaries.
pub(crate) fn snippet(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
