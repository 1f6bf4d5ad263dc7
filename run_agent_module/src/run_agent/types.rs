use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct RunAgentParams {
    /// The fully built instruction handed to the agent on stdin.
    pub instruction: String,
    /// Model override; empty means the CLI's own default.
    pub model_name: String,
    /// Iteration cap bounding the agent's tool-calling loop.
    pub max_iterations: u32,
}

#[derive(Debug, Clone)]
pub struct RunAgentOutput {
    pub final_answer: String,
}

/// Structured envelope some agent CLIs print as their last stdout line.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct AgentEnvelope {
    pub(super) final_answer: String,
}
