mod run_agent;

pub use run_agent::{run_agent, RunAgentError, RunAgentOutput, RunAgentParams};
