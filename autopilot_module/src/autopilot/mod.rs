mod control;
mod ledger;
mod mailbox;
mod state;
mod sweep;

pub use control::StopFlag;
pub use ledger::ProcessedLedger;
pub use mailbox::{CommandMailbox, InboundMessage, Mailbox};
pub use state::{AutopilotState, AutopilotStateStore, TriageRule, TriageSummary};
pub use sweep::{TriageOutcome, TriageRunner, TRIAGE_LOCK_STALENESS};
