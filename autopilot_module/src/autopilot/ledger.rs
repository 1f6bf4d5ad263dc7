//! Idempotency ledger for the triage path: the set of inbound message
//! ids that have already been handled. Checked before every message and
//! saved immediately after each one, never batched, so a crash mid-sweep
//! can only skip work, not repeat it.
//!
//! TODO: bound the ledger; processed ids accumulate without limit on a
//! long-lived deployment.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::warn;

use crate::plans::PlanError;

pub struct ProcessedLedger {
    path: PathBuf,
}

impl ProcessedLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing or unreadable ledger is treated as empty; triage is
    /// idempotent by design, so reprocessing wastes work but corrupts
    /// nothing.
    pub fn load(&self) -> BTreeSet<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return BTreeSet::new(),
            Err(err) => {
                warn!("failed to read processed-mail ledger: {err}");
                return BTreeSet::new();
            }
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(ids) => ids.into_iter().collect(),
            Err(err) => {
                warn!("failed to parse processed-mail ledger: {err}");
                BTreeSet::new()
            }
        }
    }

    pub fn save(&self, ids: &BTreeSet<String>) -> Result<(), PlanError> {
        let list: Vec<&String> = ids.iter().collect();
        fs::write(&self.path, serde_json::to_string_pretty(&list)?)?;
        Ok(())
    }
}
