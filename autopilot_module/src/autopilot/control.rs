//! Stop flag for manually-triggered triage sweeps. The background
//! service ignores it and is governed by `service_enabled` in the
//! autopilot state instead.

use std::fs;
use std::path::PathBuf;

use crate::plans::PlanError;

pub struct StopFlag {
    path: PathBuf,
}

impl StopFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Signal a running manual sweep to stop before its next message.
    pub fn request(&self) -> Result<(), PlanError> {
        fs::write(&self.path, "stop")?;
        Ok(())
    }

    pub fn clear(&self) {
        let _ = fs::remove_file(&self.path);
    }

    pub fn is_set(&self) -> bool {
        self.path.exists()
    }
}
