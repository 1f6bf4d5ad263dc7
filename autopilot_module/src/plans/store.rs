//! Durable storage for the plan document. Writes are crash-safe: the
//! current primary is backed up, the new state lands in a temp file, and
//! an atomic rename swaps it in. Loads recover from backups when the
//! primary is corrupt. The store does no locking of its own; callers
//! serialise through the execution lock.

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{debug, error, info};

use super::types::{PlanError, PlanState};

const BACKUP_PREFIX: &str = "action_plans_";
const BACKUP_KEEP: usize = 10;

pub struct PlanStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl PlanStore {
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Load the full state document. A missing file is a fresh start, a
    /// corrupt one falls back to the newest parseable backup, and when
    /// every backup fails too the caller gets an empty state instead of
    /// an error (the data loss is logged prominently).
    pub fn load(&self) -> Result<PlanState, PlanError> {
        if !self.path.exists() {
            info!("no existing action plans file, starting fresh");
            return Ok(PlanState::default());
        }
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) => {
                error!("failed to read action plans file: {err}");
                return self.restore_from_backup();
            }
        };
        match serde_json::from_str::<PlanState>(&raw) {
            Ok(state) => {
                debug!("loaded {} action plans", state.action_plans.len());
                Ok(state)
            }
            Err(err) => {
                error!("action plans file failed to parse: {err}");
                self.restore_from_backup()
            }
        }
    }

    /// Persist the state document: back up the current primary (keeping
    /// the newest ten), write a temp sibling, atomically rename it over
    /// the primary. Fails loudly on any I/O error.
    pub fn save(&self, state: &PlanState) -> Result<(), PlanError> {
        if self.path.exists() {
            fs::create_dir_all(&self.backup_dir)?;
            let stamp = Utc::now().format("%Y%m%d_%H%M%S");
            let backup_path = self
                .backup_dir
                .join(format!("{BACKUP_PREFIX}{stamp}.json"));
            fs::copy(&self.path, &backup_path)?;
            debug!("created backup: {}", backup_path.display());
            self.prune_backups()?;
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, serde_json::to_string_pretty(state)?)?;
        fs::rename(&temp_path, &self.path)?;

        debug!("saved {} action plans", state.action_plans.len());
        Ok(())
    }

    fn restore_from_backup(&self) -> Result<PlanState, PlanError> {
        let backups = self.sorted_backups();
        if backups.is_empty() {
            error!("no backups available for restoration; continuing with empty state");
            return Ok(PlanState::default());
        }
        for backup in backups.iter().rev() {
            let parsed = fs::read_to_string(backup)
                .map_err(PlanError::from)
                .and_then(|raw| serde_json::from_str::<PlanState>(&raw).map_err(PlanError::from));
            match parsed {
                Ok(state) => {
                    info!("restored action plans from backup: {}", backup.display());
                    return Ok(state);
                }
                Err(err) => {
                    error!("failed to restore from backup {}: {err}", backup.display());
                }
            }
        }
        error!("all backup restoration attempts failed; continuing with empty state");
        Ok(PlanState::default())
    }

    /// Backup paths sorted oldest-first (the timestamped names sort
    /// lexicographically).
    fn sorted_backups(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.backup_dir) else {
            return Vec::new();
        };
        let mut backups: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| {
                        name.starts_with(BACKUP_PREFIX) && name.ends_with(".json")
                    })
            })
            .collect();
        backups.sort();
        backups
    }

    fn prune_backups(&self) -> Result<(), PlanError> {
        let backups = self.sorted_backups();
        if backups.len() <= BACKUP_KEEP {
            return Ok(());
        }
        for old_backup in &backups[..backups.len() - BACKUP_KEEP] {
            fs::remove_file(old_backup)?;
            debug!("removed old backup: {}", old_backup.display());
        }
        Ok(())
    }
}
