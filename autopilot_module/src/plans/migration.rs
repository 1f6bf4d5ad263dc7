//! Legacy-plan normalisation, run once when the manager opens the store.
//!
//! The old `"every_sweep"` frequency is absorbed at the serde boundary
//! (it deserialises as an alias of `hourly`); what remains here is
//! filling the gaps older documents carry: missing window lists and a
//! missing provenance field. A record that is still invalid after this
//! pass is kept untouched rather than dropped.

use tracing::{info, warn};

use super::schedule::validate_schedule;
use super::types::{PlanState, Schedule};

/// Fill legacy defaults in place; returns how many plans were touched.
pub(crate) fn normalize_legacy_plans(state: &mut PlanState) -> usize {
    let mut migrated = 0;
    for plan in &mut state.action_plans {
        let mut touched = false;

        match &mut plan.schedule {
            Schedule::Daily { time_windows } | Schedule::Weekly { time_windows, .. }
                if time_windows.is_empty() =>
            {
                *time_windows = vec!["09:00".to_string()];
                touched = true;
            }
            Schedule::TwiceDaily { time_windows } if time_windows.len() != 2 => {
                *time_windows = vec!["09:00".to_string(), "17:00".to_string()];
                touched = true;
            }
            _ => {}
        }

        if plan.created_by.is_empty() {
            plan.created_by = "migration".to_string();
            touched = true;
        }

        if touched {
            migrated += 1;
            info!("migrated legacy plan {} ({})", plan.id, plan.name);
        }
        if let Err(err) = validate_schedule(&plan.schedule, &plan.timezone) {
            warn!(
                "plan {} ({}) is still invalid after migration, keeping as-is: {err}",
                plan.id, plan.name
            );
        }
    }
    migrated
}
