//! Time source seam. Sweeps read the clock exactly once and reuse that
//! instant for every due-ness check, so a window boundary crossed
//! mid-sweep cannot flip answers between plans.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub trait Clock: Send + Sync {
    fn now_in(&self, tz: Tz) -> DateTime<Tz>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_in(&self, tz: Tz) -> DateTime<Tz> {
        Utc::now().with_timezone(&tz)
    }
}
