//! Pure schedule evaluation: decides whether a plan is due and computes
//! its next execution instant. No I/O happens here; callers supply the
//! current time once per sweep.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Timelike,
};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use super::types::{ActionPlan, PlanError, Schedule};

/// Wall-clock windows fire within this tolerance of the configured time.
pub(crate) const WINDOW_TOLERANCE_MINUTES: i64 = 5;

/// Legacy plans with a `custom` schedule and no interval at all behave as
/// if `custom_interval_hours` were set to this.
const DEFAULT_CUSTOM_INTERVAL_HOURS: u32 = 6;

/// Whether `plan` should execute at `now`. Disabled plans are never due.
pub fn is_due(plan: &ActionPlan, now: DateTime<Tz>) -> bool {
    if !plan.enabled {
        return false;
    }
    let tz = plan.tz();
    let now = now.with_timezone(&tz);
    let last_executed = parse_tracked_timestamp(plan, plan.last_executed.as_deref(), tz);

    match &plan.schedule {
        Schedule::Once => last_executed.is_none(),
        Schedule::Hourly => match last_executed {
            None => true,
            Some(last) => now.signed_duration_since(last) >= Duration::minutes(60),
        },
        Schedule::Daily { time_windows } => {
            window_due(now, time_windows, last_executed, WindowKind::SameDay)
        }
        Schedule::TwiceDaily { time_windows } => {
            window_due(now, time_windows, last_executed, WindowKind::SameDay)
        }
        Schedule::Weekly {
            days_of_week,
            time_windows,
        } => {
            let weekday = now.weekday().num_days_from_monday() as u8;
            if !days_of_week.contains(&weekday) {
                return false;
            }
            window_due(now, time_windows, last_executed, WindowKind::SameWeek)
        }
        Schedule::Custom { .. } => custom_due(plan, now, last_executed, tz),
    }
}

/// The next instant `plan` will become due after `now`, in the plan's
/// zone. `None` means the plan will never run again (a completed `once`
/// plan). Nothing is mutated; callers persist the result.
pub fn next_execution_after(plan: &ActionPlan, now: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = plan.tz();
    let now = now.with_timezone(&tz);
    let last_executed = parse_tracked_timestamp(plan, plan.last_executed.as_deref(), tz);

    match &plan.schedule {
        Schedule::Once => {
            if plan.last_executed.is_some() {
                None
            } else {
                Some(now)
            }
        }
        Schedule::Hourly => match last_executed {
            Some(last) => Some(last + Duration::hours(1)),
            None => Some(now + Duration::hours(1)),
        },
        Schedule::Daily { time_windows } => {
            next_window_time(now, time_windows.first()?, 1)
        }
        Schedule::TwiceDaily { time_windows } => {
            let earliest = time_windows
                .iter()
                .filter_map(|window| next_window_time(now, window, 0))
                .filter(|candidate| *candidate > now)
                .min();
            match earliest {
                Some(candidate) => Some(candidate),
                None => next_window_time(now, time_windows.first()?, 1),
            }
        }
        Schedule::Weekly {
            days_of_week,
            time_windows,
        } => {
            let window = time_windows.first()?;
            let current_weekday = i64::from(now.weekday().num_days_from_monday());
            let days_ahead = days_of_week
                .iter()
                .map(|&day| {
                    let delta = (i64::from(day) - current_weekday).rem_euclid(7);
                    if delta > 0 {
                        delta
                    } else {
                        7
                    }
                })
                .min()?;
            next_window_time(now, window, days_ahead)
        }
        Schedule::Custom {
            custom_interval_days,
            custom_interval_minutes,
            custom_interval_hours,
        } => {
            let interval = custom_interval(
                *custom_interval_days,
                *custom_interval_minutes,
                *custom_interval_hours,
            );
            match last_executed {
                Some(last) => Some(last + interval),
                None => Some(now + interval),
            }
        }
    }
}

/// Validate a schedule descriptor plus its timezone before persistence.
/// Invalid configurations are rejected outright, never coerced.
pub(crate) fn validate_schedule(schedule: &Schedule, timezone: &str) -> Result<(), PlanError> {
    let windows: &[String] = match schedule {
        Schedule::Daily { time_windows }
        | Schedule::TwiceDaily { time_windows }
        | Schedule::Weekly { time_windows, .. } => time_windows,
        _ => &[],
    };
    for window in windows {
        if parse_window(window).is_none() {
            return Err(PlanError::InvalidSchedule(format!(
                "invalid time format: {window} (expected HH:MM, 24-hour)"
            )));
        }
    }

    match schedule {
        Schedule::Daily { time_windows } if time_windows.is_empty() => {
            return Err(PlanError::InvalidSchedule(
                "daily requires at least 1 time window".to_string(),
            ));
        }
        Schedule::TwiceDaily { time_windows } if time_windows.len() != 2 => {
            return Err(PlanError::InvalidSchedule(
                "twice_daily requires exactly 2 time windows".to_string(),
            ));
        }
        Schedule::Weekly { days_of_week, .. } => {
            if days_of_week.is_empty() {
                return Err(PlanError::InvalidSchedule(
                    "weekly requires days_of_week (0-6, Monday-Sunday)".to_string(),
                ));
            }
            if days_of_week.iter().any(|day| *day > 6) {
                return Err(PlanError::InvalidSchedule(
                    "days_of_week must be integers 0-6 (Monday-Sunday)".to_string(),
                ));
            }
        }
        Schedule::Custom {
            custom_interval_days,
            custom_interval_minutes,
            custom_interval_hours,
        } => {
            let intervals = [
                custom_interval_days,
                custom_interval_minutes,
                custom_interval_hours,
            ];
            if intervals.iter().all(|value| value.is_none()) {
                return Err(PlanError::InvalidSchedule(
                    "custom requires at least one of: custom_interval_days, \
                     custom_interval_minutes, custom_interval_hours"
                        .to_string(),
                ));
            }
            if intervals.iter().any(|value| **value == Some(0)) {
                return Err(PlanError::InvalidSchedule(
                    "custom intervals must be >= 1".to_string(),
                ));
            }
        }
        _ => {}
    }

    if timezone.parse::<Tz>().is_err() {
        return Err(PlanError::InvalidTimezone(timezone.to_string()));
    }
    Ok(())
}

/// Parse a persisted timestamp. RFC 3339 first; naive legacy stamps are
/// interpreted as already being in the plan's zone (never UTC or the
/// system zone). Unparsable values are logged and treated as absent.
pub(crate) fn parse_timestamp(raw: &str, tz: Tz) -> Option<DateTime<Tz>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&tz));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;
    localize(tz, naive)
}

pub(crate) fn format_timestamp(value: DateTime<Tz>) -> String {
    value.to_rfc3339()
}

fn parse_tracked_timestamp(
    plan: &ActionPlan,
    raw: Option<&str>,
    tz: Tz,
) -> Option<DateTime<Tz>> {
    let raw = raw?;
    let parsed = parse_timestamp(raw, tz);
    if parsed.is_none() {
        warn!("plan '{}': failed to parse timestamp '{}'", plan.name, raw);
    }
    parsed
}

#[derive(Clone, Copy, PartialEq)]
enum WindowKind {
    /// Daily and twice-daily: suppress a window that already fired today.
    SameDay,
    /// Weekly: suppress any firing within the last 7 days.
    SameWeek,
}

fn window_due(
    now: DateTime<Tz>,
    windows: &[String],
    last_executed: Option<DateTime<Tz>>,
    kind: WindowKind,
) -> bool {
    let tz = now.timezone();
    for raw in windows {
        let Some(window) = parse_window(raw) else {
            warn!("failed to parse time window {raw}");
            continue;
        };
        let Some(window_dt) = localize(tz, now.date_naive().and_time(window)) else {
            continue;
        };
        let diff_seconds = now.signed_duration_since(window_dt).num_seconds().abs();
        if diff_seconds > WINDOW_TOLERANCE_MINUTES * 60 {
            continue;
        }
        if let Some(last) = last_executed {
            match kind {
                WindowKind::SameDay => {
                    if last.date_naive() == now.date_naive() {
                        // Same calendar day: only the window that already
                        // fired is suppressed, a second daily window still
                        // runs.
                        let hour_gap = i64::from(last.hour()) - i64::from(window_dt.hour());
                        if hour_gap.abs() < 1 {
                            return false;
                        }
                    }
                }
                WindowKind::SameWeek => {
                    let days_since = now
                        .date_naive()
                        .signed_duration_since(last.date_naive())
                        .num_days();
                    if days_since < 7 {
                        return false;
                    }
                }
            }
        }
        info!("time window match: {raw} (current: {})", now.format("%H:%M"));
        return true;
    }
    false
}

fn custom_due(
    plan: &ActionPlan,
    now: DateTime<Tz>,
    last_executed: Option<DateTime<Tz>>,
    tz: Tz,
) -> bool {
    // next_execution is authoritative when present and in the future: a
    // partially-failed update can leave last_executed stale while a
    // correct next_execution was already persisted.
    if let Some(raw) = plan.next_execution.as_deref() {
        match parse_timestamp(raw, tz) {
            Some(next) if now < next => {
                debug!(
                    "custom plan '{}': next_execution {} still ahead, skip",
                    plan.name,
                    next.format("%H:%M:%S")
                );
                return false;
            }
            Some(_) => {
                debug!(
                    "custom plan '{}': next_execution has passed, checking interval",
                    plan.name
                );
            }
            None => warn!(
                "custom plan '{}': failed to parse next_execution '{}'",
                plan.name, raw
            ),
        }
    }

    let Some(last) = last_executed else {
        info!("custom plan '{}': never executed, should run", plan.name);
        return true;
    };

    let (days, minutes, hours) = match &plan.schedule {
        Schedule::Custom {
            custom_interval_days,
            custom_interval_minutes,
            custom_interval_hours,
        } => (
            *custom_interval_days,
            *custom_interval_minutes,
            *custom_interval_hours,
        ),
        _ => return false,
    };
    let elapsed = now.signed_duration_since(last);
    // Precedence when several intervals survived validation: days over
    // minutes over hours.
    if let Some(days) = days {
        elapsed >= Duration::days(i64::from(days))
    } else if let Some(minutes) = minutes {
        elapsed >= Duration::minutes(i64::from(minutes))
    } else {
        let hours = hours.unwrap_or(DEFAULT_CUSTOM_INTERVAL_HOURS);
        elapsed >= Duration::hours(i64::from(hours))
    }
}

fn custom_interval(days: Option<u32>, minutes: Option<u32>, hours: Option<u32>) -> Duration {
    if let Some(days) = days {
        Duration::days(i64::from(days))
    } else if let Some(minutes) = minutes {
        Duration::minutes(i64::from(minutes))
    } else {
        Duration::hours(i64::from(hours.unwrap_or(DEFAULT_CUSTOM_INTERVAL_HOURS)))
    }
}

/// Next occurrence of a "HH:MM" window, `days_offset` days from today.
/// With an offset of zero, a window that already passed slips to
/// tomorrow.
fn next_window_time(
    now: DateTime<Tz>,
    window: &str,
    days_offset: i64,
) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let window = parse_window(window)?;
    let date = now.date_naive() + Duration::days(days_offset);
    let mut next = localize(tz, date.and_time(window))?;
    if days_offset == 0 && next <= now {
        next = localize(tz, (date + Duration::days(1)).and_time(window))?;
    }
    Some(next)
}

pub(crate) fn parse_window(window: &str) -> Option<NaiveTime> {
    let (hour, minute) = window.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn localize(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(value) => Some(value),
        // DST fold: take the earlier instant.
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => None,
    }
}
