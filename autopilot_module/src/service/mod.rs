mod autopilot_loop;
mod config;
mod plan_loop;

pub use autopilot_loop::run_autopilot_service;
pub use config::ServiceConfig;
pub use plan_loop::run_plan_service;

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Initialise tracing for a service binary. The filter comes from the
/// named environment variable ("info" when unset or invalid).
pub fn init_logging(level_env: &str) {
    let directives = std::env::var(level_env).unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::try_new(directives.to_lowercase())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

/// Sleep in one-second chunks so a shutdown request interrupts the wait
/// promptly.
pub(crate) fn sleep_interruptible(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let chunk = remaining.min(Duration::from_secs(1));
        std::thread::sleep(chunk);
        remaining -= chunk;
    }
}
