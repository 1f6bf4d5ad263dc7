//! Background service executing scheduled action plans.
//!
//! Usage: `action-plan-service`
//!
//! Configuration via environment variables (see `ServiceConfig`), most
//! notably `ACTION_PLAN_SERVICE_INTERVAL` and
//! `ACTION_PLAN_SERVICE_HANDS_FREE`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use autopilot_module::service::{init_logging, run_plan_service, ServiceConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging("ACTION_PLAN_SERVICE_LOG_LEVEL");

    let config = ServiceConfig::from_env()?;
    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let config = config.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            if let Err(err) = run_plan_service(&config, stop) {
                error!("action plan service failed: {err}");
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping action plan service");
    stop.store(true, Ordering::Relaxed);
    let _ = worker.join();
    Ok(())
}
