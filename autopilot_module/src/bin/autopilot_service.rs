//! Background service triaging inbound mail.
//!
//! Usage: `autopilot-service`
//!
//! Configuration via environment variables (see `ServiceConfig`), most
//! notably `AUTOPILOT_SERVICE_INTERVAL` and
//! `AUTOPILOT_SERVICE_HANDS_FREE`. The sweep itself only runs while
//! `service_enabled` is set in the autopilot state document.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use autopilot_module::service::{init_logging, run_autopilot_service, ServiceConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenvy::dotenv().ok();
    init_logging("AUTOPILOT_SERVICE_LOG_LEVEL");

    let config = ServiceConfig::from_env()?;
    let stop = Arc::new(AtomicBool::new(false));
    let worker = {
        let config = config.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            if let Err(err) = run_autopilot_service(&config, stop) {
                error!("autopilot service failed: {err}");
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping autopilot service");
    stop.store(true, Ordering::Relaxed);
    let _ = worker.join();
    Ok(())
}
