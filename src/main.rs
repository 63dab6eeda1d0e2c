pub mod config;
pub mod controller;
pub mod error;
pub mod mapping;
pub mod orchestrator;
pub mod vehicle;
pub mod vision;
pub mod worker;

use crate::config::{Cli, SessionFiles};
use crate::controller::GamepadDevice;
use crate::orchestrator::{Devices, Orchestrator, StopReason};
use crate::vehicle::DryRunVehicle;
use crate::vision::{ClassifierPipeline, LogDisplay, TestPatternCamera};
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup()?;

    // Everything file-based is checked before a device is touched
    info!("Loading configuration");
    let SessionFiles {
        profile,
        labels,
        model,
    } = SessionFiles::load(&cli).await?;

    let devices = Devices {
        controller: Box::new(GamepadDevice),
        camera: Box::new(TestPatternCamera::new(cli.camera_index)),
        display: Box::new(LogDisplay::new(format!("camera {}", cli.camera_index))),
        classifier: ClassifierPipeline::new(Box::new(model), labels),
    };
    let vehicle = Arc::new(DryRunVehicle::new(cli.vehicle_id.clone()));

    let running = Orchestrator::create(profile, vehicle)
        .start(devices)
        .await
        .map_err(|e| eyre!("Failed to start session for {}: {}", cli.vehicle_id, e))?;

    let stopped = running
        .run_until_stopped(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl_c, stopping: {}", e);
            }
        })
        .await;

    match stopped.report().map(|report| &report.reason) {
        Some(StopReason::DeviceLost(e)) => Err(eyre!("Session ended: {}", e)),
        _ => Ok(()),
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(std::env::var("RUST_LOG").ok().as_deref());
    Ok(())
}

/// `RUST_LOG` directives, `info` when unset
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::new(directives.unwrap_or("info"))
}

fn setup_logging_env(directives: Option<&str>) {
    FmtSubscriber::builder()
        .with_env_filter(log_filter(directives))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
