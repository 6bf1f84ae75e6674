pub mod arbiter;
pub mod config;
pub mod control;
pub mod hub;
pub mod server;
pub mod services;

use crate::arbiter::ModeArbiter;
use crate::config::RoverConfig;
use crate::control::{GestureController, ManualControlHandle};
use crate::hub::ConnectionHub;
use crate::services::{ImageService, ManualControlService, NullClassifier};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    info!("Starting rover hub");
    let config = RoverConfig::load()?;

    // One hub and one arbiter, shared by explicit handles everywhere
    let hub = Arc::new(ConnectionHub::new());
    let arbiter = Arc::new(ModeArbiter::new());

    let gesture = GestureController::new(config.gesture.clone(), arbiter.clone(), hub.clone());
    hub.register_service(
        "camera_frame",
        Box::new(ImageService::new(Box::new(NullClassifier), gesture)),
    )
    .await;
    hub.register_service("manual_control", Box::new(ManualControlService::new()))
        .await;

    let _manual_handle =
        ManualControlHandle::spawn(config.joystick.clone(), arbiter.clone(), hub.clone())
            .map_err(|e| eyre!("Failed to spawn manual control loop: {}", e))?;

    server::serve(&config.server, hub).await
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
