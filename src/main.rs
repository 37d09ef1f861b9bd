use anyhow::Result;
use powershades::Config;
use powershades::platform::{PositionUpdate, ShadesPlatform, group_key, shade_key};
use std::sync::Arc;
use tracing::{error, info};

fn log_update(update: &PositionUpdate) {
    info!(
        key = %update.key,
        position = update.current_position,
        "{} at {}%",
        update.name,
        update.current_position
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;

    powershades::logging::init_logging(&config.logging)?;
    config.validate()?;

    info!("PowerShades bridge starting up");

    let platform = Arc::new(
        ShadesPlatform::from_config(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create platform: {}", e))?,
    );

    let report = platform.discover().await;
    for shade in &report.shades {
        platform
            .register_accessory(shade_key(&shade.id), Arc::new(log_update))
            .await;
    }
    for group in &report.groups {
        platform
            .register_accessory(group_key(&group.id), Arc::new(log_update))
            .await;
    }
    for failure in &report.failures {
        error!("Discovery incomplete: {}", failure);
    }

    let scheduler = platform.start_polling();

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    scheduler.stop().await;
    info!("Bridge shutdown complete");
    Ok(())
}
