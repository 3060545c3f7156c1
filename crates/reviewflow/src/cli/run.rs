//! `reviewflow run`: intake and routing loops until Ctrl-C.

use anyhow::{Context, Result};
use reviewflow::{ReviewflowConfig, METRICS};
use tracing::info;

pub async fn run(config: &ReviewflowConfig) -> Result<()> {
    let pipeline = super::open_pipeline(config).await?;
    let intake = pipeline.intake_loop();
    let router = pipeline.router_loop();

    intake.start().await?;
    if let Err(e) = router.start().await {
        intake.stop().await?;
        return Err(e.into());
    }
    info!("Watching folder '{}'; press Ctrl-C to stop", config.intake.folder_id);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutdown requested");

    let (intake_stopped, router_stopped) = tokio::join!(intake.stop(), router.stop());
    intake_stopped?;
    router_stopped?;

    info!("{}", METRICS.snapshot().summary());
    Ok(())
}
