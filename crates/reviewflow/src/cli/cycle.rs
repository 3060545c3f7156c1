//! `reviewflow intake` and `reviewflow route`: one cycle, then exit.

use super::output::print_json;
use anyhow::Result;
use reviewflow::ReviewflowConfig;

pub async fn intake(config: &ReviewflowConfig, json: bool) -> Result<()> {
    let pipeline = super::open_pipeline(config).await?;
    let report = pipeline.intake.check_for_new_files().await?;
    if json {
        print_json(&report)?;
    } else {
        println!("{}", report);
    }
    Ok(())
}

pub async fn route(config: &ReviewflowConfig, json: bool) -> Result<()> {
    let pipeline = super::open_pipeline(config).await?;
    let report = pipeline.router.route_once().await?;
    if json {
        print_json(&report)?;
    } else {
        println!("{}", report);
    }
    Ok(())
}
