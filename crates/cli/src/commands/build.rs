use anyhow::{Context, Result};
use droppy_server::resources;

use crate::cli::RuntimeConfig;

/// Rebuild the client resource cache.
pub async fn run(config: &RuntimeConfig) -> Result<()> {
    let paths = config.paths.clone();
    let report = tokio::task::spawn_blocking(move || resources::build(&paths))
        .await
        .context("resource build task failed")?
        .context("failed to build resources")?;

    println!(
        "Built {} resources ({} bytes) into {}",
        report.files,
        report.bytes,
        report.path.display()
    );
    Ok(())
}
