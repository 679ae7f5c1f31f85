use anyhow::{Context, Result};
use droppy_server::server::{self, StartOptions};
use tracing::info;

use crate::cli::{RuntimeConfig, VERSION};

/// Run the server in this process until it receives Ctrl-C or SIGTERM.
pub async fn run(config: &RuntimeConfig) -> Result<()> {
    info!(
        version = VERSION,
        pid = std::process::id(),
        dev = config.mode.is_dev(),
        daemon = config.daemon,
        config_dir = %config.paths.config_dir.display(),
        files_dir = %config.paths.files_dir.display(),
        "starting droppy"
    );

    let options = StartOptions { paths: config.paths.clone(), dev: config.mode.is_dev(), preset: None };
    server::start(options).await.context("server failed")
}
