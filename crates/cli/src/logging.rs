// tracing subscriber setup: stderr by default, `--log <file>` appends to a file.

use std::sync::Mutex;

use anyhow::{Context, Result};
use droppy_common::fs::open_private_append;
use tracing_subscriber::EnvFilter;

use crate::cli::RuntimeConfig;

/// Install the global subscriber. `RUST_LOG` overrides the mode default.
pub fn init(config: &RuntimeConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(config)));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.color);

    match &config.log_file {
        Some(path) => {
            let file = open_private_append(path)
                .with_context(|| format!("failed to open log file `{}`", path.display()))?;
            builder.with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn default_directive(config: &RuntimeConfig) -> &'static str {
    if config.mode.is_dev() {
        "debug"
    } else {
        "info"
    }
}
