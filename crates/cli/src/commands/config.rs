// `droppy config`: open config.toml in a text editor, writing defaults first.

use std::path::Path;

use anyhow::{bail, Context, Result};
use droppy_common::config::Config;
use tracing::info;

use crate::cli::RuntimeConfig;
use crate::editor;

pub async fn run(config: &RuntimeConfig) -> Result<()> {
    let path = config.paths.config_file();
    ensure_config(&path).await?;

    let Some(editor) = editor::resolve(config.preferred_editor.as_deref()) else {
        println!("No suitable editor found, please edit {}", path.display());
        return Ok(());
    };
    open_in_editor(&editor, &path).await
}

/// Write the default config when none exists yet. Returns whether it did.
async fn ensure_config(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let target = path.to_path_buf();
            tokio::task::spawn_blocking(move || Config::init_default(&target))
                .await
                .context("config task failed")?
                .context("failed to write default config")?;
            info!(path = %path.display(), "wrote default config");
            Ok(true)
        }
        Err(e) => Err(e).with_context(|| format!("failed to inspect `{}`", path.display())),
    }
}

async fn open_in_editor(editor: &Path, path: &Path) -> Result<()> {
    info!(editor = %editor.display(), path = %path.display(), "opening config");
    let status = tokio::process::Command::new(editor)
        .arg(path)
        .status()
        .await
        .with_context(|| format!("failed to launch `{}`", editor.display()))?;
    if !status.success() {
        bail!("`{}` exited with {status}", editor.display());
    }
    Ok(())
}
