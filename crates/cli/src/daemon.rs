// Detach from the terminal before any command runs.

use anyhow::Result;

/// Fork into the background if requested.
///
/// Must run before the tokio runtime is created and before the log file or
/// any other descriptor is opened, so the surviving child owns them.
pub fn maybe_daemonize(detach: bool) -> Result<()> {
    if !detach {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use anyhow::Context;
        use daemonize::Daemonize;

        // Keep the working directory so relative paths resolve the same way
        // in the child.
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        Daemonize::new().working_directory(cwd).start().context("failed to daemonize")?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        anyhow::bail!("daemonizing is only supported on Unix systems; use a service manager instead")
    }
}

#[cfg(test)]
mod tests {
    use super::maybe_daemonize;

    #[test]
    fn no_detach_is_a_no_op() {
        maybe_daemonize(false).unwrap();
    }
}
