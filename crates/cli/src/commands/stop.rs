// `droppy stop`: terminate every other running instance.

use std::io::Write;

use anyhow::Result;

use crate::cli::{RuntimeConfig, APP_NAME};
use crate::process::{self, StopReport, SystemProcesses};

pub async fn run(_config: &RuntimeConfig) -> Result<()> {
    let report = process::stop_others(&SystemProcesses, APP_NAME, std::process::id()).await?;
    report_outcome(report, &mut std::io::stdout())
}

/// Print the outcome once every termination has completed. Any failure fails
/// the whole command.
fn report_outcome(report: StopReport, out: &mut impl Write) -> Result<()> {
    let StopReport { killed, failed } = report;
    let failed_count = failed.len();
    if let Some((pid, error)) = failed.into_iter().next() {
        return Err(error.context(format!(
            "failed to stop pid {pid} ({failed_count} of {} processes could not be stopped)",
            failed_count + killed.len()
        )));
    }

    if killed.is_empty() {
        writeln!(out, "No processes found")?;
        return Ok(());
    }
    for pid in &killed {
        writeln!(out, "Killed PID {pid}")?;
    }
    out.flush()?;
    Ok(())
}
