// Discovery and termination of other running droppy instances.

use std::future::Future;

use anyhow::{Context, Result};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// A live OS process observed at stop time. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
}

/// Access to the OS process table.
pub trait ProcessTable: Clone + Send + Sync + 'static {
    /// Every process whose command name equals `name`.
    fn find_by_name(&self, name: &str) -> impl Future<Output = Result<Vec<ProcessRecord>>> + Send;

    /// Ask `pid` to terminate. A process that already exited counts as terminated.
    fn terminate(&self, pid: u32) -> impl Future<Output = Result<()>> + Send;
}

/// The real process table, backed by `sysinfo` and `SIGTERM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessTable for SystemProcesses {
    async fn find_by_name(&self, name: &str) -> Result<Vec<ProcessRecord>> {
        let name = name.to_owned();
        tokio::task::spawn_blocking(move || snapshot(&name))
            .await
            .context("process snapshot task failed")
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        tokio::task::spawn_blocking(move || send_terminate(pid))
            .await
            .context("terminate task failed")?
    }
}

fn snapshot(name: &str) -> Vec<ProcessRecord> {
    use sysinfo::{ProcessesToUpdate, System};

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    let mut matches: Vec<ProcessRecord> = system
        .processes()
        .iter()
        // Threads show up as processes on Linux and share the parent's name.
        .filter(|(_, process)| process.thread_kind().is_none())
        .filter(|(_, process)| process.name() == name)
        .map(|(pid, process)| ProcessRecord {
            pid: pid.as_u32(),
            name: process.name().to_string_lossy().into_owned(),
        })
        .collect();
    matches.sort_by_key(|record| record.pid);
    matches
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid).with_context(|| format!("pid {pid} out of range"))?;
    match kill(Pid::from_raw(raw), Signal::SIGTERM) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug!(pid, "process already exited");
            Ok(())
        }
        Err(errno) => Err(anyhow::Error::new(errno).context(format!("failed to signal pid {pid}"))),
    }
}

#[cfg(not(unix))]
fn send_terminate(pid: u32) -> Result<()> {
    use sysinfo::{Pid, ProcessesToUpdate, System};

    let target = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);
    match system.process(target) {
        None => Ok(()),
        Some(process) if process.kill() => Ok(()),
        Some(_) => anyhow::bail!("failed to terminate pid {pid}"),
    }
}

/// Outcome of a stop fan-out, built only after every termination finished.
#[derive(Debug, Default)]
pub struct StopReport {
    pub killed: Vec<u32>,
    pub failed: Vec<(u32, anyhow::Error)>,
}

impl StopReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Terminate every process named `name` except `own_pid`, concurrently.
pub async fn stop_others<T: ProcessTable>(table: &T, name: &str, own_pid: u32) -> Result<StopReport> {
    let targets: Vec<u32> = table
        .find_by_name(name)
        .await
        .context("failed to list processes")?
        .into_iter()
        .map(|record| record.pid)
        .filter(|&pid| pid != own_pid)
        .collect();

    let mut tasks = JoinSet::new();
    for pid in targets {
        let table = table.clone();
        tasks.spawn(async move { (pid, table.terminate(pid).await) });
    }

    let mut report = StopReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((pid, Ok(()))) => report.killed.push(pid),
            Ok((pid, Err(error))) => {
                warn!(pid, error = %format!("{error:#}"), "failed to terminate process");
                report.failed.push((pid, error));
            }
            Err(join_error) => return Err(join_error).context("terminate task panicked"),
        }
    }
    report.killed.sort_unstable();
    report.failed.sort_by_key(|(pid, _)| *pid);
    Ok(report)
}
