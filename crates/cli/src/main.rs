// droppy CLI entry point.

use tracing::debug;

mod cli;
mod commands;
mod daemon;
mod editor;
mod exit_code;
mod help;
mod logging;
mod output;
mod process;

use crate::exit_code::ExitCode;

fn main() -> std::process::ExitCode {
    let invocation = match cli::parse(std::env::args_os()) {
        Ok(invocation) => invocation,
        Err(error) => {
            let _ = error.print();
            return ExitCode::Error.into();
        }
    };

    // Detach first: the log file, runtime threads and sockets must belong to
    // the surviving child.
    if let Err(error) = daemon::maybe_daemonize(invocation.cli.daemon) {
        output::print_anyhow_error(false, &error);
        return ExitCode::Error.into();
    }

    let config = match cli::RuntimeConfig::from_invocation(&invocation) {
        Ok(config) => config,
        Err(error) => {
            output::print_anyhow_error(false, &error);
            return ExitCode::Error.into();
        }
    };

    if let Err(error) = logging::init(&config) {
        output::print_anyhow_error(config.color, &error);
        return ExitCode::Error.into();
    }
    if !invocation.unrecognized.is_empty() {
        debug!(flags = ?invocation.unrecognized, "ignoring unrecognized flags");
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            output::print_error(config.color, &format!("failed to start async runtime: {error}"));
            return ExitCode::Error.into();
        }
    };

    runtime.block_on(commands::dispatch(&invocation, &config)).into()
}
