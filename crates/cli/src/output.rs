// User-facing stderr lines. Colour is decided once in `RuntimeConfig`.

use std::io::{self, Write};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

/// Write `error: <message>` to stderr.
pub fn print_error(color: bool, message: &str) {
    let line = render_stderr_line("error", message, color, ANSI_RED);
    let _ = writeln!(io::stderr().lock(), "{line}");
}

/// Write `warning: <message>` to stderr.
pub fn print_warning(color: bool, message: &str) {
    let line = render_stderr_line("warning", message, color, ANSI_YELLOW);
    let _ = writeln!(io::stderr().lock(), "{line}");
}

/// Print a command's error with its full context chain.
pub fn print_anyhow_error(color: bool, error: &anyhow::Error) {
    print_error(color, &format!("{error:#}"));
}

fn render_stderr_line(label: &str, message: &str, color: bool, ansi: &str) -> String {
    if color {
        format!("{ansi}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}
