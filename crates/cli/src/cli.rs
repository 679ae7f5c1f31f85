// Argument parsing and the runtime configuration derived from it.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use droppy_common::paths::Paths;

/// Process name matched by `droppy stop`.
pub const APP_NAME: &str = "droppy";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "droppy", disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Config directory
    #[arg(short = 'c', long = "configdir", value_name = "dir")]
    pub configdir: Option<PathBuf>,

    /// Files directory
    #[arg(short = 'f', long = "filesdir", value_name = "dir")]
    pub filesdir: Option<PathBuf>,

    /// Daemonize (background) process
    #[arg(short = 'd', long)]
    pub daemon: bool,

    /// Log to file instead of stderr
    #[arg(short = 'l', long = "log", value_name = "file")]
    pub log: Option<PathBuf>,

    /// Enable developing mode
    #[arg(long)]
    pub dev: bool,

    /// Force-enable colored log output
    #[arg(long, overrides_with = "no_color")]
    pub color: bool,

    /// Force-disable colored log output
    #[arg(long = "no-color", overrides_with = "color")]
    pub no_color: bool,

    /// Print version
    #[arg(short = 'v', short_alias = 'V')]
    pub version: bool,

    /// Print help
    #[arg(short = 'h', long)]
    pub help: bool,

    /// Command followed by its arguments
    pub positionals: Vec<String>,
}

/// One parsed command line. Immutable once built.
#[derive(Debug)]
pub struct Invocation {
    pub cli: Cli,
    /// Flags that name no declared option, kept but otherwise ignored.
    pub unrecognized: Vec<String>,
}

impl Invocation {
    /// The command to dispatch. `-v`/`-V` win over everything, `-h` means
    /// no command.
    pub fn command(&self) -> Option<&str> {
        if self.cli.version {
            return Some("version");
        }
        if self.cli.help {
            return None;
        }
        self.cli.positionals.first().map(String::as_str)
    }

    /// Positional arguments after the command name.
    pub fn args(&self) -> &[String] {
        if self.cli.version || self.cli.help {
            return &[];
        }
        self.cli.positionals.get(1..).unwrap_or(&[])
    }
}

/// Parse a raw argument vector (including the binary name).
pub fn parse<I, T>(raw: I) -> Result<Invocation, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let raw: Vec<String> =
        raw.into_iter().map(|arg| arg.into().to_string_lossy().into_owned()).collect();
    let (known, unrecognized) = split_unrecognized(&Cli::command(), raw);
    let cli = Cli::try_parse_from(known)?;
    Ok(Invocation { cli, unrecognized })
}

/// Separate tokens that look like flags but name no declared option.
///
/// The token following a value-taking flag is always kept, as is everything
/// after `--`.
fn split_unrecognized(command: &clap::Command, raw: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut longs = HashMap::new();
    let mut shorts = HashMap::new();
    for arg in command.get_arguments().filter(|arg| !arg.is_positional()) {
        let takes_value = arg.get_action().takes_values();
        if let Some(long) = arg.get_long() {
            longs.insert(long.to_owned(), takes_value);
        }
        for alias in arg.get_all_aliases().into_iter().flatten() {
            longs.insert(alias.to_owned(), takes_value);
        }
        if let Some(short) = arg.get_short() {
            shorts.insert(short, takes_value);
        }
        for alias in arg.get_all_short_aliases().into_iter().flatten() {
            shorts.insert(alias, takes_value);
        }
    }

    let mut known = Vec::with_capacity(raw.len());
    let mut unrecognized = Vec::new();
    let mut tokens = raw.into_iter();
    known.extend(tokens.next());

    let mut expect_value = false;
    let mut passthrough = false;
    for token in tokens {
        if passthrough || expect_value {
            expect_value = false;
            known.push(token);
            continue;
        }
        if token == "--" {
            passthrough = true;
            known.push(token);
            continue;
        }

        if let Some(body) = token.strip_prefix("--") {
            let (name, inline_value) = match body.split_once('=') {
                Some((name, _)) => (name, true),
                None => (body, false),
            };
            match longs.get(name) {
                Some(&takes_value) => {
                    expect_value = takes_value && !inline_value;
                    known.push(token);
                }
                None => unrecognized.push(token),
            }
        } else if let Some(cluster) = token.strip_prefix('-').filter(|rest| !rest.is_empty()) {
            // Walk the cluster: known switches stay together, unknown ones are
            // split off, and the first value-taking flag swallows the rest.
            let mut kept = String::from("-");
            let mut dropped = Vec::new();
            for (index, c) in cluster.char_indices() {
                match shorts.get(&c) {
                    Some(&true) => {
                        kept.push_str(&cluster[index..]);
                        expect_value = index + c.len_utf8() == cluster.len();
                        break;
                    }
                    Some(&false) => kept.push(c),
                    None => dropped.push(format!("-{c}")),
                }
            }
            if kept.len() > 1 {
                known.push(kept);
            }
            if dropped.len() == cluster.chars().count() {
                unrecognized.push(token);
            } else {
                unrecognized.extend(dropped);
            }
        } else {
            known.push(token);
        }
    }

    (known, unrecognized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Production,
    Development,
}

impl Mode {
    pub fn is_dev(self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Process-wide settings, built once at startup and passed to every command.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub mode: Mode,
    pub color: bool,
    pub daemon: bool,
    pub log_file: Option<PathBuf>,
    pub paths: Paths,
    /// Basename of `$VISUAL` or `$EDITOR`.
    pub preferred_editor: Option<String>,
}

impl RuntimeConfig {
    /// Build from the invocation and the process environment.
    pub fn from_invocation(invocation: &Invocation) -> Result<Self> {
        let cli = &invocation.cli;
        let paths = Paths::resolve(cli.configdir.as_deref(), cli.filesdir.as_deref())
            .context("failed to resolve droppy directories")?;
        let cwd = std::env::current_dir().context("failed to determine current directory")?;
        let log_file = cli.log.as_ref().map(|path| cwd.join(path));
        let visual = std::env::var("VISUAL").ok();
        let editor = std::env::var("EDITOR").ok();
        let editor_env = preferred_editor_env(visual.as_deref(), editor.as_deref());

        Ok(Self {
            mode: if cli.dev { Mode::Development } else { Mode::Production },
            color: resolve_color(cli, log_file.is_some(), std::io::stderr().is_terminal()),
            daemon: cli.daemon,
            log_file,
            paths,
            preferred_editor: editor_env.and_then(editor_basename),
        })
    }
}

fn resolve_color(cli: &Cli, logs_to_file: bool, stderr_is_tty: bool) -> bool {
    if cli.color {
        true
    } else if cli.no_color {
        false
    } else {
        !logs_to_file && stderr_is_tty
    }
}

/// `VISUAL` wins over `EDITOR`; blank values count as unset.
fn preferred_editor_env<'a>(visual: Option<&'a str>, editor: Option<&'a str>) -> Option<&'a str> {
    let set = |value: Option<&'a str>| value.filter(|v| !v.trim().is_empty());
    set(visual).or_else(|| set(editor))
}

fn editor_basename(value: &str) -> Option<String> {
    let program = value.split_whitespace().next()?;
    Path::new(program).file_name().map(|name| name.to_string_lossy().into_owned())
}
