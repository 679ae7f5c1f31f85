// Command registry and dispatch.

use std::fmt;

use tracing::debug;

use crate::cli::{Invocation, RuntimeConfig};
use crate::exit_code::ExitCode;
use crate::{help, output};

pub mod build;
pub mod config;
pub mod start;
pub mod stop;
pub mod update;
pub mod users;

/// Every command droppy knows, in help display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Start,
    Stop,
    Update,
    Config,
    List,
    Add,
    Del,
    Build,
    Version,
}

/// How many positional arguments a command takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Extra arguments are ignored.
    Any,
    Between(usize, usize),
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Self::Any => true,
            Self::Between(min, max) => (min..=max).contains(&count),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any number of"),
            Self::Between(min, max) if min == max => write!(f, "{min}"),
            Self::Between(min, max) => write!(f, "{min} to {max}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    /// Argument synopsis shown in help.
    pub args: &'static str,
    pub arity: Arity,
    pub description: &'static str,
}

const NO_ALIASES: &[&str] = &[];
const VERSION_ALIASES: &[&str] = &["-v"];

impl CommandKind {
    pub const ALL: [CommandKind; 9] = [
        Self::Start,
        Self::Stop,
        Self::Update,
        Self::Config,
        Self::List,
        Self::Add,
        Self::Del,
        Self::Build,
        Self::Version,
    ];

    pub fn descriptor(self) -> CommandDescriptor {
        let (name, aliases, args, arity, description) = match self {
            Self::Start => ("start", NO_ALIASES, "", Arity::Any, "Start the server"),
            Self::Stop => ("stop", NO_ALIASES, "", Arity::Any, "Stop all running servers"),
            Self::Update => ("update", NO_ALIASES, "", Arity::Any, "Self-update"),
            Self::Config => ("config", NO_ALIASES, "", Arity::Any, "Edit the config"),
            Self::List => ("list", NO_ALIASES, "", Arity::Any, "List users"),
            Self::Add => (
                "add",
                NO_ALIASES,
                "<user> <pass> [p]",
                Arity::Between(2, 3),
                "Add or update a user. Specify 'p' for privileged",
            ),
            Self::Del => ("del", NO_ALIASES, "<user>", Arity::Between(1, 1), "Delete a user"),
            Self::Build => ("build", NO_ALIASES, "", Arity::Any, "Build client resources"),
            Self::Version => ("version", VERSION_ALIASES, "", Arity::Any, "Print version"),
        };
        CommandDescriptor { name, aliases, args, arity, description }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.descriptor().name == name)
    }
}

/// A fully validated command, ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Update,
    Config,
    List,
    Add { user: String, password: String, privileged: bool },
    Del { user: String },
    Build,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown command `{0}`")]
    Unknown(String),
    #[error("`{command}` takes {expected} arguments, got {got}")]
    Arity { command: &'static str, expected: Arity, got: usize },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Start => CommandKind::Start,
            Self::Stop => CommandKind::Stop,
            Self::Update => CommandKind::Update,
            Self::Config => CommandKind::Config,
            Self::List => CommandKind::List,
            Self::Add { .. } => CommandKind::Add,
            Self::Del { .. } => CommandKind::Del,
            Self::Build => CommandKind::Build,
            Self::Version => CommandKind::Version,
        }
    }

    pub fn parse(name: &str, args: &[String]) -> Result<Self, ParseError> {
        let kind = CommandKind::from_name(name).ok_or_else(|| ParseError::Unknown(name.to_owned()))?;
        let descriptor = kind.descriptor();
        if !descriptor.arity.accepts(args.len()) {
            return Err(ParseError::Arity {
                command: descriptor.name,
                expected: descriptor.arity,
                got: args.len(),
            });
        }

        Ok(match kind {
            CommandKind::Start => Self::Start,
            CommandKind::Stop => Self::Stop,
            CommandKind::Update => Self::Update,
            CommandKind::Config => Self::Config,
            CommandKind::List => Self::List,
            CommandKind::Add => Self::Add {
                user: args[0].clone(),
                password: args[1].clone(),
                privileged: args.get(2).is_some_and(|flag| flag == "p"),
            },
            CommandKind::Del => Self::Del { user: args[0].clone() },
            CommandKind::Build => Self::Build,
            CommandKind::Version => Self::Version,
        })
    }
}

/// Route one invocation to its command and return the process exit status.
pub async fn dispatch(invocation: &Invocation, config: &RuntimeConfig) -> ExitCode {
    let Some(name) = invocation.command() else {
        print!("{}", help::render_help(config.color));
        return ExitCode::Success;
    };

    match Command::parse(name, invocation.args()) {
        Ok(command) => run(command, config).await,
        Err(error) => {
            output::print_warning(config.color, &error.to_string());
            print!("{}", help::render_help(config.color));
            ExitCode::Error
        }
    }
}

pub async fn run(command: Command, config: &RuntimeConfig) -> ExitCode {
    debug!(command = command.kind().descriptor().name, mode = ?config.mode, "running command");
    let result = match command {
        Command::Start => start::run(config).await,
        Command::Stop => stop::run(config).await,
        Command::Update => update::run(config).await,
        Command::Config => config::run(config).await,
        Command::List => users::list(config).await,
        Command::Add { user, password, privileged } => {
            users::add(config, user, password, privileged).await
        }
        Command::Del { user } => users::del(config, user).await,
        Command::Build => build::run(config).await,
        Command::Version => {
            println!("{}", crate::cli::VERSION);
            Ok(())
        }
    };

    if let Err(error) = &result {
        debug!(error = ?error, "command failed");
        output::print_anyhow_error(config.color, error);
    }
    ExitCode::from_result(&result)
}
