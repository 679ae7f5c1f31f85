// Help text and user listing.

use std::fmt::Write as _;

use droppy_common::users::UserSummary;

use crate::commands::CommandKind;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_BLUE: &str = "\x1b[34m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_RESET: &str = "\x1b[0m";

const NAME_WIDTH: usize = 24;

struct OptionDescriptor {
    flags: &'static str,
    description: &'static str,
}

const OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor { flags: "-c, --configdir <dir>", description: "Config directory" },
    OptionDescriptor { flags: "-f, --filesdir <dir>", description: "Files directory" },
    OptionDescriptor { flags: "-l, --log <file>", description: "Log to file instead of stderr" },
    OptionDescriptor { flags: "-d, --daemon", description: "Daemonize (background) process" },
    OptionDescriptor { flags: "--dev", description: "Enable developing mode" },
    OptionDescriptor { flags: "--color", description: "Force-enable colored log output" },
    OptionDescriptor { flags: "--no-color", description: "Force-disable colored log output" },
    OptionDescriptor { flags: "-h, --help", description: "Print help" },
];

pub fn render_help(color: bool) -> String {
    let (bold, reset) = if color { (ANSI_BOLD, ANSI_RESET) } else { ("", "") };
    let mut out = String::new();
    let _ = writeln!(out, "{bold}Usage:{reset} droppy [command] [options]");

    let _ = writeln!(out, "\n{bold}Commands:{reset}");
    for kind in CommandKind::ALL {
        let descriptor = kind.descriptor();
        let mut label = descriptor.name.to_owned();
        for alias in descriptor.aliases {
            label.push_str(", ");
            label.push_str(alias);
        }
        if !descriptor.args.is_empty() {
            label.push(' ');
            label.push_str(descriptor.args);
        }
        push_row(&mut out, &label, descriptor.description, color.then_some(ANSI_BLUE));
    }

    let _ = writeln!(out, "\n{bold}Options:{reset}");
    for option in OPTIONS {
        push_row(&mut out, option.flags, option.description, color.then_some(ANSI_GREEN));
    }
    out
}

fn push_row(out: &mut String, label: &str, description: &str, ansi: Option<&str>) {
    // Pad before colouring so escapes do not count toward the column width.
    let padded = format!("{label:<NAME_WIDTH$}");
    match ansi {
        Some(ansi) => {
            let _ = writeln!(out, "  {ansi}{padded}{ANSI_RESET}{description}");
        }
        None => {
            let _ = writeln!(out, "  {padded}{description}");
        }
    }
}

pub fn render_users(users: &[UserSummary]) -> String {
    if users.is_empty() {
        return "No users defined. Use 'add' to add one.\n".to_owned();
    }

    let mut out = String::from("Current Users:\n");
    for user in users {
        let suffix = if user.privileged { " (privileged)" } else { "" };
        let _ = writeln!(out, "  - {}{suffix}", user.name);
    }
    out
}
