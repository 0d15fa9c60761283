//! Commands and types used throughout xkb-switch.
//!
//! This module defines the vocabulary the components share: [`Command`]
//! describes every action the switcher can perform, [`GroupChange`] is the
//! event a [`GroupEventSource`](crate::traits::GroupEventSource) emits, and
//! [`Cli`] / [`Plan`] turn command-line flags into an ordered list of
//! actions.

use crate::config::LayoutSource;
use clap::{ArgAction, Parser};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The active group changed; `group` is the new index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupChange {
    pub group: usize,
}

/// Every action the layout switcher can perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the raw string the layout list is parsed from.
    PrintRaw,
    /// Lock the group after the current one, wrapping around.
    Next,
    /// Lock the group whose layout renders as the given name.
    Set(String),
    /// Print the current layout, or the server's long group name if `fancy`.
    Print { fancy: bool },
    /// Print every configured layout, one per line.
    List,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PrintRaw => write!(f, "print-raw"),
            Command::Next => write!(f, "next"),
            Command::Set(name) => write!(f, "set {}", name),
            Command::Print { fancy: false } => write!(f, "print"),
            Command::Print { fancy: true } => write!(f, "print --fancy"),
            Command::List => write!(f, "list"),
        }
    }
}

/// Command-line flags of the `xkb-switch` binary.
#[derive(Debug, Parser)]
#[command(
    name = "xkb-switch",
    version,
    disable_version_flag = true,
    about = "Query and switch the active XKB keyboard layout group"
)]
pub struct Cli {
    /// Set the current layout group to NAME
    #[arg(short = 's', long = "set", value_name = "NAME")]
    pub set: Option<String>,

    /// Display all layout groups
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Display the current layout group (default action)
    #[arg(short = 'p', long)]
    pub print: bool,

    /// Switch to the next layout group
    #[arg(short = 'n', long)]
    pub next: bool,

    /// Wait for a group change, then continue
    #[arg(short = 'w', long)]
    pub wait: bool,

    /// Wait for group changes forever, printing each new group
    #[arg(short = 'W', long)]
    pub longwait: bool,

    /// Give up waiting after SECS seconds
    #[arg(short = 't', long, value_name = "SECS", value_parser = parse_timeout)]
    pub timeout: Option<Duration>,

    /// Print the raw layout string
    #[arg(short = 'x', long)]
    pub raw: bool,

    /// Print the server's descriptive group name instead of the layout
    #[arg(short = 'f', long)]
    pub fancy: bool,

    /// Print debug information (repeat for more)
    #[arg(short = 'd', long, action = ArgAction::Count)]
    pub debug: u8,

    /// Read configuration from PATH
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// X display to connect to
    #[arg(long, value_name = "NAME")]
    pub display: Option<String>,

    /// Where the layout list is read from
    #[arg(long, value_enum)]
    pub source: Option<LayoutSource>,

    /// Show version number
    #[arg(short = 'v', long, action = ArgAction::Version)]
    version: Option<bool>,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid number of seconds: {:?}", s))?;
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid timeout {:?}: {}", s, e))
}

/// How long to block on group changes before running the actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Run the actions immediately.
    None,
    /// Wait for one change, then run the actions once.
    Once,
    /// Run the actions after every change, forever.
    Forever,
}

/// An ordered set of actions derived from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub wait: WaitMode,
    pub timeout: Option<Duration>,
    pub actions: Vec<Command>,
}

/// The flags do not form a valid request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("Invalid flag combination. Try --help.")]
    InvalidCombination,
    #[error("Argument expected for --set.")]
    MissingArgument,
    #[error("--timeout needs --wait or --longwait.")]
    TimeoutWithoutWait,
}

impl Plan {
    /// Validate the flags and put the requested actions in execution order:
    /// raw string, next or set, print, list.
    pub fn from_cli(cli: &Cli) -> Result<Self, UsageError> {
        if cli.set.as_deref() == Some("") {
            return Err(UsageError::MissingArgument);
        }

        let requested = [
            cli.set.is_some(),
            cli.list,
            cli.print,
            cli.next,
            cli.wait,
            cli.longwait,
            cli.raw,
        ]
        .iter()
        .filter(|f| **f)
        .count();

        let exclusive = cli.set.is_some() || cli.list || cli.next || cli.longwait;
        if exclusive && requested != 1 {
            return Err(UsageError::InvalidCombination);
        }
        if cli.timeout.is_some() && !(cli.wait || cli.longwait) {
            return Err(UsageError::TimeoutWithoutWait);
        }

        let wait = if cli.longwait {
            WaitMode::Forever
        } else if cli.wait {
            WaitMode::Once
        } else {
            WaitMode::None
        };

        let mut actions = Vec::new();
        if cli.raw {
            actions.push(Command::PrintRaw);
        }
        if cli.next {
            actions.push(Command::Next);
        } else if let Some(name) = &cli.set {
            actions.push(Command::Set(name.clone()));
        }
        if cli.print || cli.longwait || requested == 0 {
            actions.push(Command::Print { fancy: cli.fancy });
        }
        if cli.list {
            actions.push(Command::List);
        }

        Ok(Plan {
            wait,
            timeout: cli.timeout,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(args: &[&str]) -> Result<Plan, UsageError> {
        let cli = Cli::try_parse_from(std::iter::once("xkb-switch").chain(args.iter().copied()))
            .expect("clap should accept these flags");
        Plan::from_cli(&cli)
    }

    #[test]
    fn no_flags_prints_current() {
        let p = plan(&[]).unwrap();
        assert_eq!(p.wait, WaitMode::None);
        assert_eq!(p.actions, vec![Command::Print { fancy: false }]);
    }

    #[test]
    fn fancy_alone_still_prints() {
        let p = plan(&["-f"]).unwrap();
        assert_eq!(p.actions, vec![Command::Print { fancy: true }]);
    }

    #[test]
    fn set_takes_a_name() {
        let p = plan(&["-s", "de(qwerty)"]).unwrap();
        assert_eq!(p.actions, vec![Command::Set("de(qwerty)".into())]);
        let p = plan(&["--set", "ru"]).unwrap();
        assert_eq!(p.actions, vec![Command::Set("ru".into())]);
    }

    #[test]
    fn set_with_empty_name_is_rejected() {
        assert_eq!(plan(&["-s", ""]), Err(UsageError::MissingArgument));
    }

    #[test]
    fn exclusive_flags_must_be_alone() {
        assert_eq!(plan(&["-l", "-p"]), Err(UsageError::InvalidCombination));
        assert_eq!(plan(&["-n", "-s", "us"]), Err(UsageError::InvalidCombination));
        assert_eq!(plan(&["-W", "-w"]), Err(UsageError::InvalidCombination));
        assert_eq!(plan(&["-s", "us", "-x"]), Err(UsageError::InvalidCombination));
    }

    #[test]
    fn wait_then_print() {
        let p = plan(&["-w", "-p"]).unwrap();
        assert_eq!(p.wait, WaitMode::Once);
        assert_eq!(p.actions, vec![Command::Print { fancy: false }]);
    }

    #[test]
    fn wait_alone_has_no_actions() {
        let p = plan(&["--wait"]).unwrap();
        assert_eq!(p.wait, WaitMode::Once);
        assert!(p.actions.is_empty());
    }

    #[test]
    fn longwait_prints_forever() {
        let p = plan(&["-W", "-f"]).unwrap();
        assert_eq!(p.wait, WaitMode::Forever);
        assert_eq!(p.actions, vec![Command::Print { fancy: true }]);
    }

    #[test]
    fn raw_comes_before_print() {
        let p = plan(&["-x", "-p"]).unwrap();
        assert_eq!(p.actions, vec![Command::PrintRaw, Command::Print { fancy: false }]);
        let p = plan(&["-x"]).unwrap();
        assert_eq!(p.actions, vec![Command::PrintRaw]);
    }

    #[test]
    fn timeout_requires_a_wait() {
        assert_eq!(plan(&["-t", "2"]), Err(UsageError::TimeoutWithoutWait));
        let p = plan(&["-w", "-t", "0.5"]).unwrap();
        assert_eq!(p.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn bad_timeout_rejected_by_clap() {
        assert!(Cli::try_parse_from(["xkb-switch", "-w", "-t", "soon"]).is_err());
        assert!(Cli::try_parse_from(["xkb-switch", "-w", "-t", "-1"]).is_err());
    }

    #[test]
    fn debug_is_counted() {
        let cli = Cli::try_parse_from(["xkb-switch", "-d", "-d"]).unwrap();
        assert_eq!(cli.debug, 2);
    }

    #[test]
    fn source_override_parses() {
        let cli = Cli::try_parse_from(["xkb-switch", "--source", "symbols"]).unwrap();
        assert_eq!(cli.source, Some(LayoutSource::Symbols));
    }

    #[test]
    fn command_display() {
        assert_eq!(Command::Set("us".into()).to_string(), "set us");
        assert_eq!(Command::Print { fancy: true }.to_string(), "print --fancy");
    }
}
