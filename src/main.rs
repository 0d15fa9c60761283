//! Entry point for the **xkb-switch** command.
//!
//! Parses the flags into a [`Plan`], opens the X session and runs the
//! planned actions.  Waiting for group changes happens on a background
//! thread with its own connection, so `--timeout` can bound it.
//!
//! Exit status is `0` on success and `2` on any error.

use clap::Parser;
use log::{debug, info};
use std::path::{Path, PathBuf};
use xkb_switch::command::{Cli, Plan, UsageError};
use xkb_switch::config::{Config, ConfigError};
use xkb_switch::switcher::SwitcherError;

#[cfg(feature = "x11")]
use xkb_switch::{switcher::LayoutSwitcher, traits::KeyboardSession, x11::session::X11SessionError};

/// Every error that ends the program.
#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Usage(#[from] UsageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Switcher(#[from] SwitcherError),
    #[cfg(feature = "x11")]
    #[error(transparent)]
    Session(#[from] X11SessionError),
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
    #[allow(dead_code)]
    #[error("xkb-switch was built without the `x11` feature")]
    NoBackend,
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/xkb-switch`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("xkb-switch")
}

/// Load the config given on the command line, or try
/// `$XDG_CONFIG_HOME/xkb-switch/config.json` and fall back to defaults.
fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    if let Some(path) = explicit {
        let cfg = Config::load(path)?;
        info!("loaded config from {}", path.display());
        return Ok(cfg);
    }

    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            Ok(cfg)
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Ok(Config::default())
        }
    }
}

fn init_logging(debug: u8) {
    let level = match debug {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

#[cfg(feature = "x11")]
fn print_lines(lines: &[String]) -> Result<(), std::io::Error> {
    use std::io::Write;

    let mut out = std::io::stdout().lock();
    for line in lines {
        writeln!(out, "{}", line)?;
    }
    out.flush()
}

//  Main

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);
    debug!("xkb-switch version {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&cli) {
        eprintln!("xkb-switch: {}", e);
        std::process::exit(2);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    let plan = Plan::from_cli(cli)?;
    debug!("plan: {:?}", plan);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(source) = cli.source {
        config.session.source = source;
    }
    if let Some(display) = &cli.display {
        config.session.display = Some(display.clone());
    }

    run_plan(&plan, &config)
}

#[cfg(not(feature = "x11"))]
fn run_plan(_plan: &Plan, _config: &Config) -> Result<(), AppError> {
    Err(AppError::NoBackend)
}

#[cfg(feature = "x11")]
fn run_plan(plan: &Plan, config: &Config) -> Result<(), AppError> {
    use xkb_switch::x11::session::X11Session;

    let display = config.session.display.as_deref();
    let mut switcher = LayoutSwitcher::new(X11Session::connect(display)?, config);

    let result = wait_and_execute(&mut switcher, plan, display);
    if result.is_err() {
        if let Some(layouts) = switcher.cached() {
            debug!("layouts: {}", layouts);
        }
    }
    result
}

#[cfg(feature = "x11")]
fn wait_and_execute<S: KeyboardSession>(
    switcher: &mut LayoutSwitcher<S>,
    plan: &Plan,
    display: Option<&str>,
) -> Result<(), AppError> {
    use watch::GroupWatch;
    use xkb_switch::command::WaitMode;

    match plan.wait {
        WaitMode::None => execute(switcher, plan),
        WaitMode::Once => {
            let mut watch = GroupWatch::spawn(display)?;
            let change = watch.next(plan.timeout)?;
            info!("group changed to {}", change.group);
            switcher.invalidate();
            execute(switcher, plan)
        }
        WaitMode::Forever => {
            let mut watch = GroupWatch::spawn(display)?;
            loop {
                let change = watch.next(plan.timeout)?;
                info!("group changed to {}", change.group);
                switcher.invalidate();
                execute(switcher, plan)?;
            }
        }
    }
}

#[cfg(feature = "x11")]
fn execute<S: KeyboardSession>(
    switcher: &mut LayoutSwitcher<S>,
    plan: &Plan,
) -> Result<(), AppError> {
    for cmd in &plan.actions {
        let lines = switcher.handle(cmd)?;
        print_lines(&lines)?;
    }
    Ok(())
}

//  Group-change watch

#[cfg(feature = "x11")]
mod watch {
    use super::AppError;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread::JoinHandle;
    use std::time::Duration;
    use xkb_switch::command::GroupChange;
    use xkb_switch::events::SessionEventSource;
    use xkb_switch::switcher::SwitcherError;
    use xkb_switch::traits::GroupEventSource;
    use xkb_switch::x11::session::{X11Session, X11SessionError};

    /// Group changes delivered from a background thread that owns its own
    /// X connection.
    pub struct GroupWatch {
        rx: mpsc::Receiver<GroupChange>,
        handle: Option<JoinHandle<Result<(), X11SessionError>>>,
    }

    impl GroupWatch {
        /// Connect on the calling thread so connection errors surface here,
        /// then start waiting on a new thread.
        pub fn spawn(display: Option<&str>) -> Result<Self, AppError> {
            let session = X11Session::connect(display)?;
            let (tx, rx) = mpsc::channel();
            let handle = std::thread::spawn(move || SessionEventSource::new(session).run(tx));
            Ok(Self {
                rx,
                handle: Some(handle),
            })
        }

        /// The next change, waiting at most `timeout` if one is given.
        pub fn next(&mut self, timeout: Option<Duration>) -> Result<GroupChange, AppError> {
            let received = match timeout {
                Some(t) => self.rx.recv_timeout(t),
                None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(change) => Ok(change),
                Err(RecvTimeoutError::Timeout) => Err(SwitcherError::Timeout.into()),
                Err(RecvTimeoutError::Disconnected) => Err(self.stopped()),
            }
        }

        /// Collect the reason the watch thread ended.
        fn stopped(&mut self) -> AppError {
            match self.handle.take().map(JoinHandle::join) {
                Some(Ok(Err(e))) => e.into(),
                _ => SwitcherError::Session("group watch stopped".into()).into(),
            }
        }
    }
}
