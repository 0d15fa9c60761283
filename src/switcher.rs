//! The orchestrator that ties the session, the parser and the commands
//! together.
//!
//! [`LayoutSwitcher`] owns a [`KeyboardSession`] and a cached
//! [`LayoutList`].  The cache is filled on first use and only dropped when
//! the caller asks for it, e.g. after a group-change notification.

use crate::command::Command;
use crate::config::{Config, LayoutSource};
use crate::layout::{LayoutError, LayoutList};
use crate::parser::{parse_layout_variant, SymbolParser};
use crate::traits::KeyboardSession;
use log::{debug, info};

/// Possible errors from the switcher.
#[derive(Debug, thiserror::Error)]
pub enum SwitcherError {
    /// The keyboard session failed or is unavailable.
    #[error("keyboard session error: {0}")]
    Session(String),

    /// The session's group has no entry in the layout list.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// `set` was given a name that is not configured.
    #[error("Group '{0}' is not supported by current layout. Try xkb-switch -l.")]
    UnknownLayout(String),

    /// The configuration yields no layouts at all.
    #[error("No layout groups configured")]
    NoLayouts,

    /// A bounded wait expired before the group changed.
    #[error("timed out waiting for a group change")]
    Timeout,
}

/// Reports and switches layout groups on a [`KeyboardSession`].
///
/// # Typical usage
///
/// ```ignore
/// let session = X11Session::connect(None)?;
/// let mut switcher = LayoutSwitcher::new(session, &Config::default());
/// switcher.set("de(qwerty)")?;
/// println!("{}", switcher.current()?);
/// ```
pub struct LayoutSwitcher<S: KeyboardSession> {
    session: S,
    parser: SymbolParser,
    source: LayoutSource,
    layouts: Option<LayoutList>,
}

impl<S: KeyboardSession> LayoutSwitcher<S> {
    pub fn new(session: S, config: &Config) -> Self {
        Self {
            session,
            parser: config.parser.build(),
            source: config.session.source,
            layouts: None,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    /// The cached list, if one has been fetched.
    pub fn cached(&self) -> Option<&LayoutList> {
        self.layouts.as_ref()
    }

    /// The configured layouts, fetched from the session on first use.
    pub fn layouts(&mut self) -> Result<&LayoutList, SwitcherError> {
        if self.layouts.is_none() {
            let list = self.fetch()?;
            info!("{} layout(s) configured: {}", list.len(), list);
            self.layouts = Some(list);
        }
        Ok(self.layouts.get_or_insert_with(LayoutList::default))
    }

    /// Drop the cached list so the next query re-reads the session.
    pub fn invalidate(&mut self) {
        self.layouts = None;
    }

    /// Re-read the layouts from the session.
    pub fn refresh(&mut self) -> Result<&LayoutList, SwitcherError> {
        self.invalidate();
        self.layouts()
    }

    /// The raw string the layout list is parsed from.
    pub fn raw_layout_string(&self) -> Result<String, SwitcherError> {
        match self.source {
            LayoutSource::Rules => Ok(self.session.layout_variant().map_err(session_err)?.to_string()),
            LayoutSource::Symbols => self.session.symbols().map_err(session_err),
        }
    }

    /// Index of the active group.
    pub fn current_group(&self) -> Result<usize, SwitcherError> {
        self.session.current_group().map_err(session_err)
    }

    /// Name of the active layout.
    pub fn current(&mut self) -> Result<String, SwitcherError> {
        let group = self.current_group()?;
        let layouts = self.layouts()?;
        Ok(layouts.get(group)?.to_string())
    }

    /// The server's descriptive name for the active group.
    pub fn current_long_name(&self) -> Result<String, SwitcherError> {
        let group = self.current_group()?;
        self.session.group_name(group).map_err(session_err)
    }

    /// Lock the group whose layout renders as `name`.  Returns the group.
    pub fn set(&mut self, name: &str) -> Result<usize, SwitcherError> {
        let group = self
            .layouts()?
            .position(name)
            .filter(|_| !name.is_empty())
            .ok_or_else(|| SwitcherError::UnknownLayout(name.to_string()))?;
        info!("set group {} ({})", group, name);
        self.session.set_current_group(group).map_err(session_err)?;
        Ok(group)
    }

    /// Lock the group after the active one, wrapping to the first.
    /// Returns the name of the new layout.
    pub fn next(&mut self) -> Result<String, SwitcherError> {
        let current = self.current_group()?;
        let layouts = self.layouts()?;
        if layouts.is_empty() {
            return Err(SwitcherError::NoLayouts);
        }
        let group = layouts
            .next_after(current)
            .ok_or(LayoutError::GroupIndexOutOfRange {
                group: current,
                len: layouts.len(),
            })?;
        let name = layouts.get(group)?.to_string();
        info!("next: group {} -> {} ({})", current, group, name);
        self.session.set_current_group(group).map_err(session_err)?;
        Ok(name)
    }

    /// Block until the active group changes.
    pub fn wait(&self) -> Result<(), SwitcherError> {
        self.session.wait_for_group_change().map_err(session_err)
    }

    /// Run a single [`Command`] and return the lines it prints.
    pub fn handle(&mut self, cmd: &Command) -> Result<Vec<String>, SwitcherError> {
        debug!("handle {}", cmd);
        match cmd {
            Command::PrintRaw => Ok(vec![self.raw_layout_string()?]),
            Command::Next => {
                self.next()?;
                Ok(Vec::new())
            }
            Command::Set(name) => {
                self.set(name)?;
                Ok(Vec::new())
            }
            Command::Print { fancy: false } => Ok(vec![self.current()?]),
            Command::Print { fancy: true } => Ok(vec![self.current_long_name()?]),
            Command::List => Ok(self.layouts()?.names()),
        }
    }

    fn fetch(&self) -> Result<LayoutList, SwitcherError> {
        match self.source {
            LayoutSource::Rules => {
                let lv = self.session.layout_variant().map_err(session_err)?;
                debug!("layout {:?}, variant {:?}", lv.layout, lv.variant);
                Ok(parse_layout_variant(&lv.layout, &lv.variant))
            }
            LayoutSource::Symbols => {
                let symbols = self.session.symbols().map_err(session_err)?;
                debug!("symbols {:?}", symbols);
                Ok(self.parser.parse(&symbols))
            }
        }
    }
}

fn session_err<E: std::error::Error>(e: E) -> SwitcherError {
    SwitcherError::Session(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutVariant;
    use std::cell::{Cell, RefCell};

    /// Record-keeping mock session.
    #[derive(Debug)]
    struct RecorderSession {
        symbols: RefCell<String>,
        layout: RefCell<String>,
        variant: RefCell<String>,
        group: Cell<usize>,
        locks: RefCell<Vec<usize>>,
        reads: Cell<usize>,
        fail: bool,
    }

    impl RecorderSession {
        fn new(layout: &str, variant: &str) -> Self {
            Self {
                symbols: RefCell::new(
                    "pc+us+sk(qwerty):2+at:3+inet(evdev)+group(alt_shift_toggle)".into(),
                ),
                layout: RefCell::new(layout.into()),
                variant: RefCell::new(variant.into()),
                group: Cell::new(0),
                locks: RefCell::new(Vec::new()),
                reads: Cell::new(0),
                fail: false,
            }
        }

        fn broken() -> Self {
            Self {
                fail: true,
                ..Self::new("us", "")
            }
        }
    }

    #[derive(Debug, thiserror::Error)]
    #[error("recorder error")]
    struct RecorderErr;

    impl KeyboardSession for RecorderSession {
        type Error = RecorderErr;

        fn symbols(&self) -> Result<String, RecorderErr> {
            if self.fail {
                return Err(RecorderErr);
            }
            self.reads.set(self.reads.get() + 1);
            Ok(self.symbols.borrow().clone())
        }

        fn layout_variant(&self) -> Result<LayoutVariant, RecorderErr> {
            if self.fail {
                return Err(RecorderErr);
            }
            self.reads.set(self.reads.get() + 1);
            Ok(LayoutVariant {
                layout: self.layout.borrow().clone(),
                variant: self.variant.borrow().clone(),
            })
        }

        fn current_group(&self) -> Result<usize, RecorderErr> {
            if self.fail {
                return Err(RecorderErr);
            }
            Ok(self.group.get())
        }

        fn set_current_group(&self, group: usize) -> Result<(), RecorderErr> {
            self.locks.borrow_mut().push(group);
            self.group.set(group);
            Ok(())
        }

        fn wait_for_group_change(&self) -> Result<(), RecorderErr> {
            Ok(())
        }

        fn group_name(&self, group: usize) -> Result<String, RecorderErr> {
            match group {
                0 => Ok("English (US)".into()),
                1 => Ok("German".into()),
                _ => Err(RecorderErr),
            }
        }
    }

    fn switcher(layout: &str, variant: &str) -> LayoutSwitcher<RecorderSession> {
        LayoutSwitcher::new(RecorderSession::new(layout, variant), &Config::default())
    }

    fn symbols_switcher() -> LayoutSwitcher<RecorderSession> {
        let mut config = Config::default();
        config.session.source = LayoutSource::Symbols;
        LayoutSwitcher::new(RecorderSession::new("", ""), &config)
    }

    #[test]
    fn current_reads_layout_for_group() {
        let mut s = switcher("us,de", ",qwerty");
        assert_eq!(s.current().unwrap(), "us");
        s.session().group.set(1);
        assert_eq!(s.current().unwrap(), "de(qwerty)");
    }

    #[test]
    fn layouts_are_cached_until_invalidated() {
        let mut s = switcher("us,de", "");
        assert!(s.cached().is_none());
        s.layouts().unwrap();
        s.layouts().unwrap();
        s.current().unwrap();
        assert_eq!(s.session().reads.get(), 1);

        *s.session().layout.borrow_mut() = "us,de,ru".into();
        assert_eq!(s.layouts().unwrap().len(), 2);
        s.invalidate();
        assert_eq!(s.layouts().unwrap().len(), 3);
        assert_eq!(s.refresh().unwrap().len(), 3);
        assert_eq!(s.session().reads.get(), 3);
    }

    #[test]
    fn symbols_source_uses_the_parser() {
        let mut s = symbols_switcher();
        assert_eq!(s.layouts().unwrap().names(), ["us", "sk(qwerty)", "at"]);
        assert_eq!(
            s.raw_layout_string().unwrap(),
            "pc+us+sk(qwerty):2+at:3+inet(evdev)+group(alt_shift_toggle)"
        );
    }

    #[test]
    fn raw_string_for_rules_source() {
        let s = switcher("us,de", ",qwerty");
        assert_eq!(s.raw_layout_string().unwrap(), "layout=us,de variant=,qwerty");
    }

    #[test]
    fn set_locks_named_group() {
        let mut s = switcher("us,de,ru", ",qwerty,");
        assert_eq!(s.set("de(qwerty)").unwrap(), 1);
        assert_eq!(s.set("ru").unwrap(), 2);
        assert_eq!(*s.session().locks.borrow(), vec![1, 2]);
    }

    #[test]
    fn set_unknown_name_fails_without_locking() {
        let mut s = switcher("us,de", ",qwerty");
        let err = s.set("de").unwrap_err();
        assert!(matches!(err, SwitcherError::UnknownLayout(ref n) if n == "de"));
        assert!(matches!(s.set(""), Err(SwitcherError::UnknownLayout(_))));
        assert!(s.session().locks.borrow().is_empty());
    }

    #[test]
    fn next_wraps_around() {
        let mut s = switcher("us,de,ru", "");
        assert_eq!(s.next().unwrap(), "de");
        assert_eq!(s.next().unwrap(), "ru");
        assert_eq!(s.next().unwrap(), "us");
        assert_eq!(*s.session().locks.borrow(), vec![1, 2, 0]);
    }

    #[test]
    fn next_on_empty_list_fails() {
        let mut s = switcher("", "");
        assert!(matches!(s.next(), Err(SwitcherError::NoLayouts)));
    }

    #[test]
    fn group_out_of_range_is_reported() {
        let mut s = switcher("us,de", "");
        s.session().group.set(5);
        let err = s.current().unwrap_err();
        assert!(matches!(
            err,
            SwitcherError::Layout(LayoutError::GroupIndexOutOfRange { group: 5, len: 2 })
        ));
    }

    #[test]
    fn next_from_unknown_group_fails_without_locking() {
        let mut s = switcher("us,de", "");
        s.session().group.set(5);
        let err = s.next().unwrap_err();
        assert!(matches!(
            err,
            SwitcherError::Layout(LayoutError::GroupIndexOutOfRange { group: 5, len: 2 })
        ));
        assert!(s.session().locks.borrow().is_empty());
    }

    #[test]
    fn session_failure_surfaces() {
        let mut s = LayoutSwitcher::new(RecorderSession::broken(), &Config::default());
        let err = s.current().unwrap_err();
        assert_eq!(err.to_string(), "keyboard session error: recorder error");
        assert!(s.cached().is_none());
    }

    #[test]
    fn handle_list_and_print() {
        let mut s = switcher("us,de", ",qwerty");
        assert_eq!(s.handle(&Command::List).unwrap(), ["us", "de(qwerty)"]);
        assert_eq!(s.handle(&Command::Print { fancy: false }).unwrap(), ["us"]);
        assert_eq!(s.handle(&Command::Print { fancy: true }).unwrap(), ["English (US)"]);
    }

    #[test]
    fn handle_set_then_print() {
        let mut s = switcher("us,de", "");
        assert!(s.handle(&Command::Set("de".into())).unwrap().is_empty());
        assert_eq!(s.handle(&Command::Print { fancy: false }).unwrap(), ["de"]);
        assert_eq!(s.handle(&Command::Print { fancy: true }).unwrap(), ["German"]);
    }

    #[test]
    fn handle_next_prints_nothing() {
        let mut s = switcher("us,de", "");
        assert!(s.handle(&Command::Next).unwrap().is_empty());
        assert_eq!(s.current_group().unwrap(), 1);
    }

    #[test]
    fn wait_delegates_to_session() {
        let s = switcher("us", "");
        s.wait().unwrap();
    }
}
