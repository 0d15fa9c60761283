//! Core traits that decouple xkb-switch from the window system.
//!
//! The [`LayoutSwitcher`](crate::switcher::LayoutSwitcher) only talks to a
//! [`KeyboardSession`]; the X11 backend lives in [`x11`](crate::x11) and the
//! tests use recording mocks.

use crate::command::GroupChange;
use crate::layout::LayoutVariant;
use std::sync::mpsc;

/// Abstraction over a keyboard session that can report and lock the active
/// layout group.
///
/// Group numbers are zero-based and only meaningful relative to the layout
/// list derived from the same session.
pub trait KeyboardSession {
    /// The error type produced by this session.
    type Error: std::error::Error + Send + 'static;

    /// The raw symbol-atom string, e.g. `pc+us+ru:2+inet(evdev)`.
    fn symbols(&self) -> Result<String, Self::Error>;

    /// The layout and variant lists from the rules-names property.
    fn layout_variant(&self) -> Result<LayoutVariant, Self::Error>;

    /// Index of the currently locked group.
    fn current_group(&self) -> Result<usize, Self::Error>;

    /// Lock `group` as the active group.
    fn set_current_group(&self, group: usize) -> Result<(), Self::Error>;

    /// Block until the active group changes.
    ///
    /// There is no timeout; callers that need one run the wait on another
    /// thread (see [`GroupEventSource`]).
    fn wait_for_group_change(&self) -> Result<(), Self::Error>;

    /// Descriptive name the server holds for `group`, e.g. `English (US)`.
    fn group_name(&self, group: usize) -> Result<String, Self::Error>;
}

/// A source of [`GroupChange`] notifications.
///
/// # Contract
///
/// * [`run`](GroupEventSource::run) **blocks** until the sink is closed or
///   an unrecoverable error occurs.
/// * Each observed change is sent through `sink` once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait GroupEventSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start waiting and forward every change into `sink`.
    fn run(&mut self, sink: mpsc::Sender<GroupChange>) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    /// A test double that records every group it is asked to lock.
    #[derive(Debug, Default)]
    struct MockSession {
        group: Cell<usize>,
        locks: RefCell<Vec<usize>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("mock error")]
    struct MockError;

    impl KeyboardSession for MockSession {
        type Error = MockError;

        fn symbols(&self) -> Result<String, MockError> {
            Ok("pc+us+ru:2".into())
        }

        fn layout_variant(&self) -> Result<LayoutVariant, MockError> {
            Ok(LayoutVariant {
                layout: "us,ru".into(),
                variant: String::new(),
            })
        }

        fn current_group(&self) -> Result<usize, MockError> {
            Ok(self.group.get())
        }

        fn set_current_group(&self, group: usize) -> Result<(), MockError> {
            self.locks.borrow_mut().push(group);
            self.group.set(group);
            Ok(())
        }

        fn wait_for_group_change(&self) -> Result<(), MockError> {
            Err(MockError)
        }

        fn group_name(&self, _group: usize) -> Result<String, MockError> {
            Err(MockError)
        }
    }

    #[test]
    fn mock_session_records_locks() {
        let s = MockSession::default();
        s.set_current_group(1).unwrap();
        assert_eq!(s.current_group().unwrap(), 1);
        assert_eq!(*s.locks.borrow(), vec![1]);
    }

    /// A test double that emits a fixed sequence of changes.
    struct MockSource {
        changes: Vec<GroupChange>,
    }

    impl GroupEventSource for MockSource {
        type Error = MockError;

        fn run(&mut self, sink: mpsc::Sender<GroupChange>) -> Result<(), MockError> {
            for change in self.changes.drain(..) {
                let _ = sink.send(change);
            }
            Ok(())
        }
    }

    #[test]
    fn mock_source_emits_changes() {
        let mut src = MockSource {
            changes: vec![GroupChange { group: 1 }, GroupChange { group: 0 }],
        };
        let (tx, rx) = mpsc::channel();
        src.run(tx).unwrap();
        let got: Vec<GroupChange> = rx.try_iter().collect();
        assert_eq!(got, vec![GroupChange { group: 1 }, GroupChange { group: 0 }]);
    }
}
