//! [`GroupEventSource`] built on any [`KeyboardSession`].
//!
//! The session's wait primitive blocks without a timeout.  Running it inside
//! a source on its own thread lets the caller bound the wait with
//! [`mpsc::Receiver::recv_timeout`]:
//!
//! ```ignore
//! let (tx, rx) = mpsc::channel();
//! let mut source = SessionEventSource::new(X11Session::connect(None)?);
//! std::thread::spawn(move || source.run(tx));
//! let change = rx.recv_timeout(Duration::from_secs(5))?;
//! ```

use crate::command::GroupChange;
use crate::traits::{GroupEventSource, KeyboardSession};
use log::{debug, info};
use std::sync::mpsc;

/// Forwards every group change observed on a session.
pub struct SessionEventSource<S> {
    session: S,
}

impl<S: KeyboardSession + Send> SessionEventSource<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: KeyboardSession + Send> GroupEventSource for SessionEventSource<S> {
    type Error = S::Error;

    /// Wait for changes until the receiver goes away or the session fails.
    fn run(&mut self, sink: mpsc::Sender<GroupChange>) -> Result<(), Self::Error> {
        loop {
            self.session.wait_for_group_change()?;
            let group = self.session.current_group()?;
            debug!("group changed to {}", group);
            if sink.send(GroupChange { group }).is_err() {
                info!("sink closed, stopping group watch");
                return Ok(());
            }
        }
    }
}
