//! **xkb-switch**: query and switch the active XKB layout group.
//!
//! An X session can have up to four keyboard layouts ("groups") configured.
//! The server only reports the active one as an integer, so the interesting
//! work is recovering the *names* of the configured layouts from the XKB
//! configuration strings and lining them up with group numbers.
//!
//! # Architecture
//!
//! * [`parser`] turns configuration strings into a [`layout::LayoutList`].
//!   It is pure and has no dependency on X11.
//! * [`traits::KeyboardSession`] abstracts the window system so the
//!   [`switcher::LayoutSwitcher`] is not coupled to X11.
//! * [`traits::GroupEventSource`] abstracts waiting for group changes;
//!   [`events::SessionEventSource`] adapts any session so the wait can run on
//!   its own thread.
//!
//! The concrete X11 backend lives in [`x11`] behind the `x11` feature.

pub mod command;
pub mod config;
pub mod events;
pub mod layout;
pub mod parser;
pub mod switcher;
pub mod traits;
#[cfg(feature = "x11")]
pub mod x11;
