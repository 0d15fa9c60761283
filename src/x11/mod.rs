//! X11-specific implementations.
//!
//! This module provides the concrete [`KeyboardSession`](crate::traits::KeyboardSession)
//! backend, speaking the XKB extension through `x11rb`.
//!
//! Nothing outside this module should reference X11 directly.

pub mod session;
