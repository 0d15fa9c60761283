//! [`KeyboardSession`] implementation backed by the X Keyboard Extension.
//!
//! Talks to the X server through `x11rb`'s pure-Rust connection, so no Xlib
//! or libxkbfile is needed at runtime.  The layout configuration is read from
//! two places:
//!
//! * the `_XKB_RULES_NAMES` property on the root window (layout and variant
//!   lists), and
//! * the symbols name of the core keyboard description (the `+`-joined
//!   symbol-atom string).

use crate::layout::LayoutVariant;
use crate::traits::KeyboardSession;
use log::{debug, trace};
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError};
use x11rb::protocol::xkb::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{self, AtomEnum, ConnectionExt as _, Window};
use x11rb::protocol::Event;
use x11rb::rust_connection::RustConnection;

/// Root-window property holding rules, model, layout, variant and options.
const RULES_NAMES_PROPERTY: &[u8] = b"_XKB_RULES_NAMES";

/// Maximum property length requested, in 32-bit units.
const RULES_NAMES_MAX_LEN: u32 = 1024;

/// XKB supports at most four groups.
const MAX_GROUPS: u8 = 4;

/// An open connection to an X server with the XKB extension initialised.
///
/// All queries target the core keyboard.
pub struct X11Session {
    conn: RustConnection,
    root: Window,
    device: xkb::DeviceSpec,
}

/// Errors that can occur when talking to the X server.
#[derive(Debug, thiserror::Error)]
pub enum X11SessionError {
    #[error("cannot open display: {0}")]
    Connect(#[from] ConnectError),
    #[error("X11 connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("X11 request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("{0}")]
    Xkb(String),
}

impl X11Session {
    /// Open `display` (or `$DISPLAY` when `None`) and negotiate XKB 1.0.
    pub fn connect(display: Option<&str>) -> Result<Self, X11SessionError> {
        let (conn, screen) = RustConnection::connect(display)?;
        let root = conn
            .setup()
            .roots
            .get(screen)
            .map(|s| s.root)
            .ok_or_else(|| X11SessionError::Xkb(format!("screen {} does not exist", screen)))?;

        let version = conn.xkb_use_extension(1, 0)?.reply()?;
        if !version.supported {
            return Err(X11SessionError::Xkb(format!(
                "XKB 1.0 not supported (server has {}.{})",
                version.server_major, version.server_minor
            )));
        }
        debug!(
            "connected to screen {}, XKB {}.{}",
            screen, version.server_major, version.server_minor
        );

        Ok(Self {
            conn,
            root,
            device: xkb::ID::USE_CORE_KBD.into(),
        })
    }

    fn atom_name(&self, atom: xproto::Atom) -> Result<String, X11SessionError> {
        let reply = self.conn.get_atom_name(atom)?.reply()?;
        String::from_utf8(reply.name)
            .map_err(|e| X11SessionError::Xkb(format!("atom name is not UTF-8: {}", e)))
    }
}

impl KeyboardSession for X11Session {
    type Error = X11SessionError;

    fn symbols(&self) -> Result<String, Self::Error> {
        let reply = self
            .conn
            .xkb_get_names(self.device, xkb::NameDetail::SYMBOLS)?
            .reply()?;
        let atom = reply
            .value_list
            .symbols_name
            .filter(|a| *a != x11rb::NONE)
            .ok_or_else(|| X11SessionError::Xkb("keyboard has no symbols name".into()))?;
        let symbols = self.atom_name(atom)?;
        debug!("raw symbols {:?}", symbols);
        Ok(symbols)
    }

    fn layout_variant(&self) -> Result<LayoutVariant, Self::Error> {
        let atom = self
            .conn
            .intern_atom(true, RULES_NAMES_PROPERTY)?
            .reply()?
            .atom;
        if atom == x11rb::NONE {
            return Err(X11SessionError::Xkb(
                "Failed to get keyboard properties: _XKB_RULES_NAMES is not set".into(),
            ));
        }

        let reply = self
            .conn
            .get_property(false, self.root, atom, AtomEnum::STRING, 0, RULES_NAMES_MAX_LEN)?
            .reply()?;
        if reply.value.is_empty() {
            return Err(X11SessionError::Xkb(
                "Failed to get keyboard properties: _XKB_RULES_NAMES is empty".into(),
            ));
        }

        let lv = LayoutVariant::from_rules_property(&reply.value);
        debug!("raw layout {:?}, variant {:?}", lv.layout, lv.variant);
        Ok(lv)
    }

    fn current_group(&self) -> Result<usize, Self::Error> {
        let state = self.conn.xkb_get_state(self.device)?.reply()?;
        Ok(usize::from(u8::from(state.group)))
    }

    fn set_current_group(&self, group: usize) -> Result<(), Self::Error> {
        let lock = u8::try_from(group)
            .ok()
            .filter(|g| *g < MAX_GROUPS)
            .ok_or_else(|| X11SessionError::Xkb(format!("group {} is out of range", group)))?;
        let no_mods = xproto::ModMask::from(0u8);
        self.conn
            .xkb_latch_lock_state(
                self.device,
                no_mods,
                no_mods,
                true,
                xkb::Group::from(lock),
                no_mods,
                false,
                0,
            )?
            .check()?;
        debug!("locked group {}", lock);
        Ok(())
    }

    fn wait_for_group_change(&self) -> Result<(), Self::Error> {
        let none = xkb::EventType::from(0u8);
        self.conn
            .xkb_select_events(
                self.device,
                none,
                xkb::EventType::STATE_NOTIFY,
                xkb::MapPart::from(0u8),
                xkb::MapPart::from(0u8),
                &xkb::SelectEventsAux::new(),
            )?
            .check()?;

        let group_state = u16::from(xkb::StatePart::GROUP_STATE);
        loop {
            match self.conn.wait_for_event()? {
                Event::XkbStateNotify(ev) if u16::from(ev.changed) & group_state != 0 => {
                    debug!("state notify: group {}", u8::from(ev.group));
                    return Ok(());
                }
                other => trace!("ignoring event {:?}", other),
            }
        }
    }

    fn group_name(&self, group: usize) -> Result<String, Self::Error> {
        let reply = self
            .conn
            .xkb_get_names(self.device, xkb::NameDetail::GROUP_NAMES)?
            .reply()?;
        let atom = named_group_slot(u8::from(reply.group_names), group)
            .and_then(|slot| reply.value_list.groups.unwrap_or_default().get(slot).copied())
            .filter(|a| *a != x11rb::NONE)
            .ok_or_else(|| X11SessionError::Xkb("Group index out of range.".into()))?;
        self.atom_name(atom)
    }
}

/// Position of `group`'s atom in a GetNames `groups` list.
///
/// The server only sends atoms for groups whose bit is set in `mask`, so
/// the slot is the number of named groups below `group`.
fn named_group_slot(mask: u8, group: usize) -> Option<usize> {
    let bit = u8::try_from(group).ok().filter(|g| *g < MAX_GROUPS)?;
    if mask & (1 << bit) == 0 {
        return None;
    }
    Some((mask & ((1 << bit) - 1)).count_ones() as usize)
}
