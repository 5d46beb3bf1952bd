mod window;

use x11rb::protocol::xproto::Window;
use xkeysym::Keysym;

use crate::{
    backend::{ConfigureRequest, DisplayServer},
    config::Modifiers,
    errors::Result,
    state::Wren,
    supervisor::ChildExit,
};

/// Notifications the window manager reacts to, already translated out of the
/// display protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WmEvent {
    MapRequest {
        window: Window,
    },
    DestroyNotify {
        window: Window,
    },
    UnmapNotify {
        window: Window,
        /// Sent by the client itself to withdraw the window.
        synthetic: bool,
    },
    ConfigureRequest(ConfigureRequest),
    EnterNotify {
        window: Window,
        /// Crossing mode was `Normal` (not a grab or ungrab).
        normal: bool,
        /// Pointer came from a child of `window`.
        inferior: bool,
    },
    ButtonPress {
        window: Window,
        button: u8,
    },
    KeyPress {
        keysym: Keysym,
        state: Modifiers,
    },
    /// The keyboard mapping changed and grabs must be renewed.
    KeyboardMappingChanged,
    ChildExited(ChildExit),
}

impl<D: DisplayServer> Wren<D> {
    /// Runs one event to completion. The next event is only looked at after
    /// every registry, layout and focus change for this one has been issued.
    pub fn handle_event(&mut self, event: WmEvent) -> Result<()> {
        tracing::trace!(?event, "handling event");
        match event {
            WmEvent::MapRequest { window } => self.handle_map_request(window),
            WmEvent::DestroyNotify { window } => self.handle_destroy(window),
            WmEvent::UnmapNotify { window, synthetic } => self.handle_unmap(window, synthetic),
            WmEvent::ConfigureRequest(request) => self.handle_configure_request(request),
            WmEvent::EnterNotify {
                window,
                normal,
                inferior,
            } => self.handle_pointer_enter(window, normal, inferior),
            WmEvent::ButtonPress { window, button } => self.handle_button_press(window, button),
            WmEvent::KeyPress { keysym, state } => self.handle_key_press(keysym, state),
            WmEvent::KeyboardMappingChanged => {
                tracing::debug!("keyboard mapping changed, renewing key grabs");
                self.display.grab_keys(&self.config.keybinds)?;
                self.display.flush()
            }
            WmEvent::ChildExited(exit) => {
                tracing::debug!(
                    pid = exit.pid,
                    code = ?exit.code,
                    signal = ?exit.signal,
                    "child process exited"
                );
                Ok(())
            }
        }
    }

    /// Handles `events` in order until one of them asks to quit. Errors that
    /// only affect one request are logged and the batch continues; a fatal
    /// error ends it.
    pub fn handle_events(&mut self, events: impl IntoIterator<Item = WmEvent>) -> Result<()> {
        for event in events {
            if !self.is_running() {
                tracing::debug!(?event, "quit requested, dropping event");
                break;
            }
            match self.handle_event(event) {
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => tracing::warn!("{err}"),
                Ok(()) => {}
            }
        }
        Ok(())
    }
}
