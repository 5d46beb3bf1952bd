use x11rb::protocol::xproto::Window;
use xkeysym::Keysym;

use crate::{backend::DisplayServer, config::Modifiers, errors::Result, state::Wren};

/// Pointer button that moves focus under click-to-focus.
pub const FOCUS_BUTTON: u8 = 1;

impl<D: DisplayServer> Wren<D> {
    pub(crate) fn handle_key_press(&mut self, keysym: Keysym, state: Modifiers) -> Result<()> {
        let numlock = self.display.numlock_mask();
        let Some(action) = self
            .config
            .keybind_action_for(state, keysym, numlock)
            .cloned()
        else {
            tracing::trace!(?keysym, ?state, "key press without binding");
            return Ok(());
        };

        tracing::debug!(?action, ?keysym, "executing key binding");
        action.execute(self)
    }

    pub(crate) fn handle_pointer_enter(
        &mut self,
        window: Window,
        normal: bool,
        inferior: bool,
    ) -> Result<()> {
        if !self.config.focus_follows_mouse || !normal || inferior {
            return Ok(());
        }
        self.focus_client(window)?;
        Ok(())
    }

    pub(crate) fn handle_button_press(&mut self, window: Window, button: u8) -> Result<()> {
        if !self.config.click_to_focus || button != FOCUS_BUTTON {
            return Ok(());
        }
        if self.live().clients.current_window() == Some(window) {
            return Ok(());
        }
        self.focus_client(window)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use xkeysym::Keysym;

    use crate::{
        config::{Modifiers, RuntimeConfig},
        handlers::WmEvent,
        testing::{Request, harness, harness_with},
    };

    fn key(keysym: Keysym, state: Modifiers) -> WmEvent {
        WmEvent::KeyPress { keysym, state }
    }

    #[test]
    fn bound_key_runs_its_action_despite_lock_bits() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2]);

        let state = Modifiers::MOD4 | Modifiers::LOCK | Modifiers::MOD2;
        wm.handle_event(key(Keysym::j, state)).unwrap();

        assert_eq!(wm.live().clients.current_window(), Some(1));
    }

    #[test]
    fn unbound_key_is_ignored() {
        let mut wm = harness();
        wm.display.requests.clear();
        wm.handle_event(key(Keysym::z, Modifiers::MOD4)).unwrap();
        assert!(wm.display.requests.is_empty());
        assert!(wm.is_running());
    }

    #[test]
    fn quit_binding_sets_exit_code() {
        let mut wm = harness();
        wm.handle_event(key(Keysym::q, Modifiers::MOD4 | Modifiers::CONTROL)).unwrap();
        assert!(!wm.is_running());
        assert_eq!(wm.exit_code(), 1);
    }

    #[test]
    fn desktop_keys_switch_and_send() {
        let mut wm = harness();
        wm.manage_test_windows(&[1]);

        wm.handle_event(key(Keysym::F2, Modifiers::MOD1 | Modifiers::SHIFT)).unwrap();
        assert!(wm.live().clients.is_empty());

        wm.handle_event(key(Keysym::F2, Modifiers::MOD1)).unwrap();
        assert_eq!(wm.desktops.current(), 1);
        assert_eq!(wm.live().clients.windows(), vec![1]);
    }

    #[test]
    fn terminal_binding_queues_a_launch() {
        let mut wm = harness();
        wm.handle_event(key(Keysym::Return, Modifiers::MOD4 | Modifiers::SHIFT)).unwrap();
        let launches = wm.take_launches();
        assert_eq!(launches.len(), 1);
        assert_eq!(launches[0].argv, vec!["xterm".to_owned()]);
    }

    #[test]
    fn click_focuses_unfocused_client_with_left_button_only() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2]);

        wm.handle_event(WmEvent::ButtonPress { window: 1, button: 3 }).unwrap();
        assert_eq!(wm.live().clients.current_window(), Some(2));

        wm.handle_event(WmEvent::ButtonPress { window: 1, button: 1 }).unwrap();
        assert_eq!(wm.live().clients.current_window(), Some(1));
        assert!(wm.display.requests.contains(&Request::UngrabButton(1)));
    }

    #[test]
    fn click_is_ignored_without_click_to_focus() {
        let mut config = RuntimeConfig::default();
        config.click_to_focus = false;
        let mut wm = harness_with(config);
        wm.manage_test_windows(&[1, 2]);

        wm.handle_event(WmEvent::ButtonPress { window: 1, button: 1 }).unwrap();
        assert_eq!(wm.live().clients.current_window(), Some(2));
    }

    #[test]
    fn pointer_enter_focuses_only_when_enabled() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2]);
        let enter = WmEvent::EnterNotify {
            window: 1,
            normal: true,
            inferior: false,
        };

        wm.handle_event(enter.clone()).unwrap();
        assert_eq!(wm.live().clients.current_window(), Some(2));

        wm.config.focus_follows_mouse = true;
        wm.handle_event(WmEvent::EnterNotify {
            window: 1,
            normal: true,
            inferior: true,
        })
        .unwrap();
        assert_eq!(wm.live().clients.current_window(), Some(2));

        wm.handle_event(enter).unwrap();
        assert_eq!(wm.live().clients.current_window(), Some(1));
    }

    #[test]
    fn new_clients_watch_pointer_entry_when_following_mouse() {
        let mut config = RuntimeConfig::default();
        config.focus_follows_mouse = true;
        let mut wm = harness_with(config);
        wm.manage_test_windows(&[1]);
        assert!(wm.display.requests.contains(&Request::Watch(1, true)));
    }
}
