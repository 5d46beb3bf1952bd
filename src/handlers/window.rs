use x11rb::protocol::xproto::Window;

use crate::{
    backend::{ConfigureRequest, DisplayServer, WindowKind},
    errors::Result,
    state::Wren,
};

impl<D: DisplayServer> Wren<D> {
    pub(super) fn handle_map_request(&mut self, window: Window) -> Result<()> {
        if let Some(owner) = self.desktops.locate(window) {
            if owner == self.desktops.current() {
                self.display.map_window(window)?;
                self.retile()?;
                return self.refocus();
            }
            tracing::debug!(window, desktop = owner, "ignoring map request for hidden client");
            return Ok(());
        }

        let kind = self.display.window_kind(window)?;
        self.display
            .watch_window(window, self.config.focus_follows_mouse)?;
        let at = self.config.insert_point();

        if kind == WindowKind::Overlay {
            tracing::debug!(window, "managing overlay window");
            self.live_mut().insert_window(window, at, true);
            self.display.map_window(window)?;
            return self.refocus();
        }

        if let Some(target) = self.rule_target(window)? {
            let rule_desktop = target.desktop;
            tracing::debug!(window, desktop = rule_desktop, follow = target.follow, "window rule matched");
            self.with_desktop(rule_desktop, |desktop| desktop.insert_window(window, at, false))?;
            if target.follow {
                self.change_desktop(rule_desktop)?;
            }
            return Ok(());
        }

        tracing::debug!(window, desktop = self.desktops.current(), "managing window");
        self.live_mut().insert_window(window, at, false);
        self.display.map_window(window)?;
        self.retile()?;
        self.refocus()
    }

    /// Placement rule for `window` when it sends the window to another desktop.
    fn rule_target(&mut self, window: Window) -> Result<Option<RuleTarget>> {
        let Some(class) = self.display.window_class(window)? else {
            return Ok(None);
        };
        let Some(rule) = self.config.rule_for(&class) else {
            return Ok(None);
        };

        let Some(desktop) = rule.desktop else {
            return Ok(None);
        };
        if desktop >= self.desktops.len() {
            tracing::warn!(class = %class, desktop, "window rule names a missing desktop");
            return Ok(None);
        }
        if desktop == self.desktops.current() {
            return Ok(None);
        }
        Ok(Some(RuleTarget {
            desktop,
            follow: rule.follow,
        }))
    }

    pub(super) fn handle_destroy(&mut self, window: Window) -> Result<()> {
        if !self.unmanage(window)? {
            tracing::trace!(window, "destroy notify for unmanaged window");
        }
        Ok(())
    }

    /// Only a client withdrawing its own window ends management; unmaps we
    /// cause while switching desktops arrive as real events and are ignored.
    pub(super) fn handle_unmap(&mut self, window: Window, synthetic: bool) -> Result<()> {
        if synthetic {
            self.unmanage(window)?;
        }
        Ok(())
    }

    pub(super) fn handle_configure_request(&mut self, request: ConfigureRequest) -> Result<()> {
        let (screen_width, screen_height) = self.screen_size();
        let request = request.clamped(screen_width, screen_height, self.config.border_size);
        self.display.configure(&request)?;
        self.display.flush()
    }
}

struct RuleTarget {
    desktop: usize,
    follow: bool,
}
