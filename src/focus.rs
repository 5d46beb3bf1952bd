//! Border, stacking and input focus, re-derived from the live desktop after
//! every change.

use x11rb::protocol::xproto::Window;

use crate::{
    backend::DisplayServer, desktop::Desktop, errors::Result, layout::LayoutMode, state::Wren,
};

/// Border drawn around every client of a desktop with `count` clients.
pub fn effective_border(count: usize, mode: LayoutMode, configured: u32) -> u32 {
    if count <= 1 || mode == LayoutMode::Monocycle {
        0
    } else {
        configured
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FocusPlan {
    pub border_width: u32,
    /// Every client in list order, with whether it is the current one.
    pub clients: Vec<(Window, bool)>,
}

impl FocusPlan {
    pub fn derive(desktop: &Desktop, configured_border: u32) -> Self {
        let current = desktop.clients.current();
        Self {
            border_width: effective_border(desktop.clients.len(), desktop.mode, configured_border),
            clients: desktop
                .clients
                .iter()
                .map(|(id, window)| (window, Some(id) == current))
                .collect(),
        }
    }

    pub fn focused(&self) -> Option<Window> {
        self.clients
            .iter()
            .find(|(_, focused)| *focused)
            .map(|(window, _)| *window)
    }
}

impl<D: DisplayServer> Wren<D> {
    /// Applies borders, stacking and input focus for the live desktop.
    pub fn refocus(&mut self) -> Result<()> {
        let plan = FocusPlan::derive(self.desktops.live(), self.config.border_size);
        let click_to_focus = self.config.click_to_focus;

        for &(window, focused) in &plan.clients {
            self.display.set_border(window, plan.border_width, self.border_pixel(focused))?;
            if focused {
                self.display.focus_window(window)?;
                self.display.raise_window(window)?;
                if click_to_focus {
                    self.display.ungrab_focus_button(window)?;
                }
            } else if click_to_focus {
                self.display.grab_focus_button(window)?;
            }
        }

        tracing::trace!(focused = ?plan.focused(), "refocused live desktop");
        self.display.flush()
    }

    /// Makes the live client holding `window` current. Returns whether it was
    /// found.
    pub fn focus_client(&mut self, window: Window) -> Result<bool> {
        let Some(id) = self.desktops.live().clients.find_by_window(window) else {
            return Ok(false);
        };
        self.desktops.live_mut().clients.set_current(id);
        self.refocus()?;
        Ok(true)
    }

    fn border_pixel(&self, focused: bool) -> u32 {
        if focused {
            self.focus_pixel
        } else {
            self.unfocus_pixel
        }
    }
}
