//! Display server capabilities the window manager core relies on.
//!
//! The core only ever talks to the display through [`DisplayServer`]. Window
//! handles are owned by the server; the core never creates or frees them.

pub mod x11;

use x11rb::protocol::xproto::{StackMode, Window};

use crate::{
    config::{Keybind, Modifiers},
    errors::Result,
    layout::WindowGeometry,
};

/// How a newly mapped window takes part in tiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowKind {
    Normal,
    /// Has a transient-for hint or a dialog/utility/dock/splash/notification
    /// window type. Managed, but kept out of the tiled set.
    Overlay,
}

/// A client's geometry request, with absent fields left untouched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub window: Window,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border_width: Option<u32>,
    pub sibling: Option<Window>,
    pub stack_mode: Option<StackMode>,
}

impl ConfigureRequest {
    /// Bounds width and height by the screen size minus `border`.
    pub fn clamped(mut self, screen_width: i32, screen_height: i32, border: u32) -> Self {
        let max_width = (screen_width - border as i32).max(1) as u32;
        let max_height = (screen_height - border as i32).max(1) as u32;
        self.width = self.width.map(|width| width.min(max_width));
        self.height = self.height.map(|height| height.min(max_height));
        self
    }
}

pub trait DisplayServer {
    /// Root window size in pixels.
    fn screen_size(&self) -> (i32, i32);

    /// Modifier bit the server maps NumLock to; empty when unmapped.
    fn numlock_mask(&self) -> Modifiers;

    /// Resolves a color name or `#rrggbb` spec to a pixel value.
    fn alloc_color(&mut self, spec: &str) -> Result<u32>;

    /// Replaces all key grabs with `binds`, under every lock combination.
    fn grab_keys(&mut self, binds: &[Keybind]) -> Result<()>;

    /// Places a window in `cell`, shrinking it so the border fits inside.
    fn move_resize(&mut self, window: Window, cell: WindowGeometry, border: u32) -> Result<()>;

    fn set_border(&mut self, window: Window, width: u32, pixel: u32) -> Result<()>;

    fn map_window(&mut self, window: Window) -> Result<()>;

    fn unmap_window(&mut self, window: Window) -> Result<()>;

    fn raise_window(&mut self, window: Window) -> Result<()>;

    fn focus_window(&mut self, window: Window) -> Result<()>;

    /// Grabs the left button so a click on an unfocused window reaches us.
    fn grab_focus_button(&mut self, window: Window) -> Result<()>;

    fn ungrab_focus_button(&mut self, window: Window) -> Result<()>;

    /// Subscribes to pointer entry on a new client when `pointer_enter` is set.
    fn watch_window(&mut self, window: Window, pointer_enter: bool) -> Result<()>;

    /// Asks the client to close through `WM_DELETE_WINDOW`. Clients that do not
    /// take part in the protocol are killed when `force` is set and left
    /// alone otherwise.
    fn close_window(&mut self, window: Window, force: bool) -> Result<()>;

    fn window_kind(&mut self, window: Window) -> Result<WindowKind>;

    /// Class part of `WM_CLASS`, if the window has one.
    fn window_class(&mut self, window: Window) -> Result<Option<String>>;

    fn configure(&mut self, request: &ConfigureRequest) -> Result<()>;

    fn flush(&mut self) -> Result<()>;

    /// Drops every grab and hands input focus back to the pointer root.
    fn release(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configure_request_is_clamped_to_screen() {
        let request = ConfigureRequest {
            window: 1,
            x: Some(-20),
            width: Some(5000),
            height: Some(300),
            ..Default::default()
        };

        let clamped = request.clamped(1200, 800, 2);
        assert_eq!(clamped.width, Some(1198));
        assert_eq!(clamped.height, Some(300));
        assert_eq!(clamped.x, Some(-20));
        assert_eq!(clamped.y, None);
    }
}
