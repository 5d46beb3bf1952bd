//! Record-keeping display used by the unit tests.

use std::collections::{BTreeMap, HashMap};

use x11rb::protocol::xproto::Window;

use crate::{
    backend::{ConfigureRequest, DisplayServer, WindowKind},
    config::{Keybind, Modifiers, RuntimeConfig},
    errors::Result,
    handlers::WmEvent,
    layout::WindowGeometry,
    state::Wren,
};

/// 1200x818 leaves 1200x800 under the default 18px panel.
pub const SCREEN_WIDTH: i32 = 1200;
pub const SCREEN_HEIGHT: i32 = 818;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    GrabKeys(usize),
    MoveResize(Window, WindowGeometry, u32),
    Border(Window, u32, u32),
    Map(Window),
    Unmap(Window),
    Raise(Window),
    Focus(Window),
    GrabButton(Window),
    UngrabButton(Window),
    Watch(Window, bool),
    Close(Window, bool),
    Configure(ConfigureRequest),
    Flush,
    Release,
}

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub requests: Vec<Request>,
    pub kinds: HashMap<Window, WindowKind>,
    pub classes: HashMap<Window, String>,
    pub numlock: Modifiers,
    width: i32,
    height: i32,
}

impl RecordingDisplay {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            numlock: Modifiers::MOD2,
            ..Default::default()
        }
    }

    /// Window of the most recent focus request.
    pub fn focused(&self) -> Option<Window> {
        self.requests.iter().rev().find_map(|request| match request {
            Request::Focus(window) => Some(*window),
            _ => None,
        })
    }

    pub fn position(&self, request: &Request) -> Option<usize> {
        self.requests.iter().position(|candidate| candidate == request)
    }

    /// Latest cell requested for each window.
    pub fn last_layout(&self) -> Vec<(Window, WindowGeometry)> {
        let mut cells = BTreeMap::new();
        for request in &self.requests {
            if let Request::MoveResize(window, cell, _) = request {
                cells.insert(*window, *cell);
            }
        }
        cells.into_iter().collect()
    }

    /// Move/resize requests issued since the requests were last cleared.
    pub fn move_resizes(&self) -> Vec<(Window, WindowGeometry, u32)> {
        self.requests
            .iter()
            .filter_map(|request| match request {
                Request::MoveResize(window, cell, border) => Some((*window, *cell, *border)),
                _ => None,
            })
            .collect()
    }
}

impl DisplayServer for RecordingDisplay {
    fn screen_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn numlock_mask(&self) -> Modifiers {
        self.numlock
    }

    fn alloc_color(&mut self, spec: &str) -> Result<u32> {
        Ok(u32::from_str_radix(spec.trim_start_matches('#'), 16).unwrap_or(0))
    }

    fn grab_keys(&mut self, binds: &[Keybind]) -> Result<()> {
        self.requests.push(Request::GrabKeys(binds.len()));
        Ok(())
    }

    fn move_resize(&mut self, window: Window, cell: WindowGeometry, border: u32) -> Result<()> {
        self.requests.push(Request::MoveResize(window, cell, border));
        Ok(())
    }

    fn set_border(&mut self, window: Window, width: u32, pixel: u32) -> Result<()> {
        self.requests.push(Request::Border(window, width, pixel));
        Ok(())
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::Map(window));
        Ok(())
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::Unmap(window));
        Ok(())
    }

    fn raise_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::Raise(window));
        Ok(())
    }

    fn focus_window(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::Focus(window));
        Ok(())
    }

    fn grab_focus_button(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::GrabButton(window));
        Ok(())
    }

    fn ungrab_focus_button(&mut self, window: Window) -> Result<()> {
        self.requests.push(Request::UngrabButton(window));
        Ok(())
    }

    fn watch_window(&mut self, window: Window, pointer_enter: bool) -> Result<()> {
        self.requests.push(Request::Watch(window, pointer_enter));
        Ok(())
    }

    fn close_window(&mut self, window: Window, force: bool) -> Result<()> {
        self.requests.push(Request::Close(window, force));
        Ok(())
    }

    fn window_kind(&mut self, window: Window) -> Result<WindowKind> {
        Ok(self.kinds.get(&window).copied().unwrap_or(WindowKind::Normal))
    }

    fn window_class(&mut self, window: Window) -> Result<Option<String>> {
        Ok(self.classes.get(&window).cloned())
    }

    fn configure(&mut self, request: &ConfigureRequest) -> Result<()> {
        self.requests.push(Request::Configure(*request));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.requests.push(Request::Flush);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.requests.push(Request::Release);
        Ok(())
    }
}

pub fn harness() -> Wren<RecordingDisplay> {
    harness_with(RuntimeConfig::default())
}

pub fn harness_with(config: RuntimeConfig) -> Wren<RecordingDisplay> {
    Wren::new(RecordingDisplay::new(SCREEN_WIDTH, SCREEN_HEIGHT), config).unwrap()
}

impl Wren<RecordingDisplay> {
    /// Delivers a map request for each window, in order.
    pub fn manage_test_windows(&mut self, windows: &[Window]) {
        for &window in windows {
            self.handle_event(WmEvent::MapRequest { window }).unwrap();
        }
    }
}
