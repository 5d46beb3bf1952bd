//! X11 display server over x11rb.

use std::os::fd::{AsFd, OwnedFd};

use x11rb::{
    CURRENT_TIME, NONE,
    connection::Connection,
    errors::ReplyError,
    protocol::{
        Event,
        xproto::{
            Allow, Atom, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ClientMessageData,
            ClientMessageEvent, Colormap, ConfigWindow, ConfigureRequestEvent,
            ConfigureWindowAux, ConnectionExt, EventMask, Grab, GrabMode, InputFocus, Keycode,
            Mapping, ModMask, NotifyDetail, NotifyMode, StackMode, Window, CLIENT_MESSAGE_EVENT,
        },
    },
    rust_connection::RustConnection,
};

use crate::{
    backend::{ConfigureRequest, DisplayServer, WindowKind},
    config::{Keybind, Modifiers},
    errors::{self, Result, WmError},
    handlers::WmEvent,
    layout::WindowGeometry,
};

/// `PointerRoot` as a focus target.
const POINTER_ROOT: Window = 1;

/// Bit set on the response type of events sent with `SendEvent`.
const SYNTHETIC_EVENT: u8 = 0x80;

struct AtomCache {
    wm_protocols: Atom,
    wm_delete_window: Atom,
    net_wm_window_type: Atom,
    /// Window types that are managed but never tiled.
    overlay_window_types: [Atom; 5],
}

impl AtomCache {
    fn new(connection: &RustConnection) -> Result<Self> {
        let intern = |name: &[u8]| -> Result<Atom> {
            Ok(connection.intern_atom(false, name)?.reply()?.atom)
        };

        Ok(Self {
            wm_protocols: intern(b"WM_PROTOCOLS")?,
            wm_delete_window: intern(b"WM_DELETE_WINDOW")?,
            net_wm_window_type: intern(b"_NET_WM_WINDOW_TYPE")?,
            overlay_window_types: [
                intern(b"_NET_WM_WINDOW_TYPE_UTILITY")?,
                intern(b"_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
                intern(b"_NET_WM_WINDOW_TYPE_SPLASH")?,
                intern(b"_NET_WM_WINDOW_TYPE_DIALOG")?,
                intern(b"_NET_WM_WINDOW_TYPE_DOCK")?,
            ],
        })
    }
}

/// Keycode to keysym table as reported by the server.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct KeyboardMap {
    min_keycode: Keycode,
    keysyms_per_keycode: usize,
    keysyms: Vec<u32>,
}

impl KeyboardMap {
    fn fetch(connection: &RustConnection) -> Result<Self> {
        let setup = connection.setup();
        let min_keycode = setup.min_keycode;
        let max_keycode = setup.max_keycode;
        let mapping = connection
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)?
            .reply()?;

        Ok(Self {
            min_keycode,
            keysyms_per_keycode: usize::from(mapping.keysyms_per_keycode),
            keysyms: mapping.keysyms,
        })
    }

    /// Unshifted keysym of `keycode`.
    fn keysym(&self, keycode: Keycode) -> xkeysym::Keysym {
        let raw = keycode
            .checked_sub(self.min_keycode)
            .map(|offset| usize::from(offset) * self.keysyms_per_keycode)
            .and_then(|index| self.keysyms.get(index))
            .copied()
            .unwrap_or(0);
        xkeysym::Keysym::new(raw)
    }

    /// Lowest keycode producing `keysym` in any column.
    fn keycode(&self, keysym: xkeysym::Keysym) -> Option<Keycode> {
        if self.keysyms_per_keycode == 0 || keysym.raw() == 0 {
            return None;
        }
        self.keysyms
            .chunks(self.keysyms_per_keycode)
            .position(|column| column.contains(&keysym.raw()))
            .and_then(|index| u8::try_from(index).ok())
            .and_then(|offset| self.min_keycode.checked_add(offset))
    }
}

/// Modifier bit whose key list contains `numlock`.
fn numlock_from_modifier_map(
    keycodes: &[Keycode],
    keycodes_per_modifier: usize,
    numlock: Option<Keycode>,
) -> Modifiers {
    let Some(numlock) = numlock else {
        return Modifiers::empty();
    };
    if keycodes_per_modifier == 0 {
        return Modifiers::empty();
    }
    keycodes
        .chunks(keycodes_per_modifier)
        .take(8)
        .position(|keys| keys.contains(&numlock))
        .map(|bit| Modifiers::from_bits_truncate(1 << bit))
        .unwrap_or_default()
}

/// `#rrggbb` to its components.
fn parse_hex_color(spec: &str) -> Option<(u8, u8, u8)> {
    let hex = spec.strip_prefix('#')?;
    if hex.len() != 6 || !hex.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn configure_request_from(event: &ConfigureRequestEvent) -> ConfigureRequest {
    let mask = event.value_mask;
    let has = |flag: ConfigWindow| mask & flag == flag;
    ConfigureRequest {
        window: event.window,
        x: has(ConfigWindow::X).then_some(i32::from(event.x)),
        y: has(ConfigWindow::Y).then_some(i32::from(event.y)),
        width: has(ConfigWindow::WIDTH).then_some(u32::from(event.width)),
        height: has(ConfigWindow::HEIGHT).then_some(u32::from(event.height)),
        border_width: has(ConfigWindow::BORDER_WIDTH).then_some(u32::from(event.border_width)),
        sibling: has(ConfigWindow::SIBLING).then_some(event.sibling),
        stack_mode: has(ConfigWindow::STACK_MODE).then_some(event.stack_mode),
    }
}

pub struct X11Display {
    connection: RustConnection,
    root: Window,
    width: i32,
    height: i32,
    colormap: Colormap,
    atoms: AtomCache,
    keyboard: KeyboardMap,
    numlock: Modifiers,
}

impl X11Display {
    /// Connects to `$DISPLAY` and takes over window management on its default
    /// screen.
    pub fn connect() -> Result<Self> {
        let (connection, screen_number) = x11rb::connect(None)?;
        let screen = &connection.setup().roots[screen_number];
        let root = screen.root;
        let width = i32::from(screen.width_in_pixels);
        let height = i32::from(screen.height_in_pixels);
        let colormap = screen.default_colormap;

        become_wm(&connection, root)?;

        let atoms = AtomCache::new(&connection)?;
        let keyboard = KeyboardMap::fetch(&connection)?;
        let numlock = probe_numlock(&connection, &keyboard)?;

        tracing::info!(screen = screen_number, width, height, ?numlock, "connected to X server");

        Ok(Self {
            connection,
            root,
            width,
            height,
            colormap,
            atoms,
            keyboard,
            numlock,
        })
    }

    /// Duplicate of the connection socket for the event loop to poll.
    pub fn event_fd(&self) -> Result<OwnedFd> {
        Ok(self.connection.stream().as_fd().try_clone_to_owned()?)
    }

    /// Every event already read from the server, translated and in order.
    pub fn pending_events(&mut self) -> Result<Vec<WmEvent>> {
        let mut events = Vec::new();
        while let Some(event) = self.connection.poll_for_event()? {
            if let Some(event) = self.translate(event)? {
                events.push(event);
            }
        }
        Ok(events)
    }

    fn translate(&mut self, event: Event) -> Result<Option<WmEvent>> {
        let translated = match event {
            Event::MapRequest(event) => Some(WmEvent::MapRequest {
                window: event.window,
            }),
            Event::DestroyNotify(event) => Some(WmEvent::DestroyNotify {
                window: event.window,
            }),
            Event::UnmapNotify(event) => Some(WmEvent::UnmapNotify {
                window: event.window,
                synthetic: event.response_type & SYNTHETIC_EVENT != 0,
            }),
            Event::ConfigureRequest(event) => {
                Some(WmEvent::ConfigureRequest(configure_request_from(&event)))
            }
            Event::EnterNotify(event) => Some(WmEvent::EnterNotify {
                window: event.event,
                normal: event.mode == NotifyMode::NORMAL,
                inferior: event.detail == NotifyDetail::INFERIOR,
            }),
            Event::ButtonPress(event) => {
                // Focus buttons are grabbed synchronously; let the click through.
                self.connection
                    .allow_events(Allow::REPLAY_POINTER, event.time)?;
                Some(WmEvent::ButtonPress {
                    window: event.event,
                    button: event.detail,
                })
            }
            Event::KeyPress(event) => Some(WmEvent::KeyPress {
                keysym: self.keyboard.keysym(event.detail),
                state: Modifiers::from_bits_truncate(u16::from(event.state)),
            }),
            Event::MappingNotify(event) if event.request != Mapping::POINTER => {
                self.keyboard = KeyboardMap::fetch(&self.connection)?;
                self.numlock = probe_numlock(&self.connection, &self.keyboard)?;
                Some(WmEvent::KeyboardMappingChanged)
            }
            Event::Error(error) => {
                if errors::is_ignorable(error.error_kind, error.major_opcode) {
                    tracing::trace!(?error, "ignoring X error for vanished window");
                } else {
                    tracing::error!(
                        kind = ?error.error_kind,
                        request = error.major_opcode,
                        bad_value = error.bad_value,
                        "unexpected X error"
                    );
                }
                None
            }
            _ => None,
        };
        Ok(translated)
    }

    /// 32-bit items of a window property; empty when the window is gone or
    /// the property is unset.
    fn property_u32s(&self, window: Window, property: Atom, kind: AtomEnum) -> Result<Vec<u32>> {
        let reply = match self
            .connection
            .get_property(false, window, property, kind, 0, 32)?
            .reply()
        {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(error)) => {
                tracing::trace!(window, ?error, "property query failed");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(reply
            .value32()
            .map(|values| values.collect())
            .unwrap_or_default())
    }

    fn supports_delete(&self, window: Window) -> Result<bool> {
        let protocols = self.property_u32s(window, self.atoms.wm_protocols, AtomEnum::ATOM)?;
        Ok(protocols.contains(&self.atoms.wm_delete_window))
    }

    fn send_delete(&self, window: Window) -> Result<()> {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms.wm_protocols,
            data: ClientMessageData::from([self.atoms.wm_delete_window, CURRENT_TIME, 0, 0, 0]),
        };
        self.connection
            .send_event(false, window, EventMask::NO_EVENT, event)?;
        Ok(())
    }
}

/// Selecting substructure redirect fails with `BadAccess` when another client
/// already holds it.
fn become_wm(connection: &RustConnection, root: Window) -> Result<()> {
    let attributes = ChangeWindowAttributesAux::new()
        .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY);
    match connection.change_window_attributes(root, &attributes)?.check() {
        Ok(()) => Ok(()),
        Err(ReplyError::X11Error(error)) if error.error_kind == x11rb::protocol::ErrorKind::Access => {
            Err(WmError::AnotherWmRunning)
        }
        Err(err) => Err(err.into()),
    }
}

fn probe_numlock(connection: &RustConnection, keyboard: &KeyboardMap) -> Result<Modifiers> {
    let modifiers = connection.get_modifier_mapping()?.reply()?;
    let numlock = keyboard.keycode(xkeysym::Keysym::Num_Lock);
    Ok(numlock_from_modifier_map(
        &modifiers.keycodes,
        usize::from(modifiers.keycodes_per_modifier()),
        numlock,
    ))
}

impl DisplayServer for X11Display {
    fn screen_size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    fn numlock_mask(&self) -> Modifiers {
        self.numlock
    }

    fn alloc_color(&mut self, spec: &str) -> Result<u32> {
        let reply = match parse_hex_color(spec) {
            Some((red, green, blue)) => self
                .connection
                .alloc_color(
                    self.colormap,
                    u16::from(red) * 257,
                    u16::from(green) * 257,
                    u16::from(blue) * 257,
                )?
                .reply()
                .map(|reply| reply.pixel),
            None => self
                .connection
                .alloc_named_color(self.colormap, spec.as_bytes())?
                .reply()
                .map(|reply| reply.pixel),
        };
        reply.map_err(|err| {
            tracing::error!(color = spec, "color allocation failed: {err}");
            WmError::ColorAllocation(spec.to_owned())
        })
    }

    fn grab_keys(&mut self, binds: &[Keybind]) -> Result<()> {
        self.connection
            .ungrab_key(Grab::ANY, self.root, ModMask::ANY)?;

        for bind in binds {
            let Some(keycode) = self.keyboard.keycode(bind.keysym) else {
                tracing::warn!(keysym = ?bind.keysym, action = ?bind.action, "no keycode for bound keysym");
                continue;
            };
            for locks in Modifiers::lock_variants(self.numlock) {
                let modifiers = ModMask::from((bind.modifiers | locks).bits());
                self.connection.grab_key(
                    true,
                    self.root,
                    modifiers,
                    keycode,
                    GrabMode::ASYNC,
                    GrabMode::ASYNC,
                )?;
            }
        }
        Ok(())
    }

    fn move_resize(&mut self, window: Window, cell: WindowGeometry, border: u32) -> Result<()> {
        let (width, height) = cell.inner(border);
        self.connection.configure_window(
            window,
            &ConfigureWindowAux::new()
                .x(cell.x_coordinate)
                .y(cell.y_coordinate)
                .width(width)
                .height(height),
        )?;
        Ok(())
    }

    fn set_border(&mut self, window: Window, width: u32, pixel: u32) -> Result<()> {
        self.connection
            .configure_window(window, &ConfigureWindowAux::new().border_width(width))?;
        self.connection.change_window_attributes(
            window,
            &ChangeWindowAttributesAux::new().border_pixel(pixel),
        )?;
        Ok(())
    }

    fn map_window(&mut self, window: Window) -> Result<()> {
        self.connection.map_window(window)?;
        Ok(())
    }

    fn unmap_window(&mut self, window: Window) -> Result<()> {
        self.connection.unmap_window(window)?;
        Ok(())
    }

    fn raise_window(&mut self, window: Window) -> Result<()> {
        self.connection.configure_window(
            window,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        )?;
        Ok(())
    }

    fn focus_window(&mut self, window: Window) -> Result<()> {
        self.connection
            .set_input_focus(InputFocus::PARENT, window, CURRENT_TIME)?;
        Ok(())
    }

    fn grab_focus_button(&mut self, window: Window) -> Result<()> {
        self.connection.grab_button(
            false,
            window,
            EventMask::BUTTON_PRESS,
            GrabMode::SYNC,
            GrabMode::ASYNC,
            NONE,
            NONE,
            ButtonIndex::ANY,
            ModMask::ANY,
        )?;
        Ok(())
    }

    fn ungrab_focus_button(&mut self, window: Window) -> Result<()> {
        self.connection
            .ungrab_button(ButtonIndex::ANY, window, ModMask::ANY)?;
        Ok(())
    }

    fn watch_window(&mut self, window: Window, pointer_enter: bool) -> Result<()> {
        if pointer_enter {
            self.connection.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::ENTER_WINDOW),
            )?;
        }
        Ok(())
    }

    fn close_window(&mut self, window: Window, force: bool) -> Result<()> {
        if self.supports_delete(window)? {
            self.send_delete(window)?;
        } else if force {
            tracing::info!(window, "window ignores WM_DELETE_WINDOW, killing its client");
            self.connection.kill_client(window)?;
        }
        self.connection.flush()?;
        Ok(())
    }

    fn window_kind(&mut self, window: Window) -> Result<WindowKind> {
        let transient_for =
            self.property_u32s(window, AtomEnum::WM_TRANSIENT_FOR.into(), AtomEnum::WINDOW)?;
        if transient_for.iter().any(|&parent| parent != NONE) {
            return Ok(WindowKind::Overlay);
        }

        let types = self.property_u32s(window, self.atoms.net_wm_window_type, AtomEnum::ATOM)?;
        if types
            .iter()
            .any(|kind| self.atoms.overlay_window_types.contains(kind))
        {
            return Ok(WindowKind::Overlay);
        }
        Ok(WindowKind::Normal)
    }

    fn window_class(&mut self, window: Window) -> Result<Option<String>> {
        let reply = match self
            .connection
            .get_property(false, window, AtomEnum::WM_CLASS, AtomEnum::STRING, 0, 1024)?
            .reply()
        {
            Ok(reply) => reply,
            Err(ReplyError::X11Error(error)) => {
                tracing::trace!(window, ?error, "WM_CLASS query failed");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        // WM_CLASS is "instance\0class\0".
        Ok(reply
            .value
            .split(|byte| *byte == 0)
            .nth(1)
            .filter(|class| !class.is_empty())
            .map(|class| String::from_utf8_lossy(class).into_owned()))
    }

    fn configure(&mut self, request: &ConfigureRequest) -> Result<()> {
        let aux = ConfigureWindowAux::new()
            .x(request.x)
            .y(request.y)
            .width(request.width)
            .height(request.height)
            .border_width(request.border_width)
            .sibling(request.sibling)
            .stack_mode(request.stack_mode);
        self.connection.configure_window(request.window, &aux)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.connection.flush()?;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        self.connection
            .ungrab_key(Grab::ANY, self.root, ModMask::ANY)?;
        self.connection
            .set_input_focus(InputFocus::POINTER_ROOT, POINTER_ROOT, CURRENT_TIME)?;
        self.connection.flush()?;
        Ok(())
    }
}
