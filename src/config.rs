use bitflags::bitflags;
use xkeysym::Keysym;

use crate::{action::Action, client::InsertPoint, layout::LayoutMode};

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub keybinds: Vec<Keybind>,
    pub window_rules: Vec<WindowRule>,
    pub desktops: usize,
    pub default_desktop: usize,
    /// Initial layout per desktop; desktops past the end use the first entry.
    pub desktop_layouts: Vec<LayoutMode>,
    /// Fraction of the screen given to the master area when a mode is chosen.
    pub master_factor: f32,
    pub panel_height: u32,
    pub top_panel: bool,
    /// Whether the panel reserve is kept free at start-up.
    pub show_panel: bool,
    pub border_size: u32,
    pub focus_color: String,
    pub unfocus_color: String,
    /// New clients become the head of the list instead of being appended.
    pub attach_aside: bool,
    /// Switch to the target desktop after sending a client there.
    pub follow_window: bool,
    pub focus_follows_mouse: bool,
    pub click_to_focus: bool,
    /// Write the desktop-state feed to stdout for pagers and status bars.
    pub emit_desktop_status: bool,
    pub terminal: String,
    pub launcher: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowRule {
    pub class: String,
    /// Target desktop; `None` keeps the window on the desktop it appears on.
    pub desktop: Option<usize>,
    pub follow: bool,
}

impl WindowRule {
    pub fn new(class: &str, desktop: usize, follow: bool) -> Self {
        Self {
            class: class.to_owned(),
            desktop: Some(desktop),
            follow,
        }
    }

    /// Rule that leaves the window on whichever desktop is live.
    pub fn on_current(class: &str, follow: bool) -> Self {
        Self {
            class: class.to_owned(),
            desktop: None,
            follow,
        }
    }

    pub fn matches(&self, class: &str) -> bool {
        self.class == class
    }
}

impl RuntimeConfig {
    /// First binding whose chord matches wins; later duplicates never run.
    pub fn keybind_action_for(
        &self,
        modifiers: Modifiers,
        keysym: Keysym,
        numlock: Modifiers,
    ) -> Option<&Action> {
        self.keybinds
            .iter()
            .find(|bind| bind.matches(modifiers, keysym, numlock))
            .map(|bind| &bind.action)
    }

    /// First rule in table order whose class matches.
    pub fn rule_for(&self, class: &str) -> Option<&WindowRule> {
        self.window_rules.iter().find(|rule| rule.matches(class))
    }

    pub fn layout_for_desktop(&self, desktop: usize) -> LayoutMode {
        self.desktop_layouts
            .get(desktop)
            .or_else(|| self.desktop_layouts.first())
            .copied()
            .unwrap_or_default()
    }

    pub fn insert_point(&self) -> InsertPoint {
        if self.attach_aside {
            InsertPoint::Head
        } else {
            InsertPoint::Tail
        }
    }

    /// Pairs of binding indices `(kept, shadowed)` sharing a chord.
    pub fn duplicate_chords(&self) -> Vec<(usize, usize)> {
        let mut duplicates = Vec::new();
        for (index, bind) in self.keybinds.iter().enumerate() {
            if let Some(first) = self.keybinds[..index]
                .iter()
                .position(|earlier| earlier.modifiers == bind.modifiers && earlier.keysym == bind.keysym)
            {
                duplicates.push((first, index));
            }
        }
        duplicates
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let main_key = MainKey::Super;
        let terminal = "xterm".to_owned();
        let launcher = "dmenu_run".to_owned();
        let desktops = 4;
        let keybinds = default_keybinds(main_key, desktops, &terminal, &launcher);
        Self {
            keybinds,
            window_rules: vec![
                WindowRule::new("MPlayer", 3, true),
                WindowRule::new("mplayer2", 3, true),
                WindowRule::new("mpv", 3, true),
            ],
            desktops,
            default_desktop: 0,
            desktop_layouts: vec![
                LayoutMode::Tile,
                LayoutMode::Tile,
                LayoutMode::Bstack,
                LayoutMode::Monocycle,
            ],
            master_factor: 0.52,
            panel_height: 18,
            top_panel: true,
            show_panel: true,
            border_size: 2,
            focus_color: "#F92672".to_owned(),
            unfocus_color: "#444444".to_owned(),
            attach_aside: true,
            follow_window: false,
            focus_follows_mouse: false,
            click_to_focus: true,
            emit_desktop_status: false,
            terminal,
            launcher,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MainKey {
    Super,
    Alt,
    Ctrl,
}

impl MainKey {
    pub fn modifier(self) -> Modifiers {
        match self {
            MainKey::Super => Modifiers::MOD4,
            MainKey::Alt => Modifiers::MOD1,
            MainKey::Ctrl => Modifiers::CONTROL,
        }
    }
}

bitflags! {
    /// Modifier state, laid out like the X11 key/button mask.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u16 {
        const SHIFT = 1 << 0;
        const LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const MOD1 = 1 << 3;
        const MOD2 = 1 << 4;
        const MOD3 = 1 << 5;
        const MOD4 = 1 << 6;
        const MOD5 = 1 << 7;
    }
}

impl Modifiers {
    /// Drops caps lock, the probed num lock bit and any pointer button bits.
    pub fn clean(self, numlock: Modifiers) -> Modifiers {
        self.difference(Modifiers::LOCK | numlock)
    }

    /// The four lock combinations a binding must be grabbed with.
    pub fn lock_variants(numlock: Modifiers) -> [Modifiers; 4] {
        [
            Modifiers::empty(),
            Modifiers::LOCK,
            numlock,
            numlock | Modifiers::LOCK,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct Keybind {
    pub modifiers: Modifiers,
    pub keysym: Keysym,
    pub action: Action,
}

impl Keybind {
    pub fn new(modifiers: Modifiers, keysym: Keysym, action: Action) -> Self {
        Self {
            modifiers,
            keysym,
            action,
        }
    }

    fn matches(&self, modifiers: Modifiers, keysym: Keysym, numlock: Modifiers) -> bool {
        self.keysym == keysym && self.modifiers.clean(numlock) == modifiers.clean(numlock)
    }
}

/// Splits a command line on whitespace into an argv.
pub fn command_argv(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_owned).collect()
}

/// F1.. selects desktop 0..; only twelve function keys exist.
pub fn desktop_keysym(desktop: usize) -> Option<Keysym> {
    (desktop < 12).then(|| Keysym::new(Keysym::F1.raw() + desktop as u32))
}

pub fn default_keybinds(
    main_key: MainKey,
    desktops: usize,
    terminal: &str,
    launcher: &str,
) -> Vec<Keybind> {
    let main = main_key.modifier();
    let shift = main | Modifiers::SHIFT;
    let ctrl = main | Modifiers::CONTROL;

    let mut binds = vec![
        Keybind::new(main, Keysym::b, Action::TogglePanel),
        Keybind::new(main, Keysym::q, Action::KillClient),
        Keybind::new(main, Keysym::j, Action::NextWindow),
        Keybind::new(main, Keysym::k, Action::PreviousWindow),
        Keybind::new(main, Keysym::h, Action::ResizeMaster(-10)),
        Keybind::new(main, Keysym::l, Action::ResizeMaster(10)),
        Keybind::new(main, Keysym::u, Action::ResizeStack(-10)),
        Keybind::new(main, Keysym::i, Action::ResizeStack(10)),
        Keybind::new(ctrl, Keysym::h, Action::RotateDesktop(-1)),
        Keybind::new(ctrl, Keysym::l, Action::RotateDesktop(1)),
        Keybind::new(shift, Keysym::h, Action::RotateFilled(-1)),
        Keybind::new(shift, Keysym::l, Action::RotateFilled(1)),
        Keybind::new(main, Keysym::Tab, Action::LastDesktop),
        Keybind::new(main, Keysym::Return, Action::SwapMaster),
        Keybind::new(shift, Keysym::j, Action::MoveDown),
        Keybind::new(shift, Keysym::k, Action::MoveUp),
        Keybind::new(shift, Keysym::t, Action::SwitchMode(LayoutMode::Tile)),
        Keybind::new(shift, Keysym::m, Action::SwitchMode(LayoutMode::Monocycle)),
        Keybind::new(shift, Keysym::b, Action::SwitchMode(LayoutMode::Bstack)),
        Keybind::new(shift, Keysym::g, Action::SwitchMode(LayoutMode::Grid)),
        Keybind::new(ctrl, Keysym::r, Action::Quit(0)),
        Keybind::new(ctrl, Keysym::q, Action::Quit(1)),
        Keybind::new(shift, Keysym::Return, Action::Spawn(command_argv(terminal))),
        Keybind::new(main, Keysym::p, Action::Spawn(command_argv(launcher))),
    ];

    for desktop in 0..desktops {
        let Some(keysym) = desktop_keysym(desktop) else {
            tracing::warn!(desktop, "no function key left for desktop binding");
            break;
        };
        binds.push(Keybind::new(Modifiers::MOD1, keysym, Action::ChangeDesktop(desktop)));
        binds.push(Keybind::new(
            Modifiers::MOD1 | Modifiers::SHIFT,
            keysym,
            Action::ClientToDesktop(desktop),
        ));
    }

    binds
}
