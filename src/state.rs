use x11rb::protocol::xproto::Window;

use crate::{
    backend::DisplayServer,
    config::RuntimeConfig,
    desktop::{ActiveDesktop, Desktop, DesktopStore},
    errors::{Result, WmError},
    focus::effective_border,
    layout::{self, LayoutMode, LayoutParams, WindowGeometry},
    status::StatusFeed,
    supervisor::LaunchIntent,
};

pub struct Wren<D: DisplayServer> {
    pub display: D,
    pub config: RuntimeConfig,
    pub desktops: DesktopStore,
    screen_width: i32,
    screen_height: i32,
    pub(crate) focus_pixel: u32,
    pub(crate) unfocus_pixel: u32,
    panel_visible: bool,
    running: bool,
    exit_code: i32,
    launches: Vec<LaunchIntent>,
    status: StatusFeed,
}

impl<D: DisplayServer> Wren<D> {
    pub fn new(mut display: D, config: RuntimeConfig) -> Result<Self> {
        if config.default_desktop >= config.desktops {
            return Err(WmError::InvalidDesktop(config.default_desktop));
        }

        let (screen_width, screen_height) = display.screen_size();
        let focus_pixel = display.alloc_color(&config.focus_color)?;
        let unfocus_pixel = display.alloc_color(&config.unfocus_color)?;

        let panel_visible = config.show_panel;
        let area = usable_area(&config, panel_visible, screen_width, screen_height);
        let desktops = DesktopStore::new(config.desktops, config.default_desktop, |id| {
            let mode = config.layout_for_desktop(id);
            Desktop::new(mode, initial_master_size(&config, mode, area))
        })?;

        for (kept, shadowed) in config.duplicate_chords() {
            let bind = &config.keybinds[shadowed];
            tracing::warn!(
                kept,
                shadowed,
                modifiers = ?bind.modifiers,
                keysym = ?bind.keysym,
                "key binding is shadowed by an earlier binding on the same chord"
            );
        }

        display.grab_keys(&config.keybinds)?;
        display.flush()?;

        tracing::info!(
            screen_width,
            screen_height,
            desktops = config.desktops,
            keybinds = config.keybinds.len(),
            rules = config.window_rules.len(),
            "window manager initialized"
        );

        Ok(Self {
            display,
            config,
            desktops,
            screen_width,
            screen_height,
            focus_pixel,
            unfocus_pixel,
            panel_visible,
            running: true,
            exit_code: 0,
            launches: Vec::new(),
            status: StatusFeed::new(),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn screen_size(&self) -> (i32, i32) {
        (self.screen_width, self.screen_height)
    }

    /// Screen area left for tiling once the panel is reserved.
    pub fn usable_area(&self) -> WindowGeometry {
        usable_area(&self.config, self.panel_visible, self.screen_width, self.screen_height)
    }

    pub fn panel_visible(&self) -> bool {
        self.panel_visible
    }

    /// Shows or hides the panel reserve and retiles the live desktop.
    pub fn toggle_panel(&mut self) -> Result<()> {
        self.panel_visible = !self.panel_visible;
        tracing::debug!(visible = self.panel_visible, "toggled panel");
        self.retile()?;
        self.refocus()
    }

    pub fn live(&self) -> &ActiveDesktop {
        self.desktops.live()
    }

    pub fn live_mut(&mut self) -> &mut ActiveDesktop {
        self.desktops.live_mut()
    }

    pub fn quit(&mut self, code: i32) {
        tracing::info!(code, "quit requested");
        self.running = false;
        self.exit_code = code;
    }

    pub fn spawn(&mut self, argv: &[String]) {
        if argv.is_empty() {
            tracing::warn!("ignoring spawn of an empty command");
            return;
        }
        self.launches.push(LaunchIntent::new(argv.to_vec()));
    }

    /// Launch intents queued since the last call.
    pub fn take_launches(&mut self) -> Vec<LaunchIntent> {
        std::mem::take(&mut self.launches)
    }

    /// Feed line for external pagers, when enabled and changed.
    pub fn status_line(&mut self) -> Option<String> {
        if !self.config.emit_desktop_status {
            return None;
        }
        self.status.update(&self.desktops)
    }

    /// Recomputes and applies geometry for the live desktop.
    pub fn retile(&mut self) -> Result<()> {
        let area = self.usable_area();
        let configured_border = self.config.border_size;
        let live = self.desktops.live_mut();

        // Growth only means something with two or more stacked clients.
        let tiled = live.tiled_windows();
        if tiled.len() <= 2 {
            live.growth = 0;
        }
        let params = LayoutParams {
            area,
            mode: live.mode,
            master_size: live.master_size,
            growth: live.growth,
        };
        let border = effective_border(live.clients.len(), live.mode, configured_border);

        for (window, cell) in layout::arrange(&tiled, &params) {
            self.display.move_resize(window, cell, border)?;
        }
        Ok(())
    }

    /// Runs `f` against desktop `id` with the save/select discipline: the live
    /// desktop is saved, `id` is checked out, mutated, saved back and the
    /// original desktop is checked out again.
    pub fn with_desktop<R>(&mut self, id: usize, f: impl FnOnce(&mut Desktop) -> R) -> Result<R> {
        let current = self.desktops.current();
        if id == current {
            let desktop: &mut Desktop = self.desktops.live_mut();
            return Ok(f(desktop));
        }
        if id >= self.desktops.len() {
            return Err(WmError::InvalidDesktop(id));
        }

        self.desktops.save(current)?;
        self.desktops.select(id)?;
        let desktop: &mut Desktop = self.desktops.live_mut();
        let result = f(desktop);
        self.desktops.save(id)?;
        self.desktops.select(current)?;
        Ok(result)
    }

    pub fn change_desktop(&mut self, target: usize) -> Result<()> {
        let current = self.desktops.current();
        if target == current {
            return Ok(());
        }
        if target >= self.desktops.len() {
            tracing::warn!(target, "ignoring switch to missing desktop");
            return Ok(());
        }

        for window in self.live().clients.windows() {
            self.display.unmap_window(window)?;
        }
        self.desktops.switch_to(target)?;
        for window in self.live().clients.windows() {
            self.display.map_window(window)?;
        }

        tracing::debug!(from = current, to = target, "switched desktop");
        self.retile()?;
        self.refocus()
    }

    pub fn last_desktop(&mut self) -> Result<()> {
        self.change_desktop(self.desktops.previous())
    }

    /// Cycles through desktops by `delta`, wrapping at both ends.
    pub fn rotate_desktop(&mut self, delta: i32) -> Result<()> {
        let count = self.desktops.len() as i32;
        let target = (self.desktops.current() as i32 + delta).rem_euclid(count);
        self.change_desktop(target as usize)
    }

    /// Cycles by `delta` to the nearest desktop that has clients.
    pub fn rotate_filled(&mut self, delta: i32) -> Result<()> {
        let count = self.desktops.len() as i32;
        let current = self.desktops.current() as i32;
        let filled: Vec<bool> = self
            .desktops
            .summaries()
            .map(|(_, desktop)| !desktop.clients.is_empty())
            .collect();

        let target = (1..count)
            .map(|step| (current + delta * step).rem_euclid(count) as usize)
            .find(|&candidate| filled[candidate]);
        match target {
            Some(target) => self.change_desktop(target),
            None => Ok(()),
        }
    }

    /// Sends the current client to `target`, leaving this desktop's focus on
    /// its predecessor.
    pub fn client_to_desktop(&mut self, target: usize) -> Result<()> {
        let current = self.desktops.current();
        if target == current {
            return Ok(());
        }
        if target >= self.desktops.len() {
            tracing::warn!(target, "ignoring move to missing desktop");
            return Ok(());
        }
        let Some(window) = self.live().clients.current_window() else {
            return Ok(());
        };

        let floating = self.live().is_floating(window);
        let at = self.config.insert_point();
        self.with_desktop(target, |desktop| desktop.insert_window(window, at, floating))?;

        self.display.unmap_window(window)?;
        self.live_mut().remove_window(window);
        tracing::debug!(window, from = current, to = target, "moved client to desktop");

        self.retile()?;
        self.refocus()?;

        if self.config.follow_window {
            self.change_desktop(target)?;
        }
        Ok(())
    }

    /// Stops managing `window` wherever it lives. Returns whether it was found.
    pub fn unmanage(&mut self, window: Window) -> Result<bool> {
        let Some(owner) = self.desktops.locate(window) else {
            return Ok(false);
        };

        self.with_desktop(owner, |desktop| desktop.remove_window(window))?;
        tracing::debug!(window, desktop = owner, "unmanaged window");

        if owner == self.desktops.current() {
            self.retile()?;
            self.refocus()?;
        }
        Ok(true)
    }

    /// Politely closes the current client and forgets it immediately.
    pub fn kill_client(&mut self) -> Result<()> {
        let Some(window) = self.live().clients.current_window() else {
            return Ok(());
        };
        self.display.close_window(window, true)?;
        self.live_mut().remove_window(window);
        self.retile()?;
        self.refocus()
    }

    /// Selects `mode`. Modes with a master area get it reset from the
    /// configured fraction.
    pub fn switch_mode(&mut self, mode: LayoutMode) -> Result<()> {
        if self.live().mode == mode {
            return Ok(());
        }
        let master_size = initial_master_size(&self.config, mode, self.usable_area());
        let live = self.live_mut();
        live.mode = mode;
        if mode != LayoutMode::Monocycle {
            live.master_size = master_size;
        }
        self.retile()?;
        self.refocus()
    }

    pub fn resize_master(&mut self, delta: i32) -> Result<()> {
        let area = self.usable_area();
        let live = self.live_mut();
        let total = layout::master_extent(live.mode, area);
        live.master_size = layout::clamp_master(live.master_size + delta, total);
        self.retile()
    }

    pub fn resize_stack(&mut self, delta: i32) -> Result<()> {
        let area = self.usable_area();
        let live = self.live_mut();
        let count = live.tiled_windows().len();
        live.growth = layout::clamp_growth(live.mode, area, count, live.growth + delta);
        self.retile()
    }

    /// Asks every managed window to close and gives the display back.
    pub fn shutdown(&mut self) -> Result<()> {
        let current = self.desktops.current();
        self.desktops.save(current)?;

        let windows: Vec<Window> = self
            .desktops
            .summaries()
            .flat_map(|(_, desktop)| desktop.clients.windows())
            .collect();
        tracing::info!(windows = windows.len(), "shutting down");

        for window in windows {
            self.display.close_window(window, false)?;
        }
        self.display.release()?;
        self.display.flush()
    }
}

fn usable_area(
    config: &RuntimeConfig,
    panel_visible: bool,
    screen_width: i32,
    screen_height: i32,
) -> WindowGeometry {
    let panel = if panel_visible { config.panel_height as i32 } else { 0 };
    let y_coordinate = if config.top_panel { panel } else { 0 };
    WindowGeometry::new(0, y_coordinate, screen_width, (screen_height - panel).max(1))
}

fn initial_master_size(config: &RuntimeConfig, mode: LayoutMode, area: WindowGeometry) -> i32 {
    (layout::master_extent(mode, area) as f32 * config.master_factor).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Request, harness, harness_with};

    #[test]
    fn new_rejects_default_desktop_out_of_range() {
        let mut config = RuntimeConfig::default();
        config.default_desktop = 4;
        let display = crate::testing::RecordingDisplay::new(1200, 818);
        assert!(matches!(Wren::new(display, config), Err(WmError::InvalidDesktop(4))));
    }

    #[test]
    fn startup_grabs_keys_and_sizes_masters_from_the_fraction() {
        let wm = harness();
        assert!(wm.display.requests.contains(&Request::GrabKeys(wm.config.keybinds.len())));
        // 1200 * 0.52 for TILE; BSTACK uses the usable height of 800.
        assert_eq!(wm.live().master_size, 624);
        assert_eq!(wm.desktops.stored(2).map(|d| d.master_size), Some(416));
        assert_eq!(wm.desktops.stored(2).map(|d| d.mode), Some(LayoutMode::Bstack));
    }

    #[test]
    fn usable_area_reserves_the_panel() {
        let mut wm = harness();
        assert_eq!(wm.usable_area(), WindowGeometry::new(0, 18, 1200, 800));
        wm.config.top_panel = false;
        assert_eq!(wm.usable_area(), WindowGeometry::new(0, 0, 1200, 800));
    }

    #[test]
    fn change_desktop_unmaps_old_before_mapping_new() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2]);
        wm.change_desktop(1).unwrap();
        wm.manage_test_windows(&[3]);
        wm.display.requests.clear();

        wm.change_desktop(0).unwrap();

        let unmap_3 = wm.display.position(&Request::Unmap(3)).unwrap();
        let map_1 = wm.display.position(&Request::Map(1)).unwrap();
        let map_2 = wm.display.position(&Request::Map(2)).unwrap();
        assert!(unmap_3 < map_1 && unmap_3 < map_2);
        assert!(!wm.display.requests.contains(&Request::Map(3)));
        assert_eq!(wm.desktops.previous(), 1);
        assert_eq!(wm.display.focused(), Some(2));
    }

    #[test]
    fn change_desktop_to_current_or_missing_is_a_no_op() {
        let mut wm = harness();
        wm.display.requests.clear();
        wm.change_desktop(0).unwrap();
        wm.change_desktop(9).unwrap();
        assert!(wm.display.requests.is_empty());
        assert_eq!(wm.desktops.current(), 0);
    }

    #[test]
    fn rotate_and_last_desktop_wrap() {
        let mut wm = harness();
        wm.rotate_desktop(-1).unwrap();
        assert_eq!(wm.desktops.current(), 3);
        wm.rotate_desktop(2).unwrap();
        assert_eq!(wm.desktops.current(), 1);
        wm.last_desktop().unwrap();
        assert_eq!(wm.desktops.current(), 3);
    }

    #[test]
    fn client_to_desktop_without_follow() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2, 3]);
        // Head insertion: list is [3, 2, 1]; make 2 current.
        let id = wm.live().clients.find_by_window(2).unwrap();
        wm.live_mut().clients.set_current(id);

        wm.client_to_desktop(1).unwrap();

        assert_eq!(wm.desktops.current(), 0);
        assert_eq!(wm.live().clients.windows(), vec![3, 1]);
        assert_eq!(wm.live().clients.current_window(), Some(3));
        let target = wm.desktops.stored(1).unwrap();
        assert_eq!(target.clients.windows(), vec![2]);
        assert_eq!(target.clients.current_window(), Some(2));
        assert!(wm.display.requests.contains(&Request::Unmap(2)));
    }

    #[test]
    fn client_to_desktop_with_follow_switches() {
        let mut config = RuntimeConfig::default();
        config.follow_window = true;
        let mut wm = harness_with(config);
        wm.manage_test_windows(&[1]);

        wm.client_to_desktop(2).unwrap();

        assert_eq!(wm.desktops.current(), 2);
        assert_eq!(wm.live().clients.current_window(), Some(1));
        assert!(wm.desktops.stored(0).unwrap().clients.is_empty());
        assert_eq!(wm.display.focused(), Some(1));
    }

    #[test]
    fn client_to_desktop_without_current_does_nothing() {
        let mut wm = harness();
        wm.display.requests.clear();
        wm.client_to_desktop(1).unwrap();
        assert!(wm.display.requests.is_empty());
    }

    #[test]
    fn unmanage_on_hidden_desktop_does_not_retile() {
        let mut wm = harness();
        wm.manage_test_windows(&[1]);
        wm.change_desktop(1).unwrap();
        wm.manage_test_windows(&[2]);
        wm.display.requests.clear();

        assert!(wm.unmanage(1).unwrap());

        assert!(wm.display.requests.is_empty());
        assert!(wm.desktops.stored(0).unwrap().clients.is_empty());
        assert_eq!(wm.live().clients.windows(), vec![2]);
    }

    #[test]
    fn unmanage_unknown_window_changes_nothing() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2]);
        wm.display.requests.clear();

        assert!(!wm.unmanage(99).unwrap());
        assert!(wm.display.requests.is_empty());
        assert_eq!(wm.live().clients.windows(), vec![2, 1]);
    }

    #[test]
    fn kill_client_closes_and_forgets_current() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2]);
        wm.kill_client().unwrap();

        assert!(wm.display.requests.contains(&Request::Close(2, true)));
        assert_eq!(wm.live().clients.windows(), vec![1]);
        assert_eq!(wm.display.focused(), Some(1));
    }

    #[test]
    fn switch_mode_resets_master_for_the_new_axis() {
        let mut wm = harness();
        wm.live_mut().master_size = 300;
        wm.switch_mode(LayoutMode::Bstack).unwrap();
        assert_eq!(wm.live().master_size, 416);
        wm.switch_mode(LayoutMode::Grid).unwrap();
        assert_eq!(wm.live().master_size, 624);
    }

    #[test]
    fn monocycle_keeps_the_master_size() {
        let mut wm = harness();
        wm.live_mut().master_size = 300;
        wm.switch_mode(LayoutMode::Monocycle).unwrap();
        assert_eq!(wm.live().master_size, 300);
        assert_eq!(wm.live().mode, LayoutMode::Monocycle);
    }

    #[test]
    fn resizing_is_clamped() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2, 3, 4]);
        for _ in 0..200 {
            wm.resize_master(-10).unwrap();
            wm.resize_stack(-10).unwrap();
        }
        assert_eq!(wm.live().master_size, layout::MIN_WINDOW_SIZE);
        for _ in 0..400 {
            wm.resize_master(10).unwrap();
            wm.resize_stack(10).unwrap();
        }
        assert_eq!(wm.live().master_size, 1200 - layout::MIN_WINDOW_SIZE);
        for (_, cell) in wm.display.last_layout() {
            assert!(cell.width >= layout::MIN_WINDOW_SIZE);
            assert!(cell.height >= layout::MIN_WINDOW_SIZE);
        }
    }

    #[test]
    fn growth_resets_when_stack_has_one_client() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2, 3]);
        wm.resize_stack(40).unwrap();
        assert_eq!(wm.live().growth, 40);
        wm.unmanage(3).unwrap();
        assert_eq!(wm.live().growth, 0);
    }

    #[test]
    fn growth_reset_ignores_overlays() {
        let mut wm = harness();
        wm.manage_test_windows(&[1, 2, 3]);
        wm.resize_stack(40).unwrap();
        wm.display.kinds.insert(9, crate::backend::WindowKind::Overlay);
        wm.manage_test_windows(&[9]);
        assert_eq!(wm.live().growth, 40);

        wm.unmanage(1).unwrap();
        assert_eq!(wm.live().tiled_windows().len(), 2);
        assert_eq!(wm.live().growth, 0);

        wm.manage_test_windows(&[4]);
        assert_eq!(wm.live().growth, 0);
    }

    #[test]
    fn toggle_panel_frees_and_restores_the_reserve() {
        let mut wm = harness();
        wm.manage_test_windows(&[1]);
        wm.display.requests.clear();

        wm.toggle_panel().unwrap();
        assert!(!wm.panel_visible());
        assert_eq!(wm.usable_area(), WindowGeometry::new(0, 0, 1200, 818));
        assert_eq!(
            wm.display.move_resizes(),
            vec![(1, WindowGeometry::new(0, 0, 1200, 818), 0)]
        );

        wm.toggle_panel().unwrap();
        assert_eq!(wm.usable_area(), WindowGeometry::new(0, 18, 1200, 800));
    }

    #[test]
    fn hidden_panel_at_startup() {
        let mut config = RuntimeConfig::default();
        config.show_panel = false;
        let wm = harness_with(config);
        assert_eq!(wm.usable_area(), WindowGeometry::new(0, 0, 1200, 818));
        assert_eq!(wm.live().master_size, 624);
    }

    #[test]
    fn rotate_filled_skips_empty_desktops() {
        let mut wm = harness();
        wm.manage_test_windows(&[1]);
        wm.change_desktop(2).unwrap();
        wm.manage_test_windows(&[2]);

        wm.rotate_filled(1).unwrap();
        assert_eq!(wm.desktops.current(), 0);
        wm.rotate_filled(-1).unwrap();
        assert_eq!(wm.desktops.current(), 2);
        wm.rotate_filled(-1).unwrap();
        assert_eq!(wm.desktops.current(), 0);
    }

    #[test]
    fn rotate_filled_without_other_clients_stays() {
        let mut wm = harness();
        wm.manage_test_windows(&[1]);
        wm.display.requests.clear();
        wm.rotate_filled(1).unwrap();
        assert_eq!(wm.desktops.current(), 0);
        assert!(wm.display.requests.is_empty());
    }

    #[test]
    fn quit_records_exit_code() {
        let mut wm = harness();
        wm.quit(7);
        assert!(!wm.is_running());
        assert_eq!(wm.exit_code(), 7);
    }

    #[test]
    fn spawn_queues_launch_intents() {
        let mut wm = harness();
        wm.spawn(&["xterm".to_owned()]);
        wm.spawn(&[]);
        assert_eq!(wm.take_launches(), vec![LaunchIntent::new(vec!["xterm".to_owned()])]);
        assert!(wm.take_launches().is_empty());
    }

    #[test]
    fn status_line_only_when_enabled_and_changed() {
        let mut wm = harness();
        assert_eq!(wm.status_line(), None);
        wm.config.emit_desktop_status = true;
        assert_eq!(
            wm.status_line().as_deref(),
            Some("0:1:0:0:0:1:0 0:1:1:0:0:0:0 0:1:2:0:2:0:0 0:1:3:0:1:0:0")
        );
        assert_eq!(wm.status_line(), None);
    }

    #[test]
    fn shutdown_closes_windows_on_every_desktop() {
        let mut wm = harness();
        wm.manage_test_windows(&[1]);
        wm.change_desktop(1).unwrap();
        wm.manage_test_windows(&[2]);
        wm.display.requests.clear();

        wm.shutdown().unwrap();

        assert!(wm.display.requests.contains(&Request::Close(1, false)));
        assert!(wm.display.requests.contains(&Request::Close(2, false)));
        assert!(wm.display.requests.contains(&Request::Release));
    }
}
