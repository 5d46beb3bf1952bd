//! Per-desktop state and the save/select discipline around the live desktop.
//!
//! Exactly one desktop is checked out as the [`ActiveDesktop`]. Mutations go
//! to that checked-out copy and only reach the store through [`DesktopStore::save`];
//! [`DesktopStore::select`] replaces the checked-out copy wholesale, so a
//! switch is never partial.

use x11rb::protocol::xproto::Window;

use crate::{
    client::{ClientList, InsertPoint},
    errors::{Result, WmError},
    layout::LayoutMode,
};

#[derive(Clone, Debug, Default)]
pub struct Desktop {
    pub clients: ClientList,
    pub mode: LayoutMode,
    pub master_size: i32,
    pub growth: i32,
    /// Managed windows kept out of the tiled set (dialogs, transients).
    pub floating: Vec<Window>,
}

impl Desktop {
    pub fn new(mode: LayoutMode, master_size: i32) -> Self {
        Self {
            clients: ClientList::new(),
            mode,
            master_size,
            growth: 0,
            floating: Vec::new(),
        }
    }

    pub fn is_floating(&self, window: Window) -> bool {
        self.floating.contains(&window)
    }

    /// Windows that take part in tiling, in list order.
    pub fn tiled_windows(&self) -> Vec<Window> {
        self.clients
            .iter()
            .map(|(_, window)| window)
            .filter(|window| !self.is_floating(*window))
            .collect()
    }

    pub fn insert_window(&mut self, window: Window, at: InsertPoint, floating: bool) {
        self.clients.insert(window, at);
        if floating {
            self.floating.push(window);
        }
    }

    /// Unlinks `window` if it is managed here.
    pub fn remove_window(&mut self, window: Window) -> bool {
        let Some(id) = self.clients.find_by_window(window) else {
            return false;
        };
        self.clients.remove(id);
        self.floating.retain(|candidate| *candidate != window);
        true
    }
}

#[derive(Clone, Debug)]
pub struct ActiveDesktop {
    id: usize,
    desktop: Desktop,
}

impl ActiveDesktop {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl std::ops::Deref for ActiveDesktop {
    type Target = Desktop;

    fn deref(&self) -> &Desktop {
        &self.desktop
    }
}

impl std::ops::DerefMut for ActiveDesktop {
    fn deref_mut(&mut self) -> &mut Desktop {
        &mut self.desktop
    }
}

#[derive(Debug)]
pub struct DesktopStore {
    slots: Vec<Desktop>,
    active: ActiveDesktop,
    previous: usize,
}

impl DesktopStore {
    /// Builds `count` desktops from `init` and checks out `selected`.
    pub fn new(count: usize, selected: usize, init: impl Fn(usize) -> Desktop) -> Result<Self> {
        let slots: Vec<Desktop> = (0..count).map(init).collect();
        let desktop = slots
            .get(selected)
            .cloned()
            .ok_or(WmError::InvalidDesktop(selected))?;
        Ok(Self {
            slots,
            active: ActiveDesktop {
                id: selected,
                desktop,
            },
            previous: selected,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn current(&self) -> usize {
        self.active.id
    }

    /// Desktop that was live before the last switch.
    pub fn previous(&self) -> usize {
        self.previous
    }

    pub fn live(&self) -> &ActiveDesktop {
        &self.active
    }

    pub fn live_mut(&mut self) -> &mut ActiveDesktop {
        &mut self.active
    }

    /// Stored copy of desktop `id`; for the live desktop this is the state as of
    /// its last [`save`](Self::save).
    pub fn stored(&self, id: usize) -> Option<&Desktop> {
        self.slots.get(id)
    }

    /// Writes the live working values into slot `id`.
    pub fn save(&mut self, id: usize) -> Result<()> {
        let slot = self.slots.get_mut(id).ok_or(WmError::InvalidDesktop(id))?;
        *slot = self.active.desktop.clone();
        Ok(())
    }

    /// Loads slot `id` into the live working values and makes it active.
    pub fn select(&mut self, id: usize) -> Result<()> {
        let desktop = self.slots.get(id).cloned().ok_or(WmError::InvalidDesktop(id))?;
        self.active = ActiveDesktop { id, desktop };
        Ok(())
    }

    /// `save(current)` then `select(target)`, remembering where we came from.
    pub fn switch_to(&mut self, target: usize) -> Result<()> {
        if target >= self.slots.len() {
            return Err(WmError::InvalidDesktop(target));
        }
        let current = self.active.id;
        self.save(current)?;
        self.select(target)?;
        self.previous = current;
        Ok(())
    }

    /// Desktop holding `window`, live state first.
    pub fn locate(&self, window: Window) -> Option<usize> {
        if self.active.clients.contains(window) {
            return Some(self.active.id);
        }
        self.slots
            .iter()
            .enumerate()
            .filter(|&(id, _)| id != self.active.id)
            .find(|(_, desktop)| desktop.clients.contains(window))
            .map(|(id, _)| id)
    }

    /// Client counts and modes for every desktop, live state substituted for
    /// the active slot.
    pub fn summaries(&self) -> impl Iterator<Item = (usize, &Desktop)> {
        self.slots.iter().enumerate().map(move |(id, desktop)| {
            if id == self.active.id {
                (id, &self.active.desktop)
            } else {
                (id, desktop)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DesktopStore {
        DesktopStore::new(4, 0, |id| {
            let mode = if id == 2 { LayoutMode::Bstack } else { LayoutMode::Tile };
            Desktop::new(mode, 600)
        })
        .unwrap()
    }

    #[test]
    fn save_then_select_is_a_no_op() {
        let mut store = store();
        store.live_mut().clients.insert(5, InsertPoint::Head);
        store.live_mut().growth = 30;

        store.save(0).unwrap();
        store.select(0).unwrap();

        assert_eq!(store.current(), 0);
        assert_eq!(store.live().clients.windows(), vec![5]);
        assert_eq!(store.live().growth, 30);
        assert_eq!(store.live().clients.current_window(), Some(5));
    }

    #[test]
    fn select_without_save_discards_live_changes() {
        let mut store = store();
        store.live_mut().clients.insert(5, InsertPoint::Head);
        store.select(0).unwrap();
        assert!(store.live().clients.is_empty());
    }

    #[test]
    fn initial_slots_carry_their_defaults() {
        let mut store = store();
        store.select(2).unwrap();
        assert_eq!(store.live().mode, LayoutMode::Bstack);
        assert_eq!(store.live().master_size, 600);
        assert_eq!(store.live().growth, 0);
        assert!(store.live().clients.is_empty());
    }

    #[test]
    fn switching_preserves_each_desktop() {
        let mut store = store();
        store.live_mut().clients.insert(1, InsertPoint::Head);
        store.switch_to(1).unwrap();
        store.live_mut().clients.insert(2, InsertPoint::Head);
        store.switch_to(0).unwrap();

        assert_eq!(store.previous(), 1);
        assert_eq!(store.live().clients.windows(), vec![1]);
        assert_eq!(store.stored(1).unwrap().clients.windows(), vec![2]);
        assert_eq!(store.locate(2), Some(1));
        assert_eq!(store.locate(1), Some(0));
        assert_eq!(store.locate(3), None);
    }

    #[test]
    fn floating_windows_are_managed_but_not_tiled() {
        let mut store = store();
        let live = store.live_mut();
        live.insert_window(1, InsertPoint::Tail, false);
        live.insert_window(2, InsertPoint::Tail, true);
        live.insert_window(3, InsertPoint::Tail, false);

        assert_eq!(live.tiled_windows(), vec![1, 3]);
        assert_eq!(live.clients.len(), 3);

        assert!(live.remove_window(2));
        assert!(!live.is_floating(2));
        assert!(!live.remove_window(2));
        assert_eq!(live.clients.windows(), vec![1, 3]);
    }

    #[test]
    fn out_of_range_ids_are_rejected() {
        let mut store = store();
        assert!(matches!(store.select(4), Err(WmError::InvalidDesktop(4))));
        assert!(matches!(store.switch_to(9), Err(WmError::InvalidDesktop(9))));
        assert_eq!(store.current(), 0);
    }
}
