use crate::{
    backend::DisplayServer, errors::Result, layout::LayoutMode, state::Wren,
};

/// Everything a key binding can trigger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    KillClient,
    NextWindow,
    PreviousWindow,
    MoveDown,
    MoveUp,
    SwapMaster,
    ResizeMaster(i32),
    ResizeStack(i32),
    SwitchMode(LayoutMode),
    ChangeDesktop(usize),
    ClientToDesktop(usize),
    LastDesktop,
    RotateDesktop(i32),
    /// Like `RotateDesktop`, skipping desktops without clients.
    RotateFilled(i32),
    TogglePanel,
    Spawn(Vec<String>),
    Quit(i32),
}

enum Direction {
    Next,
    Previous,
}

impl Action {
    pub fn execute<D: DisplayServer>(&self, wren: &mut Wren<D>) -> Result<()> {
        match self {
            Action::KillClient => wren.kill_client(),
            Action::NextWindow => change_focus(Direction::Next, wren),
            Action::PreviousWindow => change_focus(Direction::Previous, wren),
            Action::MoveDown => move_client(Direction::Next, wren),
            Action::MoveUp => move_client(Direction::Previous, wren),
            Action::SwapMaster => swap_master(wren),
            Action::ResizeMaster(delta) => wren.resize_master(*delta),
            Action::ResizeStack(delta) => wren.resize_stack(*delta),
            Action::SwitchMode(mode) => wren.switch_mode(*mode),
            Action::ChangeDesktop(desktop) => wren.change_desktop(*desktop),
            Action::ClientToDesktop(desktop) => wren.client_to_desktop(*desktop),
            Action::LastDesktop => wren.last_desktop(),
            Action::RotateDesktop(delta) => wren.rotate_desktop(*delta),
            Action::RotateFilled(delta) => wren.rotate_filled(*delta),
            Action::TogglePanel => wren.toggle_panel(),
            Action::Spawn(argv) => {
                wren.spawn(argv);
                Ok(())
            }
            Action::Quit(code) => {
                wren.quit(*code);
                Ok(())
            }
        }
    }
}

fn change_focus<D: DisplayServer>(direction: Direction, wren: &mut Wren<D>) -> Result<()> {
    let clients = &wren.live().clients;
    let Some(current) = clients.current() else {
        return Ok(());
    };
    let target = match direction {
        Direction::Next => clients.next(current),
        Direction::Previous => clients.prev(current),
    };
    let Some(target) = target else {
        return Ok(());
    };

    wren.live_mut().clients.set_current(target);
    wren.refocus()
}

/// Swaps the current client with its neighbour and follows it. The master
/// never moves this way, and nothing moves into the master slot.
fn move_client<D: DisplayServer>(direction: Direction, wren: &mut Wren<D>) -> Result<()> {
    let clients = &wren.live().clients;
    let Some(current) = clients.current() else {
        return Ok(());
    };
    if clients.head() == Some(current) {
        return Ok(());
    }
    let neighbour = match direction {
        Direction::Next => clients.successor(current),
        Direction::Previous => clients
            .predecessor(current)
            .filter(|prev| clients.head() != Some(*prev)),
    };
    let Some(neighbour) = neighbour else {
        return Ok(());
    };

    let clients = &mut wren.live_mut().clients;
    clients.swap(current, neighbour);
    clients.set_current(neighbour);
    wren.retile()?;
    wren.refocus()
}

/// Puts the current client in the master slot; from the master, promotes the
/// first stacked client instead.
fn swap_master<D: DisplayServer>(wren: &mut Wren<D>) -> Result<()> {
    let live = wren.live();
    if live.clients.len() < 2 || live.mode == LayoutMode::Monocycle {
        return Ok(());
    }
    let (Some(head), Some(current)) = (live.clients.head(), live.clients.current()) else {
        return Ok(());
    };
    let target = if current == head {
        live.clients.successor(head)
    } else {
        Some(current)
    };
    let Some(target) = target else {
        return Ok(());
    };

    let clients = &mut wren.live_mut().clients;
    clients.swap(head, target);
    clients.set_current(head);
    wren.retile()?;
    wren.refocus()
}
