//! Desktop-state feed read by external pagers and status bars.
//!
//! One line per change, one `mon:active_mon:desktop:windows:mode:current:urgent`
//! token per desktop, separated by spaces.

use crate::desktop::DesktopStore;

#[derive(Debug, Default)]
pub struct StatusFeed {
    last: Option<String>,
}

impl StatusFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// The rendered line if it differs from the last one handed out.
    pub fn update(&mut self, store: &DesktopStore) -> Option<String> {
        let line = render(store);
        if self.last.as_deref() == Some(line.as_str()) {
            return None;
        }
        self.last = Some(line.clone());
        Some(line)
    }
}

pub fn render(store: &DesktopStore) -> String {
    let current = store.current();
    store
        .summaries()
        .map(|(id, desktop)| {
            format!(
                "0:1:{id}:{windows}:{mode}:{is_current}:0",
                windows = desktop.clients.len(),
                mode = desktop.mode.index(),
                is_current = u8::from(id == current),
            )
        })
        .collect::<Vec<_>>()
        .join(" ")
}
