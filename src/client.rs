//! Ordered set of managed windows on one desktop.
//!
//! Clients live in an arena. Links between neighbours are optional slot
//! indices, so removal only returns a slot to the free list and no handle can
//! dangle. The list is linear: `next`/`prev` wrap around at traversal time.

use x11rb::protocol::xproto::Window;

/// Stable handle to a client slot inside one [`ClientList`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(usize);

/// Where [`ClientList::insert`] places a new client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertPoint {
    Head,
    Tail,
}

#[derive(Clone, Debug)]
struct Client {
    window: Window,
    prev: Option<ClientId>,
    next: Option<ClientId>,
}

#[derive(Clone, Debug)]
enum Slot {
    Occupied(Client),
    Free { next_free: Option<usize> },
}

#[derive(Clone, Debug, Default)]
pub struct ClientList {
    slots: Vec<Slot>,
    free_head: Option<usize>,
    head: Option<ClientId>,
    current: Option<ClientId>,
    len: usize,
}

impl ClientList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<ClientId> {
        self.head
    }

    pub fn current(&self) -> Option<ClientId> {
        self.current
    }

    pub fn current_window(&self) -> Option<Window> {
        self.current.and_then(|id| self.window(id))
    }

    /// Makes `id` the current client. Ignored for stale handles.
    pub fn set_current(&mut self, id: ClientId) {
        if self.client(id).is_some() {
            self.current = Some(id);
        }
    }

    pub fn window(&self, id: ClientId) -> Option<Window> {
        self.client(id).map(|client| client.window)
    }

    /// Inserts `window` and makes it the current client.
    pub fn insert(&mut self, window: Window, at: InsertPoint) -> ClientId {
        let id = self.allocate(Client {
            window,
            prev: None,
            next: None,
        });

        match (self.head, at) {
            (None, _) => self.head = Some(id),
            (Some(old_head), InsertPoint::Head) => {
                self.client_mut(id).next = Some(old_head);
                self.client_mut(old_head).prev = Some(id);
                self.head = Some(id);
            }
            (Some(_), InsertPoint::Tail) => {
                if let Some(tail) = self.tail() {
                    self.client_mut(tail).next = Some(id);
                    self.client_mut(id).prev = Some(tail);
                }
            }
        }

        self.len += 1;
        self.current = Some(id);
        id
    }

    /// Unlinks `id` and returns its window.
    ///
    /// The current client becomes the removed node's predecessor, or the new
    /// head when it had none, or nothing when the list is now empty.
    pub fn remove(&mut self, id: ClientId) -> Option<Window> {
        let Client { window, prev, next } = self.client(id)?.clone();

        match prev {
            Some(prev) => self.client_mut(prev).next = next,
            None => self.head = next,
        }
        if let Some(next) = next {
            self.client_mut(next).prev = prev;
        }

        self.slots[id.0] = Slot::Free {
            next_free: self.free_head,
        };
        self.free_head = Some(id.0);
        self.len -= 1;
        self.current = prev.or(self.head);

        Some(window)
    }

    pub fn find_by_window(&self, window: Window) -> Option<ClientId> {
        self.iter()
            .find(|&(_, candidate)| candidate == window)
            .map(|(id, _)| id)
    }

    pub fn contains(&self, window: Window) -> bool {
        self.find_by_window(window).is_some()
    }

    /// Successor of `id`, wrapping from the tail to the head.
    pub fn next(&self, id: ClientId) -> Option<ClientId> {
        let client = self.client(id)?;
        client.next.or(self.head)
    }

    /// Predecessor of `id`, wrapping from the head to the tail.
    pub fn prev(&self, id: ClientId) -> Option<ClientId> {
        let client = self.client(id)?;
        client.prev.or_else(|| self.tail())
    }

    /// Stored successor without wraparound.
    pub fn successor(&self, id: ClientId) -> Option<ClientId> {
        self.client(id)?.next
    }

    /// Stored predecessor without wraparound.
    pub fn predecessor(&self, id: ClientId) -> Option<ClientId> {
        self.client(id)?.prev
    }

    pub fn tail(&self) -> Option<ClientId> {
        let mut cursor = self.head?;
        while let Some(next) = self.client(cursor)?.next {
            cursor = next;
        }
        Some(cursor)
    }

    /// Exchanges the windows held by `a` and `b`; linkage is untouched.
    pub fn swap(&mut self, a: ClientId, b: ClientId) -> bool {
        let (Some(window_a), Some(window_b)) = (self.window(a), self.window(b)) else {
            return false;
        };
        self.client_mut(a).window = window_b;
        self.client_mut(b).window = window_a;
        true
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Windows in list order, head first.
    pub fn windows(&self) -> Vec<Window> {
        self.iter().map(|(_, window)| window).collect()
    }

    fn allocate(&mut self, client: Client) -> ClientId {
        match self.free_head {
            Some(index) => {
                if let Slot::Free { next_free } = self.slots[index] {
                    self.free_head = next_free;
                }
                self.slots[index] = Slot::Occupied(client);
                ClientId(index)
            }
            None => {
                self.slots.push(Slot::Occupied(client));
                ClientId(self.slots.len() - 1)
            }
        }
    }

    fn client(&self, id: ClientId) -> Option<&Client> {
        match self.slots.get(id.0) {
            Some(Slot::Occupied(client)) => Some(client),
            _ => None,
        }
    }

    // Only called with handles obtained from live links.
    fn client_mut(&mut self, id: ClientId) -> &mut Client {
        match &mut self.slots[id.0] {
            Slot::Occupied(client) => client,
            Slot::Free { .. } => unreachable!("link to freed client slot {}", id.0),
        }
    }
}

pub struct Iter<'a> {
    list: &'a ClientList,
    cursor: Option<ClientId>,
}

impl Iterator for Iter<'_> {
    type Item = (ClientId, Window);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let client = self.list.client(id)?;
        self.cursor = client.next;
        Some((id, client.window))
    }
}
