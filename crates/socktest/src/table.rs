//! Socket status table and per-cookie stat aggregation.
//!
//! Both live behind one lock owned by the switch, so a single call's
//! bookkeeping (status update plus counter bump) is never observed half
//! applied by a snapshot.
//!
//! Entries carry a generation number. A descriptor closed and reopened while
//! another thread was inside a syscall on the old socket gets a new
//! generation, and the stale thread's update or removal no longer matches it.

use std::collections::{BTreeMap, HashMap};

use crate::cookie::Cookie;
use crate::status::{Sockets, Stat, Status};

/// Lifecycle counter selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Counter {
    Opened,
    Connected,
    Listened,
    Accepted,
    Closed,
    OpenFailed,
    ConnectFailed,
    ListenFailed,
    AcceptFailed,
    CloseFailed,
}

impl Counter {
    /// Success or failure counter for one operation outcome.
    pub(crate) fn pick(ok: bool, success: Counter, failure: Counter) -> Counter {
        if ok { success } else { failure }
    }
}

/// A tracked descriptor as seen by one in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tracked {
    pub fd: i32,
    pub generation: u64,
    pub status: Status,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    generation: u64,
    status: Status,
}

#[derive(Debug, Default)]
pub(crate) struct Tables {
    sockets: HashMap<i32, Entry>,
    stats: BTreeMap<Cookie, Stat>,
    next_generation: u64,
}

impl Tables {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start tracking `fd` with a fresh status. Any entry already under `fd`
    /// belongs to a socket the OS has since released; it is replaced
    /// outright, never merged.
    pub(crate) fn insert(&mut self, fd: i32, cookie: Cookie) -> Tracked {
        debug_assert!(!cookie.is_zero(), "tracked sockets need a non-zero cookie");
        self.next_generation += 1;
        let entry = Entry {
            generation: self.next_generation,
            status: Status::new(cookie),
        };
        self.sockets.insert(fd, entry);
        Tracked {
            fd,
            generation: entry.generation,
            status: entry.status,
        }
    }

    pub(crate) fn lookup(&self, fd: i32) -> Option<Tracked> {
        self.sockets.get(&fd).map(|entry| Tracked {
            fd,
            generation: entry.generation,
            status: entry.status,
        })
    }

    /// Apply `mutate` to the live entry if it is still the one `tracked`
    /// refers to, and return the resulting status. If the descriptor has
    /// since been closed or recycled the mutation lands on a private copy.
    pub(crate) fn update(&mut self, tracked: &Tracked, mutate: impl FnOnce(&mut Status)) -> Status {
        match self.sockets.get_mut(&tracked.fd) {
            Some(entry) if entry.generation == tracked.generation => {
                mutate(&mut entry.status);
                entry.status
            }
            _ => {
                let mut status = tracked.status;
                mutate(&mut status);
                status
            }
        }
    }

    /// Stop tracking `tracked.fd` if it still refers to the same socket.
    pub(crate) fn remove(&mut self, tracked: &Tracked) -> bool {
        match self.sockets.get(&tracked.fd) {
            Some(entry) if entry.generation == tracked.generation => {
                self.sockets.remove(&tracked.fd);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn record(&mut self, cookie: Cookie, counter: Counter) {
        let st = self.stats.entry(cookie).or_insert_with(|| Stat::new(cookie));
        let slot = match counter {
            Counter::Opened => &mut st.opened,
            Counter::Connected => &mut st.connected,
            Counter::Listened => &mut st.listened,
            Counter::Accepted => &mut st.accepted,
            Counter::Closed => &mut st.closed,
            Counter::OpenFailed => &mut st.open_failed,
            Counter::ConnectFailed => &mut st.connect_failed,
            Counter::ListenFailed => &mut st.listen_failed,
            Counter::AcceptFailed => &mut st.accept_failed,
            Counter::CloseFailed => &mut st.close_failed,
        };
        *slot = slot.saturating_add(1);
    }

    pub(crate) fn sockets(&self) -> Sockets {
        self.sockets
            .iter()
            .map(|(&fd, entry)| (fd, entry.status))
            .collect()
    }

    /// Stats for every cookie seen so far, ordered by cookie.
    pub(crate) fn stats(&self) -> Vec<Stat> {
        self.stats.values().copied().collect()
    }
}
