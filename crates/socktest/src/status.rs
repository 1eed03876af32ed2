//! Per-socket status and per-cookie statistics.

use std::collections::HashMap;
use std::fmt;

use socktest_core::Errno;

use crate::cookie::Cookie;

/// Snapshot of every tracked descriptor.
pub type Sockets = HashMap<i32, Status>;

/// What the switch knows about one tracked socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Identity the socket was created with.
    pub cookie: Cookie,
    /// Error from the most recent tracked syscall on this socket.
    pub err: Option<Errno>,
    /// Last pending error read through `getsockopt(SOL_SOCKET, SO_ERROR)`.
    pub socket_err: Option<Errno>,
}

impl Status {
    #[must_use]
    pub const fn new(cookie: Cookie) -> Self {
        Self {
            cookie,
            err: None,
            socket_err: None,
        }
    }
}

struct ErrDisplay(Option<Errno>);

impl fmt::Display for ErrDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(errno) => write!(f, "{errno}"),
            None => f.write_str("<nil>"),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: syscallerr={} socketerr={}",
            self.cookie,
            ErrDisplay(self.err),
            ErrDisplay(self.socket_err)
        )
    }
}

/// Cumulative lifecycle counters for one cookie.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    pub family: i32,
    pub sotype: i32,
    pub protocol: i32,

    pub opened: u64,
    pub connected: u64,
    pub listened: u64,
    pub accepted: u64,
    pub closed: u64,

    pub open_failed: u64,
    pub connect_failed: u64,
    pub listen_failed: u64,
    pub accept_failed: u64,
    pub close_failed: u64,
}

impl Stat {
    /// Zeroed counters for `cookie`.
    #[must_use]
    pub const fn new(cookie: Cookie) -> Self {
        Self {
            family: cookie.family(),
            sotype: cookie.sotype(),
            protocol: cookie.protocol(),
            opened: 0,
            connected: 0,
            listened: 0,
            accepted: 0,
            closed: 0,
            open_failed: 0,
            connect_failed: 0,
            listen_failed: 0,
            accept_failed: 0,
            close_failed: 0,
        }
    }

    /// The cookie these counters aggregate.
    #[must_use]
    pub const fn cookie(&self) -> Cookie {
        Cookie::new(self.family, self.sotype, self.protocol)
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: opened={} connected={} listened={} accepted={} closed={} \
             openfailed={} connectfailed={} listenfailed={} acceptfailed={} closefailed={}",
            self.cookie(),
            self.opened,
            self.connected,
            self.listened,
            self.accepted,
            self.closed,
            self.open_failed,
            self.connect_failed,
            self.listen_failed,
            self.accept_failed,
            self.close_failed,
        )
    }
}
