//! Deterministic in-process socket backend.
//!
//! `SimSyscalls` hands out descriptors the way a kernel does (lowest free
//! number first, starting after stdio) and enforces just enough socket state
//! for the lifecycle calls to fail realistically: unknown descriptors give
//! `EBADF`, `accept` on a non-listener gives `EINVAL`, and so on. No data
//! moves anywhere.
//!
//! Tests steer it with [`SimSyscalls::fail_next`] and
//! [`SimSyscalls::set_socket_error`], and observe it through
//! [`SimSyscalls::calls`].

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use parking_lot::Mutex;

use super::{SysOp, Syscalls};
use crate::errno::{
    EAFNOSUPPORT, EBADF, EINVAL, EISCONN, ENOPROTOOPT, EOPNOTSUPP, Errno,
};
use crate::socket::{
    AF_INET, AF_INET6, AF_UNSPEC, SO_ERROR, SO_TYPE, SOCK_DGRAM, SOL_SOCKET, base_socket_type,
    valid_address_family, valid_backlog, valid_socket_type,
};

/// First descriptor handed out; 0..=2 belong to stdio.
const FIRST_FD: i32 = 3;
/// First simulated peer port reported by `accept`.
const FIRST_PEER_PORT: u16 = 40_000;

#[derive(Debug, Clone, Copy)]
struct SimSocket {
    family: i32,
    sotype: i32,
    listening: bool,
    backlog: i32,
    connected: bool,
    so_error: i32,
}

#[derive(Debug, Default)]
struct SimState {
    open: BTreeMap<i32, SimSocket>,
    injected: HashMap<SysOp, VecDeque<Errno>>,
    calls: HashMap<SysOp, u64>,
    next_peer_port: u16,
}

impl SimState {
    fn enter(&mut self, op: SysOp) -> Result<(), Errno> {
        *self.calls.entry(op).or_insert(0) += 1;
        match self.injected.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn lowest_free_fd(&self) -> i32 {
        let mut fd = FIRST_FD;
        for &used in self.open.range(FIRST_FD..).map(|(k, _)| k) {
            if used != fd {
                break;
            }
            fd += 1;
        }
        fd
    }

    fn get(&self, fd: i32) -> Result<&SimSocket, Errno> {
        self.open.get(&fd).ok_or(Errno(EBADF))
    }

    fn get_mut(&mut self, fd: i32) -> Result<&mut SimSocket, Errno> {
        self.open.get_mut(&fd).ok_or(Errno(EBADF))
    }

    fn peer_addr(&mut self, family: i32) -> Option<SocketAddr> {
        let port = FIRST_PEER_PORT.wrapping_add(self.next_peer_port);
        self.next_peer_port = self.next_peer_port.wrapping_add(1);
        match family {
            AF_INET => Some(SocketAddr::from((Ipv4Addr::LOCALHOST, port))),
            AF_INET6 => Some(SocketAddr::from((Ipv6Addr::LOCALHOST, port))),
            _ => None,
        }
    }
}

/// Simulated socket syscalls.
#[derive(Debug, Default)]
pub struct SimSyscalls {
    state: Mutex<SimState>,
}

impl SimSyscalls {
    /// Create a backend with no open descriptors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of category `op` fail with `errno` before it has
    /// any effect. Queued failures are consumed in order.
    pub fn fail_next(&self, op: SysOp, errno: Errno) {
        self.state
            .lock()
            .injected
            .entry(op)
            .or_default()
            .push_back(errno);
    }

    /// Number of calls of category `op` that reached this backend.
    #[must_use]
    pub fn calls(&self, op: SysOp) -> u64 {
        self.state.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Set the pending `SO_ERROR` reported (once) by the next
    /// `getsockopt(fd, SOL_SOCKET, SO_ERROR)`.
    pub fn set_socket_error(&self, fd: i32, errno: Errno) -> Result<(), Errno> {
        self.state.lock().get_mut(fd)?.so_error = errno.code();
        Ok(())
    }

    /// Whether `fd` is currently open.
    #[must_use]
    pub fn is_open(&self, fd: i32) -> bool {
        self.state.lock().open.contains_key(&fd)
    }

    /// Queue length `fd` is listening with, after clamping, or `None` if it
    /// is not a listening socket.
    #[must_use]
    pub fn listen_backlog(&self, fd: i32) -> Option<i32> {
        let state = self.state.lock();
        state
            .open
            .get(&fd)
            .filter(|socket| socket.listening)
            .map(|socket| socket.backlog)
    }

    /// Open descriptors in ascending order.
    #[must_use]
    pub fn open_descriptors(&self) -> Vec<i32> {
        self.state.lock().open.keys().copied().collect()
    }

    fn accept_inner(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        let mut state = self.state.lock();
        state.enter(SysOp::Accept)?;
        let listener = *state.get(fd)?;
        if !listener.listening {
            return Err(Errno(EINVAL));
        }
        let nfd = state.lowest_free_fd();
        state.open.insert(
            nfd,
            SimSocket {
                listening: false,
                backlog: 0,
                connected: true,
                so_error: 0,
                ..listener
            },
        );
        let peer = state.peer_addr(listener.family);
        Ok((nfd, peer))
    }
}

impl Syscalls for SimSyscalls {
    fn socket(&self, family: i32, sotype: i32, _proto: i32) -> Result<i32, Errno> {
        let mut state = self.state.lock();
        state.enter(SysOp::Socket)?;
        if family == AF_UNSPEC || !valid_address_family(family) {
            return Err(Errno(EAFNOSUPPORT));
        }
        if !valid_socket_type(sotype) {
            return Err(Errno(EINVAL));
        }
        let fd = state.lowest_free_fd();
        state.open.insert(
            fd,
            SimSocket {
                family,
                sotype: base_socket_type(sotype),
                listening: false,
                backlog: 0,
                connected: false,
                so_error: 0,
            },
        );
        Ok(fd)
    }

    fn connect(&self, fd: i32, _addr: &SocketAddr) -> Result<(), Errno> {
        let mut state = self.state.lock();
        state.enter(SysOp::Connect)?;
        let socket = state.get_mut(fd)?;
        if socket.listening {
            return Err(Errno(EINVAL));
        }
        if socket.connected && socket.sotype != SOCK_DGRAM {
            return Err(Errno(EISCONN));
        }
        socket.connected = true;
        Ok(())
    }

    fn listen(&self, fd: i32, backlog: i32) -> Result<(), Errno> {
        let mut state = self.state.lock();
        state.enter(SysOp::Listen)?;
        let socket = state.get_mut(fd)?;
        if socket.sotype == SOCK_DGRAM {
            return Err(Errno(EOPNOTSUPP));
        }
        socket.listening = true;
        socket.backlog = valid_backlog(backlog);
        Ok(())
    }

    fn accept(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        self.accept_inner(fd)
    }

    fn accept4(&self, fd: i32, _flags: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        self.accept_inner(fd)
    }

    fn getsockopt_int(&self, fd: i32, level: i32, opt: i32) -> Result<i32, Errno> {
        let mut state = self.state.lock();
        state.enter(SysOp::GetsockoptInt)?;
        let socket = state.get_mut(fd)?;
        match (level, opt) {
            (SOL_SOCKET, SO_ERROR) => Ok(std::mem::take(&mut socket.so_error)),
            (SOL_SOCKET, SO_TYPE) => Ok(socket.sotype),
            _ => Err(Errno(ENOPROTOOPT)),
        }
    }

    fn close(&self, fd: i32) -> Result<(), Errno> {
        let mut state = self.state.lock();
        state.enter(SysOp::Close)?;
        state.open.remove(&fd).map(|_| ()).ok_or(Errno(EBADF))
    }
}
