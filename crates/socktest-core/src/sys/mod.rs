//! The syscall seam.
//!
//! [`Syscalls`] is the narrow interface the switch wraps: the six socket
//! primitives with native-like signatures, failing with [`Errno`]. Two
//! backends ship here:
//!
//! - [`HostSyscalls`]: the running kernel, via `libc::syscall`.
//! - [`SimSyscalls`]: an in-process descriptor allocator for deterministic
//!   tests, with injectable failures and per-operation call counters.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::errno::Errno;

#[allow(unsafe_code)]
#[cfg(target_os = "linux")]
mod host;
mod sim;

#[cfg(target_os = "linux")]
pub use host::HostSyscalls;
pub use sim::SimSyscalls;

/// Socket syscall category. `accept` and `accept4` share [`SysOp::Accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SysOp {
    Socket,
    Connect,
    Listen,
    Accept,
    GetsockoptInt,
    Close,
}

impl SysOp {
    /// Every category, in syscall-lifecycle order.
    pub const ALL: [SysOp; 6] = [
        SysOp::Socket,
        SysOp::Connect,
        SysOp::Listen,
        SysOp::Accept,
        SysOp::GetsockoptInt,
        SysOp::Close,
    ];

    /// Lowercase syscall name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SysOp::Socket => "socket",
            SysOp::Connect => "connect",
            SysOp::Listen => "listen",
            SysOp::Accept => "accept",
            SysOp::GetsockoptInt => "getsockopt",
            SysOp::Close => "close",
        }
    }
}

/// Socket system calls as consumed by the switch.
///
/// Descriptors are plain `i32`s; an implementation owns whatever they refer
/// to. Every method must be callable from many threads at once.
pub trait Syscalls: Send + Sync {
    /// `socket(family, type, protocol)`.
    fn socket(&self, family: i32, sotype: i32, proto: i32) -> Result<i32, Errno>;

    /// `connect(fd, addr)`.
    fn connect(&self, fd: i32, addr: &SocketAddr) -> Result<(), Errno>;

    /// `listen(fd, backlog)`.
    fn listen(&self, fd: i32, backlog: i32) -> Result<(), Errno>;

    /// `accept(fd)`, returning the new descriptor and the peer address when
    /// the family has one.
    fn accept(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno>;

    /// `accept4(fd, flags)`.
    fn accept4(&self, fd: i32, flags: i32) -> Result<(i32, Option<SocketAddr>), Errno>;

    /// `getsockopt(fd, level, opt)` for an `int`-valued option.
    fn getsockopt_int(&self, fd: i32, level: i32, opt: i32) -> Result<i32, Errno>;

    /// `close(fd)`.
    fn close(&self, fd: i32) -> Result<(), Errno>;
}

impl<T: Syscalls + ?Sized> Syscalls for Arc<T> {
    fn socket(&self, family: i32, sotype: i32, proto: i32) -> Result<i32, Errno> {
        (**self).socket(family, sotype, proto)
    }

    fn connect(&self, fd: i32, addr: &SocketAddr) -> Result<(), Errno> {
        (**self).connect(fd, addr)
    }

    fn listen(&self, fd: i32, backlog: i32) -> Result<(), Errno> {
        (**self).listen(fd, backlog)
    }

    fn accept(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        (**self).accept(fd)
    }

    fn accept4(&self, fd: i32, flags: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        (**self).accept4(fd, flags)
    }

    fn getsockopt_int(&self, fd: i32, level: i32, opt: i32) -> Result<i32, Errno> {
        (**self).getsockopt_int(fd, level, opt)
    }

    fn close(&self, fd: i32) -> Result<(), Errno> {
        (**self).close(fd)
    }
}
