//! Error number definitions.
//!
//! Linux errno values used by the socket layer, and the [`Errno`] error type
//! every backend and the switch report failures with.

use thiserror::Error;

pub const EPERM: i32 = 1;
pub const ENOENT: i32 = 2;
pub const EINTR: i32 = 4;
pub const EIO: i32 = 5;
pub const EBADF: i32 = 9;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EACCES: i32 = 13;
pub const EFAULT: i32 = 14;
pub const EINVAL: i32 = 22;
pub const ENFILE: i32 = 23;
pub const EMFILE: i32 = 24;
pub const EPIPE: i32 = 32;
pub const ENOSYS: i32 = 38;
pub const ENOTSOCK: i32 = 88;
pub const EDESTADDRREQ: i32 = 89;
pub const EPROTOTYPE: i32 = 91;
pub const ENOPROTOOPT: i32 = 92;
pub const EPROTONOSUPPORT: i32 = 93;
pub const EOPNOTSUPP: i32 = 95;
pub const EAFNOSUPPORT: i32 = 97;
pub const EADDRINUSE: i32 = 98;
pub const EADDRNOTAVAIL: i32 = 99;
pub const ENETDOWN: i32 = 100;
pub const ENETUNREACH: i32 = 101;
pub const ECONNABORTED: i32 = 103;
pub const ECONNRESET: i32 = 104;
pub const ENOBUFS: i32 = 105;
pub const EISCONN: i32 = 106;
pub const ENOTCONN: i32 = 107;
pub const ETIMEDOUT: i32 = 110;
pub const ECONNREFUSED: i32 = 111;
pub const EHOSTUNREACH: i32 = 113;
pub const EALREADY: i32 = 114;
pub const EINPROGRESS: i32 = 115;

/// `EWOULDBLOCK` aliases `EAGAIN` on Linux.
pub const EWOULDBLOCK: i32 = EAGAIN;

/// A native error number returned by a socket syscall or injected by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Error)]
#[error("{} (errno {})", errno_name(.0), .0)]
pub struct Errno(pub i32);

impl Errno {
    /// Raw errno value.
    #[must_use]
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Symbolic name (`"ECONNREFUSED"`), or `"EUNKNOWN"` for values outside
    /// the table above.
    #[must_use]
    pub fn name(self) -> &'static str {
        errno_name(&self.0)
    }

    /// Errno left behind by the most recent failing libc call on this thread.
    #[must_use]
    pub fn last_os_error() -> Self {
        Self(
            std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(EINVAL),
        )
    }
}

impl From<Errno> for std::io::Error {
    fn from(errno: Errno) -> Self {
        std::io::Error::from_raw_os_error(errno.0)
    }
}

fn errno_name(code: &i32) -> &'static str {
    match *code {
        EPERM => "EPERM",
        ENOENT => "ENOENT",
        EINTR => "EINTR",
        EIO => "EIO",
        EBADF => "EBADF",
        EAGAIN => "EAGAIN",
        ENOMEM => "ENOMEM",
        EACCES => "EACCES",
        EFAULT => "EFAULT",
        EINVAL => "EINVAL",
        ENFILE => "ENFILE",
        EMFILE => "EMFILE",
        EPIPE => "EPIPE",
        ENOSYS => "ENOSYS",
        ENOTSOCK => "ENOTSOCK",
        EDESTADDRREQ => "EDESTADDRREQ",
        EPROTOTYPE => "EPROTOTYPE",
        ENOPROTOOPT => "ENOPROTOOPT",
        EPROTONOSUPPORT => "EPROTONOSUPPORT",
        EOPNOTSUPP => "EOPNOTSUPP",
        EAFNOSUPPORT => "EAFNOSUPPORT",
        EADDRINUSE => "EADDRINUSE",
        EADDRNOTAVAIL => "EADDRNOTAVAIL",
        ENETDOWN => "ENETDOWN",
        ENETUNREACH => "ENETUNREACH",
        ECONNABORTED => "ECONNABORTED",
        ECONNRESET => "ECONNRESET",
        ENOBUFS => "ENOBUFS",
        EISCONN => "EISCONN",
        ENOTCONN => "ENOTCONN",
        ETIMEDOUT => "ETIMEDOUT",
        ECONNREFUSED => "ECONNREFUSED",
        EHOSTUNREACH => "EHOSTUNREACH",
        EALREADY => "EALREADY",
        EINPROGRESS => "EINPROGRESS",
        _ => "EUNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(
            Errno(ECONNREFUSED).to_string(),
            "ECONNREFUSED (errno 111)"
        );
        assert_eq!(Errno(4000).to_string(), "EUNKNOWN (errno 4000)");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn values_match_host_libc() {
        assert_eq!(EBADF, libc::EBADF);
        assert_eq!(EAFNOSUPPORT, libc::EAFNOSUPPORT);
        assert_eq!(EISCONN, libc::EISCONN);
        assert_eq!(ECONNREFUSED, libc::ECONNREFUSED);
        assert_eq!(EINPROGRESS, libc::EINPROGRESS);
        assert_eq!(EWOULDBLOCK, libc::EWOULDBLOCK);
    }

    #[test]
    fn converts_into_io_error() {
        let err: std::io::Error = Errno(EPIPE).into();
        assert_eq!(err.raw_os_error(), Some(EPIPE));
    }
}
