//! Host kernel backend.
//!
//! Thin wrappers over `libc::syscall`; a negative return is mapped to the
//! thread's errno. Address arguments are converted between
//! [`SocketAddr`] and `sockaddr_in`/`sockaddr_in6`; other families have no
//! `SocketAddr` form and come back from `accept` as `None`.

use std::ffi::c_int;
use std::mem::size_of;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use super::Syscalls;
use crate::errno::Errno;
use crate::socket::valid_backlog;

/// The running kernel's socket syscalls.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSyscalls;

impl HostSyscalls {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[inline]
fn ret_int(ret: libc::c_long) -> Result<i32, Errno> {
    if ret < 0 {
        Err(Errno::last_os_error())
    } else {
        Ok(ret as i32)
    }
}

#[inline]
fn ret_unit(ret: libc::c_long) -> Result<(), Errno> {
    ret_int(ret).map(|_| ())
}

fn encode_sockaddr(addr: &SocketAddr) -> (libc::sockaddr_storage, libc::socklen_t) {
    // SAFETY: sockaddr_storage is plain old data; all-zero is a valid value.
    let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
    let len = match addr {
        SocketAddr::V4(v4) => {
            let sin = libc::sockaddr_in {
                sin_family: libc::AF_INET as libc::sa_family_t,
                sin_port: v4.port().to_be(),
                sin_addr: libc::in_addr {
                    s_addr: u32::from(*v4.ip()).to_be(),
                },
                sin_zero: [0; 8],
            };
            // SAFETY: sockaddr_storage is large and aligned enough for any sockaddr.
            unsafe {
                std::ptr::write(
                    (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in>(),
                    sin,
                );
            }
            size_of::<libc::sockaddr_in>()
        }
        SocketAddr::V6(v6) => {
            let sin6 = libc::sockaddr_in6 {
                sin6_family: libc::AF_INET6 as libc::sa_family_t,
                sin6_port: v6.port().to_be(),
                sin6_flowinfo: v6.flowinfo(),
                sin6_addr: libc::in6_addr {
                    s6_addr: v6.ip().octets(),
                },
                sin6_scope_id: v6.scope_id(),
            };
            // SAFETY: as above.
            unsafe {
                std::ptr::write(
                    (&mut storage as *mut libc::sockaddr_storage).cast::<libc::sockaddr_in6>(),
                    sin6,
                );
            }
            size_of::<libc::sockaddr_in6>()
        }
    };
    (storage, len as libc::socklen_t)
}

fn decode_sockaddr(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Option<SocketAddr> {
    let len = len as usize;
    match storage.ss_family as c_int {
        libc::AF_INET if len >= size_of::<libc::sockaddr_in>() => {
            // SAFETY: family and length say the storage holds a sockaddr_in.
            let sin: libc::sockaddr_in = unsafe {
                std::ptr::read((storage as *const libc::sockaddr_storage).cast::<libc::sockaddr_in>())
            };
            let ip = Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr));
            Some(SocketAddr::V4(SocketAddrV4::new(
                ip,
                u16::from_be(sin.sin_port),
            )))
        }
        libc::AF_INET6 if len >= size_of::<libc::sockaddr_in6>() => {
            // SAFETY: family and length say the storage holds a sockaddr_in6.
            let sin6: libc::sockaddr_in6 = unsafe {
                std::ptr::read(
                    (storage as *const libc::sockaddr_storage).cast::<libc::sockaddr_in6>(),
                )
            };
            Some(SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::from(sin6.sin6_addr.s6_addr),
                u16::from_be(sin6.sin6_port),
                sin6.sin6_flowinfo,
                sin6.sin6_scope_id,
            )))
        }
        _ => None,
    }
}

impl Syscalls for HostSyscalls {
    fn socket(&self, family: i32, sotype: i32, proto: i32) -> Result<i32, Errno> {
        // SAFETY: socket takes no pointers.
        ret_int(unsafe { libc::syscall(libc::SYS_socket, family, sotype, proto) })
    }

    fn connect(&self, fd: i32, addr: &SocketAddr) -> Result<(), Errno> {
        let (storage, len) = encode_sockaddr(addr);
        // SAFETY: storage outlives the call and len covers the encoded address.
        ret_unit(unsafe {
            libc::syscall(
                libc::SYS_connect,
                fd,
                &storage as *const libc::sockaddr_storage,
                len,
            )
        })
    }

    fn listen(&self, fd: i32, backlog: i32) -> Result<(), Errno> {
        let backlog = valid_backlog(backlog);
        // SAFETY: listen takes no pointers.
        ret_unit(unsafe { libc::syscall(libc::SYS_listen, fd, backlog) })
    }

    fn accept(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        // accept(2) is accept4(2) with no flags; some architectures only
        // provide the latter.
        self.accept4(fd, 0)
    }

    fn accept4(&self, fd: i32, flags: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        // SAFETY: all-zero sockaddr_storage is valid.
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let mut len = size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        // SAFETY: storage and len are live, writable locals sized as advertised.
        let nfd = ret_int(unsafe {
            libc::syscall(
                libc::SYS_accept4,
                fd,
                &mut storage as *mut libc::sockaddr_storage,
                &mut len as *mut libc::socklen_t,
                flags,
            )
        })?;
        Ok((nfd, decode_sockaddr(&storage, len)))
    }

    fn getsockopt_int(&self, fd: i32, level: i32, opt: i32) -> Result<i32, Errno> {
        let mut value: c_int = 0;
        let mut len = size_of::<c_int>() as libc::socklen_t;
        // SAFETY: value and len are live, writable locals sized as advertised.
        ret_unit(unsafe {
            libc::syscall(
                libc::SYS_getsockopt,
                fd,
                level,
                opt,
                &mut value as *mut c_int,
                &mut len as *mut libc::socklen_t,
            )
        })?;
        Ok(value)
    }

    fn close(&self, fd: i32) -> Result<(), Errno> {
        // SAFETY: close on any value is memory safe; bad descriptors give EBADF.
        ret_unit(unsafe { libc::syscall(libc::SYS_close, fd) })
    }
}
