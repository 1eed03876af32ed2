//! Host-kernel smoke tests. Only operations that need no remote peer.

#![cfg(target_os = "linux")]

use socktest_core::errno::{EAFNOSUPPORT, EAGAIN, EBADF};
use socktest_core::socket::{AF_INET, SO_ERROR, SO_TYPE, SOCK_NONBLOCK, SOCK_STREAM, SOL_SOCKET};
use socktest_core::{Errno, HostSyscalls, Syscalls};

#[test]
fn socket_getsockopt_close_roundtrip() {
    let host = HostSyscalls::new();
    let fd = host.socket(AF_INET, SOCK_STREAM, 0).expect("socket");
    assert!(fd >= 0);
    assert_eq!(host.getsockopt_int(fd, SOL_SOCKET, SO_ERROR), Ok(0));
    assert_eq!(host.getsockopt_int(fd, SOL_SOCKET, SO_TYPE), Ok(SOCK_STREAM));
    assert_eq!(host.close(fd), Ok(()));
    assert_eq!(host.close(fd), Err(Errno(EBADF)));
}

#[test]
fn unsupported_family_fails() {
    let host = HostSyscalls::new();
    assert_eq!(host.socket(9999, SOCK_STREAM, 0), Err(Errno(EAFNOSUPPORT)));
}

#[test]
fn nonblocking_accept_without_peer_would_block() {
    let host = HostSyscalls::new();
    let fd = host
        .socket(AF_INET, SOCK_STREAM | SOCK_NONBLOCK, 0)
        .expect("socket");
    // listen on an unbound socket binds it to an ephemeral loopback-reachable port.
    host.listen(fd, 4).expect("listen");
    assert_eq!(host.accept(fd).map(|(nfd, _)| nfd), Err(Errno(EAGAIN)));
    host.close(fd).expect("close");
}

#[test]
fn out_of_range_backlogs_are_clamped() {
    let host = HostSyscalls::new();
    for backlog in [-1, i32::MAX] {
        let fd = host.socket(AF_INET, SOCK_STREAM, 0).expect("socket");
        assert_eq!(host.listen(fd, backlog), Ok(()));
        host.close(fd).expect("close");
    }
}
