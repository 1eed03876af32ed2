//! Socket constants.
//!
//! `<sys/socket.h>` and `<netinet/in.h>` values the switch needs to derive
//! socket identities, plus the naming used when rendering them for
//! diagnostics. Values are the Linux ones.

// ---------------------------------------------------------------------------
// Address families (AF_*)
// ---------------------------------------------------------------------------

/// Unspecified address family.
pub const AF_UNSPEC: i32 = 0;
/// Unix domain sockets.
pub const AF_UNIX: i32 = 1;
/// IPv4 Internet protocols.
pub const AF_INET: i32 = 2;
/// IPv6 Internet protocols.
pub const AF_INET6: i32 = 10;
/// Kernel user interface device.
pub const AF_NETLINK: i32 = 16;

// ---------------------------------------------------------------------------
// Socket types (SOCK_*)
// ---------------------------------------------------------------------------

/// Byte-stream socket.
pub const SOCK_STREAM: i32 = 1;
/// Datagram socket.
pub const SOCK_DGRAM: i32 = 2;
/// Raw network protocol access.
pub const SOCK_RAW: i32 = 3;
/// Sequenced, reliable, connection-based datagrams.
pub const SOCK_SEQPACKET: i32 = 5;

/// Set O_NONBLOCK on the new socket.
pub const SOCK_NONBLOCK: i32 = 0x800;
/// Set FD_CLOEXEC on the new socket.
pub const SOCK_CLOEXEC: i32 = 0x80000;

/// Bits of the `socket()` type argument that select the base type.
pub const SOCK_TYPE_MASK: i32 = 0xff;

// ---------------------------------------------------------------------------
// Protocols (IPPROTO_*)
// ---------------------------------------------------------------------------

/// Default protocol for the family/type pair.
pub const IPPROTO_IP: i32 = 0;
/// Transmission Control Protocol.
pub const IPPROTO_TCP: i32 = 6;
/// User Datagram Protocol.
pub const IPPROTO_UDP: i32 = 17;

// ---------------------------------------------------------------------------
// Levels and options
// ---------------------------------------------------------------------------

/// Socket-level options (for `getsockopt`/`setsockopt`).
pub const SOL_SOCKET: i32 = 1;
/// Socket type (get only).
pub const SO_TYPE: i32 = 3;
/// Pending error (get only).
pub const SO_ERROR: i32 = 4;

/// Largest pending-connection queue `listen()` is asked for; larger
/// requests are clamped.
pub const SOMAXCONN: i32 = 4096;

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// Returns `true` if `af` is a recognized address family.
#[inline]
pub fn valid_address_family(af: i32) -> bool {
    matches!(af, AF_UNSPEC | AF_UNIX | AF_INET | AF_INET6 | AF_NETLINK)
}

/// Strips `SOCK_NONBLOCK`/`SOCK_CLOEXEC` and any other modifier bits.
#[inline]
pub fn base_socket_type(stype: i32) -> i32 {
    stype & SOCK_TYPE_MASK
}

/// Returns `true` if `stype` encodes a recognized base socket type.
#[inline]
pub fn valid_socket_type(stype: i32) -> bool {
    matches!(
        base_socket_type(stype),
        SOCK_STREAM | SOCK_DGRAM | SOCK_RAW | SOCK_SEQPACKET
    )
}

/// Clamps `backlog` into the range `[0, SOMAXCONN]`.
#[inline]
pub fn valid_backlog(backlog: i32) -> i32 {
    backlog.clamp(0, SOMAXCONN)
}

// ---------------------------------------------------------------------------
// Diagnostic names
// ---------------------------------------------------------------------------

/// `inet4`, `inet6`, `local`, or the decimal family number.
pub fn family_name(family: i32) -> String {
    match family {
        AF_INET => "inet4".to_string(),
        AF_INET6 => "inet6".to_string(),
        AF_UNIX => "local".to_string(),
        other => other.to_string(),
    }
}

/// Base type name followed by `|0x..` for any modifier bits.
pub fn type_name(stype: i32) -> String {
    let base = match base_socket_type(stype) {
        SOCK_STREAM => "stream".to_string(),
        SOCK_DGRAM => "datagram".to_string(),
        SOCK_RAW => "raw".to_string(),
        SOCK_SEQPACKET => "seqpacket".to_string(),
        other => other.to_string(),
    };
    let flags = (stype as u32) & !(SOCK_TYPE_MASK as u32);
    if flags != 0 {
        format!("{base}|{flags:#x}")
    } else {
        base
    }
}

/// `default` for 0, `tcp`, `udp`, or the decimal protocol number.
pub fn protocol_name(proto: i32) -> String {
    match proto {
        IPPROTO_IP => "default".to_string(),
        IPPROTO_TCP => "tcp".to_string(),
        IPPROTO_UDP => "udp".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_af_known_families() {
        assert!(valid_address_family(AF_UNSPEC));
        assert!(valid_address_family(AF_UNIX));
        assert!(valid_address_family(AF_INET));
        assert!(valid_address_family(AF_INET6));
        assert!(valid_address_family(AF_NETLINK));
        assert!(!valid_address_family(3));
        assert!(!valid_address_family(-1));
    }

    #[test]
    fn socket_type_ignores_modifier_flags() {
        assert!(valid_socket_type(SOCK_STREAM | SOCK_NONBLOCK));
        assert!(valid_socket_type(SOCK_DGRAM | SOCK_CLOEXEC));
        assert!(!valid_socket_type(SOCK_NONBLOCK | SOCK_CLOEXEC));
        assert!(!valid_socket_type(4)); // gap between RAW(3) and SEQPACKET(5)
        assert_eq!(base_socket_type(SOCK_STREAM | SOCK_CLOEXEC), SOCK_STREAM);
    }

    #[test]
    fn backlog_clamps() {
        assert_eq!(valid_backlog(-5), 0);
        assert_eq!(valid_backlog(128), 128);
        assert_eq!(valid_backlog(i32::MAX), SOMAXCONN);
    }

    #[test]
    fn names_render_known_and_unknown_values() {
        assert_eq!(family_name(AF_INET), "inet4");
        assert_eq!(family_name(AF_INET6), "inet6");
        assert_eq!(family_name(AF_UNIX), "local");
        assert_eq!(family_name(AF_NETLINK), "16");

        assert_eq!(type_name(SOCK_STREAM), "stream");
        assert_eq!(type_name(SOCK_SEQPACKET), "seqpacket");
        assert_eq!(type_name(SOCK_DGRAM | SOCK_NONBLOCK), "datagram|0x800");
        assert_eq!(type_name(9), "9");

        assert_eq!(protocol_name(0), "default");
        assert_eq!(protocol_name(IPPROTO_TCP), "tcp");
        assert_eq!(protocol_name(IPPROTO_UDP), "udp");
        assert_eq!(protocol_name(132), "132");
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn constants_match_host_libc() {
        assert_eq!(AF_INET6, libc::AF_INET6);
        assert_eq!(SOCK_NONBLOCK, libc::SOCK_NONBLOCK);
        assert_eq!(SOCK_CLOEXEC, libc::SOCK_CLOEXEC);
        assert_eq!(SOL_SOCKET, libc::SOL_SOCKET);
        assert_eq!(SO_ERROR, libc::SO_ERROR);
        assert_eq!(IPPROTO_TCP, libc::IPPROTO_TCP);
    }
}
