//! Socket identity keys.

use std::fmt;

use socktest_core::socket::{SOCK_TYPE_MASK, family_name, protocol_name, type_name};

/// A socket's (address family, socket type, protocol) triple packed into
/// one comparable value.
///
/// Layout: family in bits 48..64, base socket type in bits 40..48, protocol
/// in bits 32..40. Type modifier flags such as `SOCK_NONBLOCK` are not part
/// of the identity, and protocols are truncated to their low byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cookie(u64);

impl Cookie {
    /// Derive the cookie for `socket(family, sotype, proto)`.
    #[must_use]
    pub const fn new(family: i32, sotype: i32, proto: i32) -> Self {
        let family = (family as u16) as u64;
        let sotype = (sotype & SOCK_TYPE_MASK) as u64;
        let proto = (proto & 0xff) as u64;
        Self(family << 48 | sotype << 40 | proto << 32)
    }

    /// Address family.
    #[must_use]
    pub const fn family(self) -> i32 {
        (self.0 >> 48) as i32
    }

    /// Base socket type.
    #[must_use]
    pub const fn sotype(self) -> i32 {
        ((self.0 >> 40) & 0xff) as i32
    }

    /// Protocol number.
    #[must_use]
    pub const fn protocol(self) -> i32 {
        ((self.0 >> 32) & 0xff) as i32
    }

    /// Packed representation.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// An all-zero triple never identifies a tracked socket.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

/// Renders as `(inet4, stream, tcp)`.
impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            family_name(self.family()),
            type_name(self.sotype()),
            protocol_name(self.protocol())
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socktest_core::socket::{
        AF_INET, AF_INET6, AF_UNIX, IPPROTO_TCP, IPPROTO_UDP, SOCK_CLOEXEC, SOCK_DGRAM,
        SOCK_NONBLOCK, SOCK_STREAM,
    };

    #[test]
    fn accessors_return_components() {
        let c = Cookie::new(AF_INET6, SOCK_DGRAM, IPPROTO_UDP);
        assert_eq!(c.family(), AF_INET6);
        assert_eq!(c.sotype(), SOCK_DGRAM);
        assert_eq!(c.protocol(), IPPROTO_UDP);
        assert!(!c.is_zero());
    }

    #[test]
    fn type_flags_do_not_change_identity() {
        assert_eq!(
            Cookie::new(AF_INET, SOCK_STREAM | SOCK_NONBLOCK | SOCK_CLOEXEC, IPPROTO_TCP),
            Cookie::new(AF_INET, SOCK_STREAM, IPPROTO_TCP)
        );
    }

    #[test]
    fn packing_matches_layout() {
        let c = Cookie::new(AF_INET, SOCK_STREAM, IPPROTO_TCP);
        assert_eq!(c.raw(), (2_u64 << 48) | (1_u64 << 40) | (6_u64 << 32));
        assert!(Cookie::new(0, 0, 0).is_zero());
    }

    #[test]
    fn ordering_is_by_family_then_type_then_protocol() {
        let a = Cookie::new(AF_UNIX, SOCK_DGRAM, 0);
        let b = Cookie::new(AF_INET, SOCK_STREAM, 0);
        let c = Cookie::new(AF_INET, SOCK_STREAM, IPPROTO_TCP);
        let d = Cookie::new(AF_INET, SOCK_DGRAM, 0);
        let mut v = vec![d, c, b, a];
        v.sort();
        assert_eq!(v, vec![a, b, c, d]);
    }

    #[test]
    fn display_uses_symbolic_names() {
        assert_eq!(
            Cookie::new(AF_INET, SOCK_STREAM, IPPROTO_TCP).to_string(),
            "(inet4, stream, tcp)"
        );
        assert_eq!(
            Cookie::new(AF_UNIX, SOCK_DGRAM, 0).to_string(),
            "(local, datagram, default)"
        );
    }
}
