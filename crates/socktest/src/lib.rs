//! socktest: a switch between networking code and its socket syscalls.
//!
//! A [`Switch`] wraps `socket`, `connect`, `listen`, `accept`/`accept4`,
//! `getsockopt` and `close` on top of any [`Syscalls`] backend. It tracks
//! every socket it creates, counts lifecycle outcomes per
//! (family, type, protocol) [`Cookie`], and runs user [`Filter`]s around
//! each call so tests can observe, fail, or rewrite them.
//!
//! ```
//! use socktest::{Filter, FilterType, Switch};
//! use socktest::Errno;
//! use socktest::errno::ECONNREFUSED;
//! use socktest::socket::{AF_INET, SOCK_STREAM};
//! use socktest::sys::SimSyscalls;
//!
//! let sw = Switch::new(SimSyscalls::new());
//! sw.set(FilterType::Connect, Filter::fail(Errno(ECONNREFUSED)));
//!
//! let fd = sw.socket(AF_INET, SOCK_STREAM, 0).unwrap();
//! let addr = "127.0.0.1:80".parse().unwrap();
//! assert_eq!(sw.connect(fd, &addr), Err(Errno(ECONNREFUSED)));
//! assert_eq!(sw.stats()[0].connect_failed, 1);
//! ```

mod cookie;
mod filter;
mod status;
mod switch;
mod table;

pub use socktest_core::{errno, socket, sys};
pub use socktest_core::{Errno, Syscalls};

pub use cookie::Cookie;
pub use filter::{AfterFilter, Filter, FilterType};
pub use status::{Sockets, Stat, Status};
pub use switch::Switch;
