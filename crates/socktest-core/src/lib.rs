//! # socktest-core
//!
//! Building blocks shared by the socktest switch and harness:
//! errno values, `<sys/socket.h>` constants, and the [`sys::Syscalls`]
//! seam with its host and simulated backends.
//!
//! Only the host backend talks to the kernel; it is the one module allowed
//! to use `unsafe`.

#![deny(unsafe_code)]

pub mod errno;
pub mod socket;
pub mod sys;

pub use errno::Errno;
#[cfg(target_os = "linux")]
pub use sys::HostSyscalls;
pub use sys::{SimSyscalls, SysOp, Syscalls};
