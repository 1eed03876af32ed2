//! The dispatch core.
//!
//! Every wrapped call follows the same protocol:
//!
//! 1. Resolve the tracked status. Untracked descriptors go straight to the
//!    backend with no filtering and no accounting.
//! 2. Run the pre-filter for the call's [`FilterType`]. An error cancels
//!    the call before the backend sees it and is counted as a failure.
//! 3. Run the backend syscall.
//! 4. Update the table and counters under the table lock.
//! 5. Run the [`AfterFilter`], if the pre-filter returned one. Its error
//!    replaces the call's result.
//!
//! No switch lock is held while a filter or a backend syscall runs.

use std::net::SocketAddr;

use parking_lot::Mutex;
use socktest_core::Errno;
use socktest_core::Syscalls;
use socktest_core::errno::EISCONN;
use socktest_core::socket::{SO_ERROR, SOL_SOCKET};

use crate::cookie::Cookie;
use crate::filter::{AfterFilter, Filter, FilterRegistry, FilterType};
use crate::status::{Sockets, Stat, Status};
use crate::table::{Counter, Tables, Tracked};

/// A call-path switch for socket syscalls.
///
/// Each switch owns its table, counters and filters; independent switches
/// never observe each other. The switch is itself a [`Syscalls`], so it can
/// stand in wherever its backend would.
#[derive(Debug)]
pub struct Switch<S> {
    sys: S,
    tables: Mutex<Tables>,
    filters: FilterRegistry,
}

impl<S: Syscalls> Switch<S> {
    /// Wrap `sys` with an empty table and no filters.
    pub fn new(sys: S) -> Self {
        Self {
            sys,
            tables: Mutex::new(Tables::new()),
            filters: FilterRegistry::new(),
        }
    }

    /// The wrapped backend.
    pub fn syscalls(&self) -> &S {
        &self.sys
    }

    /// Install `filter` for `filter_type`, replacing the previous one, or
    /// clear it with `None`. Calls already past their pre-filter are not
    /// affected.
    pub fn set(&self, filter_type: FilterType, filter: impl Into<Option<Filter>>) {
        self.filters.set(filter_type, filter.into());
    }

    /// Point-in-time copy of the socket table.
    pub fn sockets(&self) -> Sockets {
        self.tables.lock().sockets()
    }

    /// Per-cookie statistics, ordered by cookie.
    pub fn stats(&self) -> Vec<Stat> {
        self.tables.lock().stats()
    }

    /// Statistics for one cookie, if it has been seen.
    pub fn stat(&self, cookie: Cookie) -> Option<Stat> {
        self.stats().into_iter().find(|st| st.cookie() == cookie)
    }

    /// Current status of `fd`, or `None` if it is not tracked.
    pub fn status(&self, fd: i32) -> Option<Status> {
        self.tracked(fd).map(|tracked| tracked.status)
    }

    /// Wraps `socket(2)`.
    pub fn socket(&self, family: i32, sotype: i32, proto: i32) -> Result<i32, Errno> {
        let cookie = Cookie::new(family, sotype, proto);
        if cookie.is_zero() {
            return self.sys.socket(family, sotype, proto);
        }

        let pending = Status::new(cookie);
        let after = match self.filters.apply(FilterType::Socket, &pending) {
            Ok(after) => after,
            Err(errno) => {
                self.tables.lock().record(cookie, Counter::OpenFailed);
                return Err(errno);
            }
        };

        let result = self.sys.socket(family, sotype, proto);
        let (created, status) = {
            let mut tables = self.tables.lock();
            match result {
                Ok(fd) => {
                    let created = tables.insert(fd, cookie);
                    tables.record(cookie, Counter::Opened);
                    (Some(created), created.status)
                }
                Err(errno) => {
                    tables.record(cookie, Counter::OpenFailed);
                    let status = Status {
                        err: Some(errno),
                        ..pending
                    };
                    (None, status)
                }
            }
        };

        self.finish_create(after, &status, created, result)
    }

    /// Wraps `connect(2)`. Every error, `EINPROGRESS` included, counts as a
    /// failed connect; a later `SO_ERROR` check of 0 counts the completion.
    pub fn connect(&self, fd: i32, addr: &SocketAddr) -> Result<(), Errno> {
        let Some(tracked) = self.tracked(fd) else {
            return self.sys.connect(fd, addr);
        };
        let after = self.pre(FilterType::Connect, &tracked, Counter::ConnectFailed)?;

        let result = self.sys.connect(fd, addr);
        let status = self.settle(
            &tracked,
            result.err(),
            Counter::pick(result.is_ok(), Counter::Connected, Counter::ConnectFailed),
        );

        finish(after, &status, result)
    }

    /// Wraps `listen(2)`.
    pub fn listen(&self, fd: i32, backlog: i32) -> Result<(), Errno> {
        let Some(tracked) = self.tracked(fd) else {
            return self.sys.listen(fd, backlog);
        };
        let after = self.pre(FilterType::Listen, &tracked, Counter::ListenFailed)?;

        let result = self.sys.listen(fd, backlog);
        let status = self.settle(
            &tracked,
            result.err(),
            Counter::pick(result.is_ok(), Counter::Listened, Counter::ListenFailed),
        );

        finish(after, &status, result)
    }

    /// Wraps `accept(2)`.
    pub fn accept(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        self.accept_with(fd, |sys| sys.accept(fd))
    }

    /// Wraps `accept4(2)`.
    pub fn accept4(&self, fd: i32, flags: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        self.accept_with(fd, |sys| sys.accept4(fd, flags))
    }

    /// Wraps `getsockopt(2)` for int-valued options.
    ///
    /// Only `SOL_SOCKET`/`SO_ERROR` reads touch the table: the value is
    /// stored as the socket error, and a value of 0 or `EISCONN` counts as a
    /// completed connect. The status's syscall error is left alone.
    pub fn getsockopt_int(&self, fd: i32, level: i32, opt: i32) -> Result<i32, Errno> {
        let Some(tracked) = self.tracked(fd) else {
            return self.sys.getsockopt_int(fd, level, opt);
        };
        let after = self.filters.apply(FilterType::GetsockoptInt, &tracked.status)?;

        let result = self.sys.getsockopt_int(fd, level, opt);
        let status = match result {
            Ok(value) if level == SOL_SOCKET && opt == SO_ERROR => {
                let socket_err = (value != 0).then_some(Errno(value));
                let mut tables = self.tables.lock();
                let status = tables.update(&tracked, |so| so.socket_err = socket_err);
                if value == 0 || value == EISCONN {
                    tables.record(tracked.status.cookie, Counter::Connected);
                }
                status
            }
            _ => tracked.status,
        };

        finish(after, &status, result)
    }

    /// Wraps `close(2)`. The descriptor stops being tracked only when the
    /// backend close succeeds; a failed close leaves it tracked with the
    /// error recorded.
    pub fn close(&self, fd: i32) -> Result<(), Errno> {
        let Some(tracked) = self.tracked(fd) else {
            return self.sys.close(fd);
        };
        let after = self.pre(FilterType::Close, &tracked, Counter::CloseFailed)?;

        let result = self.sys.close(fd);
        let status = {
            let mut tables = self.tables.lock();
            let cookie = tracked.status.cookie;
            match result {
                Ok(()) => {
                    tables.remove(&tracked);
                    tables.record(cookie, Counter::Closed);
                    Status {
                        err: None,
                        ..tracked.status
                    }
                }
                Err(errno) => {
                    let status = tables.update(&tracked, |so| so.err = Some(errno));
                    tables.record(cookie, Counter::CloseFailed);
                    status
                }
            }
        };

        finish(after, &status, result)
    }

    fn tracked(&self, fd: i32) -> Option<Tracked> {
        self.tables.lock().lookup(fd)
    }

    /// Run the pre-filter. A cancellation is recorded like a backend failure.
    fn pre(
        &self,
        filter_type: FilterType,
        tracked: &Tracked,
        failure: Counter,
    ) -> Result<Option<AfterFilter>, Errno> {
        self.filters
            .apply(filter_type, &tracked.status)
            .map_err(|errno| {
                let mut tables = self.tables.lock();
                tables.update(tracked, |so| so.err = Some(errno));
                tables.record(tracked.status.cookie, failure);
                errno
            })
    }

    /// Record a completed syscall's error and outcome counter.
    fn settle(&self, tracked: &Tracked, err: Option<Errno>, counter: Counter) -> Status {
        let mut tables = self.tables.lock();
        let status = tables.update(tracked, |so| so.err = err);
        tables.record(tracked.status.cookie, counter);
        status
    }

    /// A failed accept creates no entry and is charged to the listener.
    /// A successful one tracks the new descriptor under the listener's
    /// cookie and leaves the listener's own status untouched.
    fn accept_with(
        &self,
        fd: i32,
        call: impl FnOnce(&S) -> Result<(i32, Option<SocketAddr>), Errno>,
    ) -> Result<(i32, Option<SocketAddr>), Errno> {
        let Some(listener) = self.tracked(fd) else {
            return call(&self.sys);
        };
        let after = self.pre(FilterType::Accept, &listener, Counter::AcceptFailed)?;

        let result = call(&self.sys);
        let cookie = listener.status.cookie;
        let (created, status) = {
            let mut tables = self.tables.lock();
            match &result {
                Ok((nfd, _)) => {
                    let created = tables.insert(*nfd, cookie);
                    tables.record(cookie, Counter::Accepted);
                    let status = Status {
                        err: None,
                        ..listener.status
                    };
                    (Some(created), status)
                }
                Err(errno) => {
                    let status = tables.update(&listener, |so| so.err = Some(*errno));
                    tables.record(cookie, Counter::AcceptFailed);
                    (None, status)
                }
            }
        };

        self.finish_create(after, &status, created, result)
    }

    /// Post-filter step for calls that create a descriptor. When the filter
    /// overrides a successful creation the caller never learns the new
    /// descriptor, so the switch closes it and accounts for that close the
    /// way [`Switch::close`] does. The filter's error stays the reported
    /// outcome either way.
    fn finish_create<T>(
        &self,
        after: Option<AfterFilter>,
        status: &Status,
        created: Option<Tracked>,
        result: Result<T, Errno>,
    ) -> Result<T, Errno> {
        let Some(after) = after else {
            return result;
        };
        let Err(errno) = after.apply(status) else {
            return result;
        };
        if let Some(created) = created {
            self.release(&created);
        }
        Err(errno)
    }

    /// Close a descriptor the caller never saw. It stays tracked, with the
    /// error recorded, if the backend close fails.
    fn release(&self, created: &Tracked) {
        let released = self.sys.close(created.fd);
        let mut tables = self.tables.lock();
        let cookie = created.status.cookie;
        match released {
            Ok(()) => {
                tables.remove(created);
                tables.record(cookie, Counter::Closed);
            }
            Err(errno) => {
                tables.update(created, |so| so.err = Some(errno));
                tables.record(cookie, Counter::CloseFailed);
            }
        }
    }
}

fn finish<T>(
    after: Option<AfterFilter>,
    status: &Status,
    result: Result<T, Errno>,
) -> Result<T, Errno> {
    match after {
        Some(after) => after.apply(status).and(result),
        None => result,
    }
}

impl<S: Syscalls> Syscalls for Switch<S> {
    fn socket(&self, family: i32, sotype: i32, proto: i32) -> Result<i32, Errno> {
        Self::socket(self, family, sotype, proto)
    }

    fn connect(&self, fd: i32, addr: &SocketAddr) -> Result<(), Errno> {
        Self::connect(self, fd, addr)
    }

    fn listen(&self, fd: i32, backlog: i32) -> Result<(), Errno> {
        Self::listen(self, fd, backlog)
    }

    fn accept(&self, fd: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        Self::accept(self, fd)
    }

    fn accept4(&self, fd: i32, flags: i32) -> Result<(i32, Option<SocketAddr>), Errno> {
        Self::accept4(self, fd, flags)
    }

    fn getsockopt_int(&self, fd: i32, level: i32, opt: i32) -> Result<i32, Errno> {
        Self::getsockopt_int(self, fd, level, opt)
    }

    fn close(&self, fd: i32) -> Result<(), Errno> {
        Self::close(self, fd)
    }
}
