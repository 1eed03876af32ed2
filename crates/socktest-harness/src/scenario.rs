//! Built-in fault-injection scenarios.
//!
//! Each scenario drives a fresh [`Switch`] through a short call sequence
//! with filters installed, logs every wrapped call, and then checks what the
//! switch recorded. Scenarios only use loopback and need no peer, so they
//! behave the same on the simulated and the host backend.

use std::fmt::Debug;
use std::net::{Ipv4Addr, SocketAddr};

use serde_json::json;
use socktest::errno::{ECONNREFUSED, EINPROGRESS, EIO};
use socktest::socket::{
    AF_INET, AF_UNIX, IPPROTO_TCP, SO_ERROR, SOCK_NONBLOCK, SOCK_STREAM, SOL_SOCKET,
};
#[cfg(target_os = "linux")]
use socktest::sys::HostSyscalls;
use socktest::sys::{SimSyscalls, SysOp};
use socktest::{Cookie, Errno, Filter, FilterType, Stat, Switch, Syscalls};

use crate::HarnessError;
use crate::config::Backend;
use crate::report::{Check, ScenarioReport};
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    OpenClose,
    ConnectRefused,
    AsyncConnectError,
    AcceptRefused,
    CloseFailure,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::OpenClose,
        Scenario::ConnectRefused,
        Scenario::AsyncConnectError,
        Scenario::AcceptRefused,
        Scenario::CloseFailure,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Scenario::OpenClose => "open-close",
            Scenario::ConnectRefused => "connect-refused",
            Scenario::AsyncConnectError => "async-connect-error",
            Scenario::AcceptRefused => "accept-refused",
            Scenario::CloseFailure => "close-failure",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Scenario::OpenClose => "open and close sockets of two kinds with no filters",
            Scenario::ConnectRefused => "a connect pre-filter refuses before the kernel is reached",
            Scenario::AsyncConnectError => {
                "a non-blocking connect stays in progress and the SO_ERROR check is overridden"
            }
            Scenario::AcceptRefused => "an accept pre-filter refuses on a listening socket",
            Scenario::CloseFailure => "a close fails once, keeping the socket tracked, then succeeds",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, HarnessError> {
        Self::ALL
            .into_iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| HarnessError::UnknownScenario(name.to_string()))
    }
}

/// Run `scenario` on a fresh switch over `backend`.
pub fn run(
    scenario: Scenario,
    backend: Backend,
    log: &mut LogEmitter,
) -> Result<ScenarioReport, HarnessError> {
    match backend {
        Backend::Sim => run_on(scenario, backend, Switch::new(SimSyscalls::new()), log),
        Backend::Host => run_host(scenario, log),
    }
}

#[cfg(target_os = "linux")]
fn run_host(scenario: Scenario, log: &mut LogEmitter) -> Result<ScenarioReport, HarnessError> {
    run_on(
        scenario,
        Backend::Host,
        Switch::new(HostSyscalls::new()),
        log,
    )
}

#[cfg(not(target_os = "linux"))]
fn run_host(_scenario: Scenario, _log: &mut LogEmitter) -> Result<ScenarioReport, HarnessError> {
    Err(HarnessError::UnsupportedBackend(Backend::Host.as_str()))
}

fn run_on<S: Syscalls>(
    scenario: Scenario,
    backend: Backend,
    switch: Switch<S>,
    log: &mut LogEmitter,
) -> Result<ScenarioReport, HarnessError> {
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_start")
            .with_backend(backend.as_str())
            .with_details(json!({ "description": scenario.description() })),
    )?;

    let mut run = Run {
        switch: &switch,
        backend,
        log: &mut *log,
        checks: Vec::new(),
    };
    match scenario {
        Scenario::OpenClose => open_close(&mut run)?,
        Scenario::ConnectRefused => connect_refused(&mut run)?,
        Scenario::AsyncConnectError => async_connect_error(&mut run)?,
        Scenario::AcceptRefused => accept_refused(&mut run)?,
        Scenario::CloseFailure => close_failure(&mut run)?,
    }
    let checks = run.checks;

    let report = ScenarioReport::new(
        scenario.name(),
        backend,
        checks,
        &switch.stats(),
        &switch.sockets(),
    );

    for check in &report.checks {
        let (level, outcome) = if check.passed {
            (LogLevel::Info, Outcome::Pass)
        } else {
            (LogLevel::Error, Outcome::Fail)
        };
        log.emit_entry(
            LogEntry::new("", level, "check")
                .with_backend(backend.as_str())
                .with_outcome(outcome)
                .with_details(json!({
                    "name": check.name,
                    "expected": check.expected,
                    "actual": check.actual,
                })),
        )?;
    }
    for st in switch.stats() {
        log.emit_entry(
            LogEntry::new("", LogLevel::Debug, "stat")
                .with_backend(backend.as_str())
                .with_details(json!({ "stat": st.to_string() })),
        )?;
    }
    log.emit_entry(
        LogEntry::new("", LogLevel::Info, "scenario_end")
            .with_backend(backend.as_str())
            .with_outcome(if report.passed {
                Outcome::Pass
            } else {
                Outcome::Fail
            }),
    )?;
    log.flush()?;

    Ok(report)
}

/// Result of a wrapped call: the outer error aborts the scenario, the inner
/// one is the syscall outcome under test.
type Call<T> = Result<Result<T, Errno>, HarnessError>;

struct Run<'a, S> {
    switch: &'a Switch<S>,
    backend: Backend,
    log: &'a mut LogEmitter,
    checks: Vec<Check>,
}

impl<S: Syscalls> Run<'_, S> {
    fn socket(&mut self, family: i32, sotype: i32, proto: i32) -> Call<i32> {
        let result = self.switch.socket(family, sotype, proto);
        self.record(SysOp::Socket, None, &result)?;
        Ok(result)
    }

    fn connect(&mut self, fd: i32, addr: &SocketAddr) -> Call<()> {
        let result = self.switch.connect(fd, addr);
        self.record(SysOp::Connect, Some(fd), &result)?;
        Ok(result)
    }

    fn listen(&mut self, fd: i32, backlog: i32) -> Call<()> {
        let result = self.switch.listen(fd, backlog);
        self.record(SysOp::Listen, Some(fd), &result)?;
        Ok(result)
    }

    fn accept(&mut self, fd: i32) -> Call<(i32, Option<SocketAddr>)> {
        let result = self.switch.accept(fd);
        self.record(SysOp::Accept, Some(fd), &result)?;
        Ok(result)
    }

    fn getsockopt_int(&mut self, fd: i32, level: i32, opt: i32) -> Call<i32> {
        let result = self.switch.getsockopt_int(fd, level, opt);
        self.record(SysOp::GetsockoptInt, Some(fd), &result)?;
        Ok(result)
    }

    fn close(&mut self, fd: i32) -> Call<()> {
        let result = self.switch.close(fd);
        self.record(SysOp::Close, Some(fd), &result)?;
        Ok(result)
    }

    fn set(&mut self, filter_type: FilterType, filter: Option<Filter>) -> Result<(), HarnessError> {
        let event = if filter.is_some() {
            "filter_set"
        } else {
            "filter_cleared"
        };
        self.switch.set(filter_type, filter);
        self.log.emit_entry(
            LogEntry::new("", LogLevel::Debug, event)
                .with_backend(self.backend.as_str())
                .with_details(json!({ "filter_type": format!("{filter_type:?}") })),
        )?;
        Ok(())
    }

    fn record<T: Debug>(
        &mut self,
        op: SysOp,
        fd: Option<i32>,
        result: &Result<T, Errno>,
    ) -> Result<(), HarnessError> {
        let mut entry = match result {
            Ok(ret) => LogEntry::new("", LogLevel::Info, "syscall")
                .with_details(json!({ "ret": format!("{ret:?}") })),
            Err(errno) => LogEntry::new("", LogLevel::Warn, "syscall")
                .with_errno(errno.code())
                .with_details(json!({ "error": errno.name() })),
        };
        entry = entry.with_op(op).with_backend(self.backend.as_str());
        if let Some(fd) = fd {
            entry = entry.with_fd(fd);
        }
        self.log.emit_entry(entry)?;
        Ok(())
    }

    fn check<T: PartialEq + Debug>(&mut self, name: &str, actual: T, expected: T) {
        self.checks.push(Check::equal(name, actual, expected));
    }

    fn stat(&self, cookie: Cookie) -> Stat {
        self.switch.stat(cookie).unwrap_or(Stat::new(cookie))
    }
}

/// Unwrap a call the scenario needs to succeed.
fn must<T>(op: SysOp, result: Result<T, Errno>) -> Result<T, HarnessError> {
    result.map_err(|errno| HarnessError::Syscall {
        op: op.as_str(),
        errno,
    })
}

const TCP4: Cookie = Cookie::new(AF_INET, SOCK_STREAM, IPPROTO_TCP);

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, port))
}

fn open_close<S: Syscalls>(run: &mut Run<'_, S>) -> Result<(), HarnessError> {
    let unix = Cookie::new(AF_UNIX, SOCK_STREAM, 0);

    let a = must(SysOp::Socket, run.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?)?;
    let b = must(SysOp::Socket, run.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?)?;
    let c = must(SysOp::Socket, run.socket(AF_UNIX, SOCK_STREAM, 0)?)?;
    run.check("tracked after open", run.switch.sockets().len(), 3);
    run.check("unix socket cookie", run.switch.status(c).map(|so| so.cookie), Some(unix));

    for fd in [a, b, c] {
        must(SysOp::Close, run.close(fd)?)?;
    }

    let tcp = run.stat(TCP4);
    run.check("tcp opened", tcp.opened, 2);
    run.check("tcp closed", tcp.closed, 2);
    let un = run.stat(unix);
    run.check("unix opened", un.opened, 1);
    run.check("unix closed", un.closed, 1);
    run.check("tracked after close", run.switch.sockets().len(), 0);
    Ok(())
}

fn connect_refused<S: Syscalls>(run: &mut Run<'_, S>) -> Result<(), HarnessError> {
    let fd = must(SysOp::Socket, run.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?)?;
    run.set(FilterType::Connect, Some(Filter::fail(Errno(ECONNREFUSED))))?;

    let result = run.connect(fd, &loopback(9))?;
    run.check("connect result", result, Err(Errno(ECONNREFUSED)));
    run.check(
        "syscall error",
        run.switch.status(fd).and_then(|so| so.err),
        Some(Errno(ECONNREFUSED)),
    );
    let st = run.stat(TCP4);
    run.check("connected", st.connected, 0);
    run.check("connect failed", st.connect_failed, 1);

    run.set(FilterType::Connect, None)?;
    must(SysOp::Close, run.close(fd)?)?;
    Ok(())
}

fn async_connect_error<S: Syscalls>(run: &mut Run<'_, S>) -> Result<(), HarnessError> {
    let fd = must(
        SysOp::Socket,
        run.socket(AF_INET, SOCK_STREAM | SOCK_NONBLOCK, IPPROTO_TCP)?,
    )?;
    run.set(FilterType::Connect, Some(Filter::fail(Errno(EINPROGRESS))))?;
    run.set(
        FilterType::GetsockoptInt,
        Some(Filter::then(|_| Err(Errno(ECONNREFUSED)))),
    )?;

    let result = run.connect(fd, &loopback(9))?;
    run.check("connect result", result, Err(Errno(EINPROGRESS)));

    let result = run.getsockopt_int(fd, SOL_SOCKET, SO_ERROR)?;
    run.check("SO_ERROR result", result, Err(Errno(ECONNREFUSED)));

    let status = run.switch.status(fd);
    run.check(
        "syscall error",
        status.and_then(|so| so.err),
        Some(Errno(EINPROGRESS)),
    );
    // The kernel reported no pending error; only the filter's verdict changed.
    run.check("socket error", status.and_then(|so| so.socket_err), None);
    let st = run.stat(TCP4);
    run.check("connect failed", st.connect_failed, 1);
    run.check("connected", st.connected, 1);

    run.set(FilterType::Connect, None)?;
    run.set(FilterType::GetsockoptInt, None)?;
    must(SysOp::Close, run.close(fd)?)?;
    Ok(())
}

fn accept_refused<S: Syscalls>(run: &mut Run<'_, S>) -> Result<(), HarnessError> {
    let ln = must(SysOp::Socket, run.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?)?;
    must(SysOp::Listen, run.listen(ln, 16)?)?;
    run.set(FilterType::Accept, Some(Filter::fail(Errno(ECONNREFUSED))))?;

    let result = run.accept(ln)?;
    run.check("accept result", result.map(|(fd, _)| fd), Err(Errno(ECONNREFUSED)));
    run.check("tracked", run.switch.sockets().len(), 1);
    let st = run.stat(TCP4);
    run.check("listened", st.listened, 1);
    run.check("accepted", st.accepted, 0);
    run.check("accept failed", st.accept_failed, 1);

    run.set(FilterType::Accept, None)?;
    must(SysOp::Close, run.close(ln)?)?;
    Ok(())
}

fn close_failure<S: Syscalls>(run: &mut Run<'_, S>) -> Result<(), HarnessError> {
    let fd = must(SysOp::Socket, run.socket(AF_INET, SOCK_STREAM, IPPROTO_TCP)?)?;
    run.set(FilterType::Close, Some(Filter::fail(Errno(EIO))))?;

    let result = run.close(fd)?;
    run.check("first close result", result, Err(Errno(EIO)));
    run.check(
        "still tracked with error",
        run.switch.status(fd).and_then(|so| so.err),
        Some(Errno(EIO)),
    );

    run.set(FilterType::Close, None)?;
    let result = run.close(fd)?;
    run.check("second close result", result, Ok(()));
    run.check("tracked after close", run.switch.status(fd).is_some(), false);

    let st = run.stat(TCP4);
    run.check("close failed", st.close_failed, 1);
    run.check("closed", st.closed, 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for s in Scenario::ALL {
            assert_eq!(Scenario::from_name(s.name()).unwrap(), s);
            assert!(!s.description().is_empty());
        }
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = Scenario::from_name("teardown").unwrap_err();
        assert!(matches!(err, HarnessError::UnknownScenario(ref n) if n == "teardown"));
        assert_eq!(err.to_string(), "unknown scenario 'teardown'");
    }

    #[test]
    fn must_names_the_failed_call() {
        let err = must::<()>(SysOp::Listen, Err(Errno(EIO))).unwrap_err();
        assert_eq!(err.to_string(), "listen failed unexpectedly: EIO (errno 5)");
    }
}
