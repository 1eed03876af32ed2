//! Machine-readable scenario reports.

use serde::Serialize;
use socktest::{Errno, Sockets, Stat};

use crate::config::Backend;

/// One expectation evaluated after a scenario ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub expected: String,
    pub actual: String,
}

impl Check {
    pub fn equal<T: PartialEq + std::fmt::Debug>(name: &str, actual: T, expected: T) -> Self {
        Self {
            name: name.to_string(),
            passed: actual == expected,
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}

/// Counters for one cookie.
#[derive(Debug, Clone, Serialize)]
pub struct StatRecord {
    pub cookie: String,
    pub label: String,
    pub opened: u64,
    pub connected: u64,
    pub listened: u64,
    pub accepted: u64,
    pub closed: u64,
    pub open_failed: u64,
    pub connect_failed: u64,
    pub listen_failed: u64,
    pub accept_failed: u64,
    pub close_failed: u64,
}

impl From<&Stat> for StatRecord {
    fn from(st: &Stat) -> Self {
        let cookie = st.cookie();
        Self {
            cookie: format!("{:#018x}", cookie.raw()),
            label: cookie.to_string(),
            opened: st.opened,
            connected: st.connected,
            listened: st.listened,
            accepted: st.accepted,
            closed: st.closed,
            open_failed: st.open_failed,
            connect_failed: st.connect_failed,
            listen_failed: st.listen_failed,
            accept_failed: st.accept_failed,
            close_failed: st.close_failed,
        }
    }
}

/// A descriptor still tracked when the scenario finished.
#[derive(Debug, Clone, Serialize)]
pub struct SocketRecord {
    pub fd: i32,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_err: Option<String>,
}

fn errno_text(errno: Option<Errno>) -> Option<String> {
    errno.map(|e| e.name().to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub backend: Backend,
    pub passed: bool,
    pub checks: Vec<Check>,
    pub stats: Vec<StatRecord>,
    pub sockets: Vec<SocketRecord>,
}

impl ScenarioReport {
    #[must_use]
    pub fn new(
        scenario: &str,
        backend: Backend,
        checks: Vec<Check>,
        stats: &[Stat],
        sockets: &Sockets,
    ) -> Self {
        let mut sockets: Vec<SocketRecord> = sockets
            .iter()
            .map(|(&fd, so)| SocketRecord {
                fd,
                label: so.cookie.to_string(),
                err: errno_text(so.err),
                socket_err: errno_text(so.socket_err),
            })
            .collect();
        sockets.sort_by_key(|s| s.fd);

        Self {
            scenario: scenario.to_string(),
            backend,
            passed: checks.iter().all(|c| c.passed),
            checks,
            stats: stats.iter().map(StatRecord::from).collect(),
            sockets,
        }
    }

    /// Checks that did not hold.
    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
