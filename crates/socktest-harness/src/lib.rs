//! Fault-injection scenarios for the socktest switch.
//!
//! This crate provides:
//! - Backend selection from `SOCKTEST_BACKEND` or the command line
//! - Built-in scenarios that drive a fresh [`socktest::Switch`] through
//!   injected failures and check what it recorded
//! - JSONL structured logging of every wrapped call
//! - JSON reports of the switch's statistics and socket table

#![forbid(unsafe_code)]

pub mod config;
pub mod report;
pub mod scenario;
pub mod structured_log;

use socktest::Errno;
use thiserror::Error;

pub use config::Backend;
pub use report::ScenarioReport;
pub use scenario::Scenario;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),
    #[error("backend '{0}' is not available on this platform")]
    UnsupportedBackend(&'static str),
    #[error("{op} failed unexpectedly: {errno}")]
    Syscall { op: &'static str, errno: Errno },
}
