//! Backend selection.
//!
//! The backend is set via the `SOCKTEST_BACKEND` environment variable:
//! - `sim` (default): the deterministic in-process backend. Scenarios never
//!   touch the kernel.
//! - `host`: real socket syscalls on the running kernel. Scenarios stay on
//!   loopback and need no peer.
//!
//! The `--backend` command-line flag takes precedence.

use std::sync::OnceLock;

use serde::Serialize;

pub const BACKEND_ENV: &str = "SOCKTEST_BACKEND";

/// Syscall backend a scenario runs against.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sim,
    Host,
}

impl Backend {
    /// Parse from string (case-insensitive). Unknown names fall back to `Sim`.
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" | "kernel" | "os" | "real" => Self::Host,
            _ => Self::Sim,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sim => "sim",
            Self::Host => "host",
        }
    }
}

static GLOBAL_BACKEND: OnceLock<Backend> = OnceLock::new();

/// Get the configured backend (reads env var on first call, caches thereafter).
#[must_use]
pub fn backend() -> Backend {
    *GLOBAL_BACKEND.get_or_init(|| {
        std::env::var(BACKEND_ENV)
            .map(|v| Backend::from_str_loose(&v))
            .unwrap_or_default()
    })
}

/// The command-line choice if given, otherwise the environment's.
#[must_use]
pub fn resolve(flag: Option<&str>) -> Backend {
    flag.map_or_else(backend, Backend::from_str_loose)
}
