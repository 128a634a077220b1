//! Process-wide defaults, read once from the environment.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

const LIMIT_ENV: &str = "FERROPHASE_SPECIALIZE_LIMIT";
const TRACE_ENV: &str = "FERROPHASE_SPECIALIZE_TRACE";
const DEFAULT_POLYMORPHIC_LIMIT: usize = 3;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

fn bool_from_env(key: &str) -> bool {
    env_true(key).unwrap_or(false)
}

/// Number of activations a node holds before collapsing to generic dispatch.
pub fn default_polymorphic_limit() -> usize {
    static LIMIT: OnceLock<usize> = OnceLock::new();
    *LIMIT.get_or_init(|| {
        std::env::var(LIMIT_ENV)
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_POLYMORPHIC_LIMIT)
    })
}

/// Whether fast-path cache hits emit `trace` events.
pub fn trace_fast_path() -> bool {
    static TRACE: OnceLock<bool> = OnceLock::new();
    *TRACE.get_or_init(|| bool_from_env(TRACE_ENV))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecializeOptions {
    /// Per-node activation limit used when a declaration does not set one.
    pub polymorphic_limit: usize,
    pub trace_fast_path: bool,
}

impl Default for SpecializeOptions {
    fn default() -> Self {
        Self {
            polymorphic_limit: default_polymorphic_limit(),
            trace_fast_path: trace_fast_path(),
        }
    }
}
