use std::str::FromStr;
use std::time::Duration;

use isp_core::error::CoreError;
use serde::Serialize;

/// Where a confirmed cascade delete is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeMode {
    /// One forced-cascade request; the store removes the subtree atomically.
    #[default]
    Server,
    /// The client walks the subtree bottom-up with per-node deletes.
    Client,
}

impl FromStr for CascadeMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(CascadeMode::Server),
            "client" => Ok(CascadeMode::Client),
            other => Err(CoreError::Validation(format!(
                "Invalid CASCADE_MODE '{other}'. Must be one of: server, client"
            ))),
        }
    }
}

/// Hierarchy engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct HierarchyConfig {
    /// Upper bound for every store call (default: `10` seconds).
    pub store_timeout: Duration,
    /// How confirmed cascade deletes are executed (default: `server`).
    pub cascade_mode: CascadeMode,
}

impl HierarchyConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var              | Default  |
    /// |----------------------|----------|
    /// | `STORE_TIMEOUT_SECS` | `10`     |
    /// | `CASCADE_MODE`       | `server` |
    pub fn from_env() -> Result<Self, CoreError> {
        let store_timeout_secs: u64 = std::env::var("STORE_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .map_err(|_| CoreError::Validation("STORE_TIMEOUT_SECS must be a valid u64".into()))?;

        let cascade_mode = std::env::var("CASCADE_MODE")
            .map(|v| v.parse())
            .unwrap_or(Ok(CascadeMode::default()))?;

        Ok(Self {
            store_timeout: Duration::from_secs(store_timeout_secs),
            cascade_mode,
        })
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(10),
            cascade_mode: CascadeMode::default(),
        }
    }
}
