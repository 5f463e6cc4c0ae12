//! Runtime settings for the VM lifecycle handlers

use std::time::Duration;

pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TASK_POLL_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    /// Node for new VMs when the inputs name none.
    pub default_node: Option<String>,
    pub task_timeout: Duration,
    pub task_poll_interval: Duration,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            default_node: None,
            task_timeout: Duration::from_secs(DEFAULT_TASK_TIMEOUT_SECS),
            task_poll_interval: Duration::from_secs(DEFAULT_TASK_POLL_INTERVAL_SECS),
        }
    }
}

impl ResourceConfig {
    /// Read `PVE_DEFAULT_NODE`, `PVE_TASK_TIMEOUT` and `PVE_TASK_POLL_INTERVAL`
    /// (seconds), falling back to the defaults for missing, unparsable or zero
    /// values.
    pub fn from_env() -> Self {
        let default_node = std::env::var("PVE_DEFAULT_NODE")
            .ok()
            .filter(|v| !v.is_empty());

        Self {
            default_node,
            task_timeout: env_secs("PVE_TASK_TIMEOUT", DEFAULT_TASK_TIMEOUT_SECS),
            task_poll_interval: env_secs(
                "PVE_TASK_POLL_INTERVAL",
                DEFAULT_TASK_POLL_INTERVAL_SECS,
            ),
        }
    }

    pub fn with_default_node(mut self, node: impl Into<String>) -> Self {
        self.default_node = Some(node.into());
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_task_poll_interval(mut self, interval: Duration) -> Self {
        self.task_poll_interval = interval;
        self
    }
}

/// A positive number of seconds from `name`, or `default`.
fn env_secs(name: &str, default: u64) -> Duration {
    let secs = match std::env::var(name) {
        Ok(value) => value
            .parse::<u64>()
            .ok()
            .filter(|&secs| secs > 0)
            .unwrap_or_else(|| {
                tracing::warn!("Ignoring invalid {}={:?}, using {}s", name, value, default);
                default
            }),
        Err(_) => default,
    };
    Duration::from_secs(secs)
}
