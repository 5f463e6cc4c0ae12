use thiserror::Error;

use crate::api::error::ApiError;

/// Errors raised while decoding or converting remote VM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmConfigError {
    #[error("Malformed {kind} config '{raw}': {reason}")]
    MalformedConfig {
        kind: &'static str,
        raw: String,
        reason: String,
    },

    #[error("VMID {vmid} overflows the platform identifier type")]
    Overflow { vmid: u64 },
}

impl VmConfigError {
    pub(crate) fn malformed(
        kind: &'static str,
        raw: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedConfig {
            kind,
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error(transparent)]
    Config(#[from] VmConfigError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("VMID is required for reading VM state but is missing in both inputs and state")]
    MissingVmId,

    #[error("No node given and no default node available")]
    MissingNode,

    #[error("Change to VM {vmid} requires replacement, not an in-place update")]
    ReplaceRequired { vmid: u32 },

    #[error("Task for VM {vmid} failed: {exit_status}")]
    TaskFailed { vmid: u32, exit_status: String },

    #[error("Task for VM {vmid} did not finish within {seconds} seconds")]
    TaskTimeout { vmid: u32, seconds: u64 },
}
