//! Reconciliation and diff engine for Proxmox VE QEMU virtual machines.
//!
//! The [`vm`] module converts the hypervisor's flat configuration into typed
//! [`Inputs`], keeps backend-computed fields apart from user intent, and plans
//! ordered config directives. [`VmResource`] drives the cluster through any
//! [`QemuClient`] implementation.

pub mod api;
pub mod config;
pub mod error;
pub mod vm;

pub use api::{ApiError, ConfigOption, QemuClient, QemuConfig, TaskId, TaskStatus, VirtualMachine};
pub use config::ResourceConfig;
pub use error::{ResourceError, VmConfigError};
pub use vm::{ChangeKind, ChangeSet, Inputs, Outputs, VmResource};
