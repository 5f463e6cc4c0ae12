pub mod common;
pub mod error;
pub mod qemu;

pub use common::{TaskId, TaskStatus};
pub use error::ApiError;
pub use qemu::{ConfigOption, QemuConfig, VirtualMachine};

use crate::vm::types::CloneSpec;
use async_trait::async_trait;

/// Remote operations the VM lifecycle needs from a Proxmox VE client.
///
/// Implementations own transport, authentication and retries.
#[async_trait]
pub trait QemuClient: Send + Sync {
    /// Locate a VM on the cluster. `node` is a hint and may be ignored.
    async fn get_vm(&self, vmid: u32, node: Option<&str>) -> Result<VirtualMachine, ApiError>;

    /// GET /api2/json/cluster/nextid
    async fn next_vmid(&self) -> Result<u32, ApiError>;

    /// A node suitable for placing a new VM, if the cluster offers one.
    async fn default_node(&self) -> Result<Option<String>, ApiError>;

    /// POST /api2/json/nodes/{node}/qemu
    async fn create_vm(
        &self,
        node: &str,
        vmid: u32,
        options: &[ConfigOption],
    ) -> Result<TaskId, ApiError>;

    /// POST /api2/json/nodes/{node}/qemu/{source}/clone
    async fn clone_vm(
        &self,
        node: &str,
        source: u32,
        target: u32,
        spec: &CloneSpec,
    ) -> Result<TaskId, ApiError>;

    /// POST /api2/json/nodes/{node}/qemu/{vmid}/config
    async fn update_config(
        &self,
        node: &str,
        vmid: u32,
        options: &[ConfigOption],
    ) -> Result<TaskId, ApiError>;

    /// PUT /api2/json/nodes/{node}/qemu/{vmid}/resize
    ///
    /// `size` carries its unit, e.g. `40G`. Returns a task when the backend
    /// runs the resize asynchronously.
    async fn resize_disk(
        &self,
        node: &str,
        vmid: u32,
        disk: &str,
        size: &str,
    ) -> Result<Option<TaskId>, ApiError>;

    /// PUT /api2/json/nodes/{node}/qemu/{vmid}/unlink with `force=1`
    async fn unlink_disks(
        &self,
        node: &str,
        vmid: u32,
        disks: &[String],
    ) -> Result<Option<TaskId>, ApiError>;

    /// DELETE /api2/json/nodes/{node}/qemu/{vmid}
    async fn delete_vm(&self, node: &str, vmid: u32) -> Result<TaskId, ApiError>;

    /// GET /api2/json/nodes/{node}/tasks/{upid}/status
    async fn task_status(&self, node: &str, task: &TaskId) -> Result<TaskStatus, ApiError>;
}
