//! Lifecycle handlers for a QEMU VM: read, diff, create, update, delete

use super::codec::{decode_disk, decode_efi_disk};
use super::computed::{copy_missing_file_ids, outputs_with_computed_from_state, reconcile, Reconciled};
use super::diff::{plan, ChangeSet};
use super::options::{build_options, EFI_DISK_KEY};
use super::types::{Inputs, Outputs};
use crate::api::{ConfigOption, QemuClient, TaskId, TaskStatus};
use crate::config::ResourceConfig;
use crate::error::ResourceError;
use std::time::Duration;
use tokio::time::Instant;

pub struct VmResource<C: QemuClient> {
    client: C,
    config: ResourceConfig,
}

impl<C: QemuClient> VmResource<C> {
    pub fn new(client: C, config: ResourceConfig) -> Self {
        Self { client, config }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Refresh a VM from the cluster.
    ///
    /// The identifier comes from `prior_inputs`, falling back to `prior_state`.
    pub async fn read(
        &self,
        prior_inputs: &Inputs,
        prior_state: Option<&Outputs>,
    ) -> Result<Reconciled, ResourceError> {
        let state = prior_state.map(|s| &s.inputs);
        let vmid = prior_inputs
            .vm_id
            .or_else(|| state.and_then(|s| s.vm_id))
            .ok_or(ResourceError::MissingVmId)?;
        let node_hint = prior_inputs
            .node
            .as_deref()
            .or_else(|| state.and_then(|s| s.node.as_deref()));

        tracing::debug!("Reading VM {} (node hint: {:?})", vmid, node_hint);
        let vm = self.client.get_vm(vmid, node_hint).await?;

        let mut reconciled = reconcile(prior_inputs, &vm)?;
        if reconciled.observed.inputs.clone.is_none() {
            if let Some(state) = state {
                reconciled.observed.inputs.clone.clone_from(&state.clone);
            }
        }
        Ok(reconciled)
    }

    pub fn diff(&self, desired: &Inputs, observed: &Outputs) -> ChangeSet {
        let changes = plan(desired, observed);
        for change in changes.changed() {
            tracing::debug!("Field '{}' changed: {:?}", change.name, change.kind);
        }
        changes
    }

    /// Create a VM, either fresh or as a clone, and return its identifier
    /// with the observed state.
    pub async fn create(&self, inputs: &Inputs) -> Result<(u32, Outputs), ResourceError> {
        let vmid = match inputs.vm_id {
            Some(vmid) => vmid,
            None => self.client.next_vmid().await?,
        };
        let node = self.resolve_node(inputs).await?;

        if let Some(spec) = &inputs.clone {
            let source_node = spec.node.as_deref().unwrap_or(&node);
            tracing::debug!(
                "Cloning VM {} on {} into VM {}",
                spec.vm_id,
                source_node,
                vmid
            );
            let task = self
                .client
                .clone_vm(source_node, spec.vm_id, vmid, spec)
                .await?;
            let timeout = spec
                .timeout
                .map_or(self.config.task_timeout, Duration::from_secs);
            self.wait_for_task(source_node, vmid, &task, timeout).await?;

            let options = self.finalize_clone(&node, vmid, inputs).await?;
            if !options.is_empty() {
                tracing::debug!("Applying {} options to cloned VM {}", options.len(), vmid);
                let task = self.client.update_config(&node, vmid, &options).await?;
                self.wait_for_task(&node, vmid, &task, self.config.task_timeout)
                    .await?;
            }
        } else {
            let options = build_options(inputs);
            tracing::debug!("Creating VM {} on {} with {} options", vmid, node, options.len());
            let task = self.client.create_vm(&node, vmid, &options).await?;
            self.wait_for_task(&node, vmid, &task, self.config.task_timeout)
                .await?;
        }

        let vm = self.client.get_vm(vmid, Some(&node)).await?;
        let observed = reconcile(inputs, &vm)?.observed;
        Ok((vmid, observed))
    }

    /// Apply `inputs` to an existing VM in place and return the new outputs.
    ///
    /// With `dry_run` nothing is sent to the cluster.
    pub async fn update(
        &self,
        inputs: &Inputs,
        state: &Outputs,
        dry_run: bool,
    ) -> Result<Outputs, ResourceError> {
        let mut desired = inputs.clone();
        if desired.vm_id.is_none() {
            desired.vm_id = state.inputs.vm_id;
        }
        if desired.node.is_none() {
            desired.node.clone_from(&state.inputs.node);
        }
        copy_missing_file_ids(&mut desired, &state.inputs);

        let outputs = outputs_with_computed_from_state(&desired, &state.inputs);
        if dry_run {
            return Ok(outputs);
        }

        let vmid = desired.vm_id.ok_or(ResourceError::MissingVmId)?;
        let changes = self.diff(&desired, state);
        if changes.delete_before_replace() {
            let current = state.inputs.vm_id.unwrap_or(vmid);
            tracing::error!("VM {} cannot be renumbered to {} in place", current, vmid);
            return Err(ResourceError::ReplaceRequired { vmid: current });
        }

        let directives = changes.directives();
        if directives.is_empty() {
            tracing::debug!("No config changes for VM {}", vmid);
            return Ok(outputs);
        }

        // Config changes go to the node the VM currently lives on.
        let node = state
            .inputs
            .node
            .as_deref()
            .or(desired.node.as_deref())
            .ok_or(ResourceError::MissingNode)?;
        tracing::debug!("Updating VM {} with {} directives", vmid, directives.len());
        let task = self.client.update_config(node, vmid, &directives).await?;
        self.wait_for_task(node, vmid, &task, self.config.task_timeout)
            .await?;

        Ok(outputs)
    }

    pub async fn delete(&self, state: &Outputs) -> Result<(), ResourceError> {
        let vmid = state.inputs.vm_id.ok_or(ResourceError::MissingVmId)?;
        let node = state
            .inputs
            .node
            .as_deref()
            .ok_or(ResourceError::MissingNode)?;

        tracing::debug!("Deleting VM {} on {}", vmid, node);
        let task = self.client.delete_vm(node, vmid).await?;
        self.wait_for_task(node, vmid, &task, self.config.task_timeout)
            .await
    }

    /// Fit the disks of a fresh clone to `inputs` and return the options
    /// still to apply.
    ///
    /// Slots the clone already has keep their volume and are resized when the
    /// size differs. Cloned slots and an EFI disk that `inputs` does not list
    /// are unlinked.
    async fn finalize_clone(
        &self,
        node: &str,
        vmid: u32,
        inputs: &Inputs,
    ) -> Result<Vec<ConfigOption>, ResourceError> {
        let cloned = self.client.get_vm(vmid, Some(node)).await?;
        let mut desired = inputs.clone();
        let mut unlink = Vec::new();

        for (interface, raw) in cloned.config.disks() {
            let Some(disk) = desired.disks.iter_mut().find(|d| d.interface == interface) else {
                unlink.push(interface);
                continue;
            };

            let current = decode_disk(&interface, &raw)?;
            disk.file_id = current.file_id;
            if disk.size != current.size {
                let size = format!("{}G", disk.size);
                tracing::debug!("Resizing {} of VM {} from {}G to {}", interface, vmid, current.size, size);
                if let Some(task) = self.client.resize_disk(node, vmid, &interface, &size).await? {
                    self.wait_for_task(node, vmid, &task, self.config.task_timeout)
                        .await?;
                }
            }
        }

        match (desired.efidisk.as_mut(), cloned.config.efidisk0.as_deref()) {
            (Some(efi), Some(raw)) if !raw.is_empty() && efi.file_id.is_none() => {
                efi.file_id = decode_efi_disk(raw)?.file_id;
            }
            (None, Some(raw)) if !raw.is_empty() => unlink.push(EFI_DISK_KEY.to_string()),
            _ => {}
        }

        if !unlink.is_empty() {
            tracing::debug!("Unlinking {:?} from cloned VM {}", unlink, vmid);
            if let Some(task) = self.client.unlink_disks(node, vmid, &unlink).await? {
                self.wait_for_task(node, vmid, &task, self.config.task_timeout)
                    .await?;
            }
        }

        Ok(build_options(&desired))
    }

    async fn resolve_node(&self, inputs: &Inputs) -> Result<String, ResourceError> {
        if let Some(node) = inputs.node.as_ref().or(self.config.default_node.as_ref()) {
            return Ok(node.clone());
        }
        self.client
            .default_node()
            .await?
            .ok_or(ResourceError::MissingNode)
    }

    async fn wait_for_task(
        &self,
        node: &str,
        vmid: u32,
        task: &TaskId,
        timeout: Duration,
    ) -> Result<(), ResourceError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.client.task_status(node, task).await? {
                TaskStatus::Running => {}
                status if status.is_ok() => return Ok(()),
                TaskStatus::Stopped { exit_status } => {
                    tracing::error!("Task {} for VM {} failed: {}", task, vmid, exit_status);
                    return Err(ResourceError::TaskFailed { vmid, exit_status });
                }
            }

            if Instant::now() >= deadline {
                tracing::error!("Task {} for VM {} timed out", task, vmid);
                return Err(ResourceError::TaskTimeout {
                    vmid,
                    seconds: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.config.task_poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "./resource_test.rs"]
mod resource_test;
