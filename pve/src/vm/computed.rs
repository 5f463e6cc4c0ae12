//! Handling of backend-computed fields
//!
//! The VM identifier, the node and every storage-assigned file id may be
//! chosen by PVE rather than the user. After a read the observed state always
//! carries the remote values, while the user-intent record keeps such a field
//! absent if the user never set it. On update the inverse applies: values the
//! user omitted are filled from the last known state so existing volumes are
//! kept.

use super::convert::vm_to_inputs;
use super::types::{Disk, Inputs, Outputs};
use crate::api::VirtualMachine;
use crate::error::VmConfigError;
use std::collections::HashMap;

/// Result of reconciling one remote read against the prior user intent.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub inputs: Inputs,
    pub observed: Outputs,
}

/// Decode `remote` once and derive both views from it.
pub fn reconcile(prior: &Inputs, remote: &VirtualMachine) -> Result<Reconciled, VmConfigError> {
    let mut fresh = vm_to_inputs(remote, prior)?;
    fresh.clone.clone_from(&prior.clone);

    let observed = Outputs::from(fresh.clone());
    Ok(Reconciled {
        inputs: preserve_absent_computed(prior, fresh),
        observed,
    })
}

pub fn reconcile_observed(prior: &Inputs, remote: &VirtualMachine) -> Result<Outputs, VmConfigError> {
    reconcile(prior, remote).map(|r| r.observed)
}

pub fn reconcile_inputs(prior: &Inputs, remote: &VirtualMachine) -> Result<Inputs, VmConfigError> {
    reconcile(prior, remote).map(|r| r.inputs)
}

/// Clear computed fields in `fresh` that were absent in `prior`.
///
/// Disks are matched by slot. A slot `prior` does not know is left alone. The
/// EFI disk is dropped entirely when `prior` had none.
pub fn preserve_absent_computed(prior: &Inputs, mut fresh: Inputs) -> Inputs {
    if prior.vm_id.is_none() {
        fresh.vm_id = None;
    }
    if prior.node.is_none() {
        fresh.node = None;
    }

    let prior_disks: HashMap<&str, &Disk> = prior
        .disks
        .iter()
        .map(|d| (d.interface.as_str(), d))
        .collect();
    for disk in &mut fresh.disks {
        if let Some(prior_disk) = prior_disks.get(disk.interface.as_str()) {
            if prior_disk.file_id.is_none() {
                disk.file_id = None;
            }
        }
    }

    match &prior.efidisk {
        None => fresh.efidisk = None,
        Some(prior_efi) if prior_efi.file_id.is_none() => {
            if let Some(efi) = fresh.efidisk.as_mut() {
                efi.file_id = None;
            }
        }
        Some(_) => {}
    }

    fresh
}

/// Copy file ids from `state` into `inputs` where the user left them out.
pub fn copy_missing_file_ids(inputs: &mut Inputs, state: &Inputs) {
    let state_disks: HashMap<&str, &Disk> = state
        .disks
        .iter()
        .filter(|d| !d.interface.is_empty())
        .map(|d| (d.interface.as_str(), d))
        .collect();

    for disk in inputs.disks.iter_mut().filter(|d| d.file_id.is_none()) {
        if let Some(state_disk) = state_disks.get(disk.interface.as_str()) {
            disk.file_id.clone_from(&state_disk.file_id);
        }
    }

    if let (Some(efi), Some(state_efi)) = (&mut inputs.efidisk, &state.efidisk) {
        if efi.file_id.is_none() {
            efi.file_id.clone_from(&state_efi.file_id);
        }
    }
}

/// Outputs for an update: the new inputs with identifier, node and file ids
/// taken from the prior state wherever the inputs omit them.
pub fn outputs_with_computed_from_state(new_inputs: &Inputs, old_state: &Inputs) -> Outputs {
    let mut merged = new_inputs.clone();
    if merged.vm_id.is_none() {
        merged.vm_id = old_state.vm_id;
    }
    if merged.node.is_none() {
        merged.node.clone_from(&old_state.node);
    }
    copy_missing_file_ids(&mut merged, old_state);
    Outputs::from(merged)
}
