//! Field-level diff between desired and observed VM configuration
//!
//! The planner walks both sides in a fixed order and records one entry per
//! compared field. Entries keep that order because PVE applies config
//! directives sequentially: CPU counts go before the `cpu` descriptor, which
//! goes before NUMA nodes, which go before disks.

use super::codec::{encode_cpu, encode_disk, encode_efi_disk, encode_numa_node};
use super::options::{cpu_scalars, general_scalars, numa_key, EFI_DISK_KEY};
use super::types::{Cpu, Disk, EfiDisk, Inputs, Outputs};
use crate::api::qemu::DELETE_KEY;
use crate::api::ConfigOption;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    NoChange,
    Update,
    Replace,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub name: String,
    pub kind: ChangeKind,
    /// Directives that apply this change in place. Empty for `NoChange`,
    /// `Replace`, and fields that cannot be changed through the config endpoint.
    pub directives: Vec<ConfigOption>,
}

/// Ordered change records plus a by-name index.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<FieldChange>,
    index: HashMap<String, usize>,
}

impl ChangeSet {
    fn record(&mut self, name: impl Into<String>, kind: ChangeKind, directives: Vec<ConfigOption>) {
        let name = name.into();
        self.index.insert(name.clone(), self.changes.len());
        self.changes.push(FieldChange {
            name,
            kind,
            directives,
        });
    }

    fn unchanged(&mut self, name: impl Into<String>) {
        self.record(name, ChangeKind::NoChange, Vec::new());
    }

    pub fn get(&self, name: &str) -> Option<&FieldChange> {
        self.index.get(name).map(|&i| &self.changes[i])
    }

    /// Kind recorded for `name`; fields never compared count as `NoChange`.
    pub fn kind(&self, name: &str) -> ChangeKind {
        self.get(name).map_or(ChangeKind::NoChange, |c| c.kind)
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn changed(&self) -> impl Iterator<Item = &FieldChange> {
        self.changes
            .iter()
            .filter(|c| c.kind != ChangeKind::NoChange)
    }

    pub fn has_changes(&self) -> bool {
        self.changed().next().is_some()
    }

    /// True only when the identifier changes; the old VM must go first so the
    /// new one can take over.
    pub fn delete_before_replace(&self) -> bool {
        self.changes.iter().any(|c| c.kind == ChangeKind::Replace)
    }

    /// Directives for the update path, in emission order.
    ///
    /// Key removals are merged into one trailing `delete` directive, since the
    /// config endpoint takes a single comma-separated list.
    pub fn directives(&self) -> Vec<ConfigOption> {
        let mut directives = Vec::new();
        let mut removed = Vec::new();
        for directive in self.changed().flat_map(|c| c.directives.iter()) {
            if directive.name == DELETE_KEY {
                removed.push(directive.value.as_str());
            } else {
                directives.push(directive.clone());
            }
        }
        if !removed.is_empty() {
            directives.push(ConfigOption::delete(removed.join(",")));
        }
        directives
    }
}

/// Compare desired inputs against the last observed state.
pub fn plan(desired: &Inputs, observed: &Outputs) -> ChangeSet {
    let observed = &observed.inputs;
    let mut changes = ChangeSet::default();

    match (desired.vm_id, observed.vm_id) {
        (Some(want), Some(have)) if want != have => {
            changes.record("vmId", ChangeKind::Replace, Vec::new());
        }
        _ => changes.unchanged("vmId"),
    }

    if desired.node.is_some() && desired.node != observed.node {
        changes.record("node", ChangeKind::Update, Vec::new());
    } else {
        changes.unchanged("node");
    }

    compare_scalars(
        &mut changes,
        general_scalars(desired),
        general_scalars(observed),
    );

    if let Some(cpu) = &desired.cpu {
        compare_cpu(&mut changes, cpu, observed.cpu.as_ref());
    } else {
        changes.unchanged("cpu");
    }

    compare_efi_disk(
        &mut changes,
        desired.efidisk.as_ref(),
        observed.efidisk.as_ref(),
    );

    if disks_changed(&desired.disks, &observed.disks) {
        let directives = desired
            .disks
            .iter()
            .map(|d| ConfigOption::new(d.interface.clone(), encode_disk(d)))
            .collect();
        changes.record("disks", ChangeKind::Update, directives);
    } else {
        changes.unchanged("disks");
    }

    if desired.clone.is_some() && desired.clone != observed.clone {
        changes.record("clone", ChangeKind::Update, Vec::new());
    } else {
        changes.unchanged("clone");
    }

    tracing::debug!(
        "Planned {} changed fields (replace={})",
        changes.changed().count(),
        changes.delete_before_replace()
    );
    changes
}

/// Absent on the desired side means the user left the field to the backend.
fn compare_scalars(
    changes: &mut ChangeSet,
    desired: Vec<(&'static str, Option<String>)>,
    observed: Vec<(&'static str, Option<String>)>,
) {
    for ((name, want), (_, have)) in desired.into_iter().zip(observed) {
        match want {
            Some(value) if Some(&value) != have.as_ref() => {
                changes.record(name, ChangeKind::Update, vec![ConfigOption::new(name, value)]);
            }
            _ => changes.unchanged(name),
        }
    }
}

fn compare_cpu(changes: &mut ChangeSet, desired: &Cpu, observed: Option<&Cpu>) {
    let empty = Cpu::default();
    let observed = observed.unwrap_or(&empty);

    compare_scalars(changes, cpu_scalars(desired), cpu_scalars(observed));

    let want = encode_cpu(desired);
    if !want.is_empty() && want != encode_cpu(observed) {
        changes.record("cpu", ChangeKind::Update, vec![ConfigOption::new("cpu", want)]);
    } else {
        changes.unchanged("cpu");
    }

    let count = desired.numa_nodes.len().max(observed.numa_nodes.len());
    for index in 0..count {
        let key = numa_key(index);
        match (desired.numa_nodes.get(index), observed.numa_nodes.get(index)) {
            (Some(want), Some(have)) if want == have => changes.unchanged(key),
            (Some(want), _) => {
                let directive = ConfigOption::new(key.clone(), encode_numa_node(want));
                changes.record(key, ChangeKind::Update, vec![directive]);
            }
            (None, _) => {
                let directive = ConfigOption::delete(key.clone());
                changes.record(key, ChangeKind::Update, vec![directive]);
            }
        }
    }
}

/// A file id only counts when the user supplied one.
fn file_id_changed(desired: Option<&String>, observed: Option<&String>) -> bool {
    desired.is_some() && desired != observed
}

fn compare_efi_disk(changes: &mut ChangeSet, desired: Option<&EfiDisk>, observed: Option<&EfiDisk>) {
    let (want, have) = match (desired, observed) {
        (None, None) => return changes.unchanged("efidisk"),
        (Some(want), None) => {
            let directive = ConfigOption::new(EFI_DISK_KEY, encode_efi_disk(want));
            return changes.record("efidisk", ChangeKind::Update, vec![directive]);
        }
        (None, Some(_)) => {
            let directive = ConfigOption::delete(EFI_DISK_KEY);
            return changes.record("efidisk", ChangeKind::Update, vec![directive]);
        }
        (Some(want), Some(have)) => (want, have),
    };

    let mut fields = Vec::new();
    if want.storage != have.storage {
        fields.push("efidisk.storage");
    }
    if want.efitype != have.efitype {
        fields.push("efidisk.efitype");
    }
    if want.pre_enrolled_keys != have.pre_enrolled_keys {
        fields.push("efidisk.preEnrolledKeys");
    }
    if file_id_changed(want.file_id.as_ref(), have.file_id.as_ref()) {
        fields.push("efidisk.fileId");
    }

    if fields.is_empty() {
        return changes.unchanged("efidisk");
    }

    // One directive rewrites the whole descriptor; attach it to the first record.
    let mut directive = Some(ConfigOption::new(EFI_DISK_KEY, encode_efi_disk(want)));
    for field in fields {
        changes.record(field, ChangeKind::Update, directive.take().into_iter().collect());
    }
}

fn disks_changed(desired: &[Disk], observed: &[Disk]) -> bool {
    desired.len() != observed.len()
        || desired.iter().zip(observed).any(|(want, have)| {
            want.interface != have.interface
                || want.storage != have.storage
                || want.size != have.size
                || file_id_changed(want.file_id.as_ref(), have.file_id.as_ref())
        })
}

#[cfg(test)]
#[path = "./diff_test.rs"]
mod diff_test;
