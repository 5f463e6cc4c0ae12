//! Conversion of a remote VM snapshot into typed [`Inputs`]

use super::codec::{decode_cpu, decode_disk, decode_efi_disk, decode_numa_node};
use super::types::{Cpu, Disk, Inputs};
use crate::api::{QemuConfig, VirtualMachine};
use crate::error::VmConfigError;
use std::collections::{BTreeMap, BTreeSet};

/// Order the remote disks by the previously known order.
///
/// Slots in `prior` that the remote still reports keep their relative order.
/// Slots only the remote reports are appended in map order. Slots the remote
/// no longer reports are dropped.
pub fn reconcile_disk_order(
    prior: &[Disk],
    remote: &BTreeMap<String, String>,
) -> Result<Vec<Disk>, VmConfigError> {
    let mut disks = Vec::with_capacity(remote.len());
    let mut seen = BTreeSet::new();

    for known in prior {
        if let Some(raw) = remote.get(&known.interface) {
            if seen.insert(known.interface.as_str()) {
                disks.push(decode_disk(&known.interface, raw)?);
            }
        }
    }

    for (interface, raw) in remote {
        if !seen.contains(interface.as_str()) {
            disks.push(decode_disk(interface, raw)?);
        }
    }

    Ok(disks)
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

fn cpu_from_config(config: &QemuConfig) -> Result<Option<Cpu>, VmConfigError> {
    let mut cpu = config
        .cpu
        .as_deref()
        .and_then(decode_cpu)
        .unwrap_or_default();

    cpu.cores = config.cores;
    cpu.sockets = config.sockets;
    cpu.limit = config.cpulimit;
    cpu.units = config.cpuunits;
    cpu.vcpus = config.vcpus;
    cpu.numa = config.numa;

    for (_, raw) in config.numa_nodes() {
        if let Some(node) = decode_numa_node(&raw)? {
            cpu.numa_nodes.push(node);
        }
    }

    Ok(if cpu == Cpu::default() { None } else { Some(cpu) })
}

/// Convert the remote snapshot into [`Inputs`], fully populated.
///
/// `prior` only supplies the disk order hint. No computed field is cleared
/// here; see [`super::computed`] for that.
pub fn vm_to_inputs(vm: &VirtualMachine, prior: &Inputs) -> Result<Inputs, VmConfigError> {
    let config = &vm.config;

    let vm_id = u32::try_from(vm.vmid).map_err(|_| VmConfigError::Overflow { vmid: vm.vmid })?;

    let efidisk = match config.efidisk0.as_deref() {
        Some(raw) if !raw.is_empty() => Some(decode_efi_disk(raw)?),
        _ => None,
    };

    let disks = reconcile_disk_order(&prior.disks, &config.disks())?;
    let cpu = cpu_from_config(config)?;

    tracing::debug!(
        "Converted VM {} on {}: {} disks, efidisk={}",
        vm_id,
        vm.node,
        disks.len(),
        efidisk.is_some()
    );

    Ok(Inputs {
        name: non_empty(&config.name),
        description: non_empty(&config.description),
        node: Some(vm.node.clone()).filter(|n| !n.is_empty()),
        vm_id: Some(vm_id),
        hookscript: non_empty(&config.hookscript),
        hotplug: non_empty(&config.hotplug),
        template: config.template,
        autostart: config.autostart,
        onboot: config.onboot,
        tablet: config.tablet,
        kvm: config.kvm,
        protection: config.protection,
        lock: non_empty(&config.lock),
        tags: non_empty(&config.tags),
        boot: non_empty(&config.boot),
        agent: non_empty(&config.agent),
        ostype: non_empty(&config.ostype),
        machine: non_empty(&config.machine),
        bios: non_empty(&config.bios),
        acpi: config.acpi,
        scsihw: non_empty(&config.scsihw),
        memory: config.memory,
        hugepages: non_empty(&config.hugepages),
        balloon: config.balloon,
        vga: non_empty(&config.vga),
        tpmstate0: non_empty(&config.tpmstate0),
        rng0: non_empty(&config.rng0),
        audio0: non_empty(&config.audio0),
        net0: non_empty(&config.net0),
        hostpci0: non_empty(&config.hostpci0),
        serial0: non_empty(&config.serial0),
        usb0: non_empty(&config.usb0),
        parallel0: non_empty(&config.parallel0),
        citype: non_empty(&config.citype),
        ciuser: non_empty(&config.ciuser),
        cipassword: non_empty(&config.cipassword),
        nameserver: non_empty(&config.nameserver),
        searchdomain: non_empty(&config.searchdomain),
        sshkeys: non_empty(&config.sshkeys),
        cicustom: non_empty(&config.cicustom),
        ciupgrade: config.ciupgrade,
        ipconfig0: non_empty(&config.ipconfig0),
        cpu,
        efidisk,
        disks,
        clone: None,
    })
}
