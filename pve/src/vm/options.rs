//! Config directives for creating and updating a VM

use super::codec::{encode_cpu, encode_disk, encode_efi_disk, encode_numa_node};
use super::types::{Cpu, Inputs};
use crate::api::qemu::{flag, ConfigOption};

pub(crate) const EFI_DISK_KEY: &str = "efidisk0";

fn text(value: &Option<String>) -> Option<String> {
    value.clone()
}

fn number<T: ToString>(value: Option<T>) -> Option<String> {
    value.map(|v| v.to_string())
}

fn boolean(value: Option<bool>) -> Option<String> {
    value.map(flag)
}

/// Plain config keys in submission order, with their wire value if set.
pub(crate) fn general_scalars(inputs: &Inputs) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("name", text(&inputs.name)),
        ("description", text(&inputs.description)),
        ("hookscript", text(&inputs.hookscript)),
        ("hotplug", text(&inputs.hotplug)),
        ("template", boolean(inputs.template)),
        ("autostart", boolean(inputs.autostart)),
        ("onboot", boolean(inputs.onboot)),
        ("tablet", boolean(inputs.tablet)),
        ("kvm", boolean(inputs.kvm)),
        ("protection", boolean(inputs.protection)),
        ("lock", text(&inputs.lock)),
        ("tags", text(&inputs.tags)),
        ("boot", text(&inputs.boot)),
        ("agent", text(&inputs.agent)),
        ("ostype", text(&inputs.ostype)),
        ("machine", text(&inputs.machine)),
        ("bios", text(&inputs.bios)),
        ("acpi", boolean(inputs.acpi)),
        ("scsihw", text(&inputs.scsihw)),
        ("memory", number(inputs.memory)),
        ("hugepages", text(&inputs.hugepages)),
        ("balloon", number(inputs.balloon)),
        ("vga", text(&inputs.vga)),
        ("tpmstate0", text(&inputs.tpmstate0)),
        ("rng0", text(&inputs.rng0)),
        ("audio0", text(&inputs.audio0)),
        ("net0", text(&inputs.net0)),
        ("hostpci0", text(&inputs.hostpci0)),
        ("serial0", text(&inputs.serial0)),
        ("usb0", text(&inputs.usb0)),
        ("parallel0", text(&inputs.parallel0)),
        ("citype", text(&inputs.citype)),
        ("ciuser", text(&inputs.ciuser)),
        ("cipassword", text(&inputs.cipassword)),
        ("nameserver", text(&inputs.nameserver)),
        ("searchdomain", text(&inputs.searchdomain)),
        ("sshkeys", text(&inputs.sshkeys)),
        ("cicustom", text(&inputs.cicustom)),
        ("ciupgrade", boolean(inputs.ciupgrade)),
        ("ipconfig0", text(&inputs.ipconfig0)),
    ]
}

/// CPU count keys. These must reach the backend before the `cpu` descriptor.
pub(crate) fn cpu_scalars(cpu: &Cpu) -> Vec<(&'static str, Option<String>)> {
    vec![
        ("cores", number(cpu.cores)),
        ("sockets", number(cpu.sockets)),
        ("cpulimit", number(cpu.limit)),
        ("cpuunits", number(cpu.units)),
        ("vcpus", number(cpu.vcpus)),
        ("numa", boolean(cpu.numa)),
    ]
}

pub(crate) fn numa_key(index: usize) -> String {
    format!("numa{}", index)
}

/// Every directive needed to create a VM from `inputs`.
///
/// Identifier, node and clone source are passed to the client separately.
pub fn build_options(inputs: &Inputs) -> Vec<ConfigOption> {
    let mut options: Vec<ConfigOption> = general_scalars(inputs)
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| ConfigOption::new(name, v)))
        .collect();

    if let Some(cpu) = &inputs.cpu {
        options.extend(
            cpu_scalars(cpu)
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| ConfigOption::new(name, v))),
        );

        let descriptor = encode_cpu(cpu);
        if !descriptor.is_empty() {
            options.push(ConfigOption::new("cpu", descriptor));
        }

        for (index, node) in cpu.numa_nodes.iter().enumerate() {
            options.push(ConfigOption::new(numa_key(index), encode_numa_node(node)));
        }
    }

    if let Some(efi) = &inputs.efidisk {
        options.push(ConfigOption::new(EFI_DISK_KEY, encode_efi_disk(efi)));
    }

    for disk in &inputs.disks {
        options.push(ConfigOption::new(disk.interface.clone(), encode_disk(disk)));
    }

    options
}
