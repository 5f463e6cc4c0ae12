//! QEMU/KVM virtual machine configuration snapshot

use crate::api::common::{proxmox_bool_option, string_or_f64, string_or_u32, string_or_u64};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DISK_FAMILIES: [&str; 4] = ["ide", "sata", "scsi", "virtio"];

/// VM configuration as returned by `GET /nodes/{node}/qemu/{vmid}/config`.
///
/// Keys without a typed field (disk slots, `numaN`, anything newer than this
/// struct) land in `extra` so nothing the remote reports is lost.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct QemuConfig {
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub acpi: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio0: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub autostart: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_u64",
        default
    )]
    pub balloon: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bios: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicustom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipassword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citype: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub ciupgrade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciuser: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_u32",
        default
    )]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_f64",
        default
    )]
    pub cpulimit: Option<f64>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_u32",
        default
    )]
    pub cpuunits: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efidisk0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hookscript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostpci0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotplug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipconfig0: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub kvm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_u64",
        default
    )]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net0: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub numa: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub onboot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ostype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel0: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub protection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsihw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial0: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_u32",
        default
    )]
    pub sockets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sshkeys: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub tablet: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "proxmox_bool_option",
        default
    )]
    pub template: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpmstate0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb0: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "string_or_u32",
        default
    )]
    pub vcpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vga: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl QemuConfig {
    /// Disk slots currently configured, keyed by interface (`scsi0`, `virtio1`, ...).
    ///
    /// CD-ROM drives share the slot namespace with disks but are not disks.
    pub fn disks(&self) -> BTreeMap<String, String> {
        self.extra
            .iter()
            .filter(|(key, _)| is_disk_slot(key))
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .filter(|(key, value)| {
                let cdrom = value.split(',').any(|part| part == "media=cdrom");
                if cdrom {
                    tracing::warn!("Skipping CD-ROM drive in slot {}", key);
                }
                !cdrom
            })
            .collect()
    }

    /// `numaN` descriptors, ordered by numeric index.
    pub fn numa_nodes(&self) -> Vec<(usize, String)> {
        let mut nodes: Vec<(usize, String)> = self
            .extra
            .iter()
            .filter_map(|(key, value)| {
                let index = key.strip_prefix("numa")?.parse::<usize>().ok()?;
                value.as_str().map(|v| (index, v.to_string()))
            })
            .collect();
        nodes.sort_by_key(|(index, _)| *index);
        nodes
    }
}

/// Whether `key` names a disk slot: an interface family followed by digits.
pub fn is_disk_slot(key: &str) -> bool {
    DISK_FAMILIES.iter().any(|family| {
        key.strip_prefix(family)
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
    })
}

/// A VM as located on the cluster, together with its configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualMachine {
    pub vmid: u64,
    pub node: String,
    pub config: QemuConfig,
}

/// Directive name whose value lists the config keys to remove.
pub const DELETE_KEY: &str = "delete";

/// A single `name=value` configuration directive submitted to the config endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigOption {
    pub name: String,
    pub value: String,
}

impl ConfigOption {
    pub fn new(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Remove `key` from the configuration.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            name: DELETE_KEY.to_string(),
            value: key.into(),
        }
    }
}

/// PVE encodes booleans as `1`/`0` on the wire.
pub fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}
