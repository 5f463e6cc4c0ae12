//! Typed VM configuration as authored by the user and as observed on the cluster

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Desired VM configuration.
///
/// Every optional field is three-valued: `None` means the user never set it
/// (the backend may compute it), `Some` of an empty or zero value means it was
/// explicitly cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hookscript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotplug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autostart: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboot: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tablet: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kvm: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protection: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ostype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bios: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acpi: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scsihw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hugepages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balloon: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vga: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpmstate0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostpci0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parallel0: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciuser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipassword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameserver: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub searchdomain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sshkeys: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cicustom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ciupgrade: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipconfig0: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efidisk: Option<EfiDisk>,
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone: Option<CloneSpec>,
}

/// Observed VM configuration. Same shape as [`Inputs`], but computed fields
/// are always populated after a successful read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    #[serde(flatten)]
    pub inputs: Inputs,
}

impl From<Inputs> for Outputs {
    fn from(inputs: Inputs) -> Self {
        Self { inputs }
    }
}

/// A storage attachment in a disk slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// Slot identifier such as `scsi0` or `virtio1`. Opaque; never parsed.
    pub interface: String,
    pub storage: String,
    /// Size in whole gigabytes.
    pub size: u64,
    /// Backend-assigned volume name, e.g. `vm-100-disk-0`.
    #[serde(rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EfiDisk {
    pub storage: String,
    #[serde(rename = "filename", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub efitype: Option<EfiType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_enrolled_keys: Option<bool>,
}

/// OVMF variable store size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EfiType {
    #[serde(rename = "2m")]
    Small,
    #[serde(rename = "4m")]
    Large,
}

impl EfiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EfiType::Small => "2m",
            EfiType::Large => "4m",
        }
    }
}

impl fmt::Display for EfiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EfiType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "2m" => Ok(EfiType::Small),
            "4m" => Ok(EfiType::Large),
            other => Err(format!("invalid EFI type: {}", other)),
        }
    }
}

/// CPU configuration. Scalar counts map to their own config keys; type, flags,
/// hidden, vendor id and phys-bits are packed into the `cpu` descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpu {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub cpu_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sockets: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numa: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags_enabled: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags_disabled: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hv_vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phys_bits: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub numa_nodes: Vec<NumaNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumaNode {
    /// CPU range expression such as `0-3`.
    pub cpus: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_nodes: Option<String>,
    /// Memory in MB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

/// Create the VM as a clone of an existing one instead of from scratch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneSpec {
    pub vm_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_store_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_clone: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}
