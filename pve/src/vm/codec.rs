//! Parsing and serialization of PVE compound config descriptors
//!
//! PVE packs structured attributes into a single comma-separated `key=value`
//! string per config key. This module converts between those strings and the
//! typed structures in [`super::types`] for CPU, NUMA node, disk and EFI disk.

use super::types::{Cpu, Disk, EfiDisk, EfiType, NumaNode};
use crate::error::VmConfigError;
use std::collections::BTreeMap;

/// PVE ignores the size of an EFI disk, so allocation always asks for `1`.
const EFI_DISK_ALLOC_SIZE: &str = "1";

/// Fields shared by disk and EFI disk descriptors.
#[derive(Debug, Default)]
struct DiskBase {
    storage: String,
    file_id: Option<String>,
    size: Option<u64>,
    extras: BTreeMap<String, String>,
}

fn split_volume(volume: &str) -> (String, Option<String>) {
    match volume.split_once(':') {
        Some((storage, file_id)) if !file_id.is_empty() => {
            (storage.to_string(), Some(file_id.to_string()))
        }
        Some((storage, _)) => (storage.to_string(), None),
        None => (volume.to_string(), None),
    }
}

fn parse_disk_base(kind: &'static str, raw: &str) -> Result<DiskBase, VmConfigError> {
    let mut base = DiskBase::default();

    for part in raw.split(',') {
        match part.split_once('=') {
            Some(("file", value)) => {
                (base.storage, base.file_id) = split_volume(value);
            }
            Some(("size", value)) => {
                let size = parse_disk_size(value)
                    .map_err(|reason| VmConfigError::malformed(kind, raw, reason))?;
                base.size = Some(size);
            }
            Some((key, value)) => {
                base.extras.insert(key.to_string(), value.to_string());
            }
            None if part.contains(':') => {
                (base.storage, base.file_id) = split_volume(part);
            }
            None => {}
        }
    }

    if base.storage.is_empty() {
        return Err(VmConfigError::malformed(kind, raw, "missing storage"));
    }

    Ok(base)
}

/// Parse a disk size such as `32G`, `2048M`, `1T` or `32` into whole gigabytes.
///
/// Integer magnitudes are converted exactly. Fractions, whether written or
/// left after unit conversion, are truncated.
pub fn parse_disk_size(value: &str) -> Result<u64, String> {
    let invalid = || format!("failed to parse disk size: {}", value);
    let out_of_range = || format!("disk size out of range: {}", value);

    let (magnitude, unit) = match value.chars().last() {
        Some(unit) if unit.is_ascii_alphabetic() => (&value[..value.len() - 1], Some(unit)),
        _ => (value, None),
    };
    let (multiplier, divisor): (u64, u64) = match unit {
        None | Some('G' | 'g') => (1, 1),
        Some('M' | 'm') => (1, 1024),
        Some('T' | 't') => (1024, 1),
        Some(other) => return Err(format!("unknown size unit: {}", other)),
    };

    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
        return Err(invalid());
    }

    if magnitude.contains('.') {
        let number: f64 = magnitude.parse().map_err(|_| invalid())?;
        let gigabytes = (number * multiplier as f64 / divisor as f64).trunc();
        if gigabytes >= u64::MAX as f64 {
            return Err(out_of_range());
        }
        return Ok(gigabytes as u64);
    }

    let number: u64 = magnitude.parse().map_err(|_| out_of_range())?;
    number
        .checked_mul(multiplier)
        .map(|n| n / divisor)
        .ok_or_else(out_of_range)
}

pub fn decode_disk(interface: &str, raw: &str) -> Result<Disk, VmConfigError> {
    let base = parse_disk_base("disk", raw)?;
    let size = base
        .size
        .ok_or_else(|| VmConfigError::malformed("disk", raw, "size is required"))?;

    Ok(Disk {
        interface: interface.to_string(),
        storage: base.storage,
        size,
        file_id: base.file_id,
    })
}

/// Without a file id the backend is asked to allocate `size` gigabytes.
pub fn encode_disk(disk: &Disk) -> String {
    let volume = match disk.file_id.as_deref() {
        Some(file_id) if !file_id.is_empty() => format!("{}:{}", disk.storage, file_id),
        _ => format!("{}:{}", disk.storage, disk.size),
    };
    format!("file={},size={}", volume, disk.size)
}

pub fn decode_efi_disk(raw: &str) -> Result<EfiDisk, VmConfigError> {
    let base = parse_disk_base("efidisk", raw)?;

    let efitype = base
        .extras
        .get("efitype")
        .map(|value| value.parse::<EfiType>())
        .transpose()
        .map_err(|reason| VmConfigError::malformed("efidisk", raw, reason))?;
    let pre_enrolled_keys = base.extras.get("pre-enrolled-keys").map(|v| v == "1");

    Ok(EfiDisk {
        storage: base.storage,
        file_id: base.file_id,
        efitype,
        pre_enrolled_keys,
    })
}

pub fn encode_efi_disk(efi: &EfiDisk) -> String {
    let file_id = match efi.file_id.as_deref() {
        Some(file_id) if !file_id.is_empty() => file_id,
        _ => EFI_DISK_ALLOC_SIZE,
    };

    let mut config = format!("file={}:{}", efi.storage, file_id);
    if let Some(efitype) = efi.efitype {
        config.push_str(&format!(",efitype={}", efitype));
    }
    if let Some(keys) = efi.pre_enrolled_keys {
        config.push_str(if keys {
            ",pre-enrolled-keys=1"
        } else {
            ",pre-enrolled-keys=0"
        });
    }
    config
}

/// Decode the `cpu` descriptor. Only type, flags, hidden, hv-vendor-id and
/// phys-bits live in it; the counts are separate config keys.
///
/// Returns `None` for an empty descriptor. Unknown keys are ignored.
pub fn decode_cpu(raw: &str) -> Option<Cpu> {
    if raw.trim().is_empty() {
        return None;
    }

    let mut cpu = Cpu::default();
    let mut seen_bare = false;

    for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((key, value)) = segment.split_once('=') else {
            if !seen_bare {
                seen_bare = true;
                cpu.cpu_type = Some(segment.to_string());
            }
            continue;
        };

        match key {
            "cputype" if !value.is_empty() => cpu.cpu_type = Some(value.to_string()),
            "flags" => {
                for token in value.split(';').map(str::trim) {
                    if let Some(flag) = token.strip_prefix('-') {
                        if !flag.is_empty() {
                            cpu.flags_disabled.push(flag.to_string());
                        }
                    } else {
                        let flag = token.strip_prefix('+').unwrap_or(token);
                        if !flag.is_empty() {
                            cpu.flags_enabled.push(flag.to_string());
                        }
                    }
                }
            }
            "hidden" => match value {
                "1" => cpu.hidden = Some(true),
                "0" => cpu.hidden = Some(false),
                _ => {}
            },
            "hv-vendor-id" => cpu.hv_vendor_id = Some(value.to_string()),
            "phys-bits" => cpu.phys_bits = Some(value.to_string()),
            _ => {}
        }
    }

    Some(cpu)
}

/// Encode the descriptor part of `cpu` in the canonical key order. Counts and
/// NUMA nodes are not part of the descriptor.
pub fn encode_cpu(cpu: &Cpu) -> String {
    let mut parts = Vec::new();

    if let Some(cpu_type) = cpu.cpu_type.as_deref().filter(|t| !t.is_empty()) {
        parts.push(cpu_type.to_string());
    }

    let flags: Vec<String> = cpu
        .flags_enabled
        .iter()
        .filter(|f| !f.is_empty())
        .map(|f| format!("+{}", f))
        .chain(
            cpu.flags_disabled
                .iter()
                .filter(|f| !f.is_empty())
                .map(|f| format!("-{}", f)),
        )
        .collect();
    if !flags.is_empty() {
        parts.push(format!("flags={}", flags.join(";")));
    }

    if let Some(hidden) = cpu.hidden {
        parts.push(format!("hidden={}", if hidden { 1 } else { 0 }));
    }
    if let Some(vendor) = &cpu.hv_vendor_id {
        parts.push(format!("hv-vendor-id={}", vendor));
    }
    if let Some(bits) = &cpu.phys_bits {
        parts.push(format!("phys-bits={}", bits));
    }

    parts.join(",")
}

/// Decode a `numaN` descriptor. Returns `None` for an empty descriptor.
pub fn decode_numa_node(raw: &str) -> Result<Option<NumaNode>, VmConfigError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }

    let mut cpus = None;
    let mut node = NumaNode::default();

    for (key, value) in raw.split(',').filter_map(|segment| segment.split_once('=')) {
        match key.trim() {
            "cpus" => cpus = Some(value.to_string()),
            "hostnodes" => node.host_nodes = Some(value.to_string()),
            "memory" => {
                let memory = value.parse::<i64>().map_err(|_| {
                    VmConfigError::malformed(
                        "numa",
                        raw,
                        format!("memory must be an integer, got '{}'", value),
                    )
                })?;
                node.memory = Some(memory);
            }
            "policy" => node.policy = Some(value.to_string()),
            _ => {}
        }
    }

    node.cpus = cpus
        .filter(|cpus| !cpus.is_empty())
        .ok_or_else(|| VmConfigError::malformed("numa", raw, "cpus is required"))?;

    Ok(Some(node))
}

pub fn encode_numa_node(node: &NumaNode) -> String {
    let mut parts = vec![format!("cpus={}", node.cpus)];
    if let Some(host_nodes) = &node.host_nodes {
        parts.push(format!("hostnodes={}", host_nodes));
    }
    if let Some(memory) = node.memory {
        parts.push(format!("memory={}", memory));
    }
    if let Some(policy) = &node.policy {
        parts.push(format!("policy={}", policy));
    }
    parts.join(",")
}

#[cfg(test)]
#[path = "./codec_test.rs"]
mod codec_test;
