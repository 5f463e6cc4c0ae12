//! Common types and serde helpers for the Proxmox API

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(upid: impl Into<String>) -> Self {
        Self(upid.into())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task state as reported by `/nodes/{node}/tasks/{upid}/status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Stopped { exit_status: String },
}

impl TaskStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TaskStatus::Stopped { exit_status } if exit_status == "OK")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxmoxBool(pub bool);

impl From<ProxmoxBool> for bool {
    fn from(value: ProxmoxBool) -> Self {
        value.0
    }
}

impl Serialize for ProxmoxBool {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(u8::from(self.0))
    }
}

impl<'de> Deserialize<'de> for ProxmoxBool {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum BoolOrInt {
            Bool(bool),
            Int(u8),
            String(String),
        }

        match BoolOrInt::deserialize(deserializer)? {
            BoolOrInt::Bool(b) => Ok(ProxmoxBool(b)),
            BoolOrInt::Int(0) => Ok(ProxmoxBool(false)),
            BoolOrInt::Int(1) => Ok(ProxmoxBool(true)),
            BoolOrInt::String(s) if s == "0" => Ok(ProxmoxBool(false)),
            BoolOrInt::String(s) if s == "1" => Ok(ProxmoxBool(true)),
            _ => Err(serde::de::Error::custom("expected 0 or 1")),
        }
    }
}

pub mod proxmox_bool_option {
    use super::ProxmoxBool;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(ProxmoxBool).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<ProxmoxBool>::deserialize(deserializer)?.map(bool::from))
    }
}

pub mod string_or_u64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrU64 {
            String(String),
            U64(u64),
        }

        match Option::<StringOrU64>::deserialize(deserializer)? {
            Some(StringOrU64::String(s)) => {
                s.parse::<u64>().map(Some).map_err(serde::de::Error::custom)
            }
            Some(StringOrU64::U64(u)) => Ok(Some(u)),
            None => Ok(None),
        }
    }
}

pub mod string_or_u32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrU32 {
            String(String),
            U32(u32),
        }

        match Option::<StringOrU32>::deserialize(deserializer)? {
            Some(StringOrU32::String(s)) => {
                s.parse::<u32>().map(Some).map_err(serde::de::Error::custom)
            }
            Some(StringOrU32::U32(u)) => Ok(Some(u)),
            None => Ok(None),
        }
    }
}

/// `cpulimit` comes back as `"2.5"` on some PVE versions and as a number on others.
pub mod string_or_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum StringOrF64 {
            String(String),
            F64(f64),
        }

        match Option::<StringOrF64>::deserialize(deserializer)? {
            Some(StringOrF64::String(s)) => {
                s.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
            Some(StringOrF64::F64(f)) => Ok(Some(f)),
            None => Ok(None),
        }
    }
}
