//! Device selection configuration

use crate::error::{Error, Result};
use mdstream_backends::BackendType;
use serde::{Deserialize, Serialize};
use std::env;

/// How a [`crate::Device`] picks and sizes its backend
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Backend to use
    pub backend: BackendType,
    /// CUDA device ordinal
    pub ordinal: usize,
    /// Simulated device memory for the CPU backend (None = unlimited)
    pub cpu_capacity_bytes: Option<usize>,
}

impl DeviceConfig {
    /// Build a configuration from the process environment
    ///
    /// # Environment Variables
    ///
    /// - `MDSTREAM_BACKEND` - `auto` (default), `cpu` or `cuda`
    /// - `MDSTREAM_DEVICE_ORDINAL` - CUDA device ordinal (default 0)
    /// - `MDSTREAM_CPU_CAPACITY` - CPU backend capacity in bytes
    ///
    /// Unset or empty variables keep their defaults; unparsable values are
    /// an error rather than silently ignored.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = value("MDSTREAM_BACKEND") {
            config.backend = backend
                .parse::<BackendType>()
                .map_err(|e| Error::InvalidConfig(format!("MDSTREAM_BACKEND: {e}")))?;
        }

        if let Some(ordinal) = value("MDSTREAM_DEVICE_ORDINAL") {
            config.ordinal = ordinal
                .trim()
                .parse::<usize>()
                .map_err(|e| Error::InvalidConfig(format!("MDSTREAM_DEVICE_ORDINAL '{ordinal}': {e}")))?;
        }

        if let Some(capacity) = value("MDSTREAM_CPU_CAPACITY") {
            let bytes = capacity
                .trim()
                .parse::<usize>()
                .map_err(|e| Error::InvalidConfig(format!("MDSTREAM_CPU_CAPACITY '{capacity}': {e}")))?;
            config.cpu_capacity_bytes = Some(bytes);
        }

        Ok(config)
    }
}
