//! Worker and device configuration for local trial execution.

use serde::{Deserialize, Serialize};
use tm_types::{validation_error, TmResult};

/// Kind of accelerator the pool represents. Only used for reporting; the
/// allocator treats every device as an opaque index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[default]
    Gpu,
    Cpu,
}

impl std::fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gpu => f.write_str("gpu"),
            Self::Cpu => f.write_str("cpu"),
        }
    }
}

/// Resources available to a [`crate::TrialRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of devices in the pool (physical accelerator count).
    pub num_devices: usize,

    /// Worker threads evaluating trials.
    pub num_workers: usize,

    pub device_kind: DeviceKind,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_devices: 1,
            num_workers: 4,
            device_kind: DeviceKind::Gpu,
        }
    }
}

impl ExecutorConfig {
    pub fn new(num_devices: usize, num_workers: usize) -> Self {
        Self {
            num_devices,
            num_workers,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TmResult<()> {
        if self.num_devices == 0 {
            return Err(validation_error!("executor needs at least one device"));
        }
        if self.num_workers == 0 {
            return Err(validation_error!("executor needs at least one worker"));
        }
        Ok(())
    }

    /// Trials that can actually run at once for a study asking for
    /// `concurrency`; anything beyond the worker count would only queue.
    pub fn max_in_flight(&self, concurrency: usize) -> usize {
        concurrency.min(self.num_workers).max(1)
    }
}
