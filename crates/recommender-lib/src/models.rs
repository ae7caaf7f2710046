//! Core data models for the resource recommender

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resource axis a recommendation is computed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceDimension {
    Cpu,
    Memory,
    AcceleratorCompute,
    AcceleratorMemory,
}

impl ResourceDimension {
    pub const ALL: [ResourceDimension; 4] = [
        ResourceDimension::Cpu,
        ResourceDimension::Memory,
        ResourceDimension::AcceleratorCompute,
        ResourceDimension::AcceleratorMemory,
    ];

    /// Configuration key prefix for this dimension (`cpu-request-percentile` etc.)
    pub fn key_prefix(&self) -> &'static str {
        match self {
            ResourceDimension::Cpu => "cpu",
            ResourceDimension::Memory => "mem",
            ResourceDimension::AcceleratorCompute => "gpu",
            ResourceDimension::AcceleratorMemory => "gpumem",
        }
    }

    /// CPU and memory estimates are mandatory; accelerator dimensions only
    /// exist for workloads that actually report accelerator usage.
    pub fn is_required(&self) -> bool {
        matches!(self, ResourceDimension::Cpu | ResourceDimension::Memory)
    }
}

impl std::fmt::Display for ResourceDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key_prefix())
    }
}

/// Fixed container holding one value per resource dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionSet<T> {
    pub cpu: T,
    pub memory: T,
    pub accelerator_compute: T,
    pub accelerator_memory: T,
}

impl<T> DimensionSet<T> {
    pub fn from_fn(mut f: impl FnMut(ResourceDimension) -> T) -> Self {
        Self {
            cpu: f(ResourceDimension::Cpu),
            memory: f(ResourceDimension::Memory),
            accelerator_compute: f(ResourceDimension::AcceleratorCompute),
            accelerator_memory: f(ResourceDimension::AcceleratorMemory),
        }
    }

    pub fn get(&self, dimension: ResourceDimension) -> &T {
        match dimension {
            ResourceDimension::Cpu => &self.cpu,
            ResourceDimension::Memory => &self.memory,
            ResourceDimension::AcceleratorCompute => &self.accelerator_compute,
            ResourceDimension::AcceleratorMemory => &self.accelerator_memory,
        }
    }

    pub fn get_mut(&mut self, dimension: ResourceDimension) -> &mut T {
        match dimension {
            ResourceDimension::Cpu => &mut self.cpu,
            ResourceDimension::Memory => &mut self.memory,
            ResourceDimension::AcceleratorCompute => &mut self.accelerator_compute,
            ResourceDimension::AcceleratorMemory => &mut self.accelerator_memory,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceDimension, &T)> {
        ResourceDimension::ALL.iter().map(move |&d| (d, self.get(d)))
    }
}

/// A single usage observation for one workload and dimension
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// An out-of-memory kill observed for a workload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OomEvent {
    pub timestamp: DateTime<Utc>,
    /// Memory usage in bytes at the moment of the kill
    pub memory_at_failure: f64,
}

/// A named discrete resource tier a recommendation can be snapped to
///
/// Accelerator capacities are optional; an entry without them is only
/// eligible for workloads with no accelerator demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub name: String,
    /// CPU capacity in cores
    pub cpu: f64,
    /// Memory capacity in bytes
    pub memory: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_compute: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accelerator_memory: Option<f64>,
}

impl Specification {
    /// Capacity offered for a dimension, `None` when the entry has no
    /// capacity on that axis.
    pub fn capacity(&self, dimension: ResourceDimension) -> Option<f64> {
        match dimension {
            ResourceDimension::Cpu => Some(self.cpu),
            ResourceDimension::Memory => Some(self.memory),
            ResourceDimension::AcceleratorCompute => self.accelerator_compute,
            ResourceDimension::AcceleratorMemory => self.accelerator_memory,
        }
    }
}

/// Recommendation output for one workload and evaluation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub workload: String,
    /// Recommended request per dimension; `None` for accelerator dimensions
    /// the workload never reported usage on
    pub requests: DimensionSet<Option<f64>>,
    /// Name of the matched specification when specification mode is enabled
    pub specification: Option<String>,
    pub generated_at: DateTime<Utc>,
}
