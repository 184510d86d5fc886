use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// MiB per GiB, the unit conversion used for every memory comparison.
pub const MIB_PER_GIB: f64 = 1024.0;

/// AMD A-series families, the default restriction of `--amd-only`.
pub const AMD_A_SERIES_FAMILIES: &[&str] = &[
    "m5a", "r5a", "c6a", "m6a", "t3a", "r6a", "hpc6a", "g4ad", "m7a", "c7a", "r7a",
];

/// Convert GiB to whole MiB. Memory is compared in MiB so exact constraints
/// never depend on float equality.
pub fn gib_to_mib(gib: f64) -> u64 {
    (gib * MIB_PER_GIB).round().max(0.0) as u64
}

/// Smallest whole MiB at or above `gib`, so a fractional floor never admits
/// anything below it.
fn gib_floor_to_mib(gib: f64) -> u64 {
    (gib * MIB_PER_GIB).ceil().max(0.0) as u64
}

/// A named compute instance class with a fixed vCPU/memory specification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceType {
    pub name: String,
    pub vcpus: u32,
    pub memory_mib: u64,
    /// Identifier prefix before the first `.` (`m5a` for `m5a.large`).
    pub family: String,
}

impl ResourceType {
    pub fn new(name: impl Into<String>, vcpus: u32, memory_mib: u64) -> Result<Self, CoreError> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::InvalidResource {
                name,
                reason: "empty identifier".into(),
            });
        }
        if vcpus == 0 {
            return Err(CoreError::InvalidResource {
                name,
                reason: "vcpus must be at least 1".into(),
            });
        }
        let family = name.split('.').next().unwrap_or(&name).to_string();
        Ok(Self {
            name,
            vcpus,
            memory_mib,
            family,
        })
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_mib as f64 / MIB_PER_GIB
    }
}

/// vCPU/memory predicate a resource type must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceConstraint {
    Exact { vcpus: u32, memory_gib: f64 },
    Threshold { min_vcpus: u32, min_memory_gib: f64 },
}

impl ResourceConstraint {
    pub fn matches(&self, resource: &ResourceType) -> bool {
        match *self {
            ResourceConstraint::Exact { vcpus, memory_gib } => {
                resource.vcpus == vcpus && resource.memory_mib == gib_to_mib(memory_gib)
            }
            ResourceConstraint::Threshold {
                min_vcpus,
                min_memory_gib,
            } => {
                resource.vcpus >= min_vcpus
                    && resource.memory_mib >= gib_floor_to_mib(min_memory_gib)
            }
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let (vcpus, memory, label) = match *self {
            ResourceConstraint::Exact { vcpus, memory_gib } => (vcpus, memory_gib, "exact"),
            ResourceConstraint::Threshold {
                min_vcpus,
                min_memory_gib,
            } => (min_vcpus, min_memory_gib, "threshold"),
        };
        if matches!(self, ResourceConstraint::Exact { .. }) && vcpus == 0 {
            return Err(CoreError::InvalidConfig(
                "exact vcpus must be at least 1".into(),
            ));
        }
        if !memory.is_finite() || memory < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "{label} memory must be a finite, non-negative GiB value (got {memory})"
            )));
        }
        Ok(())
    }
}

/// The active catalog predicate: a resource constraint plus an optional
/// family restriction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFilter {
    pub constraint: ResourceConstraint,
    /// Identifier prefixes; empty means unrestricted.
    #[serde(default)]
    pub family_prefixes: Vec<String>,
}

impl CandidateFilter {
    pub fn new(constraint: ResourceConstraint) -> Self {
        Self {
            constraint,
            family_prefixes: Vec::new(),
        }
    }

    pub fn with_families<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.family_prefixes = prefixes
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        self
    }

    pub fn accepts(&self, resource: &ResourceType) -> bool {
        self.constraint.matches(resource)
            && (self.family_prefixes.is_empty()
                || self
                    .family_prefixes
                    .iter()
                    .any(|prefix| resource.name.starts_with(prefix.as_str())))
    }
}
