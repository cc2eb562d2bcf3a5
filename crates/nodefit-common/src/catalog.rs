//! EC2 instance type catalog
//!
//! Candidate node types for the packing simulation. A compiled-in catalog
//! covers the general-purpose, compute-optimized, memory-optimized, and
//! burstable families we actually run; a JSON file can replace it when
//! pricing or families drift.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::quantity::GIB;

/// Catalog loading and validation errors
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog contains no instance types
    #[error("catalog is empty")]
    Empty,

    /// Instance type name appears more than once
    #[error("duplicate instance type '{0}' in catalog")]
    Duplicate(String),

    /// Instance type has zero CPU or memory
    #[error("instance type '{name}' has zero {resource}")]
    ZeroCapacity { name: String, resource: &'static str },

    /// Instance type has a non-positive hourly price
    #[error("instance type '{0}' has a non-positive hourly price")]
    InvalidPrice(String),

    /// Requested instance type is not in the catalog
    #[error("unknown instance type '{0}'")]
    Unknown(String),

    /// Failed to read the catalog file
    #[error("failed to read catalog file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the catalog JSON
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A candidate EC2 instance type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceType {
    /// Instance type name (e.g. "m6i.2xlarge")
    pub name: String,
    /// vCPU count
    pub vcpus: u32,
    /// Memory in bytes
    pub memory_bytes: u64,
    /// On-demand hourly price in USD
    pub hourly_usd: f64,
    /// Instance generation (e.g. 7 for m7i); derived from the name when 0
    #[serde(default)]
    pub generation: u32,
}

impl InstanceType {
    /// CPU capacity in millicores
    pub fn cpu_millicores(&self) -> u64 {
        u64::from(self.vcpus) * 1000
    }
}

/// Extract the instance generation from a type name ("m6i.large" -> 6).
///
/// Returns 0 when the family carries no digits.
pub fn parse_generation(name: &str) -> u32 {
    let family = name.split('.').next().unwrap_or(name);
    let digits: String = family
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// The set of candidate instance types for an analysis
#[derive(Debug, Clone)]
pub struct InstanceCatalog {
    instances: Vec<InstanceType>,
}

impl InstanceCatalog {
    /// The compiled-in catalog (on-demand us-east-1 pricing)
    pub fn builtin() -> Self {
        let instances = vec![
            entry("t3.medium", 2, 4, 0.0416),
            entry("t3.large", 2, 8, 0.0832),
            entry("t3.xlarge", 4, 16, 0.1664),
            entry("m5.large", 2, 8, 0.096),
            entry("m5.xlarge", 4, 16, 0.192),
            entry("m5.2xlarge", 8, 32, 0.384),
            entry("m5.4xlarge", 16, 64, 0.768),
            entry("m6i.large", 2, 8, 0.096),
            entry("m6i.xlarge", 4, 16, 0.192),
            entry("m6i.2xlarge", 8, 32, 0.384),
            entry("m6i.4xlarge", 16, 64, 0.768),
            entry("m7i.large", 2, 8, 0.1008),
            entry("m7i.xlarge", 4, 16, 0.2016),
            entry("m7i.2xlarge", 8, 32, 0.4032),
            entry("m7i.4xlarge", 16, 64, 0.8064),
            entry("c5.xlarge", 4, 8, 0.17),
            entry("c5.2xlarge", 8, 16, 0.34),
            entry("c5.4xlarge", 16, 32, 0.68),
            entry("c6i.xlarge", 4, 8, 0.17),
            entry("c6i.2xlarge", 8, 16, 0.34),
            entry("c6i.4xlarge", 16, 32, 0.68),
            entry("c7i.xlarge", 4, 8, 0.1785),
            entry("c7i.2xlarge", 8, 16, 0.357),
            entry("c7i.4xlarge", 16, 32, 0.714),
            entry("r5.large", 2, 16, 0.126),
            entry("r5.xlarge", 4, 32, 0.252),
            entry("r5.2xlarge", 8, 64, 0.504),
            entry("r6i.large", 2, 16, 0.126),
            entry("r6i.xlarge", 4, 32, 0.252),
            entry("r6i.2xlarge", 8, 64, 0.504),
            entry("r7i.large", 2, 16, 0.1323),
            entry("r7i.xlarge", 4, 32, 0.2646),
            entry("r7i.2xlarge", 8, 64, 0.5292),
        ];
        Self { instances }
    }

    /// Load a replacement catalog from a JSON file (an array of instance
    /// types). Generations missing from the file are derived from the name.
    pub fn from_json_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut instances: Vec<InstanceType> = serde_json::from_str(&content)?;
        for instance in &mut instances {
            if instance.generation == 0 {
                instance.generation = parse_generation(&instance.name);
            }
        }
        let catalog = Self { instances };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate catalog contents
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.instances.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = BTreeSet::new();
        for instance in &self.instances {
            if !seen.insert(instance.name.as_str()) {
                return Err(CatalogError::Duplicate(instance.name.clone()));
            }
            if instance.vcpus == 0 {
                return Err(CatalogError::ZeroCapacity {
                    name: instance.name.clone(),
                    resource: "vCPUs",
                });
            }
            if instance.memory_bytes == 0 {
                return Err(CatalogError::ZeroCapacity {
                    name: instance.name.clone(),
                    resource: "memory",
                });
            }
            if instance.hourly_usd <= 0.0 {
                return Err(CatalogError::InvalidPrice(instance.name.clone()));
            }
        }
        Ok(())
    }

    /// Look up an instance type by name
    pub fn get(&self, name: &str) -> Option<&InstanceType> {
        self.instances.iter().find(|i| i.name == name)
    }

    /// Subset the catalog to the named instance types, preserving catalog
    /// order. Unknown names are an error.
    pub fn retain_named(&self, names: &[String]) -> Result<Self, CatalogError> {
        for name in names {
            if self.get(name).is_none() {
                return Err(CatalogError::Unknown(name.clone()));
            }
        }
        let instances = self
            .instances
            .iter()
            .filter(|i| names.contains(&i.name))
            .cloned()
            .collect();
        Ok(Self { instances })
    }

    pub fn instances(&self) -> &[InstanceType] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

fn entry(name: &str, vcpus: u32, memory_gib: u64, hourly_usd: f64) -> InstanceType {
    InstanceType {
        name: name.to_string(),
        vcpus,
        memory_bytes: memory_gib * GIB,
        hourly_usd,
        generation: parse_generation(name),
    }
}
