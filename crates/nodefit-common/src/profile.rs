//! Pod resource profiles and aggregation
//!
//! A pod resource profile is the atomic unit of the packing simulation:
//! a (cpu, memory) request tuple plus the number of pods carrying it.
//! CPU is held in integer millicores so profile identity, merging, and sort
//! order never depend on float equality.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::quantity::{self, QuantityError};

/// A group of identical pods to be packed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodProfile {
    /// CPU request per pod, in millicores
    pub cpu_millicores: u64,
    /// Memory request per pod, in bytes
    pub memory_bytes: u64,
    /// Number of pods with this request tuple
    pub pod_count: u32,
    /// Workload names contributing to this profile (for reporting)
    pub workloads: Vec<String>,
}

impl PodProfile {
    /// Create a profile with no workload labels
    pub fn new(cpu_millicores: u64, memory_bytes: u64, pod_count: u32) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
            pod_count,
            workloads: Vec::new(),
        }
    }

    /// Attach a workload label
    pub fn with_workload(mut self, name: impl Into<String>) -> Self {
        self.workloads.push(name.into());
        self
    }

    /// Aggregate CPU across all pods in the profile, in millicores
    pub fn total_cpu_millicores(&self) -> u64 {
        self.cpu_millicores * u64::from(self.pod_count)
    }

    /// Aggregate memory across all pods in the profile, in bytes
    pub fn total_memory_bytes(&self) -> u64 {
        self.memory_bytes * u64::from(self.pod_count)
    }
}

/// A set of pod profiles with unique (cpu, memory) tuples
///
/// Inserting a profile whose resource tuple already exists merges it: pod
/// counts are summed and workload labels are unioned.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    // Keyed by (cpu_millicores, memory_bytes) for deterministic iteration
    profiles: BTreeMap<(u64, u64), PodProfile>,
}

impl ProfileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a profile, merging with an existing profile that has the same
    /// resource tuple. Profiles carrying no pods are ignored.
    pub fn insert(&mut self, profile: PodProfile) {
        if profile.pod_count == 0 {
            return;
        }
        let key = (profile.cpu_millicores, profile.memory_bytes);
        match self.profiles.get_mut(&key) {
            Some(existing) => {
                existing.pod_count += profile.pod_count;
                for workload in profile.workloads {
                    if !existing.workloads.contains(&workload) {
                        existing.workloads.push(workload);
                    }
                }
                existing.workloads.sort();
            }
            None => {
                let mut profile = profile;
                profile.workloads.sort();
                self.profiles.insert(key, profile);
            }
        }
    }

    /// Number of distinct profiles
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Total pod count across all profiles
    pub fn pod_count(&self) -> u32 {
        self.profiles.values().map(|p| p.pod_count).sum()
    }

    /// Iterate profiles in ascending (cpu, memory) order
    pub fn iter(&self) -> impl Iterator<Item = &PodProfile> {
        self.profiles.values()
    }

    /// Profiles in descending (total_cpu, total_memory) order
    ///
    /// Ties are broken by per-pod (cpu, memory), which are unique within the
    /// set, so the ordering is total and re-runs produce identical output.
    pub fn sorted_decreasing(&self) -> Vec<&PodProfile> {
        let mut sorted: Vec<&PodProfile> = self.profiles.values().collect();
        sorted.sort_by(|a, b| {
            (b.total_cpu_millicores(), b.total_memory_bytes())
                .cmp(&(a.total_cpu_millicores(), a.total_memory_bytes()))
                .then_with(|| {
                    (b.cpu_millicores, b.memory_bytes).cmp(&(a.cpu_millicores, a.memory_bytes))
                })
        });
        sorted
    }
}

/// Aggregate resource demand across a profile set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDemand {
    /// Total CPU demand in millicores
    pub cpu_millicores: u64,
    /// Total memory demand in bytes
    pub memory_bytes: u64,
    /// Total pod count
    pub pod_count: u32,
}

impl ClusterDemand {
    /// Sum demand across all profiles in a set
    pub fn from_profiles(profiles: &ProfileSet) -> Self {
        let mut demand = Self {
            cpu_millicores: 0,
            memory_bytes: 0,
            pod_count: 0,
        };
        for profile in profiles.iter() {
            demand.cpu_millicores += profile.total_cpu_millicores();
            demand.memory_bytes += profile.total_memory_bytes();
            demand.pod_count += profile.pod_count;
        }
        demand
    }
}

/// Serde-facing profile shape for loading profiles from a JSON file
///
/// CPU and memory are Kubernetes quantity strings so profile files read the
/// same way resource requests do in a pod manifest.
#[derive(Debug, Clone, Serialize, Deserialize, garde::Validate)]
#[serde(deny_unknown_fields)]
pub struct ProfileSpec {
    /// Workload name (e.g. "edxapp-web")
    #[garde(length(min = 1))]
    pub name: String,

    /// CPU request per pod (e.g. "500m")
    #[garde(length(min = 1))]
    pub cpu: String,

    /// Memory request per pod (e.g. "1Gi")
    #[garde(length(min = 1))]
    pub memory: String,

    /// Number of pods
    #[garde(range(min = 1))]
    pub count: u32,
}

impl ProfileSpec {
    /// Parse the quantity strings into a [`PodProfile`]
    pub fn to_profile(&self) -> Result<PodProfile, QuantityError> {
        Ok(PodProfile {
            cpu_millicores: quantity::parse_cpu(&self.cpu)?,
            memory_bytes: quantity::parse_memory(&self.memory)?,
            pod_count: self.count,
            workloads: vec![self.name.clone()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantity::MIB;

    #[test]
    fn test_insert_merges_duplicates() {
        let mut set = ProfileSet::new();
        set.insert(PodProfile::new(500, 512 * MIB, 3).with_workload("web"));
        set.insert(PodProfile::new(500, 512 * MIB, 2).with_workload("worker"));
        set.insert(PodProfile::new(250, 256 * MIB, 1).with_workload("cron"));

        assert_eq!(set.len(), 2);
        assert_eq!(set.pod_count(), 6);

        let merged = set
            .iter()
            .find(|p| p.cpu_millicores == 500)
            .expect("merged profile");
        assert_eq!(merged.pod_count, 5);
        assert_eq!(merged.workloads, vec!["web", "worker"]);
    }

    #[test]
    fn test_insert_ignores_empty_profiles() {
        let mut set = ProfileSet::new();
        set.insert(PodProfile::new(500, 512 * MIB, 0));
        assert!(set.is_empty());
    }

    #[test]
    fn test_sorted_decreasing_by_totals() {
        let mut set = ProfileSet::new();
        // totals: (1000m, 1GiB)
        set.insert(PodProfile::new(250, 256 * MIB, 4));
        // totals: (4000m, 2GiB)
        set.insert(PodProfile::new(2000, 1024 * MIB, 2));
        // totals: (1000m, 2GiB) - same CPU total as the first, more memory
        set.insert(PodProfile::new(1000, 2048 * MIB, 1));

        let sorted = set.sorted_decreasing();
        let cpus: Vec<u64> = sorted.iter().map(|p| p.cpu_millicores).collect();
        assert_eq!(cpus, vec![2000, 1000, 250]);
    }

    #[test]
    fn test_sorted_decreasing_is_deterministic() {
        let mut set = ProfileSet::new();
        for i in 1..=10u64 {
            set.insert(PodProfile::new(i * 100, i * 100 * MIB, 2));
        }
        let first: Vec<_> = set.sorted_decreasing().into_iter().cloned().collect();
        let second: Vec<_> = set.sorted_decreasing().into_iter().cloned().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cluster_demand() {
        let mut set = ProfileSet::new();
        set.insert(PodProfile::new(500, 512 * MIB, 4));
        set.insert(PodProfile::new(1000, 1024 * MIB, 2));

        let demand = ClusterDemand::from_profiles(&set);
        assert_eq!(demand.cpu_millicores, 4000);
        assert_eq!(demand.memory_bytes, 4096 * MIB);
        assert_eq!(demand.pod_count, 6);
    }

    #[test]
    fn test_profile_spec_to_profile() {
        let spec = ProfileSpec {
            name: "edxapp-web".to_string(),
            cpu: "750m".to_string(),
            memory: "1.5Gi".to_string(),
            count: 6,
        };
        let profile = spec.to_profile().unwrap();
        assert_eq!(profile.cpu_millicores, 750);
        assert_eq!(profile.memory_bytes, 1536 * MIB);
        assert_eq!(profile.pod_count, 6);
        assert_eq!(profile.workloads, vec!["edxapp-web"]);
    }

    #[test]
    fn test_profile_spec_validation() {
        use garde::Validate;

        let spec = ProfileSpec {
            name: String::new(),
            cpu: "500m".to_string(),
            memory: "1Gi".to_string(),
            count: 0,
        };
        assert!(spec.validate().is_err());
    }
}
