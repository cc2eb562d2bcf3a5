//! First-fit-decreasing bin packing of pod profiles onto nodes
//!
//! Simulates how many nodes of a given capacity the cluster's pods need.
//! This is a heuristic approximation, not an optimal solver: profiles are
//! placed largest-first into the first node with room, with no backtracking.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::InstanceType;
use crate::defaults::{DEFAULT_DAEMONSET_CPU_MILLICORES, DEFAULT_DAEMONSET_MEMORY_BYTES};
use crate::profile::ProfileSet;

/// Packing simulation errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PackingError {
    /// The per-node reservation consumes the whole node
    #[error(
        "daemonset reservation ({reservation_cpu}m CPU, {reservation_memory} bytes) \
         leaves no allocatable capacity on {instance}"
    )]
    ReservationExceedsCapacity {
        instance: String,
        reservation_cpu: u64,
        reservation_memory: u64,
    },

    /// A single pod is larger than an empty node
    #[error(
        "pod ({cpu_millicores}m CPU, {memory_bytes} bytes) does not fit an empty node \
         ({capacity_cpu}m CPU, {capacity_memory} bytes)"
    )]
    PodTooLarge {
        cpu_millicores: u64,
        memory_bytes: u64,
        capacity_cpu: u64,
        capacity_memory: u64,
    },
}

/// Fixed per-node resource reservation for DaemonSet pods
///
/// DaemonSets are scheduled once per node, so their footprint is subtracted
/// from every node's capacity rather than packed with the workload pods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeReservation {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

impl Default for NodeReservation {
    fn default() -> Self {
        Self {
            cpu_millicores: DEFAULT_DAEMONSET_CPU_MILLICORES,
            memory_bytes: DEFAULT_DAEMONSET_MEMORY_BYTES,
        }
    }
}

impl NodeReservation {
    pub fn new(cpu_millicores: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
        }
    }

    /// A zero reservation (the whole node is allocatable)
    pub fn none() -> Self {
        Self::new(0, 0)
    }
}

/// Allocatable capacity of a single node after the DaemonSet reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapacity {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

impl NodeCapacity {
    pub fn new(cpu_millicores: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
        }
    }

    /// Capacity of one node of the given instance type, minus the reservation
    pub fn for_instance(
        instance: &InstanceType,
        reservation: NodeReservation,
    ) -> Result<Self, PackingError> {
        let cpu = instance.cpu_millicores();
        let memory = instance.memory_bytes;
        if reservation.cpu_millicores >= cpu || reservation.memory_bytes >= memory {
            return Err(PackingError::ReservationExceedsCapacity {
                instance: instance.name.clone(),
                reservation_cpu: reservation.cpu_millicores,
                reservation_memory: reservation.memory_bytes,
            });
        }
        Ok(Self {
            cpu_millicores: cpu - reservation.cpu_millicores,
            memory_bytes: memory - reservation.memory_bytes,
        })
    }
}

/// One simulated node and the pods placed on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bin {
    pub cpu_used_millicores: u64,
    pub memory_used_bytes: u64,
    pub pod_count: u32,
}

impl Bin {
    fn empty() -> Self {
        Self {
            cpu_used_millicores: 0,
            memory_used_bytes: 0,
            pod_count: 0,
        }
    }

    fn fits(&self, capacity: NodeCapacity, cpu: u64, memory: u64) -> bool {
        self.cpu_used_millicores + cpu <= capacity.cpu_millicores
            && self.memory_used_bytes + memory <= capacity.memory_bytes
    }

    fn place(&mut self, cpu: u64, memory: u64) {
        self.cpu_used_millicores += cpu;
        self.memory_used_bytes += memory;
        self.pod_count += 1;
    }

    /// Fraction of node CPU in use, in [0, 1]
    pub fn cpu_utilization(&self, capacity: NodeCapacity) -> f64 {
        if capacity.cpu_millicores == 0 {
            return 0.0;
        }
        self.cpu_used_millicores as f64 / capacity.cpu_millicores as f64
    }

    /// Fraction of node memory in use, in [0, 1]
    pub fn memory_utilization(&self, capacity: NodeCapacity) -> f64 {
        if capacity.memory_bytes == 0 {
            return 0.0;
        }
        self.memory_used_bytes as f64 / capacity.memory_bytes as f64
    }
}

/// Result of a packing simulation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Packing {
    pub capacity: NodeCapacity,
    pub bins: Vec<Bin>,
    pub pods_placed: u32,
}

impl Packing {
    /// Number of nodes the simulation opened
    pub fn node_count(&self) -> u32 {
        self.bins.len() as u32
    }

    /// Per-bin CPU utilization fractions, in bin creation order
    pub fn cpu_utilizations(&self) -> Vec<f64> {
        self.bins
            .iter()
            .map(|b| b.cpu_utilization(self.capacity))
            .collect()
    }

    /// Per-bin memory utilization fractions, in bin creation order
    pub fn memory_utilizations(&self) -> Vec<f64> {
        self.bins
            .iter()
            .map(|b| b.memory_utilization(self.capacity))
            .collect()
    }

    /// Average CPU utilization across bins, in [0, 1]
    pub fn avg_cpu_utilization(&self) -> f64 {
        average(&self.cpu_utilizations())
    }

    /// Average memory utilization across bins, in [0, 1]
    pub fn avg_memory_utilization(&self) -> f64 {
        average(&self.memory_utilizations())
    }
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Pack a profile set onto nodes of the given capacity, first-fit-decreasing.
///
/// Profiles are taken in descending (total_cpu, total_memory) order and each
/// profile's pods are placed one at a time: existing bins are scanned in
/// creation order for the first with room for the pod's CPU *and* memory,
/// and a new bin is opened when none fits.
pub fn pack_first_fit_decreasing(
    profiles: &ProfileSet,
    capacity: NodeCapacity,
) -> Result<Packing, PackingError> {
    let mut bins: Vec<Bin> = Vec::new();
    let mut pods_placed: u32 = 0;

    for profile in profiles.sorted_decreasing() {
        let (cpu, memory) = (profile.cpu_millicores, profile.memory_bytes);
        if cpu > capacity.cpu_millicores || memory > capacity.memory_bytes {
            return Err(PackingError::PodTooLarge {
                cpu_millicores: cpu,
                memory_bytes: memory,
                capacity_cpu: capacity.cpu_millicores,
                capacity_memory: capacity.memory_bytes,
            });
        }

        for _ in 0..profile.pod_count {
            match bins.iter_mut().find(|b| b.fits(capacity, cpu, memory)) {
                Some(bin) => bin.place(cpu, memory),
                None => {
                    let mut bin = Bin::empty();
                    bin.place(cpu, memory);
                    bins.push(bin);
                }
            }
            pods_placed += 1;
        }
    }

    Ok(Packing {
        capacity,
        bins,
        pods_placed,
    })
}
