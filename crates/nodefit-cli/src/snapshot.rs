//! Cluster snapshot ingestion
//!
//! Parses the JSON document produced by `kubectl get pods --all-namespaces
//! -o json` into pod resource profiles. Only the fields the analysis needs
//! are deserialized.
//!
//! DaemonSet pods are handled separately from workload pods: a DaemonSet is
//! scheduled once per node, so its per-pod request is reserved on every
//! simulated node instead of being packed.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use nodefit_common::packing::NodeReservation;
use nodefit_common::profile::{PodProfile, ProfileSet};
use nodefit_common::quantity;

/// Aggregated view of a pod snapshot
#[derive(Debug, Clone)]
pub struct ClusterSnapshot {
    /// Workload pod profiles, duplicates merged
    pub profiles: ProfileSet,
    /// Per-node reservation measured from DaemonSet pods
    pub daemonset_reservation: Option<NodeReservation>,
    /// Distinct DaemonSets observed
    pub daemonsets: u32,
    /// Pods in the snapshot
    pub pods_seen: u32,
    /// Pods contributing to the profiles
    pub pods_packed: u32,
    /// Pods owned by DaemonSets
    pub pods_daemonset: u32,
    /// Pods skipped because of their phase (Succeeded/Failed)
    pub pods_skipped_phase: u32,
    /// Running/Pending pods with no resource requests at all
    pub pods_without_requests: u32,
}

// Subset of the Kubernetes PodList schema that the analysis reads.

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
    #[serde(default)]
    spec: PodSpec,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
    #[serde(default)]
    namespace: String,
    #[serde(default, rename = "ownerReferences")]
    owner_references: Vec<OwnerReference>,
}

#[derive(Debug, Deserialize)]
struct OwnerReference {
    kind: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
struct Container {
    #[serde(default)]
    resources: ContainerResources,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerResources {
    #[serde(default)]
    requests: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
}

/// Parse a kubectl pod snapshot into profiles and a DaemonSet reservation
pub fn parse_snapshot(json: &str) -> Result<ClusterSnapshot> {
    let pod_list: PodList =
        serde_json::from_str(json).context("Failed to parse pod snapshot JSON")?;

    let mut profiles = ProfileSet::new();
    // Per-pod request of each DaemonSet, max across its observed pods so the
    // result does not depend on pod iteration order
    let mut daemonset_requests: BTreeMap<(String, String), (u64, u64)> = BTreeMap::new();

    let mut pods_seen = 0u32;
    let mut pods_packed = 0u32;
    let mut pods_daemonset = 0u32;
    let mut pods_skipped_phase = 0u32;
    let mut pods_without_requests = 0u32;

    for pod in &pod_list.items {
        pods_seen += 1;

        let phase = pod.status.phase.as_deref().unwrap_or("Unknown");
        if !matches!(phase, "Running" | "Pending") {
            pods_skipped_phase += 1;
            continue;
        }

        let (cpu, memory) = pod_requests(pod).with_context(|| {
            format!(
                "Invalid resource request on pod {}/{}",
                pod.metadata.namespace, pod.metadata.name
            )
        })?;

        if let Some(owner) = daemonset_owner(pod) {
            pods_daemonset += 1;
            let key = (pod.metadata.namespace.clone(), owner.to_string());
            let entry = daemonset_requests.entry(key).or_insert((0, 0));
            entry.0 = entry.0.max(cpu);
            entry.1 = entry.1.max(memory);
            continue;
        }

        if cpu == 0 && memory == 0 {
            pods_without_requests += 1;
            debug!(
                pod = %format!("{}/{}", pod.metadata.namespace, pod.metadata.name),
                "pod has no resource requests, excluding from packing"
            );
            continue;
        }

        pods_packed += 1;
        profiles.insert(PodProfile::new(cpu, memory, 1).with_workload(workload_label(pod)));
    }

    let daemonsets = daemonset_requests.len() as u32;
    let daemonset_reservation = if daemonset_requests.is_empty() {
        None
    } else {
        let cpu = daemonset_requests.values().map(|(c, _)| c).sum();
        let memory = daemonset_requests.values().map(|(_, m)| m).sum();
        Some(NodeReservation::new(cpu, memory))
    };

    info!(
        pods = pods_seen,
        packed = pods_packed,
        daemonset = pods_daemonset,
        profiles = profiles.len(),
        "Parsed pod snapshot"
    );

    Ok(ClusterSnapshot {
        profiles,
        daemonset_reservation,
        daemonsets,
        pods_seen,
        pods_packed,
        pods_daemonset,
        pods_skipped_phase,
        pods_without_requests,
    })
}

/// Sum of container requests for a pod, in (millicores, bytes)
fn pod_requests(pod: &Pod) -> Result<(u64, u64)> {
    let mut cpu = 0u64;
    let mut memory = 0u64;
    for container in &pod.spec.containers {
        if let Some(request) = container.resources.requests.get("cpu") {
            cpu += quantity::parse_cpu(request)?;
        }
        if let Some(request) = container.resources.requests.get("memory") {
            memory += quantity::parse_memory(request)?;
        }
    }
    Ok((cpu, memory))
}

/// The DaemonSet owner name, if this pod belongs to one
fn daemonset_owner(pod: &Pod) -> Option<&str> {
    pod.metadata
        .owner_references
        .iter()
        .find(|o| o.kind == "DaemonSet")
        .map(|o| o.name.as_str())
}

/// Label for grouping pods in reports: "namespace/workload".
///
/// ReplicaSet owners have their trailing hash segment stripped so the label
/// reads as the Deployment name; other owners are used as-is; bare pods fall
/// back to the pod name.
fn workload_label(pod: &Pod) -> String {
    let owner = pod.metadata.owner_references.first();
    let name = match owner {
        Some(o) if o.kind == "ReplicaSet" => strip_replicaset_hash(&o.name),
        Some(o) => o.name.as_str(),
        None => pod.metadata.name.as_str(),
    };
    format!("{}/{}", pod.metadata.namespace, name)
}

/// A ReplicaSet is named "<deployment>-<hash>"; drop the hash segment
fn strip_replicaset_hash(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((prefix, _)) if !prefix.is_empty() => prefix,
        _ => name,
    }
}
