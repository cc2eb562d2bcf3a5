//! Integration tests for the analyze pipeline
//!
//! Exercises the snapshot -> profiles -> packing -> ranking flow end to end
//! against an embedded kubectl snapshot, without touching a live cluster.

use std::io::Write;

use nodefit_cli::snapshot::parse_snapshot;
use nodefit_common::packing::{pack_first_fit_decreasing, NodeCapacity};
use nodefit_common::profile::{ClusterDemand, ProfileSet, ProfileSpec};
use nodefit_common::scoring::{rank_instances, ScoringConfig};
use nodefit_common::InstanceCatalog;

/// A trimmed-down `kubectl get pods -A -o json` capture: two deployments,
/// a worker, two DaemonSets, a completed job, and a requestless pod.
const SNAPSHOT: &str = r#"{
  "apiVersion": "v1",
  "kind": "List",
  "items": [
    {
      "metadata": {
        "name": "edxapp-web-7f6d5c4b3a-aaaaa",
        "namespace": "edxapp",
        "ownerReferences": [{"kind": "ReplicaSet", "name": "edxapp-web-7f6d5c4b3a"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "750m", "memory": "1Gi"}}}]},
      "status": {"phase": "Running"}
    },
    {
      "metadata": {
        "name": "edxapp-web-7f6d5c4b3a-bbbbb",
        "namespace": "edxapp",
        "ownerReferences": [{"kind": "ReplicaSet", "name": "edxapp-web-7f6d5c4b3a"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "750m", "memory": "1Gi"}}}]},
      "status": {"phase": "Running"}
    },
    {
      "metadata": {
        "name": "learn-api-66b9c8d7f5-ccccc",
        "namespace": "learn",
        "ownerReferences": [{"kind": "ReplicaSet", "name": "learn-api-66b9c8d7f5"}]
      },
      "spec": {
        "containers": [
          {"resources": {"requests": {"cpu": "500m", "memory": "768Mi"}}},
          {"resources": {"requests": {"cpu": "100m", "memory": "128Mi"}}}
        ]
      },
      "status": {"phase": "Running"}
    },
    {
      "metadata": {
        "name": "celery-worker-0",
        "namespace": "learn",
        "ownerReferences": [{"kind": "StatefulSet", "name": "celery-worker"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "1", "memory": "2Gi"}}}]},
      "status": {"phase": "Pending"}
    },
    {
      "metadata": {
        "name": "fluent-bit-11111",
        "namespace": "operations",
        "ownerReferences": [{"kind": "DaemonSet", "name": "fluent-bit"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "100m", "memory": "128Mi"}}}]},
      "status": {"phase": "Running"}
    },
    {
      "metadata": {
        "name": "fluent-bit-22222",
        "namespace": "operations",
        "ownerReferences": [{"kind": "DaemonSet", "name": "fluent-bit"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "100m", "memory": "128Mi"}}}]},
      "status": {"phase": "Running"}
    },
    {
      "metadata": {
        "name": "node-exporter-33333",
        "namespace": "operations",
        "ownerReferences": [{"kind": "DaemonSet", "name": "node-exporter"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "50m", "memory": "64Mi"}}}]},
      "status": {"phase": "Running"}
    },
    {
      "metadata": {
        "name": "nightly-refresh-44444",
        "namespace": "learn",
        "ownerReferences": [{"kind": "Job", "name": "nightly-refresh"}]
      },
      "spec": {"containers": [{"resources": {"requests": {"cpu": "2", "memory": "4Gi"}}}]},
      "status": {"phase": "Succeeded"}
    },
    {
      "metadata": {"name": "debug-shell", "namespace": "operations"},
      "spec": {"containers": [{"resources": {}}]},
      "status": {"phase": "Running"}
    }
  ]
}"#;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * 1024 * 1024;

#[test]
fn test_snapshot_aggregation() {
    let snapshot = parse_snapshot(SNAPSHOT).unwrap();

    assert_eq!(snapshot.pods_seen, 9);
    assert_eq!(snapshot.pods_packed, 4);
    assert_eq!(snapshot.pods_daemonset, 3);
    assert_eq!(snapshot.pods_skipped_phase, 1);
    assert_eq!(snapshot.pods_without_requests, 1);

    // edxapp-web pods merge into one profile; learn-api sums its containers
    assert_eq!(snapshot.profiles.len(), 3);
    let web = snapshot
        .profiles
        .iter()
        .find(|p| p.workloads == vec!["edxapp/edxapp-web"])
        .expect("web profile");
    assert_eq!(web.pod_count, 2);
    assert_eq!(web.cpu_millicores, 750);
    assert_eq!(web.memory_bytes, GIB);

    let api = snapshot
        .profiles
        .iter()
        .find(|p| p.workloads == vec!["learn/learn-api"])
        .expect("api profile");
    assert_eq!(api.cpu_millicores, 600);
    assert_eq!(api.memory_bytes, 896 * MIB);

    // fluent-bit + node-exporter, once per node
    let reservation = snapshot.daemonset_reservation.expect("reservation");
    assert_eq!(reservation.cpu_millicores, 150);
    assert_eq!(reservation.memory_bytes, 192 * MIB);
}

#[test]
fn test_end_to_end_ranking_properties() {
    let snapshot = parse_snapshot(SNAPSHOT).unwrap();
    let config = ScoringConfig {
        reservation: snapshot.daemonset_reservation.unwrap(),
        ..ScoringConfig::default()
    };
    let catalog = InstanceCatalog::builtin();
    let ranking = rank_instances(&catalog, &snapshot.profiles, &config);

    assert!(!ranking.assessments.is_empty());
    assert!(ranking.recommendation().is_some());

    let total_pods = snapshot.profiles.pod_count();
    for assessment in &ranking.assessments {
        // Efficiency bounds
        assert!(
            (0.0..=100.0).contains(&assessment.efficiency_percent),
            "{} efficiency out of bounds",
            assessment.instance.name
        );
        // HA floor
        assert!(assessment.recommended_nodes >= 3);

        // Re-pack this candidate and check pod conservation and capacity
        let capacity =
            NodeCapacity::for_instance(&assessment.instance, config.reservation).unwrap();
        let packing = pack_first_fit_decreasing(&snapshot.profiles, capacity).unwrap();
        let placed: u32 = packing.bins.iter().map(|b| b.pod_count).sum();
        assert_eq!(placed, total_pods);
        for bin in &packing.bins {
            assert!(bin.cpu_used_millicores <= capacity.cpu_millicores);
            assert!(bin.memory_used_bytes <= capacity.memory_bytes);
        }
        assert_eq!(packing.node_count(), assessment.packed_bins);
    }

    // Scores ascend and the ranking is reproducible
    for pair in ranking.assessments.windows(2) {
        assert!(pair[0].score <= pair[1].score);
    }
    let again = rank_instances(&catalog, &snapshot.profiles, &config);
    assert_eq!(ranking, again);
}

#[test]
fn test_demand_matches_snapshot() {
    let snapshot = parse_snapshot(SNAPSHOT).unwrap();
    let demand = ClusterDemand::from_profiles(&snapshot.profiles);

    // 2x750m + 600m + 1000m
    assert_eq!(demand.cpu_millicores, 3100);
    // 2x1Gi + 896Mi + 2Gi
    assert_eq!(demand.memory_bytes, 4 * GIB + 896 * MIB);
    assert_eq!(demand.pod_count, 4);
}

#[test]
fn test_profiles_file_loading() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{"name": "web", "cpu": "500m", "memory": "512Mi", "count": 4}},
            {{"name": "worker", "cpu": "1", "memory": "2Gi", "count": 2}},
            {{"name": "web-canary", "cpu": "500m", "memory": "512Mi", "count": 1}}
        ]"#
    )
    .unwrap();

    let content = std::fs::read_to_string(file.path()).unwrap();
    let specs: Vec<ProfileSpec> = serde_json::from_str(&content).unwrap();

    let mut profiles = ProfileSet::new();
    for spec in &specs {
        profiles.insert(spec.to_profile().unwrap());
    }

    // web and web-canary share a resource tuple and merge
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles.pod_count(), 7);
    let web = profiles.iter().find(|p| p.cpu_millicores == 500).unwrap();
    assert_eq!(web.pod_count, 5);
    assert_eq!(web.workloads, vec!["web", "web-canary"]);
}
