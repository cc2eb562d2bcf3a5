//! Report rendering and writing
//!
//! This module handles printing summary tables to stdout and writing the
//! full analysis report to a JSON file.

use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, ContentArrangement, Table};
use tracing::info;

use nodefit_common::packing::{NodeCapacity, NodeReservation, Packing};
use nodefit_common::profile::ClusterDemand;
use nodefit_common::quantity::{format_cpu, format_memory};
use nodefit_common::scoring::ScoringConfig;
use nodefit_common::stats::UtilizationStats;
use nodefit_common::{InstanceCatalog, InstanceType, Ranking};

use crate::snapshot::ClusterSnapshot;

/// Print a summary of what the snapshot contained
pub fn print_snapshot_summary(
    snapshot: &ClusterSnapshot,
    reservation: NodeReservation,
    reservation_source: &str,
) {
    println!("\n=== Cluster Snapshot ===");
    println!("Pods seen:           {}", snapshot.pods_seen);
    println!("Pods packed:         {}", snapshot.pods_packed);
    println!(
        "DaemonSet pods:      {} ({} DaemonSets)",
        snapshot.pods_daemonset, snapshot.daemonsets
    );
    if snapshot.pods_skipped_phase > 0 {
        println!("Skipped (phase):     {}", snapshot.pods_skipped_phase);
    }
    if snapshot.pods_without_requests > 0 {
        println!("Without requests:    {}", snapshot.pods_without_requests);
    }
    println!("Distinct profiles:   {}", snapshot.profiles.len());
    println!(
        "Node reservation:    {} CPU, {} ({})",
        format_cpu(reservation.cpu_millicores),
        format_memory(reservation.memory_bytes),
        reservation_source,
    );
}

/// Print the ranked candidates as a table, best first
pub fn print_ranking_table(ranking: &Ranking, demand: &ClusterDemand, top: Option<usize>) {
    println!("\n=== Node Type Recommendations ===");
    println!(
        "Workload demand: {} CPU, {}, {} pods\n",
        format_cpu(demand.cpu_millicores),
        format_memory(demand.memory_bytes),
        demand.pod_count,
    );

    if ranking.assessments.is_empty() {
        println!("No feasible instance types for this workload.");
    } else {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Rank"),
                Cell::new("Instance"),
                Cell::new("vCPU"),
                Cell::new("Memory"),
                Cell::new("Nodes"),
                Cell::new("Eff (%)"),
                Cell::new("$/hr"),
                Cell::new("$/mo"),
                Cell::new("Score"),
            ]);

        let shown = top.unwrap_or(ranking.assessments.len());
        for (rank, assessment) in ranking.assessments.iter().take(shown).enumerate() {
            table.add_row(vec![
                Cell::new(rank + 1),
                Cell::new(&assessment.instance.name),
                Cell::new(assessment.instance.vcpus),
                Cell::new(format_memory(assessment.instance.memory_bytes)),
                Cell::new(assessment.recommended_nodes),
                Cell::new(format!("{:.1}", assessment.efficiency_percent)),
                Cell::new(format!("{:.2}", assessment.hourly_usd)),
                Cell::new(format!("{:.0}", assessment.monthly_usd)),
                Cell::new(format!("{:.3}", assessment.score)),
            ]);
        }
        println!("{table}");

        if let Some(name) = ranking.recommendation() {
            println!("\nRecommended baseline node type: {name}");
        }
    }

    if !ranking.infeasible.is_empty() {
        println!("\nExcluded candidates:");
        for excluded in &ranking.infeasible {
            println!("  {:<15} {}", excluded.name, excluded.reason);
        }
    }
}

/// Print per-bin packing detail for a single instance type
pub fn print_packing_detail(instance: &InstanceType, capacity: NodeCapacity, packing: &Packing) {
    println!("\n=== Packing Detail: {} ===", instance.name);
    println!(
        "Allocatable per node: {} CPU, {}",
        format_cpu(capacity.cpu_millicores),
        format_memory(capacity.memory_bytes),
    );
    println!("Nodes opened: {}\n", packing.node_count());

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Node"),
            Cell::new("Pods"),
            Cell::new("CPU Used"),
            Cell::new("CPU (%)"),
            Cell::new("Mem Used"),
            Cell::new("Mem (%)"),
        ]);

    for (index, bin) in packing.bins.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(bin.pod_count),
            Cell::new(format_cpu(bin.cpu_used_millicores)),
            Cell::new(format!("{:.1}", bin.cpu_utilization(capacity) * 100.0)),
            Cell::new(format_memory(bin.memory_used_bytes)),
            Cell::new(format!("{:.1}", bin.memory_utilization(capacity) * 100.0)),
        ]);
    }
    println!("{table}");

    let cpu = UtilizationStats::from_utilizations(&packing.cpu_utilizations());
    let memory = UtilizationStats::from_utilizations(&packing.memory_utilizations());
    println!(
        "\nCPU utilization:    min {:.1}%  avg {:.1}%  max {:.1}%",
        cpu.min * 100.0,
        cpu.avg * 100.0,
        cpu.max * 100.0
    );
    println!(
        "Memory utilization: min {:.1}%  avg {:.1}%  max {:.1}%",
        memory.min * 100.0,
        memory.avg * 100.0,
        memory.max * 100.0
    );
}

/// Print the instance catalog as a table
pub fn print_catalog_table(catalog: &InstanceCatalog) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Instance"),
            Cell::new("vCPU"),
            Cell::new("Memory"),
            Cell::new("Gen"),
            Cell::new("$/hr"),
        ]);

    for instance in catalog.instances() {
        table.add_row(vec![
            Cell::new(&instance.name),
            Cell::new(instance.vcpus),
            Cell::new(format_memory(instance.memory_bytes)),
            Cell::new(instance.generation),
            Cell::new(format!("{:.4}", instance.hourly_usd)),
        ]);
    }
    println!("{table}");
}

/// Build the full analysis report document
pub fn build_report(
    ranking: &Ranking,
    demand: &ClusterDemand,
    scoring: &ScoringConfig,
    snapshot: Option<&ClusterSnapshot>,
) -> serde_json::Value {
    let snapshot_summary = snapshot.map(|s| {
        serde_json::json!({
            "pods_seen": s.pods_seen,
            "pods_packed": s.pods_packed,
            "pods_daemonset": s.pods_daemonset,
            "daemonsets": s.daemonsets,
            "pods_skipped_phase": s.pods_skipped_phase,
            "pods_without_requests": s.pods_without_requests,
            "profiles": s.profiles.iter().collect::<Vec<_>>(),
        })
    });

    serde_json::json!({
        "run_id": uuid::Uuid::now_v7().to_string(),
        "written_at": chrono::Utc::now().to_rfc3339(),
        "config": {
            "headroom_percent": scoring.headroom_percent,
            "min_nodes": scoring.min_nodes,
            "reservation": scoring.reservation,
            "weights": scoring.weights,
        },
        "demand": demand,
        "snapshot": snapshot_summary,
        "candidates": ranking.assessments,
        "infeasible": ranking.infeasible,
        "recommendation": ranking.recommendation(),
    })
}

/// Write the report to a file, pretty-printed
pub fn write_report(path: &Path, report: &serde_json::Value) -> Result<()> {
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodefit_common::profile::{PodProfile, ProfileSet};
    use nodefit_common::quantity::MIB;
    use nodefit_common::scoring::rank_instances;

    fn sample_ranking() -> (Ranking, ClusterDemand) {
        let mut profiles = ProfileSet::new();
        profiles.insert(PodProfile::new(500, 512 * MIB, 6).with_workload("apps/web"));
        let demand = ClusterDemand::from_profiles(&profiles);
        let ranking = rank_instances(
            &InstanceCatalog::builtin(),
            &profiles,
            &ScoringConfig::default(),
        );
        (ranking, demand)
    }

    #[test]
    fn test_build_report_shape() {
        let (ranking, demand) = sample_ranking();
        let report = build_report(&ranking, &demand, &ScoringConfig::default(), None);

        assert!(report["run_id"].is_string());
        assert!(report["written_at"].is_string());
        assert_eq!(report["demand"]["pod_count"], 6);
        assert!(report["candidates"].as_array().unwrap().len() > 0);
        assert_eq!(
            report["recommendation"].as_str(),
            ranking.recommendation()
        );
        assert!(report["snapshot"].is_null());
    }

    #[test]
    fn test_write_report() {
        let (ranking, demand) = sample_ranking();
        let report = build_report(&ranking, &demand, &ScoringConfig::default(), None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &report).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["run_id"], report["run_id"]);
    }
}
