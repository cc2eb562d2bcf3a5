//! Packing efficiency, node counts, and instance ranking
//!
//! Evaluates every candidate instance type with the packing simulation and
//! ranks them using a weighted combination of:
//! - **Waste**: 100 minus packing efficiency
//! - **Cost**: absolute hourly cost at the recommended node count
//! - **Node count**: fewer large nodes preferred over many small ones
//! - **Generation**: newer instance generations preferred

use serde::Serialize;

use crate::catalog::{InstanceCatalog, InstanceType};
use crate::defaults::HOURS_PER_MONTH;
use crate::packing::{pack_first_fit_decreasing, NodeCapacity, NodeReservation, Packing};
use crate::profile::{ClusterDemand, ProfileSet};

/// Packing efficiency of a simulation, in percent.
///
/// Defined as min(average CPU utilization, average memory utilization) across
/// the produced bins: the minimum deliberately surfaces the bottleneck
/// resource. A packing with no bins scores 0.
pub fn packing_efficiency(packing: &Packing) -> f64 {
    if packing.bins.is_empty() {
        return 0.0;
    }
    let cpu = packing.avg_cpu_utilization();
    let memory = packing.avg_memory_utilization();
    (cpu.min(memory) * 100.0).clamp(0.0, 100.0)
}

/// Required node count for the aggregate demand plus headroom.
///
/// Computes the node count needed to cover CPU and memory demand separately,
/// takes the larger of the two, and never recommends fewer than `min_nodes`
/// (the high-availability floor).
pub fn recommend_node_count(
    demand: &ClusterDemand,
    capacity: NodeCapacity,
    headroom_percent: f64,
    min_nodes: u32,
) -> u32 {
    let factor = 1.0 + headroom_percent.max(0.0) / 100.0;

    let cpu_nodes = nodes_for(demand.cpu_millicores as f64 * factor, capacity.cpu_millicores);
    let memory_nodes = nodes_for(demand.memory_bytes as f64 * factor, capacity.memory_bytes);

    cpu_nodes.max(memory_nodes).max(min_nodes)
}

fn nodes_for(demand: f64, per_node: u64) -> u32 {
    if per_node == 0 {
        return 0;
    }
    (demand / per_node as f64).ceil() as u32
}

/// Weights for the ranking score components. Lower score is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringWeights {
    /// Resource waste (100 - packing efficiency)
    pub waste: f64,
    /// Absolute hourly cost, normalized across candidates
    pub cost: f64,
    /// Node count, normalized across candidates (fewer preferred)
    pub node_count: f64,
    /// Instance generation, normalized across candidates (newer preferred)
    pub generation: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            waste: 0.4,
            cost: 0.3,
            node_count: 0.2,
            generation: 0.1,
        }
    }
}

/// Weighted contribution of each component to the final score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub waste: f64,
    pub cost: f64,
    pub node_count: f64,
    pub generation: f64,
}

/// Evaluation of one candidate instance type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceAssessment {
    pub instance: InstanceType,
    /// Packing efficiency in percent, [0, 100]
    pub efficiency_percent: f64,
    /// Bins opened by the packing simulation
    pub packed_bins: u32,
    /// Recommended node count (demand + headroom, HA floor applied)
    pub recommended_nodes: u32,
    /// Hourly cost at the recommended node count
    pub hourly_usd: f64,
    /// Monthly cost at the recommended node count
    pub monthly_usd: f64,
    /// Composite score; lower is better
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

/// Candidate excluded from the ranking, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfeasibleInstance {
    pub name: String,
    pub reason: String,
}

/// Ranked candidates plus the ones that could not hold the workload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    /// Assessments sorted best-first
    pub assessments: Vec<InstanceAssessment>,
    pub infeasible: Vec<InfeasibleInstance>,
}

impl Ranking {
    /// The top-ranked instance type name, if any candidate was feasible
    pub fn recommendation(&self) -> Option<&str> {
        self.assessments.first().map(|a| a.instance.name.as_str())
    }
}

/// Parameters for an instance ranking run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringConfig {
    pub headroom_percent: f64,
    pub min_nodes: u32,
    pub reservation: NodeReservation,
    pub weights: ScoringWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            headroom_percent: crate::defaults::DEFAULT_HEADROOM_PERCENT,
            min_nodes: crate::defaults::DEFAULT_MIN_NODES,
            reservation: NodeReservation::default(),
            weights: ScoringWeights::default(),
        }
    }
}

/// Evaluate and rank every instance type in the catalog.
///
/// Candidates whose allocatable capacity cannot hold the reservation or the
/// largest single pod are reported as infeasible rather than failing the run.
/// Equal scores tie-break on instance name so the ranking is deterministic.
pub fn rank_instances(
    catalog: &InstanceCatalog,
    profiles: &ProfileSet,
    config: &ScoringConfig,
) -> Ranking {
    let demand = ClusterDemand::from_profiles(profiles);

    struct Candidate {
        instance: InstanceType,
        efficiency: f64,
        packed_bins: u32,
        recommended_nodes: u32,
        hourly_usd: f64,
    }

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut infeasible: Vec<InfeasibleInstance> = Vec::new();

    for instance in catalog.instances() {
        let capacity = match NodeCapacity::for_instance(instance, config.reservation) {
            Ok(capacity) => capacity,
            Err(err) => {
                infeasible.push(InfeasibleInstance {
                    name: instance.name.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let packing = match pack_first_fit_decreasing(profiles, capacity) {
            Ok(packing) => packing,
            Err(err) => {
                infeasible.push(InfeasibleInstance {
                    name: instance.name.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let recommended_nodes =
            recommend_node_count(&demand, capacity, config.headroom_percent, config.min_nodes);

        candidates.push(Candidate {
            instance: instance.clone(),
            efficiency: packing_efficiency(&packing),
            packed_bins: packing.node_count(),
            recommended_nodes,
            hourly_usd: instance.hourly_usd * f64::from(recommended_nodes),
        });
    }

    // Min-max normalize cost, node count, and generation across candidates so
    // the weights compare like with like.
    let cost_range = min_max(candidates.iter().map(|c| c.hourly_usd));
    let node_range = min_max(candidates.iter().map(|c| f64::from(c.recommended_nodes)));
    let gen_range = min_max(candidates.iter().map(|c| f64::from(c.instance.generation)));

    let weights = config.weights;
    let mut assessments: Vec<InstanceAssessment> = candidates
        .into_iter()
        .map(|c| {
            let breakdown = ScoreBreakdown {
                waste: weights.waste * (100.0 - c.efficiency) / 100.0,
                cost: weights.cost * normalize(c.hourly_usd, cost_range),
                node_count: weights.node_count
                    * normalize(f64::from(c.recommended_nodes), node_range),
                // Older generations score higher (worse)
                generation: weights.generation
                    * (1.0 - normalize(f64::from(c.instance.generation), gen_range)),
            };
            let score = breakdown.waste + breakdown.cost + breakdown.node_count + breakdown.generation;

            InstanceAssessment {
                hourly_usd: c.hourly_usd,
                monthly_usd: c.hourly_usd * HOURS_PER_MONTH,
                efficiency_percent: c.efficiency,
                packed_bins: c.packed_bins,
                recommended_nodes: c.recommended_nodes,
                instance: c.instance,
                score,
                breakdown,
            }
        })
        .collect();

    assessments.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.instance.name.cmp(&b.instance.name))
    });

    Ranking {
        assessments,
        infeasible,
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for value in values {
        min = min.min(value);
        max = max.max(value);
    }
    (min, max)
}

fn normalize(value: f64, (min, max): (f64, f64)) -> f64 {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return 0.0;
    }
    (value - min) / (max - min)
}
