//! Configuration types for the CLI

use std::path::PathBuf;

use nodefit_common::ScoringWeights;

/// Where pod resource profiles come from
#[derive(Debug, Clone)]
pub struct InputOptions {
    /// Path to a `kubectl get pods -o json` snapshot file
    pub snapshot: Option<PathBuf>,
    /// Path to a JSON file of profile specs
    pub profiles: Option<PathBuf>,
    /// Collect pods live via kubectl
    pub kubectl: bool,
    /// kubeconfig context for live collection
    pub kube_context: Option<String>,
    /// Restrict live collection to one namespace
    pub namespace: Option<String>,
    /// kubectl timeout in seconds
    pub kubectl_timeout: u64,
}

/// Packing inputs: candidate instances and the per-node reservation
#[derive(Debug, Clone)]
pub struct PackingOptions {
    /// Candidate instance types (empty = whole catalog)
    pub instance_types: Vec<String>,
    /// Path to a replacement instance catalog
    pub catalog: Option<PathBuf>,
    /// DaemonSet CPU reservation override (Kubernetes quantity)
    pub daemonset_cpu: Option<String>,
    /// DaemonSet memory reservation override (Kubernetes quantity)
    pub daemonset_memory: Option<String>,
}

/// Node sizing parameters
#[derive(Debug, Clone)]
pub struct ScoringOptions {
    /// Headroom percentage added to aggregate demand
    pub headroom_percent: f64,
    /// Minimum node count (high-availability floor)
    pub min_nodes: u32,
    /// Ranking weights
    pub weights: ScoringWeights,
}

/// Report rendering options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    /// Stdout format (table or json)
    pub format: OutputFormat,
    /// Limit the table to the top N candidates
    pub top: Option<usize>,
    /// Write the full JSON report to this path
    pub output: Option<PathBuf>,
}

/// Configuration for an analyze run
///
/// Composed of focused sub-configs for organization.
#[derive(Debug, Clone)]
pub struct AnalyzeConfig {
    pub input: InputOptions,
    pub packing: PackingOptions,
    pub scoring: ScoringOptions,
    pub output: OutputOptions,
}

/// Stdout output format
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert_eq!("table".parse::<OutputFormat>().unwrap(), OutputFormat::Table);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
