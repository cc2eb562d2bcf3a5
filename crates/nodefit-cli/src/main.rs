//! nodefit: EC2 node sizing recommendations for Kubernetes clusters
//!
//! This tool ingests pod resource requests, simulates first-fit-decreasing
//! bin packing across candidate EC2 instance types, and recommends baseline
//! node types by a weighted waste/cost/node-count/generation score.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use garde::Validate;
use tracing::{info, warn};

use nodefit_cli::config::{
    AnalyzeConfig, InputOptions, OutputFormat, OutputOptions, PackingOptions, ScoringOptions,
};
use nodefit_cli::kubectl::{self, KubectlOptions};
use nodefit_cli::report;
use nodefit_cli::snapshot::{self, ClusterSnapshot};
use nodefit_common::defaults::{
    DEFAULT_HEADROOM_PERCENT, DEFAULT_KUBECTL_TIMEOUT_SECS, DEFAULT_MIN_NODES,
};
use nodefit_common::packing::{pack_first_fit_decreasing, NodeCapacity, NodeReservation};
use nodefit_common::profile::{ClusterDemand, ProfileSet, ProfileSpec};
use nodefit_common::quantity;
use nodefit_common::scoring::{rank_instances, ScoringConfig, ScoringWeights};
use nodefit_common::InstanceCatalog;

#[derive(Parser, Debug)]
#[command(name = "nodefit")]
#[command(about = "EC2 node sizing recommendations for Kubernetes clusters")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

/// Pod profile input flags shared by analyze and pack
#[derive(clap::Args, Debug)]
struct InputArgs {
    /// Path to a `kubectl get pods -o json` snapshot file
    #[arg(long, value_name = "FILE")]
    snapshot: Option<PathBuf>,

    /// Path to a JSON file of pod profiles
    #[arg(long, value_name = "FILE")]
    profiles: Option<PathBuf>,

    /// Collect pods live via kubectl
    #[arg(long)]
    kubectl: bool,

    /// kubeconfig context for live collection
    #[arg(long, env = "NODEFIT_KUBE_CONTEXT")]
    kube_context: Option<String>,

    /// Restrict live collection to one namespace (default: all namespaces)
    #[arg(short = 'n', long)]
    namespace: Option<String>,

    /// kubectl timeout in seconds
    #[arg(long, default_value_t = DEFAULT_KUBECTL_TIMEOUT_SECS)]
    kubectl_timeout: u64,
}

/// Arguments for the analyze command (extracted to reduce enum size)
#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    input: InputArgs,

    /// Comma-separated candidate instance types (default: whole catalog)
    #[arg(short, long)]
    instances: Option<String>,

    /// Path to a replacement instance catalog (JSON array)
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Per-node DaemonSet CPU reservation override (e.g. "300m")
    #[arg(long)]
    daemonset_cpu: Option<String>,

    /// Per-node DaemonSet memory reservation override (e.g. "768Mi")
    #[arg(long)]
    daemonset_memory: Option<String>,

    /// Headroom percentage added to aggregate demand
    #[arg(long, default_value_t = DEFAULT_HEADROOM_PERCENT)]
    headroom: f64,

    /// Minimum node count (high-availability floor)
    #[arg(long, default_value_t = DEFAULT_MIN_NODES)]
    min_nodes: u32,

    /// Show only the top N candidates
    #[arg(long)]
    top: Option<usize>,

    /// Output format (table, json)
    #[arg(long, default_value = "table")]
    format: String,

    /// Write the full JSON report to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl AnalyzeArgs {
    /// Parse candidate instance types from the comma-separated string
    fn parse_instance_types(&self) -> Vec<String> {
        self.instances
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl TryFrom<AnalyzeArgs> for AnalyzeConfig {
    type Error = anyhow::Error;

    fn try_from(args: AnalyzeArgs) -> Result<Self> {
        let instance_types = args.parse_instance_types();
        let format: OutputFormat = args
            .format
            .parse()
            .map_err(|_| anyhow!("invalid format '{}', expected table or json", args.format))?;
        Ok(Self {
            input: InputOptions {
                snapshot: args.input.snapshot,
                profiles: args.input.profiles,
                kubectl: args.input.kubectl,
                kube_context: args.input.kube_context,
                namespace: args.input.namespace,
                kubectl_timeout: args.input.kubectl_timeout,
            },
            packing: PackingOptions {
                instance_types,
                catalog: args.catalog,
                daemonset_cpu: args.daemonset_cpu,
                daemonset_memory: args.daemonset_memory,
            },
            scoring: ScoringOptions {
                headroom_percent: args.headroom,
                min_nodes: args.min_nodes,
                weights: ScoringWeights::default(),
            },
            output: OutputOptions {
                format,
                top: args.top,
                output: args.output,
            },
        })
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze pod demand and rank candidate node types
    Analyze(Box<AnalyzeArgs>),

    /// Show per-node packing detail for one instance type
    Pack {
        /// Instance type to simulate (e.g. "m6i.2xlarge")
        #[arg(short, long)]
        instance: String,

        #[command(flatten)]
        input: InputArgs,

        /// Path to a replacement instance catalog (JSON array)
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Per-node DaemonSet CPU reservation override (e.g. "300m")
        #[arg(long)]
        daemonset_cpu: Option<String>,

        /// Per-node DaemonSet memory reservation override (e.g. "768Mi")
        #[arg(long)]
        daemonset_memory: Option<String>,
    },

    /// Print the active instance catalog
    Catalog {
        /// Path to a replacement instance catalog (JSON array)
        #[arg(long, value_name = "FILE")]
        catalog: Option<PathBuf>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&e);
        std::process::exit(1);
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Analyze(analyze_args) => {
            let config: AnalyzeConfig = (*analyze_args).try_into()?;
            handle_analyze(config).await
        }
        Command::Pack {
            instance,
            input,
            catalog,
            daemonset_cpu,
            daemonset_memory,
        } => handle_pack(instance, input, catalog, daemonset_cpu, daemonset_memory).await,
        Command::Catalog { catalog, format } => handle_catalog(catalog, format),
    }
}

/// Handle the analyze command
async fn handle_analyze(config: AnalyzeConfig) -> Result<()> {
    let catalog = load_catalog(config.packing.catalog.as_deref(), &config.packing.instance_types)?;
    let (profiles, snapshot) = load_profiles(&config.input).await?;

    if profiles.is_empty() {
        bail!("no pod profiles found in input");
    }
    if let Some(s) = &snapshot {
        if s.pods_without_requests > 0 {
            warn!(
                pods = s.pods_without_requests,
                "pods without resource requests are excluded from packing"
            );
        }
    }

    let (reservation, reservation_source) = resolve_reservation(
        config.packing.daemonset_cpu.as_deref(),
        config.packing.daemonset_memory.as_deref(),
        snapshot.as_ref(),
    )?;

    let scoring = ScoringConfig {
        headroom_percent: config.scoring.headroom_percent,
        min_nodes: config.scoring.min_nodes,
        reservation,
        weights: config.scoring.weights,
    };

    info!(
        candidates = catalog.len(),
        profiles = profiles.len(),
        pods = profiles.pod_count(),
        headroom = scoring.headroom_percent,
        "Ranking instance types"
    );

    let demand = ClusterDemand::from_profiles(&profiles);
    let ranking = rank_instances(&catalog, &profiles, &scoring);

    // One document feeds both JSON stdout and the report file, so run id and
    // timestamp agree between the two
    let document = (config.output.format == OutputFormat::Json || config.output.output.is_some())
        .then(|| report::build_report(&ranking, &demand, &scoring, snapshot.as_ref()));

    match config.output.format {
        OutputFormat::Table => {
            if let Some(s) = &snapshot {
                report::print_snapshot_summary(s, reservation, reservation_source);
            }
            report::print_ranking_table(&ranking, &demand, config.output.top);
        }
        OutputFormat::Json => {
            let document = document.as_ref().expect("built for json format");
            println!("{}", serde_json::to_string_pretty(document)?);
        }
    }

    if let Some(path) = &config.output.output {
        let document = document.as_ref().expect("built when output path is set");
        report::write_report(path, document)?;
    }

    Ok(())
}

/// Handle the pack command
async fn handle_pack(
    instance_name: String,
    input: InputArgs,
    catalog_path: Option<PathBuf>,
    daemonset_cpu: Option<String>,
    daemonset_memory: Option<String>,
) -> Result<()> {
    let catalog = load_catalog(catalog_path.as_deref(), &[])?;
    let instance = catalog
        .get(&instance_name)
        .ok_or_else(|| anyhow!("unknown instance type '{}'", instance_name))?;

    let input = InputOptions {
        snapshot: input.snapshot,
        profiles: input.profiles,
        kubectl: input.kubectl,
        kube_context: input.kube_context,
        namespace: input.namespace,
        kubectl_timeout: input.kubectl_timeout,
    };
    let (profiles, snapshot) = load_profiles(&input).await?;
    if profiles.is_empty() {
        bail!("no pod profiles found in input");
    }

    let (reservation, _) = resolve_reservation(
        daemonset_cpu.as_deref(),
        daemonset_memory.as_deref(),
        snapshot.as_ref(),
    )?;

    let capacity = NodeCapacity::for_instance(instance, reservation)?;
    let packing = pack_first_fit_decreasing(&profiles, capacity)?;

    report::print_packing_detail(instance, capacity, &packing);
    Ok(())
}

/// Handle the catalog command
fn handle_catalog(catalog_path: Option<PathBuf>, format: String) -> Result<()> {
    let catalog = load_catalog(catalog_path.as_deref(), &[])?;
    let format: OutputFormat = format
        .parse()
        .map_err(|_| anyhow!("invalid format '{}', expected table or json", format))?;

    match format {
        OutputFormat::Table => report::print_catalog_table(&catalog),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(catalog.instances())?)
        }
    }
    Ok(())
}

/// Load the catalog (file or builtin), subset to the named candidates
fn load_catalog(path: Option<&std::path::Path>, names: &[String]) -> Result<InstanceCatalog> {
    let catalog = match path {
        Some(path) => InstanceCatalog::from_json_file(path)?,
        None => InstanceCatalog::builtin(),
    };
    if names.is_empty() {
        Ok(catalog)
    } else {
        Ok(catalog.retain_named(names)?)
    }
}

/// Load pod profiles from exactly one of the configured sources
async fn load_profiles(input: &InputOptions) -> Result<(ProfileSet, Option<ClusterSnapshot>)> {
    let sources =
        usize::from(input.snapshot.is_some()) + usize::from(input.profiles.is_some()) + usize::from(input.kubectl);
    if sources != 1 {
        bail!("exactly one of --snapshot, --profiles, or --kubectl is required");
    }

    if let Some(path) = &input.snapshot {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file: {}", path.display()))?;
        let snapshot = snapshot::parse_snapshot(&content)?;
        return Ok((snapshot.profiles.clone(), Some(snapshot)));
    }

    if let Some(path) = &input.profiles {
        return Ok((load_profile_specs(path)?, None));
    }

    let options = KubectlOptions {
        context: input.kube_context.clone(),
        namespace: input.namespace.clone(),
        timeout: Duration::from_secs(input.kubectl_timeout),
    };
    let json = kubectl::fetch_pods(&options).await?;
    let snapshot = snapshot::parse_snapshot(&json)?;
    Ok((snapshot.profiles.clone(), Some(snapshot)))
}

/// Load and validate a profiles JSON file
fn load_profile_specs(path: &std::path::Path) -> Result<ProfileSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read profiles file: {}", path.display()))?;
    let specs: Vec<ProfileSpec> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse profiles file: {}", path.display()))?;

    let mut profiles = ProfileSet::new();
    for spec in &specs {
        spec.validate()
            .map_err(|e| anyhow!("invalid profile '{}': {e}", spec.name))?;
        let profile = spec
            .to_profile()
            .with_context(|| format!("invalid quantity in profile '{}'", spec.name))?;
        profiles.insert(profile);
    }
    Ok(profiles)
}

/// Resolve the effective per-node reservation.
///
/// CLI overrides win over the snapshot measurement; the compiled-in default
/// applies when neither exists.
fn resolve_reservation(
    cpu_override: Option<&str>,
    memory_override: Option<&str>,
    snapshot: Option<&ClusterSnapshot>,
) -> Result<(NodeReservation, &'static str)> {
    let measured = snapshot.and_then(|s| s.daemonset_reservation);
    let base = measured.unwrap_or_default();

    let cpu = match cpu_override {
        Some(quantity) => quantity::parse_cpu(quantity)
            .with_context(|| format!("invalid --daemonset-cpu '{}'", quantity))?,
        None => base.cpu_millicores,
    };
    let memory = match memory_override {
        Some(quantity) => quantity::parse_memory(quantity)
            .with_context(|| format!("invalid --daemonset-memory '{}'", quantity))?,
        None => base.memory_bytes,
    };

    let source = if cpu_override.is_some() || memory_override.is_some() {
        "override"
    } else if measured.is_some() {
        "measured from snapshot"
    } else {
        "default"
    };

    Ok((NodeReservation::new(cpu, memory), source))
}
