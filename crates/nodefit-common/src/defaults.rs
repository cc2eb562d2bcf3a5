//! Default configuration values shared between analysis and CLI
//!
//! These constants keep defaults consistent between the library, the CLI
//! flags, and the JSON report.

/// Default headroom percentage added to aggregate demand when sizing nodes
pub const DEFAULT_HEADROOM_PERCENT: f64 = 20.0;

/// Minimum node count for high availability
pub const DEFAULT_MIN_NODES: u32 = 3;

/// Default per-node DaemonSet CPU reservation (millicores) when the snapshot
/// carries no DaemonSet pods and no override is given
pub const DEFAULT_DAEMONSET_CPU_MILLICORES: u64 = 200;

/// Default per-node DaemonSet memory reservation (bytes)
pub const DEFAULT_DAEMONSET_MEMORY_BYTES: u64 = 512 * 1024 * 1024;

/// Default timeout for the kubectl subprocess in seconds
pub const DEFAULT_KUBECTL_TIMEOUT_SECS: u64 = 60;

/// Hours used to convert hourly cost to monthly cost
pub const HOURS_PER_MONTH: f64 = 730.0;
