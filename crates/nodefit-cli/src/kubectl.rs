//! Live pod collection via kubectl
//!
//! Runs `kubectl get pods -o json` as a subprocess and returns its stdout.
//! kubectl owns cluster auth and API access; nodefit never speaks to the
//! Kubernetes API directly.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::info;

/// Options for the kubectl invocation
#[derive(Debug, Clone, Default)]
pub struct KubectlOptions {
    /// kubeconfig context (kubectl's current context when unset)
    pub context: Option<String>,
    /// Restrict to one namespace (all namespaces when unset)
    pub namespace: Option<String>,
    /// Timeout for the whole invocation
    pub timeout: Duration,
}

/// Fetch the pod list JSON from the cluster.
///
/// Returns kubectl's stdout. The process is killed if the timeout elapses.
pub async fn fetch_pods(options: &KubectlOptions) -> Result<String> {
    let mut args: Vec<String> = vec!["get".into(), "pods".into()];
    match &options.namespace {
        Some(namespace) => {
            args.push("--namespace".into());
            args.push(namespace.clone());
        }
        None => args.push("--all-namespaces".into()),
    }
    if let Some(context) = &options.context {
        args.push("--context".into());
        args.push(context.clone());
    }
    args.push("--output".into());
    args.push("json".into());

    info!(
        args = ?args,
        timeout_secs = options.timeout.as_secs(),
        "Collecting pods via kubectl"
    );

    let mut command = Command::new("kubectl");
    command
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the future on timeout must not leave kubectl running
        .kill_on_drop(true);

    let output = tokio::time::timeout(options.timeout, command.output())
        .await
        .map_err(|_| {
            anyhow::anyhow!(
                "kubectl timed out after {}s",
                options.timeout.as_secs()
            )
        })?
        .context("Failed to run kubectl (is it on PATH?)")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "kubectl exited with {}: {}",
            output.status,
            stderr.trim().lines().last().unwrap_or("no error output")
        );
    }

    let stdout = String::from_utf8(output.stdout).context("kubectl produced non-UTF-8 output")?;
    info!(bytes = stdout.len(), "Collected pod snapshot");
    Ok(stdout)
}
