//! nodefit-cli - EC2 node sizing recommendations for Kubernetes clusters
//!
//! This crate provides the `nodefit` binary: it ingests pod resource
//! requests (from a kubectl snapshot, a profiles file, or live kubectl),
//! simulates bin packing across candidate EC2 instance types, and reports
//! ranked node type recommendations.

pub mod config;
pub mod kubectl;
pub mod report;
pub mod snapshot;
