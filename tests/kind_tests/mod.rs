//! Cluster-backed stories for the hub operator
//!
//! - `hub_crd`: creating, reading and deleting MultiClusterHub resources
//!   through the API server
//! - `admission`: the validating webhook rejecting hubs it should reject

mod admission;
mod helpers;
mod hub_crd;
