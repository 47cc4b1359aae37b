//! InternalHubComponent marker resource
//!
//! One marker exists per managed component, in the hub namespace. Its presence,
//! not the presence of rendered manifests, means "this component is managed".

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Marker specification; intentionally empty
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.open-cluster-management.io",
    version = "v1",
    kind = "InternalHubComponent",
    plural = "internalhubcomponents",
    namespaced
)]
pub struct InternalHubComponentSpec {}
