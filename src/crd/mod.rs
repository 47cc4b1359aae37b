//! Custom Resource Definitions for the hub operator
//!
//! This module contains all CRD definitions used by the hub operator.

mod hub;
mod internal_component;
mod types;

pub use hub::{MultiClusterHub, MultiClusterHubSpec, MultiClusterHubStatus};
pub use internal_component::{InternalHubComponent, InternalHubComponentSpec};
pub use types::{
    AvailabilityType, ComponentConfig, ComponentStatuses, ConditionStatus, ConfigOverride,
    ContainerConfig, DeploymentConfig, DeploymentMode, EnvConfig, HubCondition, HubPhase,
    IngressSpec, Overrides, StatusCondition, Toleration,
};
