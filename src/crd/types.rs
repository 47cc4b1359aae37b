//! Shared types for the hub CRDs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pod replica and anti-affinity posture for hub workloads
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum AvailabilityType {
    /// Single replica per workload
    Basic,
    /// Multiple replicas spread across nodes
    #[default]
    High,
}

impl AvailabilityType {
    /// Parse the stored string form; `None` for anything unrecognised
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Basic" => Some(Self::Basic),
            "High" => Some(Self::High),
            _ => None,
        }
    }

    /// Replica count used by rendered workloads
    pub fn replicas(self) -> u32 {
        match self {
            Self::Basic => 1,
            Self::High => 2,
        }
    }
}

impl std::fmt::Display for AvailabilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic => write!(f, "Basic"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Installation topology, carried on the `deploymentmode` annotation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeploymentMode {
    /// The operator installs every component itself
    #[default]
    Standalone,
    /// Only a delegated engine is managed, targeting another control plane
    Hosted,
}

impl std::fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standalone => write!(f, "Standalone"),
            Self::Hosted => write!(f, "Hosted"),
        }
    }
}

/// Overall hub phase
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HubPhase {
    /// Waiting on components or pruning
    #[default]
    Pending,
    /// Every component is available at the desired version
    Running,
    /// First installation in progress
    Installing,
    /// Upgrade in progress
    Updating,
    /// Upgrade blocked by a condition
    UpdatingBlocked,
    /// Teardown in progress
    Uninstalling,
    /// A managed resource failed to apply
    Error,
    /// Reconciliation paused by annotation
    Paused,
}

impl HubPhase {
    /// Every phase, for metric initialisation
    pub const ALL: [HubPhase; 8] = [
        HubPhase::Pending,
        HubPhase::Running,
        HubPhase::Installing,
        HubPhase::Updating,
        HubPhase::UpdatingBlocked,
        HubPhase::Uninstalling,
        HubPhase::Error,
        HubPhase::Paused,
    ];
}

impl std::fmt::Display for HubPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Installing => "Installing",
            Self::Updating => "Updating",
            Self::UpdatingBlocked => "UpdatingBlocked",
            Self::Uninstalling => "Uninstalling",
            Self::Error => "Error",
            Self::Paused => "Paused",
        };
        write!(f, "{s}")
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl ConditionStatus {
    /// Parse the string form used by other controllers' status documents
    pub fn parse(s: &str) -> Self {
        match s {
            "True" => Self::True,
            "False" => Self::False,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Hub-level condition, unique by type
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HubCondition {
    /// Condition type (e.g. Progressing, Complete, or a failure key)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Last time the condition was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Last time the status changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Normalized per-component status entry
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCondition {
    /// Kind of the observed resource; not persisted
    #[serde(skip)]
    pub kind: String,

    /// Whether the component counts as available; not persisted
    #[serde(skip)]
    pub available: bool,

    /// Condition type taken from the observed resource
    #[serde(rename = "type", default)]
    pub type_: String,

    /// Status of the condition
    #[serde(default)]
    pub status: ConditionStatus,

    /// Last time the condition was written
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Last time the status changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// Machine-readable reason
    #[serde(default)]
    pub reason: String,

    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Pod toleration applied to hub workloads
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    /// Taint key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Exists or Equal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Taint value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Taint effect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    /// Eviction grace for NoExecute taints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toleration_seconds: Option<i64>,
}

/// Deprecated ingress settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    /// TLS cipher suites
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssl_ciphers: Vec<String>,
}

/// Per-component and global overrides
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Overrides {
    /// Pull policy applied to every rendered container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_policy: Option<String>,

    /// Component enablement list
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

/// Enablement and configuration for a single component
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    /// Registry name of the component
    pub name: String,

    /// Whether the component should be installed
    #[serde(default)]
    pub enabled: bool,

    /// Post-render configuration overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_overrides: Option<ConfigOverride>,
}

impl ComponentConfig {
    /// Convenience constructor without config overrides
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            config_overrides: None,
        }
    }
}

/// Overrides spliced into rendered manifests
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOverride {
    /// Deployment-level overrides
    #[serde(default)]
    pub deployments: Vec<DeploymentConfig>,
}

/// Overrides for one rendered Deployment
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfig {
    /// Deployment name
    pub name: String,
    /// Container overrides
    #[serde(default)]
    pub containers: Vec<ContainerConfig>,
}

/// Overrides for one container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    /// Container name
    pub name: String,
    /// Environment variables to set
    #[serde(default)]
    pub env: Vec<EnvConfig>,
}

/// A single environment variable
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct EnvConfig {
    /// Variable name
    pub name: String,
    /// Variable value
    #[serde(default)]
    pub value: String,
}

/// Schema for opaque sub-objects kept for compatibility
pub(crate) fn preserve_unknown_fields(_: &mut SchemaGenerator) -> Schema {
    let mut obj = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    obj.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        serde_json::Value::Bool(true),
    );
    Schema::Object(obj)
}

/// Component name to status map
pub type ComponentStatuses = BTreeMap<String, StatusCondition>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn availability_parse_accepts_only_known_values() {
        assert_eq!(AvailabilityType::parse("High"), Some(AvailabilityType::High));
        assert_eq!(AvailabilityType::parse("Basic"), Some(AvailabilityType::Basic));
        assert_eq!(AvailabilityType::parse("high"), None);
        assert_eq!(AvailabilityType::parse(""), None);
    }

    #[test]
    fn condition_status_parse_defaults_to_unknown() {
        assert_eq!(ConditionStatus::parse("True"), ConditionStatus::True);
        assert_eq!(ConditionStatus::parse("False"), ConditionStatus::False);
        assert_eq!(ConditionStatus::parse("maybe"), ConditionStatus::Unknown);
    }

    #[test]
    fn status_condition_does_not_persist_availability() {
        let sc = StatusCondition {
            kind: "Deployment".to_string(),
            available: true,
            type_: "Available".to_string(),
            status: ConditionStatus::True,
            ..Default::default()
        };
        let json = serde_json::to_value(&sc).expect("serialize");
        assert!(json.get("available").is_none());
        assert!(json.get("kind").is_none());
        assert_eq!(json["type"], "Available");
    }
}
