//! MultiClusterHub Custom Resource Definition
//!
//! The MultiClusterHub is the single control object for an installation. Its
//! `overrides.components` list decides which registry components are installed;
//! the deployment mode and pause switch travel as annotations.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    preserve_unknown_fields, AvailabilityType, ComponentConfig, ComponentStatuses,
    DeploymentMode, HubCondition, HubPhase, IngressSpec, Overrides, Toleration,
};
use crate::{
    ANNOTATION_DEPLOYMENT_MODE, ANNOTATION_PAUSE, ANNOTATION_PAUSE_LEGACY, HUB_FINALIZER,
    INSTALLER_NAMESPACE_LABEL, INSTALLER_NAME_LABEL,
};

/// Specification for a MultiClusterHub
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "operator.open-cluster-management.io",
    version = "v1",
    kind = "MultiClusterHub",
    plural = "multiclusterhubs",
    shortname = "mch",
    status = "MultiClusterHubStatus",
    derive = "PartialEq",
    namespaced,
    printcolumn = r#"{"name":"Status","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"CurrentVersion","type":"string","jsonPath":".status.currentVersion"}"#,
    printcolumn = r#"{"name":"DesiredVersion","type":"string","jsonPath":".status.desiredVersion"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterHubSpec {
    /// Pull secret propagated to every namespace the hub owns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,

    /// `Basic` or `High`; anything else is rewritten to `High`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_config: String,

    /// Node selector applied to hub workloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,

    /// Tolerations applied to hub workloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerations: Option<Vec<Toleration>>,

    /// Deprecated embedded hive configuration; immutable once set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub hive: Option<serde_json::Value>,

    /// Deprecated ingress settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress: Option<IngressSpec>,

    /// Component enablement and configuration overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<Overrides>,

    /// Deprecated custom CA configmap
    #[serde(
        rename = "customCAConfigmap",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub custom_ca_configmap: String,

    /// Skip importing the hub as a managed cluster of itself
    #[serde(default)]
    pub disable_hub_self_management: bool,

    /// Skip refreshing cluster image sets
    #[serde(default)]
    pub disable_update_cluster_image_sets: bool,

    /// Deprecated; immutable once set
    #[serde(default)]
    pub separate_certificate_management: bool,

    /// Deprecated; use the cluster-backup component
    #[serde(default)]
    pub enable_cluster_backup: bool,

    /// Deprecated; the proxy addon is managed by the engine
    #[serde(default)]
    pub enable_cluster_proxy_addon: bool,
}

/// Observed state of a MultiClusterHub
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterHubStatus {
    /// Overall phase
    #[serde(default)]
    pub phase: HubPhase,

    /// Last version at which every component was available
    #[serde(default)]
    pub current_version: String,

    /// Version this operator installs
    #[serde(default)]
    pub desired_version: String,

    /// Hub-level conditions, unique by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<HubCondition>,

    /// Per-component status, recomputed on every pass
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub components: ComponentStatuses,
}

impl MultiClusterHub {
    /// True if an override entry exists for `name`
    pub fn component_present(&self, name: &str) -> bool {
        self.component_configs().iter().any(|c| c.name == name)
    }

    /// Whether `name` is enabled; missing entries and a missing list mean disabled
    pub fn enabled(&self, name: &str) -> bool {
        self.component_configs()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.enabled)
            .unwrap_or(false)
    }

    /// Mark `name` enabled, appending an entry if needed
    pub fn enable(&mut self, name: &str) {
        self.set_enabled(name, true);
    }

    /// Mark `name` disabled, appending an entry if needed
    pub fn disable(&mut self, name: &str) {
        self.set_enabled(name, false);
    }

    fn set_enabled(&mut self, name: &str, enabled: bool) {
        let overrides = self.spec.overrides.get_or_insert_with(Overrides::default);
        match overrides.components.iter_mut().find(|c| c.name == name) {
            Some(c) => c.enabled = enabled,
            None => overrides
                .components
                .push(ComponentConfig::new(name, enabled)),
        }
    }

    /// Remove the first entry for `name`; returns whether anything was removed
    pub fn prune(&mut self, name: &str) -> bool {
        let Some(overrides) = self.spec.overrides.as_mut() else {
            return false;
        };
        match overrides.components.iter().position(|c| c.name == name) {
            Some(idx) => {
                overrides.components.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Collapse duplicate entries
    ///
    /// Each name keeps the position of its first entry and the contents of its
    /// last one. Returns whether the list changed.
    pub fn dedup_components(&mut self) -> bool {
        let Some(overrides) = self.spec.overrides.as_mut() else {
            return false;
        };
        let before = overrides.components.len();
        let mut out: Vec<ComponentConfig> = Vec::with_capacity(before);
        for entry in overrides.components.drain(..) {
            match out.iter_mut().find(|c| c.name == entry.name) {
                Some(existing) => *existing = entry,
                None => out.push(entry),
            }
        }
        let changed = out.len() != before;
        overrides.components = out;
        changed
    }

    /// Override entries in stored order
    pub fn component_configs(&self) -> &[ComponentConfig] {
        self.spec
            .overrides
            .as_ref()
            .map(|o| o.components.as_slice())
            .unwrap_or(&[])
    }

    /// Deployment mode from the `deploymentmode` annotation
    pub fn deployment_mode(&self) -> DeploymentMode {
        match self.annotations().get(ANNOTATION_DEPLOYMENT_MODE) {
            Some(v) if v == "Hosted" => DeploymentMode::Hosted,
            _ => DeploymentMode::Standalone,
        }
    }

    /// True when either pause annotation is `true` (case-insensitive)
    pub fn is_paused(&self) -> bool {
        let annotations = self.annotations();
        [ANNOTATION_PAUSE, ANNOTATION_PAUSE_LEGACY]
            .iter()
            .filter_map(|k| annotations.get(*k))
            .any(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Parsed availability, if valid
    pub fn availability(&self) -> Option<AvailabilityType> {
        AvailabilityType::parse(&self.spec.availability_config)
    }

    /// Availability used for rendering, falling back to the default
    pub fn effective_availability(&self) -> AvailabilityType {
        self.availability().unwrap_or_default()
    }

    /// True once the deletion timestamp is set
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// True if the hub finalizer is present
    pub fn has_finalizer(&self) -> bool {
        self.finalizers().iter().any(|f| f == HUB_FINALIZER)
    }

    /// Add the hub finalizer; returns whether it was added
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.finalizers_mut().push(HUB_FINALIZER.to_string());
        true
    }

    /// Remove the hub finalizer; returns whether it was present
    pub fn remove_finalizer(&mut self) -> bool {
        let before = self.finalizers().len();
        self.finalizers_mut().retain(|f| f != HUB_FINALIZER);
        before != self.finalizers().len()
    }

    /// Labels marking resources owned by this hub
    pub fn installer_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (INSTALLER_NAME_LABEL.to_string(), self.name_any()),
            (
                INSTALLER_NAMESPACE_LABEL.to_string(),
                self.namespace().unwrap_or_default(),
            ),
        ])
    }

    /// Label selector string matching [`Self::installer_labels`]
    pub fn installer_selector(&self) -> String {
        format!(
            "{}={},{}={}",
            INSTALLER_NAME_LABEL,
            self.name_any(),
            INSTALLER_NAMESPACE_LABEL,
            self.namespace().unwrap_or_default()
        )
    }

    /// True if `labels` carry this hub's installer labels
    pub fn owns(&self, labels: &BTreeMap<String, String>) -> bool {
        self.installer_labels()
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }

    /// Mutable status, created on first use
    pub fn status_mut(&mut self) -> &mut MultiClusterHubStatus {
        self.status.get_or_insert_with(MultiClusterHubStatus::default)
    }

    /// Current version recorded in status, or empty
    pub fn current_version(&self) -> &str {
        self.status
            .as_ref()
            .map(|s| s.current_version.as_str())
            .unwrap_or("")
    }

    /// Current phase recorded in status
    pub fn phase(&self) -> HubPhase {
        self.status
            .as_ref()
            .map(|s| s.phase.clone())
            .unwrap_or_default()
    }
}
