//! Fold observed resources into a hub status
//!
//! [`calculate_status`] is a pure function of the hub, one snapshot of observed
//! resources and a handful of platform flags. The component map is rebuilt from
//! scratch on every call.

use std::collections::HashMap;

use k8s_openapi::api::apps::v1::Deployment;
use kube::api::DynamicObject;
use kube::ResourceExt;
use tracing::info;

use super::conditions::{reason, BLOCKED, COMPLETE, PROGRESSING};
use super::mapping;
use crate::components::{
    Registry, CONSOLE, ENGINE_CSV_KEY, ENGINE_KEY, ENGINE_SUBSCRIPTION_KEY, MULTICLUSTER_ENGINE,
};
use crate::crd::{
    ComponentStatuses, ConditionStatus, HubCondition, HubPhase, MultiClusterHub,
    MultiClusterHubStatus,
};
use crate::ENGINE_MANAGED_BY_LABEL;

/// Resources read once per pass for status computation
#[derive(Clone, Debug, Default)]
pub struct Observed {
    /// Deployments in every namespace the hub tracks
    pub deployments: Vec<Deployment>,
    /// Engine OLM subscription
    pub engine_subscription: Option<DynamicObject>,
    /// Engine ClusterServiceVersion
    pub engine_csv: Option<DynamicObject>,
    /// Engine resource
    pub engine: Option<DynamicObject>,
}

impl Observed {
    /// True if the engine was adopted from an installation this hub did not make
    pub fn engine_is_foreign(&self) -> bool {
        self.engine
            .as_ref()
            .is_some_and(|e| e.labels().get(ENGINE_MANAGED_BY_LABEL).is_some_and(|v| v == "true"))
    }
}

/// Facts about the host platform that change what is expected to exist
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformFlags {
    /// The platform console capability is enabled
    pub ocp_console: bool,
}

impl Default for PlatformFlags {
    fn default() -> Self {
        Self { ocp_console: true }
    }
}

/// Every status key expected for `hub`, initialized to Unknown
pub fn expected_components(
    hub: &MultiClusterHub,
    registry: &Registry,
    flags: PlatformFlags,
) -> ComponentStatuses {
    let mut out = ComponentStatuses::new();
    for component in registry.iter() {
        if !hub.enabled(component.name) {
            continue;
        }
        if component.name == MULTICLUSTER_ENGINE {
            for key in [ENGINE_SUBSCRIPTION_KEY, ENGINE_CSV_KEY, ENGINE_KEY] {
                out.insert(key.to_string(), mapping::unknown());
            }
            continue;
        }
        if component.requires_console && !flags.ocp_console {
            out.insert(CONSOLE.to_string(), mapping::console_unavailable());
            continue;
        }
        for deployment in component.deployments {
            out.insert(deployment.to_string(), mapping::unknown());
        }
    }
    out
}

/// Component map for a standalone hub
pub fn component_statuses(
    hub: &MultiClusterHub,
    observed: &Observed,
    registry: &Registry,
    flags: PlatformFlags,
) -> ComponentStatuses {
    let mut components = expected_components(hub, registry, flags);

    for deployment in &observed.deployments {
        let name = deployment.name_any();
        if let Some(entry) = components.get_mut(&name) {
            *entry = mapping::map_deployment(deployment);
        }
    }

    if components.contains_key(ENGINE_KEY) {
        if observed.engine_is_foreign() {
            components.insert(ENGINE_SUBSCRIPTION_KEY.to_string(), mapping::unmanaged());
            components.insert(ENGINE_CSV_KEY.to_string(), mapping::unmanaged());
        } else {
            if let Some(sub) = &observed.engine_subscription {
                components.insert(ENGINE_SUBSCRIPTION_KEY.to_string(), mapping::map_subscription(sub));
            }
            if let Some(csv) = &observed.engine_csv {
                components.insert(ENGINE_CSV_KEY.to_string(), mapping::map_csv(csv));
            }
        }
        if let Some(engine) = &observed.engine {
            components.insert(ENGINE_KEY.to_string(), mapping::map_engine(engine));
        }
    }
    components
}

/// True if every entry is available
pub fn all_successful(components: &ComponentStatuses) -> bool {
    components.values().all(|c| c.available)
}

/// Recompute a standalone hub's status from one snapshot
pub fn calculate_status(
    hub: &MultiClusterHub,
    observed: &Observed,
    registry: &Registry,
    flags: PlatformFlags,
    desired_version: &str,
) -> MultiClusterHubStatus {
    let components = component_statuses(hub, observed, registry, flags);
    finish_status(hub, components, desired_version)
}

/// Apply version and condition bookkeeping to a freshly built component map
pub fn finish_status(
    hub: &MultiClusterHub,
    components: ComponentStatuses,
    desired_version: &str,
) -> MultiClusterHubStatus {
    let previous = hub.status.clone().unwrap_or_default();
    let components = carry_timestamps(&previous.components, components);
    let mut status = MultiClusterHubStatus {
        phase: previous.phase,
        current_version: previous.current_version,
        desired_version: desired_version.to_string(),
        conditions: previous.conditions,
        components,
    };

    if all_successful(&status.components) {
        status.current_version = desired_version.to_string();
        if !status.is_pruning() {
            status.set_condition(HubCondition::new(
                COMPLETE,
                ConditionStatus::True,
                reason::COMPONENTS_AVAILABLE,
                "All hub components ready.",
            ));
        } else if status.has_condition(COMPLETE) {
            status.set_condition(HubCondition::new(
                COMPLETE,
                ConditionStatus::False,
                reason::OLD_RESOURCE_DELETE_FAILED,
                "Not all components successfully pruned.",
            ));
        }
    } else {
        if !status.has_condition(PROGRESSING) {
            status.set_condition(HubCondition::new(
                PROGRESSING,
                ConditionStatus::True,
                reason::RECONCILING,
                "Hub is reconciling.",
            ));
        }
        if status.has_condition(COMPLETE) {
            status.set_condition(HubCondition::new(
                COMPLETE,
                ConditionStatus::False,
                reason::COMPONENTS_UNAVAILABLE,
                "Not all hub components ready.",
            ));
        }
    }

    status.phase = derive_phase(&status, hub.is_deleting());
    status
}

/// Keep stored timestamps on entries whose content did not change, so an
/// unchanged hub produces an identical status
fn carry_timestamps(
    previous: &ComponentStatuses,
    mut components: ComponentStatuses,
) -> ComponentStatuses {
    for (name, entry) in components.iter_mut() {
        let Some(before) = previous.get(name) else {
            continue;
        };
        if before.type_ == entry.type_
            && before.status == entry.status
            && before.reason == entry.reason
            && before.message == entry.message
        {
            entry.last_update_time = before.last_update_time;
            entry.last_transition_time = before.last_transition_time;
        } else if before.status == entry.status {
            entry.last_transition_time = before.last_transition_time;
        }
    }
    components
}

/// Overall phase, checked in a fixed order
pub fn derive_phase(status: &MultiClusterHubStatus, deleting: bool) -> HubPhase {
    if deleting {
        return HubPhase::Uninstalling;
    }
    if status.has_failure() {
        return HubPhase::Error;
    }
    if status.is_paused() {
        return HubPhase::Paused;
    }
    if status.current_version.is_empty() {
        return HubPhase::Installing;
    }

    if all_successful(&status.components) {
        if status.is_pruning() {
            return HubPhase::Pending;
        }
        return HubPhase::Running;
    }
    if status.current_version != status.desired_version {
        return if status.has_condition(BLOCKED) {
            HubPhase::UpdatingBlocked
        } else {
            HubPhase::Updating
        };
    }
    HubPhase::Pending
}

/// Log components whose availability flipped since the last call
///
/// `previous` holds the last observed availability per status key; keys that
/// disappear from the map are forgotten so they log again when they return.
pub fn log_availability_transitions(
    previous: &mut HashMap<String, bool>,
    components: &ComponentStatuses,
) -> usize {
    let mut logged = 0;
    for (name, status) in components {
        match previous.insert(name.clone(), status.available) {
            Some(before) if before == status.available => {}
            Some(_) | None if status.available => {
                info!(component = %name, "component is available");
                logged += 1;
            }
            Some(_) | None => {
                info!(
                    component = %name,
                    reason = %status.reason,
                    "component is not available"
                );
                logged += 1;
            }
        }
    }
    previous.retain(|name, _| components.contains_key(name));
    logged
}
