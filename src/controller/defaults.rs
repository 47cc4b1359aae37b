//! Registry-driven defaulting of the hub spec
//!
//! Defaulting mutates the in-memory hub and reports whether anything changed.
//! The caller writes the hub back and requeues when it did; an unchanged hub
//! passes straight through.

use kube::ResourceExt;
use tracing::{info, warn};

use super::Context;
use crate::components::{valid_component, Registry, PREVIEW_MIGRATIONS, RETIRED};
use crate::crd::{AvailabilityType, MultiClusterHub};
use crate::{ANNOTATION_PAUSE_LEGACY, DEPRECATED_ANNOTATIONS};

/// Apply standalone defaults; returns whether the hub changed
pub fn apply_defaults(hub: &mut MultiClusterHub, registry: &Registry) -> bool {
    let mut changed = false;

    for name in registry.default_enabled() {
        if !hub.component_present(name) {
            hub.enable(name);
            changed = true;
        }
    }
    for name in registry.default_disabled() {
        if !hub.component_present(name) {
            hub.disable(name);
            changed = true;
        }
    }

    if !hub.is_deleting() && hub.add_finalizer() {
        changed = true;
    }

    if hub.dedup_components() {
        changed = true;
    }

    for name in RETIRED {
        if hub.prune(name) {
            info!(component = name, "pruning retired component");
            changed = true;
        }
    }

    for (preview, ga) in PREVIEW_MIGRATIONS {
        if hub.enabled(preview) {
            info!(from = preview, to = ga, "migrating preview component");
            hub.enable(ga);
            hub.prune(preview);
            changed = true;
        }
    }

    let invalid: Vec<String> = hub
        .component_configs()
        .iter()
        .filter(|c| !valid_component(&c.name))
        .map(|c| c.name.clone())
        .collect();
    for name in invalid {
        if hub.prune(&name) {
            info!(component = %name, "removing invalid component");
            changed = true;
        }
    }

    changed |= default_availability(hub);
    changed
}

/// Apply the smaller hosted-mode default set; returns whether the hub changed
pub fn apply_hosted_defaults(hub: &mut MultiClusterHub) -> bool {
    let mut changed = false;
    if !hub.is_deleting() && hub.add_finalizer() {
        changed = true;
    }
    changed |= default_availability(hub);
    changed
}

fn default_availability(hub: &mut MultiClusterHub) -> bool {
    if hub.availability().is_some() {
        return false;
    }
    if !hub.spec.availability_config.is_empty() {
        warn!(
            value = %hub.spec.availability_config,
            "invalid availabilityConfig, using High"
        );
    }
    hub.spec.availability_config = AvailabilityType::High.to_string();
    true
}

/// Deprecated spec fields and annotations in use on `hub`
pub fn deprecated_fields(hub: &MultiClusterHub) -> Vec<&'static str> {
    let spec = &hub.spec;
    let annotations = hub.annotations();
    let mut out = Vec::new();
    if spec.hive.is_some() {
        out.push("hive");
    }
    if spec.ingress.is_some() {
        out.push("ingress");
    }
    if !spec.custom_ca_configmap.is_empty() {
        out.push("customCAConfigmap");
    }
    if spec.enable_cluster_backup {
        out.push("enableClusterBackup");
    }
    if spec.enable_cluster_proxy_addon {
        out.push("enableClusterProxyAddon");
    }
    if spec.separate_certificate_management {
        out.push("separateCertificateManagement");
    }
    for key in DEPRECATED_ANNOTATIONS
        .iter()
        .chain(std::iter::once(&ANNOTATION_PAUSE_LEGACY))
    {
        if annotations.get(*key).is_some_and(|v| !v.is_empty()) {
            out.push(*key);
        }
    }
    out
}

/// Warn once per hub about each deprecated field in use
pub fn log_deprecations(ctx: &Context, hub: &MultiClusterHub) {
    let id = format!("{}/{}", hub.namespace().unwrap_or_default(), hub.name_any());
    for field in deprecated_fields(hub) {
        if ctx.state.first_deprecation(&id, field) {
            warn!(hub = %id, field, "deprecated field in use");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{
        CLUSTER_BACKUP, FINE_GRAINED_RBAC, FINE_GRAINED_RBAC_PREVIEW, SEARCH, SEARCH_COMMUNITY,
    };
    use crate::config::PackageMode;
    use crate::crd::{ComponentConfig, Overrides};
    use crate::HUB_FINALIZER;

    fn hub() -> MultiClusterHub {
        let mut h = MultiClusterHub::new("multiclusterhub", Default::default());
        h.metadata.namespace = Some("open-cluster-management".to_string());
        h
    }

    fn with_components(components: Vec<ComponentConfig>) -> MultiClusterHub {
        let mut h = hub();
        h.spec.overrides = Some(Overrides {
            components,
            ..Default::default()
        });
        h
    }

    /// Story: a brand new hub gets every registry default written out, a
    /// finalizer, and High availability
    #[test]
    fn story_fresh_hub_is_fully_defaulted() {
        let registry = Registry::new(PackageMode::Commercial);
        let mut h = hub();
        assert!(apply_defaults(&mut h, &registry));

        for name in registry.default_enabled() {
            assert!(h.enabled(name), "{name} should be enabled");
        }
        assert!(h.component_present(CLUSTER_BACKUP));
        assert!(!h.enabled(CLUSTER_BACKUP));
        assert!(h.finalizers().iter().any(|f| f == HUB_FINALIZER));
        assert_eq!(h.spec.availability_config, "High");
    }

    /// Story: defaulting a second time is a no-op so the pass does not loop
    #[test]
    fn story_defaulting_is_idempotent() {
        let registry = Registry::new(PackageMode::Commercial);
        let mut h = hub();
        apply_defaults(&mut h, &registry);
        assert!(!apply_defaults(&mut h, &registry));
    }

    #[test]
    fn explicit_choices_survive() {
        let registry = Registry::new(PackageMode::Commercial);
        let mut h = with_components(vec![ComponentConfig::new(SEARCH, false)]);
        apply_defaults(&mut h, &registry);
        assert!(!h.enabled(SEARCH));
    }

    #[test]
    fn community_mode_enables_community_search() {
        let registry = Registry::new(PackageMode::Community);
        let mut h = hub();
        apply_defaults(&mut h, &registry);
        assert!(h.enabled(SEARCH_COMMUNITY));
        assert!(!h.enabled(SEARCH));
    }

    #[test]
    fn retired_and_unknown_names_are_pruned() {
        let registry = Registry::new(PackageMode::Commercial);
        let mut h = with_components(vec![
            ComponentConfig::new("management-ingress", true),
            ComponentConfig::new("made-up", true),
        ]);
        assert!(apply_defaults(&mut h, &registry));
        assert!(!h.component_present("management-ingress"));
        assert!(!h.component_present("made-up"));
    }

    #[test]
    fn enabled_preview_is_migrated_to_ga_name() {
        let registry = Registry::new(PackageMode::Commercial);
        let mut h = with_components(vec![ComponentConfig::new(FINE_GRAINED_RBAC_PREVIEW, true)]);
        apply_defaults(&mut h, &registry);
        assert!(h.enabled(FINE_GRAINED_RBAC));
        assert!(!h.component_present(FINE_GRAINED_RBAC_PREVIEW));
    }

    #[test]
    fn deleting_hub_gets_no_finalizer() {
        let mut h = hub();
        h.metadata.deletion_timestamp = Some(k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(
            chrono::Utc::now(),
        ));
        h.spec.availability_config = "Basic".to_string();
        assert!(!apply_hosted_defaults(&mut h));
        assert!(h.finalizers().is_empty());
    }

    #[test]
    fn invalid_availability_is_forced_high() {
        let mut h = hub();
        h.metadata.finalizers = Some(vec![HUB_FINALIZER.to_string()]);
        h.spec.availability_config = "Medium".to_string();
        assert!(apply_hosted_defaults(&mut h));
        assert_eq!(h.spec.availability_config, "High");
    }

    #[test]
    fn deprecated_fields_include_legacy_annotations() {
        let mut h = hub();
        h.spec.enable_cluster_backup = true;
        h.annotations_mut()
            .insert(ANNOTATION_PAUSE_LEGACY.to_string(), "true".to_string());
        assert_eq!(deprecated_fields(&h), vec!["enableClusterBackup", "mch-pause"]);
    }
}
