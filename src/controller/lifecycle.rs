//! Per-component install and removal
//!
//! [`ensure_component`] creates the component's marker, renders its chart,
//! splices configured env vars into deployments, stamps the release version
//! and applies every object. [`ensure_no_component`] works in the other
//! direction: the marker goes first and must be confirmed gone before any
//! rendered object is deleted.
//!
//! Hooks declared on a registry entry run around both directions.

use std::collections::BTreeMap;

use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::infra::{ensure_namespace, ensure_pull_secret};
use super::{Context, Flow};
use crate::components::{variant_of, ComponentDescriptor, Hook};
use crate::crd::{ConditionStatus, DeploymentConfig, EnvConfig, HubCondition, MultiClusterHub};
use crate::kinds::{self, ObjectKey};
use crate::render::{chart_values, kind_of, stamp_release, ChartInputs, RenderOutput, RenderRequest};
use crate::status::conditions::{failure_type, reason, PROGRESSING};
use crate::status::fields;
use crate::{Result, RESYNC_PERIOD};

/// Rendered kinds that carry the installer labels so teardown can find them
const LABELLED_KINDS: &[&str] = &[
    "ClusterRole",
    "ClusterRoleBinding",
    "ServiceMonitor",
    "CustomResourceDefinition",
];

/// Name of the search status resource
pub const SEARCH_RESOURCE: &str = "search-v2-operator";

/// Inputs resolved once per pass and shared by every component
#[derive(Clone, Debug, Default)]
pub struct PassInputs {
    /// Resolved image overrides
    pub images: BTreeMap<String, String>,
    /// Resolved template overrides
    pub templates: BTreeMap<String, String>,
    /// STS posture
    pub sts: bool,
}

fn render(ctx: &Context, hub: &MultiClusterHub, chart: &str, inputs: &PassInputs) -> RenderOutput {
    let platform = ctx.state.platform();
    let values = chart_values(&ChartInputs {
        hub,
        config: &ctx.config,
        images: &inputs.images,
        templates: &inputs.templates,
        sts: inputs.sts,
        platform_version: platform.version.as_deref(),
        ingress_domain: platform.ingress_domain.as_deref(),
        api_url: platform.api_url.as_deref(),
    });
    ctx.renderer.render_chart(&RenderRequest {
        chart: ctx.config.templates_path.join(chart),
        values,
    })
}

/// Set env vars on one container of a rendered deployment
///
/// Existing entries are replaced by name, new ones appended. Returns whether
/// the container was found.
pub fn splice_env(deployment: &mut DynamicObject, container: &str, env: &[EnvConfig]) -> bool {
    let Some(containers) = deployment
        .data
        .pointer_mut("/spec/template/spec/containers")
        .and_then(Value::as_array_mut)
    else {
        return false;
    };
    let Some(target) = containers
        .iter_mut()
        .find(|c| c.get("name").and_then(Value::as_str) == Some(container))
    else {
        return false;
    };

    if !target.get("env").is_some_and(Value::is_array) {
        target["env"] = json!([]);
    }
    let Some(vars) = target.get_mut("env").and_then(Value::as_array_mut) else {
        return false;
    };
    for var in env {
        let entry = json!({"name": var.name, "value": var.value});
        match vars
            .iter_mut()
            .find(|v| v.get("name").and_then(Value::as_str) == Some(var.name.as_str()))
        {
            Some(existing) => *existing = entry,
            None => vars.push(entry),
        }
    }
    true
}

fn apply_deployment_overrides(obj: &mut DynamicObject, overrides: &[DeploymentConfig]) {
    if kind_of(obj) != "Deployment" {
        return;
    }
    let name = obj.name_any();
    let Some(config) = overrides.iter().find(|d| d.name == name) else {
        return;
    };
    for container in &config.containers {
        if splice_env(obj, &container.name, &container.env) {
            debug!(deployment = %name, container = %container.name, "applied env overrides");
        } else {
            warn!(deployment = %name, container = %container.name, "container for env override not found");
        }
    }
}

// =============================================================================
// Marker
// =============================================================================

async fn ensure_marker(ctx: &Context, hub: &MultiClusterHub, component: &str) -> Result<()> {
    let ns = hub.namespace().unwrap_or_default();
    let key = ObjectKey::namespaced(ns.clone(), component);
    if ctx
        .client
        .get(kinds::INTERNAL_HUB_COMPONENT, &key)
        .await?
        .is_some()
    {
        return Ok(());
    }
    let mut marker = kinds::INTERNAL_HUB_COMPONENT.object(component, Some(&ns));
    marker.labels_mut().extend(hub.installer_labels());
    marker.data = json!({"spec": {}});
    info!(component, "creating component marker");
    ctx.client
        .apply(kinds::INTERNAL_HUB_COMPONENT, &marker)
        .await
}

/// Delete the marker and confirm it is gone
async fn ensure_no_marker(ctx: &Context, hub: &MultiClusterHub, component: &str) -> Result<Flow> {
    let key = ObjectKey::namespaced(hub.namespace().unwrap_or_default(), component);
    let Some(marker) = ctx.client.get(kinds::INTERNAL_HUB_COMPONENT, &key).await? else {
        return Ok(Flow::Continue);
    };
    if marker.metadata.deletion_timestamp.is_some() {
        info!(component, "component marker deletion in progress");
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }

    info!(component, "deleting component marker");
    ctx.client.delete(kinds::INTERNAL_HUB_COMPONENT, &key).await?;
    if ctx
        .client
        .get(kinds::INTERNAL_HUB_COMPONENT, &key)
        .await?
        .is_some()
    {
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }
    Ok(Flow::Continue)
}

// =============================================================================
// Hooks
// =============================================================================

async fn console_plugins(ctx: &Context) -> Result<Option<Vec<String>>> {
    let Some(console) = ctx
        .client
        .get(kinds::CONSOLE_OPERATOR, &ObjectKey::cluster("cluster"))
        .await?
    else {
        return Ok(None);
    };
    Ok(Some(
        fields::array(&console.data, &["spec", "plugins"])
            .found()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
    ))
}

async fn set_console_plugins(ctx: &Context, plugins: Vec<String>) -> Result<()> {
    ctx.client
        .patch(
            kinds::CONSOLE_OPERATOR,
            &ObjectKey::cluster("cluster"),
            &json!({"spec": {"plugins": plugins}}),
        )
        .await
}

async fn register_plugin(ctx: &Context, plugin: &str) -> Result<()> {
    let Some(mut plugins) = console_plugins(ctx).await? else {
        warn!(plugin, "console config not found, cannot register plugin");
        return Ok(());
    };
    if plugins.iter().any(|p| p == plugin) {
        return Ok(());
    }
    info!(plugin, "registering console plugin");
    plugins.push(plugin.to_string());
    set_console_plugins(ctx, plugins).await
}

async fn deregister_plugin(ctx: &Context, plugin: &str) -> Result<()> {
    let Some(plugins) = console_plugins(ctx).await? else {
        return Ok(());
    };
    if !plugins.iter().any(|p| p == plugin) {
        return Ok(());
    }
    info!(plugin, "removing console plugin");
    set_console_plugins(ctx, plugins.into_iter().filter(|p| p != plugin).collect()).await
}

async fn ensure_search_resource(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    let ns = hub.namespace().unwrap_or_default();
    let key = ObjectKey::namespaced(ns.clone(), SEARCH_RESOURCE);
    if ctx.client.get(kinds::SEARCH, &key).await?.is_some() {
        return Ok(());
    }
    let mut search = kinds::SEARCH.object(SEARCH_RESOURCE, Some(&ns));
    search.labels_mut().extend(hub.installer_labels());
    search.data = json!({"spec": {}});
    info!(search = %key, "creating search resource");
    ctx.client.apply(kinds::SEARCH, &search).await
}

async fn run_hooks_before_install(
    ctx: &Context,
    hub: &MultiClusterHub,
    component: &ComponentDescriptor,
) -> Result<()> {
    for hook in component.hooks.iter().filter(|h| h.runs_before_install()) {
        if let Hook::DedicatedNamespace(ns) = hook {
            ensure_namespace(ctx, hub, ns).await?;
            ensure_pull_secret(ctx, hub, ns).await?;
        }
    }
    Ok(())
}

async fn run_hooks_after_install(
    ctx: &Context,
    hub: &MultiClusterHub,
    component: &ComponentDescriptor,
) -> Result<()> {
    for hook in component.hooks {
        match hook {
            Hook::ConsolePlugin(plugin) => register_plugin(ctx, plugin).await?,
            Hook::SearchStatus => ensure_search_resource(ctx, hub).await?,
            Hook::AddonRegistration(_) | Hook::DedicatedNamespace(_) => {}
        }
    }
    Ok(())
}

async fn run_hooks_before_removal(
    ctx: &Context,
    hub: &MultiClusterHub,
    component: &ComponentDescriptor,
) -> Result<()> {
    for hook in component.hooks {
        match hook {
            Hook::ConsolePlugin(plugin) => deregister_plugin(ctx, plugin).await?,
            Hook::SearchStatus => {
                let key = ObjectKey::namespaced(hub.namespace().unwrap_or_default(), SEARCH_RESOURCE);
                ctx.client.delete(kinds::SEARCH, &key).await?;
            }
            Hook::AddonRegistration(addon) => {
                info!(addon, "removing addon registration");
                ctx.client
                    .delete(kinds::CLUSTER_MANAGEMENT_ADDON, &ObjectKey::cluster(*addon))
                    .await?;
            }
            Hook::DedicatedNamespace(_) => {}
        }
    }
    Ok(())
}

async fn run_hooks_after_removal(ctx: &Context, component: &ComponentDescriptor) -> Result<Flow> {
    for hook in component.hooks {
        let Hook::DedicatedNamespace(ns) = hook else {
            continue;
        };
        let key = ObjectKey::cluster(*ns);
        let Some(existing) = ctx.client.get(kinds::NAMESPACE, &key).await? else {
            continue;
        };
        if existing.metadata.deletion_timestamp.is_none() {
            info!(namespace = ns, "deleting component namespace");
            ctx.client.delete(kinds::NAMESPACE, &key).await?;
        }
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }
    Ok(Flow::Continue)
}

// =============================================================================
// Install / remove
// =============================================================================

/// Install or refresh one component
///
/// Every rendered object is attempted. Each failure is recorded as its own
/// condition and the first error is returned once all objects were tried.
pub async fn ensure_component(
    ctx: &Context,
    hub: &mut MultiClusterHub,
    component: &ComponentDescriptor,
    inputs: &PassInputs,
) -> Result<Flow> {
    let Some(chart) = component.chart else {
        return Ok(Flow::Continue);
    };
    let name = component.name;

    run_hooks_before_install(ctx, hub, component).await?;
    ensure_marker(ctx, hub, name).await?;

    let rendered = render(ctx, hub, chart, inputs);
    if !rendered.is_clean() {
        for e in &rendered.errors {
            error!(component = name, error = %e, "failed to render chart");
        }
        hub.status_mut().set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::False,
            reason::FAILED_RENDERING,
            format!("Failed to render {name}: {}", rendered.errors.join("; ")),
        ));
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }

    let deployment_overrides: Vec<DeploymentConfig> = hub
        .component_configs()
        .iter()
        .find(|c| c.name == name)
        .and_then(|c| c.config_overrides.as_ref())
        .map(|o| o.deployments.clone())
        .unwrap_or_default();
    let labels = hub.installer_labels();
    let version = ctx.config.version.clone();

    let mut first_error = None;
    for mut obj in rendered.objects {
        apply_deployment_overrides(&mut obj, &deployment_overrides);
        if LABELLED_KINDS.contains(&kind_of(&obj)) {
            obj.labels_mut().extend(labels.clone());
        }
        stamp_release(&mut obj, &version);

        let kind = kind_of(&obj).to_string();
        let obj_name = obj.name_any();
        match ctx.applier.apply(&obj).await {
            Ok(outcome) => {
                if outcome.created {
                    info!(component = name, kind = %kind, name = %obj_name, "created resource");
                }
                if outcome.drifted {
                    hub.status_mut().set_condition(HubCondition::new(
                        PROGRESSING,
                        ConditionStatus::True,
                        reason::COMPONENTS_UPDATING,
                        format!("Updating {kind}/{obj_name} to target version ({version})"),
                    ));
                }
            }
            Err(e) => {
                error!(component = name, kind = %kind, name = %obj_name, error = %e, "failed to apply resource");
                hub.status_mut().set_condition(HubCondition::new(
                    failure_type(&obj_name, &kind),
                    ConditionStatus::True,
                    reason::FAILED_APPLYING_COMPONENT,
                    e.to_string(),
                ));
                first_error.get_or_insert(e);
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    run_hooks_after_install(ctx, hub, component).await?;
    Ok(Flow::Continue)
}

/// Remove one component
///
/// Render errors requeue instead of failing; absence is the goal either way.
/// When the component's variant is enabled only the marker is removed, since
/// the variant owns the shared workloads.
pub async fn ensure_no_component(
    ctx: &Context,
    hub: &MultiClusterHub,
    component: &ComponentDescriptor,
    inputs: &PassInputs,
) -> Result<Flow> {
    let Some(chart) = component.chart else {
        return Ok(Flow::Continue);
    };
    let name = component.name;

    let flow = ensure_no_marker(ctx, hub, name).await?;
    if !flow.is_continue() {
        return Ok(flow);
    }

    if let Some(variant) = variant_of(name).filter(|v| hub.enabled(v)) {
        debug!(component = name, variant, "variant enabled, leaving shared resources");
        return Ok(Flow::Continue);
    }

    run_hooks_before_removal(ctx, hub, component).await?;

    let rendered = render(ctx, hub, chart, inputs);
    if !rendered.is_clean() {
        for e in &rendered.errors {
            warn!(component = name, error = %e, "failed to render chart for removal");
        }
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }
    for obj in &rendered.objects {
        ctx.applier.delete(obj).await?;
    }

    run_hooks_after_removal(ctx, component).await
}
