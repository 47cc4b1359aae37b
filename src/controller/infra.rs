//! Cluster prerequisites ensured before components are installed

use kube::api::DynamicObject;
use kube::{Resource, ResourceExt};
use serde_json::json;
use tracing::{error, info};

use super::engine::version_at_least;
use super::{Context, Flow};
use crate::crd::{ConditionStatus, HubCondition, MultiClusterHub};
use crate::kinds::{self, ObjectKey};
use crate::render::kind_of;
use crate::status::conditions::{reason, PROGRESSING};
use crate::status::fields;
use crate::{Error, Result, ANNOTATION_IGNORE_OCP_VERSION, RESYNC_PERIOD};

/// Namespace label that lets platform monitoring scrape the hub namespace
pub const CLUSTER_MONITORING_LABEL: &str = "openshift.io/cluster-monitoring";
/// Label asking the platform to inject the trusted CA bundle
pub const INJECT_CA_BUNDLE_LABEL: &str = "config.openshift.io/inject-trusted-cabundle";
/// Name of the operator metrics Service and ServiceMonitor
pub const METRICS_SERVICE: &str = "multiclusterhub-operator-metrics";
/// Port the operator serves metrics on
pub const METRICS_PORT: u16 = 8383;
/// Oldest supported host platform
pub const MIN_PLATFORM_VERSION: &str = "4.12.0";

const SELECTOR_KEY: &str = "name";
const SELECTOR_VALUE: &str = "multiclusterhub-operator";

fn owned(hub: &MultiClusterHub, mut obj: DynamicObject) -> DynamicObject {
    if let Some(owner) = hub.controller_owner_ref(&()) {
        obj.metadata.owner_references = Some(vec![owner]);
    }
    obj
}

/// Label the hub namespace for platform monitoring
pub async fn ensure_namespace_label(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    let ns = hub.namespace().unwrap_or_default();
    let key = ObjectKey::cluster(ns.clone());
    let namespace = ctx
        .client
        .get(kinds::NAMESPACE, &key)
        .await?
        .ok_or_else(|| Error::internal(format!("namespace {ns} of the hub does not exist")))?;
    if namespace.labels().contains_key(CLUSTER_MONITORING_LABEL) {
        return Ok(());
    }
    info!(namespace = %ns, label = CLUSTER_MONITORING_LABEL, "labelling hub namespace");
    ctx.client
        .patch(
            kinds::NAMESPACE,
            &key,
            &json!({"metadata": {"labels": {CLUSTER_MONITORING_LABEL: "true"}}}),
        )
        .await
}

/// Ensure a namespace owned by the hub exists
pub async fn ensure_namespace(ctx: &Context, hub: &MultiClusterHub, name: &str) -> Result<()> {
    if ctx
        .client
        .get(kinds::NAMESPACE, &ObjectKey::cluster(name))
        .await?
        .is_some()
    {
        return Ok(());
    }
    let mut ns = kinds::NAMESPACE.object(name, None);
    ns.labels_mut().extend(hub.installer_labels());
    info!(namespace = name, "creating namespace");
    ctx.client.apply(kinds::NAMESPACE, &ns).await
}

/// Copy the hub's image pull secret into `namespace`
///
/// A hub without a pull secret, or a target equal to the hub namespace, is a
/// no-op.
pub async fn ensure_pull_secret(ctx: &Context, hub: &MultiClusterHub, namespace: &str) -> Result<()> {
    let Some(name) = hub.spec.image_pull_secret.as_deref().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let hub_ns = hub.namespace().unwrap_or_default();
    if namespace == hub_ns {
        return Ok(());
    }
    let source = ctx
        .client
        .get(kinds::SECRET, &ObjectKey::namespaced(hub_ns.clone(), name))
        .await?
        .ok_or_else(|| Error::internal(format!("pull secret {name} not found in {hub_ns}")))?;

    let mut copy = kinds::SECRET.object(name, Some(namespace));
    copy.labels_mut().extend(hub.installer_labels());
    copy.data = json!({
        "type": source.data.get("type").cloned().unwrap_or_else(|| json!("kubernetes.io/dockerconfigjson")),
        "data": source.data.get("data").cloned().unwrap_or_else(|| json!({})),
    });
    ctx.client.apply(kinds::SECRET, &copy).await
}

/// Apply every CRD shipped with the operator
pub async fn install_crds(ctx: &Context, hub: &mut MultiClusterHub) -> Result<()> {
    let rendered = ctx.renderer.render_crds(&ctx.config.crds_path);
    if !rendered.is_clean() {
        let message = rendered.errors.join("; ");
        error!(error = %message, "failed to render CRDs");
        hub.status_mut().set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::False,
            reason::FAILED_RENDERING_CRD,
            format!("Error installing CRDs: {message}"),
        ));
        return Err(Error::render(message));
    }

    let labels = hub.installer_labels();
    for mut crd in rendered.objects {
        crd.labels_mut().extend(labels.clone());
        if let Err(e) = ctx.applier.apply(&crd).await {
            error!(kind = kind_of(&crd), name = %crd.name_any(), error = %e, "failed to apply CRD");
            hub.status_mut().set_condition(HubCondition::new(
                PROGRESSING,
                ConditionStatus::False,
                reason::PREREQUISITE_FAILED,
                format!("Error installing CRDs: {e}"),
            ));
            return Err(e);
        }
    }
    Ok(())
}

/// Create the trust bundle configmap if it does not exist
pub async fn ensure_trust_bundle(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    let ns = hub.namespace().unwrap_or_default();
    let name = ctx.config.trusted_ca_bundle.as_str();
    let key = ObjectKey::namespaced(ns.clone(), name);
    if ctx.client.get(kinds::CONFIG_MAP, &key).await?.is_some() {
        return Ok(());
    }
    let mut cm = kinds::CONFIG_MAP.object(name, Some(&ns));
    cm.labels_mut()
        .insert(INJECT_CA_BUNDLE_LABEL.to_string(), "true".to_string());
    info!(configmap = %key, "creating trust bundle configmap");
    ctx.client.apply(kinds::CONFIG_MAP, &owned(hub, cm)).await
}

/// Create the operator metrics Service if it does not exist
pub async fn ensure_metrics_service(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    let ns = hub.namespace().unwrap_or_default();
    let key = ObjectKey::namespaced(ns.clone(), METRICS_SERVICE);
    if ctx.client.get(kinds::SERVICE, &key).await?.is_some() {
        return Ok(());
    }
    let mut svc = kinds::SERVICE.object(METRICS_SERVICE, Some(&ns));
    svc.labels_mut()
        .insert(SELECTOR_KEY.to_string(), SELECTOR_VALUE.to_string());
    svc.data = json!({
        "spec": {
            "ports": [{
                "name": "metrics",
                "port": METRICS_PORT,
                "protocol": "TCP",
                "targetPort": METRICS_PORT,
            }],
            "selector": {SELECTOR_KEY: SELECTOR_VALUE},
        }
    });
    info!(service = %key, "creating metrics service");
    ctx.client.apply(kinds::SERVICE, &owned(hub, svc)).await
}

/// Create the operator ServiceMonitor, if the monitoring API is served
pub async fn ensure_service_monitor(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    let ns = hub.namespace().unwrap_or_default();
    let Some(existing) = ctx
        .client
        .list(kinds::SERVICE_MONITOR, Some(ns.clone()), None)
        .await?
    else {
        info!("ServiceMonitor API not available, skipping metrics scrape config");
        return Ok(());
    };
    if existing.iter().any(|m| m.name_any() == METRICS_SERVICE) {
        return Ok(());
    }
    let mut monitor = kinds::SERVICE_MONITOR.object(METRICS_SERVICE, Some(&ns));
    monitor
        .labels_mut()
        .insert(SELECTOR_KEY.to_string(), SELECTOR_VALUE.to_string());
    monitor.data = json!({
        "spec": {
            "endpoints": [{
                "bearerTokenFile": "/var/run/secrets/kubernetes.io/serviceaccount/token",
                "port": "metrics",
            }],
            "namespaceSelector": {"matchNames": [ns]},
            "selector": {"matchLabels": {SELECTOR_KEY: SELECTOR_VALUE}},
        }
    });
    info!(name = METRICS_SERVICE, "creating metrics servicemonitor");
    ctx.client
        .apply(kinds::SERVICE_MONITOR, &owned(hub, monitor))
        .await
}

/// Refresh the cached ingress domain and API server URL
pub async fn discover_platform(ctx: &Context) -> Result<()> {
    let cluster = ObjectKey::cluster("cluster");
    let domain = ctx
        .client
        .get(kinds::INGRESS_CONFIG, &cluster)
        .await?
        .and_then(|i| fields::string(&i.data, &["spec", "domain"]).found().map(str::to_string));
    let api_url = ctx
        .client
        .get(kinds::INFRASTRUCTURE, &cluster)
        .await?
        .and_then(|i| {
            fields::string(&i.data, &["status", "apiServerURL"])
                .found()
                .map(str::to_string)
        });

    let changed = ctx.state.update_platform(|p| {
        p.ingress_domain = domain.clone();
        p.api_url = api_url.clone();
    });
    if changed {
        info!(
            ingress_domain = domain.as_deref().unwrap_or(""),
            api_url = api_url.as_deref().unwrap_or(""),
            "platform endpoints changed"
        );
    }
    Ok(())
}

/// Host platform version: configured, cached, or read from ClusterVersion
pub async fn platform_version(ctx: &Context) -> Result<Option<String>> {
    if let Some(v) = ctx.config.cluster_version.clone() {
        return Ok(Some(v));
    }
    if let Some(v) = ctx.state.platform().version {
        return Ok(Some(v));
    }
    let version = ctx
        .client
        .get(kinds::CLUSTER_VERSION, &ObjectKey::cluster("version"))
        .await?
        .and_then(|cv| {
            fields::array(&cv.data, &["status", "history"])
                .found()
                .and_then(|h| h.first())
                .map(|entry| fields::string_or_empty(entry, &["version"]))
        })
        .filter(|v| !v.is_empty());
    if let Some(v) = &version {
        ctx.state.update_platform(|p| p.version = Some(v.clone()));
    }
    Ok(version)
}

/// True if the platform console capability is enabled
///
/// Platforms that predate capabilities always run the console. A cluster
/// without a ClusterVersion is not the platform at all.
pub async fn console_enabled(ctx: &Context) -> Result<bool> {
    let Some(cv) = ctx
        .client
        .get(kinds::CLUSTER_VERSION, &ObjectKey::cluster("version"))
        .await?
    else {
        return Ok(false);
    };
    Ok(
        match fields::array(&cv.data, &["status", "capabilities", "enabledCapabilities"]).found() {
            Some(enabled) => enabled.iter().any(|c| c.as_str() == Some("Console")),
            None => true,
        },
    )
}

/// Refuse to continue on platforms older than the supported minimum
pub async fn gate_platform_version(ctx: &Context, hub: &mut MultiClusterHub) -> Result<Flow> {
    if hub.annotations().contains_key(ANNOTATION_IGNORE_OCP_VERSION) {
        return Ok(Flow::Continue);
    }
    let Some(version) = platform_version(ctx).await? else {
        return Err(Error::internal("failed to detect the host platform version"));
    };
    if version_at_least(&version, MIN_PLATFORM_VERSION) {
        return Ok(Flow::Continue);
    }
    let message = format!(
        "Platform version requirement not met: {version} is older than {MIN_PLATFORM_VERSION}"
    );
    error!(version = %version, "{message}");
    hub.status_mut().set_condition(HubCondition::new(
        PROGRESSING,
        ConditionStatus::False,
        reason::PLATFORM_UNSUPPORTED,
        message,
    ));
    Ok(Flow::Requeue(RESYNC_PERIOD))
}
