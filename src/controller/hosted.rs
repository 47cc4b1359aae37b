//! Hosted-mode pipeline
//!
//! A hosted hub does not install components locally. It owns one engine
//! resource scoped to a target namespace and the credentials that engine
//! needs to reach the delegated cluster.

use std::time::Duration;

use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::json;
use tracing::info;

use super::defaults::apply_hosted_defaults;
use super::infra::{ensure_namespace, ensure_pull_secret};
use super::{engine, Context, Flow};
use crate::components::ENGINE_KEY;
use crate::crd::{
    ComponentStatuses, ConditionStatus, HubCondition, MultiClusterHub, MultiClusterHubStatus,
};
use crate::kinds::{self, ObjectKey};
use crate::status::aggregate::finish_status;
use crate::status::conditions::{reason, PROGRESSING};
use crate::status::mapping;
use crate::{
    Error, Result, ANNOTATION_DEPLOYMENT_MODE, ANNOTATION_ENGINE_KUBECONFIG,
    ANNOTATION_IMAGE_REPOSITORY, ENGINE_MANAGED_BY_LABEL, HOSTED_TEARDOWN_RETRY, RESYNC_PERIOD,
};

/// Data key holding the delegated kubeconfig
const KUBECONFIG_KEY: &str = "kubeconfig";

/// Namespace the hosted engine installs into
pub fn target_namespace(hub: &MultiClusterHub) -> String {
    format!("{}-engine", hub.namespace().unwrap_or_default())
}

/// Name of the hosted engine resource
pub fn engine_name(hub: &MultiClusterHub) -> String {
    format!("{}-engine", hub.name_any())
}

/// Engine resource for a hosted hub
pub fn hosted_engine(hub: &MultiClusterHub) -> DynamicObject {
    let mut engine = kinds::MULTICLUSTER_ENGINE.object(&engine_name(hub), None);
    engine.labels_mut().extend(hub.installer_labels());
    engine
        .labels_mut()
        .insert(ENGINE_MANAGED_BY_LABEL.to_string(), "true".to_string());

    let annotations = engine.annotations_mut();
    if let Some(repo) = hub
        .annotations()
        .get(ANNOTATION_IMAGE_REPOSITORY)
        .filter(|r| !r.is_empty())
    {
        annotations.insert("imageRepository".to_string(), repo.clone());
    }
    if let Some(secret) = hub.annotations().get(ANNOTATION_ENGINE_KUBECONFIG) {
        annotations.insert(ANNOTATION_ENGINE_KUBECONFIG.to_string(), secret.clone());
    }
    annotations.insert(ANNOTATION_DEPLOYMENT_MODE.to_string(), "Hosted".to_string());

    let mut spec = json!({
        "imagePullSecret": hub.spec.image_pull_secret.clone().unwrap_or_default(),
        "tolerations": engine::tolerations(hub),
        "nodeSelector": hub.spec.node_selector.clone().unwrap_or_default(),
        "availabilityConfig": hub.effective_availability().to_string(),
        "targetNamespace": target_namespace(hub),
    });
    if let Some(policy) = hub
        .spec
        .overrides
        .as_ref()
        .and_then(|o| o.image_pull_policy.as_ref())
    {
        spec["overrides"] = json!({"imagePullPolicy": policy});
    }
    engine.data = json!({ "spec": spec });
    engine
}

fn kubeconfig_missing(hub: &mut MultiClusterHub, message: String) -> Flow {
    info!(message = %message, "hosted kubeconfig unavailable");
    hub.status_mut().set_condition(HubCondition::new(
        PROGRESSING,
        ConditionStatus::False,
        reason::KUBECONFIG_MISSING,
        message,
    ));
    Flow::Requeue(RESYNC_PERIOD)
}

/// Copy the delegated kubeconfig secret into the target namespace
async fn ensure_kubeconfig(ctx: &Context, hub: &mut MultiClusterHub, target: &str) -> Result<Flow> {
    let Some(name) = hub
        .annotations()
        .get(ANNOTATION_ENGINE_KUBECONFIG)
        .filter(|n| !n.is_empty())
        .cloned()
    else {
        return Ok(kubeconfig_missing(
            hub,
            format!("Annotation {ANNOTATION_ENGINE_KUBECONFIG} must name the hosted kubeconfig secret"),
        ));
    };

    let hub_ns = hub.namespace().unwrap_or_default();
    let source = ctx
        .client
        .get(kinds::SECRET, &ObjectKey::namespaced(hub_ns.clone(), name.clone()))
        .await?;
    let Some(kubeconfig) = source
        .as_ref()
        .and_then(|s| s.data.get("data"))
        .and_then(|d| d.get(KUBECONFIG_KEY))
        .cloned()
    else {
        return Ok(kubeconfig_missing(
            hub,
            format!("Secret {hub_ns}/{name} with key {KUBECONFIG_KEY} not found"),
        ));
    };

    let mut copy = kinds::SECRET.object(&name, Some(target));
    copy.labels_mut().extend(hub.installer_labels());
    copy.data = json!({
        "type": "Opaque",
        "data": { KUBECONFIG_KEY: kubeconfig },
    });
    ctx.client.apply(kinds::SECRET, &copy).await?;
    Ok(Flow::Continue)
}

/// Delete the hosted engine, then its namespace, confirming each is gone
async fn teardown(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    let engine = ObjectKey::cluster(engine_name(hub));
    if let Some(existing) = ctx.client.get(kinds::MULTICLUSTER_ENGINE, &engine).await? {
        if existing.metadata.deletion_timestamp.is_none() {
            info!(engine = %engine, "deleting hosted multicluster engine");
            ctx.client.delete(kinds::MULTICLUSTER_ENGINE, &engine).await?;
        }
        return Err(Error::teardown(format!("waiting for engine {engine} to be deleted")));
    }

    let ns = ObjectKey::cluster(target_namespace(hub));
    if ctx.client.get(kinds::NAMESPACE, &ns).await?.is_some() {
        ctx.client.delete(kinds::NAMESPACE, &ns).await?;
        return Err(Error::teardown(format!("waiting for namespace {ns} to be deleted")));
    }
    Ok(())
}

/// Run the hosted pipeline up to status computation
pub async fn reconcile_hosted(ctx: &Context, hub: &mut MultiClusterHub) -> Result<Flow> {
    if hub.is_deleting() {
        if hub.has_finalizer() {
            if let Err(e) = teardown(ctx, hub).await {
                info!(error = %e, "hosted teardown incomplete");
                return Ok(Flow::Requeue(HOSTED_TEARDOWN_RETRY));
            }
            info!("hosted hub finalized, removing finalizer");
            hub.remove_finalizer();
            *hub = ctx.client.update_hub(hub).await?;
        }
        return Ok(Flow::Done);
    }

    if apply_hosted_defaults(hub) {
        info!("setting hosted defaults");
        *hub = ctx.client.update_hub(hub).await?;
        return Ok(Flow::Requeue(Duration::ZERO));
    }

    if hub.is_paused() {
        info!("reconciliation is paused");
        return Ok(Flow::Done);
    }

    let target = target_namespace(hub);
    ensure_namespace(ctx, hub, &target).await?;
    ensure_pull_secret(ctx, hub, &target).await?;

    let flow = ensure_kubeconfig(ctx, hub, &target).await?;
    if !flow.is_continue() {
        return Ok(flow);
    }

    ctx.client
        .apply(kinds::MULTICLUSTER_ENGINE, &hosted_engine(hub))
        .await?;
    Ok(Flow::Continue)
}

/// Status of a hosted hub: only the hosted engine is tracked
pub async fn hosted_status(ctx: &Context, hub: &MultiClusterHub) -> Result<MultiClusterHubStatus> {
    let engine = ctx
        .client
        .get(kinds::MULTICLUSTER_ENGINE, &ObjectKey::cluster(engine_name(hub)))
        .await?;
    let mut components = ComponentStatuses::new();
    components.insert(
        ENGINE_KEY.to_string(),
        engine.as_ref().map(mapping::map_engine).unwrap_or_else(mapping::unknown),
    );
    Ok(finish_status(hub, components, &ctx.config.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::controller::MockHubClient;
    use crate::crd::HubPhase;
    use crate::render::{MockApplier, MockRenderer};
    use crate::HUB_FINALIZER;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn hub() -> MultiClusterHub {
        let mut h = MultiClusterHub::new("hosted-hub", Default::default());
        h.metadata.namespace = Some("clusters".to_string());
        h.metadata.finalizers = Some(vec![HUB_FINALIZER.to_string()]);
        h.spec.availability_config = "High".to_string();
        h.annotations_mut()
            .insert(ANNOTATION_DEPLOYMENT_MODE.to_string(), "Hosted".to_string());
        h
    }

    fn context(client: MockHubClient) -> Context {
        Context::for_testing(
            Arc::new(client),
            Arc::new(MockRenderer::new()),
            Arc::new(MockApplier::new()),
            OperatorConfig::default(),
        )
    }

    #[test]
    fn hosted_engine_targets_hub_scoped_namespace() {
        let mut h = hub();
        h.annotations_mut()
            .insert(ANNOTATION_ENGINE_KUBECONFIG.to_string(), "hosted-kubeconfig".to_string());
        let engine = hosted_engine(&h);
        assert_eq!(engine.name_any(), "hosted-hub-engine");
        assert_eq!(engine.data["spec"]["targetNamespace"], "clusters-engine");
        assert_eq!(engine.annotations().get(ANNOTATION_DEPLOYMENT_MODE).map(String::as_str), Some("Hosted"));
        assert_eq!(
            engine.annotations().get(ANNOTATION_ENGINE_KUBECONFIG).map(String::as_str),
            Some("hosted-kubeconfig")
        );
        assert_eq!(engine.labels().get(ENGINE_MANAGED_BY_LABEL).map(String::as_str), Some("true"));
        assert!(engine.data["spec"].get("overrides").is_none());
    }

    /// Story: without the kubeconfig annotation nothing is installed and the
    /// hub says why
    #[tokio::test]
    async fn story_missing_kubeconfig_annotation_holds_install() {
        let mut client = MockHubClient::new();
        client.expect_get().returning(|_, _| Ok(None));
        client
            .expect_apply()
            .withf(|gvk, _| *gvk == kinds::NAMESPACE)
            .returning(|_, _| Ok(()));
        let ctx = context(client);
        let mut h = hub();

        let flow = reconcile_hosted(&ctx, &mut h).await.expect("pass");
        assert_eq!(flow, Flow::Requeue(RESYNC_PERIOD));
        let cond = h.status.as_ref().and_then(|s| s.condition(PROGRESSING)).expect("cond");
        assert_eq!(cond.reason, reason::KUBECONFIG_MISSING);
    }

    /// Story: with credentials in place the kubeconfig is copied and the
    /// engine applied
    #[tokio::test]
    async fn story_hosted_install_applies_secret_and_engine() {
        let applied = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorder = applied.clone();
        let mut client = MockHubClient::new();
        client.expect_get().returning(|gvk, key| {
            if gvk == kinds::SECRET && key.name == "hosted-kubeconfig" {
                let mut s = gvk.object(&key.name, key.namespace.as_deref());
                s.data = json!({"data": {"kubeconfig": "YXBpVmVyc2lvbjogdjE="}});
                Ok(Some(s))
            } else {
                Ok(None)
            }
        });
        client.expect_apply().returning(move |gvk, obj| {
            recorder.lock().push(format!(
                "{}/{}/{}",
                gvk.kind,
                obj.namespace().unwrap_or_default(),
                obj.name_any()
            ));
            Ok(())
        });
        let ctx = context(client);
        let mut h = hub();
        h.annotations_mut()
            .insert(ANNOTATION_ENGINE_KUBECONFIG.to_string(), "hosted-kubeconfig".to_string());

        let flow = reconcile_hosted(&ctx, &mut h).await.expect("pass");
        assert_eq!(flow, Flow::Continue);
        assert_eq!(
            *applied.lock(),
            vec![
                "Namespace//clusters-engine".to_string(),
                "Secret/clusters-engine/hosted-kubeconfig".to_string(),
                "MultiClusterEngine//hosted-hub-engine".to_string(),
            ]
        );
    }

    /// Story: deletion removes the engine first and retries quickly until it
    /// is gone
    #[tokio::test]
    async fn story_teardown_waits_for_engine() {
        let mut client = MockHubClient::new();
        client.expect_get().returning(|gvk, key| {
            if gvk == kinds::MULTICLUSTER_ENGINE {
                Ok(Some(gvk.object(&key.name, None)))
            } else {
                Ok(None)
            }
        });
        client
            .expect_delete()
            .withf(|gvk, key| *gvk == kinds::MULTICLUSTER_ENGINE && key.name == "hosted-hub-engine")
            .times(1)
            .returning(|_, _| Ok(()));
        client.expect_update_hub().never();
        let ctx = context(client);
        let mut h = hub();
        h.metadata.deletion_timestamp = Some(
            k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now()),
        );

        let flow = reconcile_hosted(&ctx, &mut h).await.expect("pass");
        assert_eq!(flow, Flow::Requeue(HOSTED_TEARDOWN_RETRY));
    }

    #[tokio::test]
    async fn finished_teardown_drops_finalizer() {
        let mut client = MockHubClient::new();
        client.expect_get().returning(|_, _| Ok(None));
        client
            .expect_update_hub()
            .withf(|h| !h.has_finalizer())
            .times(1)
            .returning(|h| Ok(h.clone()));
        let ctx = context(client);
        let mut h = hub();
        h.metadata.deletion_timestamp = Some(
            k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now()),
        );
        assert_eq!(reconcile_hosted(&ctx, &mut h).await.expect("pass"), Flow::Done);
    }

    #[tokio::test]
    async fn invalid_availability_is_written_back() {
        let mut client = MockHubClient::new();
        client
            .expect_update_hub()
            .withf(|h| h.spec.availability_config == "High")
            .times(1)
            .returning(|h| Ok(h.clone()));
        let ctx = context(client);
        let mut h = hub();
        h.spec.availability_config = "Sometimes".to_string();
        assert_eq!(
            reconcile_hosted(&ctx, &mut h).await.expect("pass"),
            Flow::Requeue(Duration::ZERO)
        );
    }

    #[tokio::test]
    async fn status_tracks_only_the_engine() {
        let mut client = MockHubClient::new();
        client.expect_get().returning(|_, _| Ok(None));
        let ctx = context(client);
        let status = hosted_status(&ctx, &hub()).await.expect("status");
        assert_eq!(status.components.len(), 1);
        assert!(status.components.contains_key(ENGINE_KEY));
        assert_eq!(status.phase, HubPhase::Installing);
    }
}
