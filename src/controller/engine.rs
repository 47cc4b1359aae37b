//! Multicluster engine management
//!
//! In standalone mode the hub depends on a multicluster engine. If one already
//! runs on the cluster and this hub did not create it, it is adopted: labelled
//! as managed, kept in step with the hub spec, and orphaned again on teardown.
//! Otherwise the operator installs it through OLM and creates the engine
//! resource itself.

use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::infra::{ensure_namespace, ensure_pull_secret};
use super::{Context, Flow};
use crate::config::PackageMode;
use crate::crd::{ConditionStatus, HubCondition, MultiClusterHub};
use crate::kinds::{self, ObjectKey};
use crate::status::conditions::{reason, PROGRESSING};
use crate::status::fields;
use crate::{
    Error, Result, ANNOTATION_DEPLOYMENT_MODE, ANNOTATION_ENGINE_SUBSCRIPTION_SPEC,
    ANNOTATION_IMAGE_REPOSITORY,
    ENGINE_MANAGED_BY_LABEL, ENGINE_NAME, ENGINE_NAMESPACE, HUB_FINALIZER, RESYNC_PERIOD,
};

/// Oldest engine version the hub can run against
pub const MIN_ENGINE_VERSION: &str = "2.4.0";

const OPERATOR_GROUP: &str = "default";
const CATALOG_NAMESPACE: &str = "openshift-marketplace";

/// Where the engine operator is installed from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Catalog {
    /// OLM package name, also used as the Subscription name
    pub package: &'static str,
    /// Subscription channel
    pub channel: &'static str,
    /// CatalogSource name
    pub source: &'static str,
}

const COMMERCIAL: Catalog = Catalog {
    package: "multicluster-engine",
    channel: "stable-2.8",
    source: "redhat-operators",
};

const COMMUNITY: Catalog = Catalog {
    package: "stolostron-engine",
    channel: "community-2.8",
    source: "community-operators",
};

/// Subscription names the engine may be installed under
pub const SUBSCRIPTION_NAMES: [&str; 2] = [COMMERCIAL.package, COMMUNITY.package];

/// Catalog entry for a package mode
pub fn catalog(mode: PackageMode) -> Catalog {
    match mode {
        PackageMode::Commercial => COMMERCIAL,
        PackageMode::Community => COMMUNITY,
    }
}

fn version_parts(version: &str) -> Vec<u64> {
    let core = version
        .trim()
        .trim_start_matches('v')
        .split(['-', '+'])
        .next()
        .unwrap_or_default();
    core.split('.')
        .map(|p| p.parse::<u64>().unwrap_or(0))
        .collect()
}

/// True if dotted `version` is at or above `minimum`
///
/// A leading `v` and any pre-release or build suffix are ignored; missing
/// components count as zero. An empty version never satisfies a minimum.
pub fn version_at_least(version: &str, minimum: &str) -> bool {
    if version.trim().is_empty() {
        return false;
    }
    let have = version_parts(version);
    let want = version_parts(minimum);
    let len = have.len().max(want.len());
    for i in 0..len {
        let h = have.get(i).copied().unwrap_or(0);
        let w = want.get(i).copied().unwrap_or(0);
        if h != w {
            return h > w;
        }
    }
    true
}

/// True if the engine carries the adopted-engine label
pub fn is_foreign(engine: &DynamicObject) -> bool {
    engine
        .labels()
        .get(ENGINE_MANAGED_BY_LABEL)
        .is_some_and(|v| v == "true")
}

/// Tolerations for engine workloads; infra nodes are tolerated by default
pub fn tolerations(hub: &MultiClusterHub) -> Value {
    match hub.spec.tolerations.as_ref() {
        Some(t) => serde_json::to_value(t).unwrap_or_else(|_| json!([])),
        None => json!([{
            "key": "node-role.kubernetes.io/infra",
            "operator": "Exists",
            "effect": "NoSchedule",
        }]),
    }
}

/// Subscription fields overridden through the hub annotation
fn subscription_overrides(hub: &MultiClusterHub) -> Result<Map<String, Value>> {
    let Some(raw) = hub
        .annotations()
        .get(ANNOTATION_ENGINE_SUBSCRIPTION_SPEC)
        .filter(|s| !s.is_empty())
    else {
        return Ok(Map::new());
    };
    let parsed: Value = serde_json::from_str(raw).map_err(|e| {
        Error::serialization(format!("engine subscription annotation '{raw}': {e}"))
    })?;
    let Value::Object(map) = parsed else {
        return Err(Error::serialization(format!(
            "engine subscription annotation '{raw}' is not an object"
        )));
    };
    Ok(map
        .into_iter()
        .filter(|(k, v)| {
            matches!(
                k.as_str(),
                "channel"
                    | "name"
                    | "source"
                    | "sourceNamespace"
                    | "startingCSV"
                    | "installPlanApproval"
            ) && v.as_str().is_some_and(|s| !s.is_empty())
        })
        .collect())
}

/// OLM Subscription for the engine operator
pub fn subscription(ctx: &Context, hub: &MultiClusterHub, mode: PackageMode) -> Result<DynamicObject> {
    let catalog = catalog(mode);
    let env: Vec<Value> = ctx
        .config
        .proxy
        .env_pairs()
        .into_iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();

    let mut config = json!({"tolerations": tolerations(hub)});
    if let Some(selector) = &hub.spec.node_selector {
        config["nodeSelector"] = json!(selector);
    }
    if !env.is_empty() {
        config["env"] = Value::Array(env);
    }

    let mut spec = json!({
        "channel": catalog.channel,
        "installPlanApproval": "Automatic",
        "name": catalog.package,
        "source": catalog.source,
        "sourceNamespace": CATALOG_NAMESPACE,
        "config": config,
    });
    let overrides = subscription_overrides(hub)?;
    if !overrides.is_empty() {
        info!(overrides = %serde_json::Value::Object(overrides.clone()), "overriding engine subscription");
    }
    for (k, v) in overrides {
        spec[k.as_str()] = v;
    }

    let mut sub = kinds::OLM_SUBSCRIPTION.object(catalog.package, Some(ENGINE_NAMESPACE));
    sub.labels_mut().extend(hub.installer_labels());
    sub.data = json!({ "spec": spec });
    Ok(sub)
}

/// Engine resource created by this hub
pub fn engine_resource(hub: &MultiClusterHub) -> DynamicObject {
    let mut engine = kinds::MULTICLUSTER_ENGINE.object(ENGINE_NAME, None);
    engine.labels_mut().extend(hub.installer_labels());
    if let Some(repo) = hub
        .annotations()
        .get(ANNOTATION_IMAGE_REPOSITORY)
        .filter(|r| !r.is_empty())
    {
        engine
            .annotations_mut()
            .insert("imageRepository".to_string(), repo.clone());
    }
    engine.data = json!({
        "spec": {
            "availabilityConfig": hub.effective_availability().to_string(),
            "imagePullSecret": hub.spec.image_pull_secret.clone().unwrap_or_default(),
            "nodeSelector": hub.spec.node_selector.clone().unwrap_or_default(),
            "tolerations": tolerations(hub),
        }
    });
    engine
}

/// True if the engine was created for a hosted hub
pub fn is_hosted(engine: &DynamicObject) -> bool {
    engine
        .annotations()
        .get(ANNOTATION_DEPLOYMENT_MODE)
        .is_some_and(|m| m == "Hosted")
}

/// The one standalone engine on the cluster, if any
///
/// Engines belonging to hosted hubs are not counted. More than one remaining
/// engine needs manual resolution and is an error.
pub async fn find_engine(ctx: &Context) -> Result<Option<DynamicObject>> {
    let Some(engines) = ctx.client.list(kinds::MULTICLUSTER_ENGINE, None, None).await? else {
        return Ok(None);
    };
    let mut engines: Vec<DynamicObject> = engines.into_iter().filter(|e| !is_hosted(e)).collect();
    if engines.len() > 1 {
        return Err(Error::validation(
            "multiple multicluster engines found; only one is allowed",
        ));
    }
    Ok(engines.pop())
}

/// Engine subscription under either package name
pub async fn find_subscription(ctx: &Context) -> Result<Option<DynamicObject>> {
    for name in SUBSCRIPTION_NAMES {
        let key = ObjectKey::namespaced(ENGINE_NAMESPACE, name);
        if let Some(sub) = ctx.client.get(kinds::OLM_SUBSCRIPTION, &key).await? {
            return Ok(Some(sub));
        }
    }
    Ok(None)
}

/// CSV installed by a subscription
pub async fn find_csv(ctx: &Context, sub: &DynamicObject) -> Result<Option<DynamicObject>> {
    let Some(csv) = fields::string(&sub.data, &["status", "installedCSV"]).found() else {
        return Ok(None);
    };
    let ns = sub.namespace().unwrap_or_else(|| ENGINE_NAMESPACE.to_string());
    ctx.client
        .get(kinds::CSV, &ObjectKey::namespaced(ns, csv))
        .await
}

/// Label an engine this hub did not create so it is treated as adopted
async fn adopt(ctx: &Context, engine: &DynamicObject) -> Result<()> {
    let mut finalizers = engine.finalizers().to_vec();
    if !finalizers.iter().any(|f| f == HUB_FINALIZER) {
        finalizers.push(HUB_FINALIZER.to_string());
    }
    info!(engine = %engine.name_any(), "adopting preexisting multicluster engine");
    ctx.client
        .patch(
            kinds::MULTICLUSTER_ENGINE,
            &ObjectKey::of(engine),
            &json!({
                "metadata": {
                    "labels": {ENGINE_MANAGED_BY_LABEL: "true"},
                    "finalizers": finalizers,
                }
            }),
        )
        .await
}

/// Keep an adopted engine in step with the hub spec
async fn sync_adopted(ctx: &Context, hub: &MultiClusterHub, engine: &DynamicObject) -> Result<()> {
    debug!(engine = %engine.name_any(), "updating adopted multicluster engine");
    ctx.client
        .patch(
            kinds::MULTICLUSTER_ENGINE,
            &ObjectKey::of(engine),
            &json!({
                "spec": {
                    "availabilityConfig": hub.effective_availability().to_string(),
                    "nodeSelector": hub.spec.node_selector.clone(),
                }
            }),
        )
        .await
}

/// Ensure the engine is installed or adopted
pub async fn ensure(ctx: &Context, hub: &MultiClusterHub, mode: PackageMode) -> Result<Flow> {
    if let Some(existing) = find_engine(ctx).await? {
        if !hub.owns(existing.labels()) {
            if is_foreign(&existing) {
                sync_adopted(ctx, hub, &existing).await?;
                return Ok(Flow::Continue);
            }
            adopt(ctx, &existing).await?;
            return Ok(Flow::Requeue(std::time::Duration::ZERO));
        }
    }

    ensure_namespace(ctx, hub, ENGINE_NAMESPACE).await?;
    ensure_pull_secret(ctx, hub, ENGINE_NAMESPACE).await?;

    let mut group = kinds::OPERATOR_GROUP.object(OPERATOR_GROUP, Some(ENGINE_NAMESPACE));
    group.labels_mut().extend(hub.installer_labels());
    group.data = json!({"spec": {"targetNamespaces": [ENGINE_NAMESPACE]}});
    ctx.client.apply(kinds::OPERATOR_GROUP, &group).await?;

    ctx.client
        .apply(kinds::OLM_SUBSCRIPTION, &subscription(ctx, hub, mode)?)
        .await?;

    match ctx
        .client
        .apply(kinds::MULTICLUSTER_ENGINE, &engine_resource(hub))
        .await
    {
        Ok(()) => Ok(Flow::Continue),
        Err(e) if e.is_not_found() => {
            info!("engine API not served yet, waiting for the engine operator");
            Ok(Flow::Requeue(RESYNC_PERIOD))
        }
        Err(e) => Err(e),
    }
}

/// Hold readiness until the engine reports a supported version
pub fn ready(hub: &mut MultiClusterHub, engine: Option<&DynamicObject>) -> Flow {
    let version = engine
        .map(|e| fields::string_or_empty(&e.data, &["status", "currentVersion"]))
        .unwrap_or_default();
    if version_at_least(&version, MIN_ENGINE_VERSION) {
        return Flow::Continue;
    }
    let message = if version.is_empty() {
        format!("Waiting for MultiClusterEngine to report a version at least {MIN_ENGINE_VERSION}")
    } else {
        format!("MultiClusterEngine version {version} is older than required {MIN_ENGINE_VERSION}")
    };
    info!(version = %version, "multicluster engine not ready");
    hub.status_mut().set_condition(HubCondition::new(
        PROGRESSING,
        ConditionStatus::False,
        reason::ENGINE_NOT_READY,
        message,
    ));
    Flow::Requeue(RESYNC_PERIOD)
}

/// Strip the hub's claim from an adopted engine and leave it running
async fn orphan(ctx: &Context, engine: &DynamicObject) -> Result<()> {
    let finalizers: Vec<String> = engine
        .finalizers()
        .iter()
        .filter(|f| f.as_str() != HUB_FINALIZER)
        .cloned()
        .collect();
    info!(engine = %engine.name_any(), "orphaning adopted multicluster engine");
    ctx.client
        .patch(
            kinds::MULTICLUSTER_ENGINE,
            &ObjectKey::of(engine),
            &json!({
                "metadata": {
                    "labels": {ENGINE_MANAGED_BY_LABEL: null},
                    "finalizers": finalizers,
                }
            }),
        )
        .await
}

/// Remove the engine during hub teardown
///
/// An owned engine is deleted and waited for before its OLM resources and
/// namespace go. An adopted engine is only released.
pub async fn cleanup(ctx: &Context, hub: &MultiClusterHub) -> Result<()> {
    if let Some(engine) = find_engine(ctx).await? {
        if is_foreign(&engine) {
            return orphan(ctx, &engine).await;
        }
        if engine.metadata.deletion_timestamp.is_none() {
            info!(engine = %engine.name_any(), "deleting multicluster engine");
            ctx.client
                .delete(kinds::MULTICLUSTER_ENGINE, &ObjectKey::of(&engine))
                .await?;
        }
        return Err(Error::teardown("waiting for the multicluster engine to be deleted"));
    }

    if let Some(sub) = find_subscription(ctx).await? {
        if let Some(csv) = find_csv(ctx, &sub).await? {
            ctx.client.delete(kinds::CSV, &ObjectKey::of(&csv)).await?;
        }
        ctx.client
            .delete(kinds::OLM_SUBSCRIPTION, &ObjectKey::of(&sub))
            .await?;
    }
    ctx.client
        .delete(
            kinds::OPERATOR_GROUP,
            &ObjectKey::namespaced(ENGINE_NAMESPACE, OPERATOR_GROUP),
        )
        .await?;

    if hub.namespace().as_deref() == Some(ENGINE_NAMESPACE) {
        warn!("engine shares the hub namespace, leaving it in place");
        return Ok(());
    }
    let ns = ObjectKey::cluster(ENGINE_NAMESPACE);
    if ctx.client.get(kinds::NAMESPACE, &ns).await?.is_some() {
        ctx.client.delete(kinds::NAMESPACE, &ns).await?;
        return Err(Error::teardown(format!(
            "waiting for namespace {ENGINE_NAMESPACE} to be deleted"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::controller::MockHubClient;
    use crate::render::{MockApplier, MockRenderer};
    use rstest::rstest;
    use std::sync::Arc;

    fn hub() -> MultiClusterHub {
        let mut h = MultiClusterHub::new("multiclusterhub", Default::default());
        h.metadata.namespace = Some("open-cluster-management".to_string());
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

    fn engine(labels: &[(&str, &str)], version: &str) -> DynamicObject {
        let mut e = kinds::MULTICLUSTER_ENGINE.object(ENGINE_NAME, None);
        for (k, v) in labels {
            e.labels_mut().insert(k.to_string(), v.to_string());
        }
        e.data = json!({"status": {"currentVersion": version}});
        e
    }

    #[rstest]
    #[case("2.4.0", true)]
    #[case("2.10.1", true)]
    #[case("v2.5.0-rc.1", true)]
    #[case("2.3.9", false)]
    #[case("2.4", true)]
    #[case("", false)]
    fn engine_version_comparison(#[case] version: &str, #[case] ok: bool) {
        assert_eq!(version_at_least(version, MIN_ENGINE_VERSION), ok);
    }

    mod subscription_spec {
        use super::*;

        #[test]
        fn community_mode_uses_community_catalog() {
            let ctx = context(MockHubClient::new());
            let sub = subscription(&ctx, &hub(), PackageMode::Community).expect("sub");
            assert_eq!(sub.name_any(), "stolostron-engine");
            assert_eq!(sub.data["spec"]["source"], "community-operators");
        }

        /// Story: the annotation overlay wins over defaults, but only for the
        /// fields it is allowed to set
        #[test]
        fn story_annotation_overrides_channel() {
            let ctx = context(MockHubClient::new());
            let mut h = hub();
            h.annotations_mut().insert(
                ANNOTATION_ENGINE_SUBSCRIPTION_SPEC.to_string(),
                r#"{"channel":"stable-2.9","source":"custom","config":{"x":1}}"#.to_string(),
            );
            let sub = subscription(&ctx, &h, PackageMode::Commercial).expect("sub");
            assert_eq!(sub.data["spec"]["channel"], "stable-2.9");
            assert_eq!(sub.data["spec"]["source"], "custom");
            assert!(sub.data["spec"]["config"].get("x").is_none());
        }

        #[test]
        fn malformed_annotation_is_an_error() {
            let ctx = context(MockHubClient::new());
            let mut h = hub();
            h.annotations_mut()
                .insert(ANNOTATION_ENGINE_SUBSCRIPTION_SPEC.to_string(), "{".to_string());
            assert!(matches!(
                subscription(&ctx, &h, PackageMode::Commercial),
                Err(Error::Serialization(_))
            ));
        }

        #[test]
        fn default_tolerations_allow_infra_nodes() {
            assert_eq!(tolerations(&hub())[0]["key"], "node-role.kubernetes.io/infra");
        }
    }

    mod readiness {
        use super::*;

        /// Story: an engine that has not reported a version holds the hub back
        #[test]
        fn story_missing_version_blocks_readiness() {
            let mut h = hub();
            let e = engine(&[], "");
            assert_eq!(ready(&mut h, Some(&e)), Flow::Requeue(RESYNC_PERIOD));
            let cond = h.status.as_ref().and_then(|s| s.condition(PROGRESSING)).expect("cond");
            assert_eq!(cond.reason, reason::ENGINE_NOT_READY);
        }

        #[test]
        fn supported_version_continues() {
            let mut h = hub();
            assert_eq!(ready(&mut h, Some(&engine(&[], "2.8.0"))), Flow::Continue);
            assert!(h.status.is_none());
        }
    }

    mod adoption {
        use super::*;

        /// Story: a preexisting engine is labelled and the pass restarts
        #[tokio::test]
        async fn story_unlabelled_engine_is_adopted() {
            let mut client = MockHubClient::new();
            client
                .expect_list()
                .returning(|_, _, _| Ok(Some(vec![engine(&[], "2.8.0")])));
            client
                .expect_patch()
                .withf(|_, _, patch| {
                    patch["metadata"]["labels"][ENGINE_MANAGED_BY_LABEL] == "true"
                        && patch["metadata"]["finalizers"][0] == HUB_FINALIZER
                })
                .times(1)
                .returning(|_, _, _| Ok(()));
            client.expect_apply().never();
            let ctx = context(client);

            let flow = ensure(&ctx, &hub(), PackageMode::Commercial).await.expect("ensure");
            assert_eq!(flow, Flow::Requeue(std::time::Duration::ZERO));
        }

        #[tokio::test]
        async fn two_engines_is_an_error() {
            let mut client = MockHubClient::new();
            client
                .expect_list()
                .returning(|_, _, _| Ok(Some(vec![engine(&[], ""), engine(&[], "")])));
            let ctx = context(client);
            assert!(ensure(&ctx, &hub(), PackageMode::Commercial).await.is_err());
        }

        fn hosted_hub_engine() -> DynamicObject {
            let mut h = MultiClusterHub::new("h1", Default::default());
            h.metadata.namespace = Some("hosted".to_string());
            h.annotations_mut()
                .insert(ANNOTATION_DEPLOYMENT_MODE.to_string(), "Hosted".to_string());
            crate::controller::hosted::hosted_engine(&h)
        }

        /// Story: a hosted hub's engine sits next to the standalone engine
        /// without making the standalone lookup ambiguous
        #[tokio::test]
        async fn story_hosted_engines_are_not_counted() {
            let mut client = MockHubClient::new();
            client.expect_list().returning(|_, _, _| {
                Ok(Some(vec![engine(&[], "2.8.0"), hosted_hub_engine()]))
            });
            let ctx = context(client);

            let found = find_engine(&ctx).await.expect("lookup").expect("engine");
            assert_eq!(found.name_any(), ENGINE_NAME);
        }

        #[tokio::test]
        async fn only_a_hosted_engine_means_none() {
            let mut client = MockHubClient::new();
            client
                .expect_list()
                .returning(|_, _, _| Ok(Some(vec![hosted_hub_engine()])));
            let ctx = context(client);
            assert!(find_engine(&ctx).await.expect("lookup").is_none());
        }

        /// Story: tearing down the standalone hub leaves hosted engines alone
        #[tokio::test]
        async fn story_cleanup_skips_hosted_engines() {
            let mut client = MockHubClient::new();
            client
                .expect_list()
                .returning(|_, _, _| Ok(Some(vec![hosted_hub_engine()])));
            client.expect_get().returning(|_, _| Ok(None));
            client
                .expect_delete()
                .withf(|gvk, _| *gvk != kinds::MULTICLUSTER_ENGINE)
                .returning(|_, _| Ok(()));
            client.expect_patch().never();
            let ctx = context(client);
            cleanup(&ctx, &hub()).await.expect("cleanup");
        }

        /// Story: teardown releases an adopted engine instead of deleting it
        #[tokio::test]
        async fn story_adopted_engine_is_orphaned_on_cleanup() {
            let mut client = MockHubClient::new();
            client.expect_list().returning(|_, _, _| {
                let mut e = engine(&[(ENGINE_MANAGED_BY_LABEL, "true")], "2.8.0");
                e.metadata.finalizers = Some(vec![HUB_FINALIZER.to_string(), "other".to_string()]);
                Ok(Some(vec![e]))
            });
            client
                .expect_patch()
                .withf(|_, _, patch| {
                    patch["metadata"]["labels"][ENGINE_MANAGED_BY_LABEL].is_null()
                        && patch["metadata"]["finalizers"] == json!(["other"])
                })
                .times(1)
                .returning(|_, _, _| Ok(()));
            client.expect_delete().never();
            let ctx = context(client);
            cleanup(&ctx, &hub()).await.expect("orphan");
        }
    }

    mod install {
        use super::*;

        /// Story: on a fresh cluster the namespace, operator group,
        /// subscription and engine resource are all applied
        #[tokio::test]
        async fn story_fresh_install_applies_everything() {
            let mut client = MockHubClient::new();
            client.expect_list().returning(|_, _, _| Ok(Some(vec![])));
            client.expect_get().returning(|_, _| Ok(None));
            let applied = Arc::new(parking_lot::Mutex::new(Vec::new()));
            let recorder = applied.clone();
            client.expect_apply().returning(move |gvk, _| {
                recorder.lock().push(gvk.kind);
                Ok(())
            });
            let ctx = context(client);

            let flow = ensure(&ctx, &hub(), PackageMode::Commercial).await.expect("ensure");
            assert_eq!(flow, Flow::Continue);
            assert_eq!(
                *applied.lock(),
                vec!["Namespace", "OperatorGroup", "Subscription", "MultiClusterEngine"]
            );
        }

        #[tokio::test]
        async fn owned_engine_is_deleted_and_waited_for() {
            let mut client = MockHubClient::new();
            let h = hub();
            let labels = h.installer_labels();
            client.expect_list().returning(move |_, _, _| {
                let mut e = engine(&[], "2.8.0");
                e.labels_mut().extend(labels.clone());
                Ok(Some(vec![e]))
            });
            client
                .expect_delete()
                .withf(|gvk, _| *gvk == kinds::MULTICLUSTER_ENGINE)
                .times(1)
                .returning(|_, _| Ok(()));
            let ctx = context(client);
            assert!(matches!(cleanup(&ctx, &h).await, Err(Error::Teardown(_))));
        }
    }
}
