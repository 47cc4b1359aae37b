//! Teardown of a standalone hub
//!
//! Each stage either finishes or returns [`Error::Teardown`], which the
//! reconciler turns into a requeue. The finalizer is only removed once every
//! stage finished in a single pass.

use kube::api::DynamicObject;
use kube::ResourceExt;
use tracing::{info, warn};

use super::lifecycle::{ensure_no_component, PassInputs};
use super::{engine, Context};
use crate::crd::{ConditionStatus, HubCondition, MultiClusterHub};
use crate::kinds::{self, Gvk, ObjectKey};
use crate::status::conditions::{reason, PROGRESSING};
use crate::{Error, Result, BACKUP_NAMESPACE};

/// Name of the helm release an app subscription created
fn release_name(sub: &DynamicObject) -> Option<String> {
    let uid = sub.metadata.uid.as_deref()?;
    let prefix = uid.get(..5)?;
    Some(format!("{}-{}", sub.name_any().replacen("-sub", "", 1), prefix))
}

async fn list_owned(ctx: &Context, gvk: Gvk, hub: &MultiClusterHub) -> Result<Vec<DynamicObject>> {
    Ok(ctx
        .client
        .list(gvk, None, Some(hub.installer_selector()))
        .await?
        .unwrap_or_default())
}

/// Delete app subscriptions and wait for their helm releases
async fn cleanup_app_subscriptions(ctx: &Context, hub: &mut MultiClusterHub) -> Result<()> {
    let subs = list_owned(ctx, kinds::APP_SUBSCRIPTION, hub).await?;
    let releases = list_owned(ctx, kinds::HELM_RELEASE, hub).await?;

    // Releases created before labelling was introduced are claimed here so
    // that the wait below can see them.
    if subs.len() > releases.len() {
        let labels = serde_json::to_value(hub.installer_labels())?;
        for sub in &subs {
            let Some(name) = release_name(sub) else {
                continue;
            };
            let key = ObjectKey {
                namespace: sub.namespace(),
                name,
            };
            if ctx.client.get(kinds::HELM_RELEASE, &key).await?.is_none() {
                info!(release = %key, "helm release not found");
                continue;
            }
            ctx.client
                .patch(
                    kinds::HELM_RELEASE,
                    &key,
                    &serde_json::json!({"metadata": {"labels": labels}}),
                )
                .await?;
        }
    }

    if !subs.is_empty() {
        info!(count = subs.len(), "terminating app subscriptions");
        for sub in &subs {
            ctx.client
                .delete(kinds::APP_SUBSCRIPTION, &ObjectKey::of(sub))
                .await?;
        }
    }

    if !subs.is_empty() || !releases.is_empty() {
        hub.status_mut().set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::True,
            reason::HELM_RELEASE_TERMINATING,
            "Waiting for helmreleases to terminate.",
        ));
        return Err(Error::teardown("waiting for helm releases to be terminated"));
    }
    Ok(())
}

async fn wait_for_backup_namespace(ctx: &Context) -> Result<()> {
    let key = ObjectKey::cluster(BACKUP_NAMESPACE);
    if ctx.client.get(kinds::NAMESPACE, &key).await?.is_some() {
        return Err(Error::teardown(format!(
            "waiting for namespace {BACKUP_NAMESPACE} to be deleted"
        )));
    }
    Ok(())
}

async fn delete_labelled(ctx: &Context, gvk: Gvk, hub: &MultiClusterHub) -> Result<()> {
    let objects = list_owned(ctx, gvk, hub).await?;
    for obj in &objects {
        ctx.client.delete(gvk, &ObjectKey::of(obj)).await?;
    }
    if !objects.is_empty() {
        info!(kind = gvk.kind, count = objects.len(), "deleted labelled resources");
    }
    Ok(())
}

/// Run every teardown stage for a hub being deleted
pub async fn finalize(ctx: &Context, hub: &mut MultiClusterHub, inputs: &PassInputs) -> Result<()> {
    cleanup_app_subscriptions(ctx, hub).await?;

    let registry = ctx.registry()?;
    for component in registry.iter() {
        let flow = ensure_no_component(ctx, hub, component, inputs).await?;
        if !flow.is_continue() {
            return Err(Error::teardown(format!(
                "waiting for component {} to be removed",
                component.name
            )));
        }
    }

    wait_for_backup_namespace(ctx).await?;
    delete_labelled(ctx, kinds::CLUSTER_ROLE, hub).await?;
    delete_labelled(ctx, kinds::CLUSTER_ROLE_BINDING, hub).await?;

    if let Err(e) = engine::cleanup(ctx, hub).await {
        if !matches!(e, Error::Teardown(_)) {
            warn!(error = %e, "multicluster engine cleanup failed");
        }
        return Err(e);
    }

    info!(hub = %hub.name_any(), "hub finalized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::controller::MockHubClient;
    use crate::render::{MockApplier, MockRenderer, RenderOutput};
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn hub() -> MultiClusterHub {
        let mut h = MultiClusterHub::new("multiclusterhub", Default::default());
        h.metadata.namespace = Some("open-cluster-management".to_string());
        h
    }

    fn context(client: MockHubClient, renderer: MockRenderer, applier: MockApplier) -> Context {
        Context::for_testing(
            Arc::new(client),
            Arc::new(renderer),
            Arc::new(applier),
            OperatorConfig::default(),
        )
    }

    fn app_sub(name: &str, uid: &str) -> DynamicObject {
        let mut s = kinds::APP_SUBSCRIPTION.object(name, Some("open-cluster-management"));
        s.metadata.uid = Some(uid.to_string());
        s
    }

    #[test]
    fn release_name_strips_sub_suffix() {
        let sub = app_sub("console-chart-sub", "abcdef-1234");
        assert_eq!(release_name(&sub).as_deref(), Some("console-chart-abcde"));
        assert_eq!(release_name(&app_sub("short", "abc")), None);
    }

    /// Story: leftover app subscriptions are deleted and the hub records that
    /// it waits for their helm releases
    #[tokio::test]
    async fn story_app_subscriptions_hold_teardown() {
        let mut client = MockHubClient::new();
        client.expect_list().returning(|gvk, _, _| {
            if gvk == kinds::APP_SUBSCRIPTION {
                Ok(Some(vec![app_sub("grc-sub", "12345678")]))
            } else {
                Ok(None)
            }
        });
        client
            .expect_get()
            .withf(|gvk, key| *gvk == kinds::HELM_RELEASE && key.name == "grc-12345")
            .returning(|gvk, key| Ok(Some(gvk.object(&key.name, key.namespace.as_deref()))));
        client
            .expect_patch()
            .withf(|gvk, _, _| *gvk == kinds::HELM_RELEASE)
            .times(1)
            .returning(|_, _, _| Ok(()));
        client
            .expect_delete()
            .withf(|gvk, key| *gvk == kinds::APP_SUBSCRIPTION && key.name == "grc-sub")
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = context(client, MockRenderer::new(), MockApplier::new());
        let mut h = hub();

        let err = finalize(&ctx, &mut h, &PassInputs::default()).await.unwrap_err();
        assert!(matches!(err, Error::Teardown(_)));
        let cond = h.status.as_ref().and_then(|s| s.condition(PROGRESSING)).expect("cond");
        assert_eq!(cond.reason, reason::HELM_RELEASE_TERMINATING);
    }

    /// Story: with nothing left on the cluster every stage passes and the
    /// labelled cluster roles are swept
    #[tokio::test]
    async fn story_clean_cluster_finishes_teardown() {
        let deleted = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorder = deleted.clone();
        let mut client = MockHubClient::new();
        client.expect_list().returning(|gvk, _, _| {
            if gvk == kinds::CLUSTER_ROLE {
                Ok(Some(vec![gvk.object("open-cluster-management:hub", None)]))
            } else {
                Ok(None)
            }
        });
        client.expect_get().returning(|_, _| Ok(None));
        client.expect_delete().returning(move |gvk, key| {
            recorder.lock().push(format!("{}/{}", gvk.kind, key.name));
            Ok(())
        });
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render_chart()
            .returning(|_| RenderOutput::default());
        let ctx = context(client, renderer, MockApplier::new());

        finalize(&ctx, &mut hub(), &PassInputs::default())
            .await
            .expect("teardown complete");
        assert!(deleted
            .lock()
            .contains(&"ClusterRole/open-cluster-management:hub".to_string()));
    }

    #[tokio::test]
    async fn lingering_backup_namespace_blocks() {
        let mut client = MockHubClient::new();
        client.expect_list().returning(|_, _, _| Ok(None));
        client.expect_get().returning(|gvk, key| {
            // the namespace outlives its chart while the cluster finalizes it
            if gvk == kinds::NAMESPACE && key.name == BACKUP_NAMESPACE {
                let mut ns = gvk.object(&key.name, None);
                ns.metadata.deletion_timestamp = Some(
                    k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(chrono::Utc::now()),
                );
                Ok(Some(ns))
            } else {
                Ok(None)
            }
        });
        client.expect_delete().returning(|_, _| Ok(()));
        let mut renderer = MockRenderer::new();
        renderer
            .expect_render_chart()
            .returning(|_| RenderOutput::default());
        let ctx = context(client, renderer, MockApplier::new());

        let err = finalize(&ctx, &mut hub(), &PassInputs::default()).await.unwrap_err();
        assert!(matches!(err, Error::Teardown(_)));
        assert!(err.to_string().contains("cluster-backup"));
    }
}
