//! Removal of resources left behind by earlier releases
//!
//! Runs once every component reports healthy. Each entry is deleted and
//! polled until gone; progress is reported through the Progressing condition.

use kube::ResourceExt;
use tracing::{info, warn};

use super::{Context, Flow};
use crate::crd::{ConditionStatus, HubCondition, MultiClusterHub};
use crate::kinds::{self, Gvk, ObjectKey};
use crate::status::conditions::{reason, PROGRESSING};
use crate::{Result, RESYNC_PERIOD};

/// Namespace where the cert-manager pull secret used to be copied
const CERT_MANAGER_NAMESPACE: &str = "cert-manager";

/// Resources that no current release creates
pub fn legacy_resources(hub: &MultiClusterHub) -> Vec<(Gvk, ObjectKey)> {
    let ns = hub.namespace().unwrap_or_default();
    let in_hub = |name: &str| ObjectKey::namespaced(ns.clone(), name);
    let mut out = vec![
        (kinds::APP_SUBSCRIPTION, in_hub("assisted-service-sub")),
        (kinds::APP_SUBSCRIPTION, in_hub("application-chart-sub")),
        (kinds::APP_SUBSCRIPTION, in_hub("policyreport-sub")),
        (kinds::APP_SUBSCRIPTION, in_hub("cluster-proxy-addon-sub")),
        (kinds::APP_SUBSCRIPTION, in_hub("management-ingress-sub")),
        (kinds::APP_CHANNEL, in_hub("charts-v1")),
        (kinds::DEPLOYMENT, in_hub("multiclusterhub-repo")),
        (kinds::SERVICE, in_hub("multiclusterhub-repo")),
        (
            kinds::CRD,
            ObjectKey::cluster("searchcustomizations.search.open-cluster-management.io"),
        ),
        (
            kinds::CRD,
            ObjectKey::cluster("searchoperators.search.open-cluster-management.io"),
        ),
    ];
    if hub.spec.separate_certificate_management {
        if let Some(secret) = hub.spec.image_pull_secret.as_deref().filter(|s| !s.is_empty()) {
            out.push((
                kinds::SECRET,
                ObjectKey::namespaced(CERT_MANAGER_NAMESPACE, secret),
            ));
        }
    }
    out
}

/// Delete one legacy resource; `Ok(true)` once it is gone
async fn uninstall(
    ctx: &Context,
    hub: &mut MultiClusterHub,
    gvk: Gvk,
    key: &ObjectKey,
) -> Result<bool> {
    let Some(existing) = ctx.client.get(gvk, key).await? else {
        return Ok(true);
    };

    if existing.metadata.deletion_timestamp.is_some() {
        info!(kind = gvk.kind, resource = %key, "waiting for legacy resource to finalize");
        hub.status_mut().set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::False,
            reason::OLD_RESOURCE_DELETE_FAILED,
            format!("Resource {}/{} finalizing", gvk.kind, key.name),
        ));
        return Ok(false);
    }

    if let Err(e) = ctx.client.delete(gvk, key).await {
        warn!(kind = gvk.kind, resource = %key, error = %e, "failed to delete legacy resource");
        hub.status_mut().set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::False,
            reason::OLD_RESOURCE_DELETE_FAILED,
            format!("Failed to remove resource {}/{}", gvk.kind, key.name),
        ));
        return Err(e);
    }

    info!(kind = gvk.kind, resource = %key, "deleted legacy resource");
    hub.status_mut().set_condition(HubCondition::new(
        PROGRESSING,
        ConditionStatus::True,
        reason::OLD_RESOURCE_DELETED,
        "Removed old resource",
    ));
    Ok(false)
}

/// Delete every legacy resource, requeueing while any remain
pub async fn ensure_removals_gone(ctx: &Context, hub: &mut MultiClusterHub) -> Result<Flow> {
    let mut all_gone = true;
    for (gvk, key) in legacy_resources(hub) {
        if !uninstall(ctx, hub, gvk, &key).await? {
            all_gone = false;
        }
    }
    if !all_gone {
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }

    let status = hub.status_mut();
    if status.is_pruning() {
        status.set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::True,
            reason::ALL_OLD_RESOURCES_DELETED,
            "All old resources pruned",
        ));
    }
    Ok(Flow::Continue)
}
