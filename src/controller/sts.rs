//! Short-lived token credential (STS) posture detection
//!
//! The cluster counts as STS-enabled only when the platform CRDs exist, the
//! service account issuer is set, cloud credentials are in manual mode and the
//! platform is AWS. Anything missing counts as false.

use tracing::{debug, info};

use super::Context;
use crate::kinds::{self, Gvk, ObjectKey};
use crate::status::fields;
use crate::Result;

/// CRDs that must exist before the platform objects can be read
const REQUIRED_CRDS: &[&str] = &[
    "authentications.config.openshift.io",
    "cloudcredentials.operator.openshift.io",
    "infrastructures.config.openshift.io",
];

async fn crd_exists(ctx: &Context, name: &str) -> Result<bool> {
    let found = ctx
        .client
        .get(kinds::CRD, &ObjectKey::cluster(name))
        .await?
        .is_some();
    if !found {
        debug!(crd = name, "CRD not present");
    }
    Ok(found)
}

async fn cluster_field(ctx: &Context, gvk: Gvk, path: &[&str]) -> Result<String> {
    let obj = ctx.client.get(gvk, &ObjectKey::cluster("cluster")).await?;
    Ok(obj
        .map(|o| fields::string_or_empty(&o.data, path))
        .unwrap_or_default())
}

async fn probe(ctx: &Context) -> Result<bool> {
    for crd in REQUIRED_CRDS {
        if !crd_exists(ctx, crd).await? {
            return Ok(false);
        }
    }
    let issuer = cluster_field(ctx, kinds::AUTHENTICATION, &["spec", "serviceAccountIssuer"]).await?;
    if issuer.is_empty() {
        return Ok(false);
    }
    let mode = cluster_field(ctx, kinds::CLOUD_CREDENTIAL, &["spec", "credentialsMode"]).await?;
    if mode != "Manual" {
        return Ok(false);
    }
    let platform = cluster_field(ctx, kinds::INFRASTRUCTURE, &["spec", "platformSpec", "type"]).await?;
    Ok(platform == "AWS")
}

/// Detect the STS posture, logging only when it changes
pub async fn detect(ctx: &Context) -> Result<bool> {
    let enabled = probe(ctx).await?;
    match ctx.state.swap_sts(enabled) {
        Some(previous) if previous == enabled => {}
        _ if enabled => info!("cluster is STS enabled"),
        Some(_) => info!("cluster is no longer STS enabled"),
        None => debug!("cluster is not STS enabled"),
    }
    Ok(enabled)
}
