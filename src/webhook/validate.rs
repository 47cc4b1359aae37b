//! Admission rules for MultiClusterHub
//!
//! Every rule is a function of the request and, for create and delete, one
//! list query against the cluster. Nothing is cached between requests.

use kube::core::admission::{AdmissionRequest, AdmissionResponse, Operation};
use kube::ResourceExt;
use tracing::{debug, info};

use crate::components::valid_component;
use crate::controller::HubClient;
use crate::crd::{AvailabilityType, DeploymentMode, MultiClusterHub};
use crate::kinds::{self, Gvk};
use crate::{Error, Result};

/// Name of the managed cluster record the hub keeps for itself
pub const LOCAL_CLUSTER: &str = "local-cluster";

/// Kinds whose instances keep a standalone hub from being deleted, with the
/// instance names that do not count
const BLOCKING_KINDS: &[(Gvk, &[&str])] = &[
    (kinds::MANAGED_CLUSTER, &[LOCAL_CLUSTER]),
    (kinds::MULTICLUSTER_OBSERVABILITY, &[]),
    (kinds::DISCOVERY_CONFIG, &[]),
    (kinds::AGENT_SERVICE_CONFIG, &[]),
];

fn check_components(hub: &MultiClusterHub) -> Result<()> {
    match hub
        .component_configs()
        .iter()
        .find(|c| !valid_component(&c.name))
    {
        Some(bad) => Err(Error::validation(format!(
            "invalid component config: {} is not a known component",
            bad.name
        ))),
        None => Ok(()),
    }
}

/// Validate a new hub against the hubs that already exist
pub fn validate_create(hub: &MultiClusterHub, existing: &[MultiClusterHub]) -> Result<()> {
    let standalone_exists = existing
        .iter()
        .any(|h| h.deployment_mode() == DeploymentMode::Standalone);

    match hub.deployment_mode() {
        DeploymentMode::Standalone if standalone_exists => {
            return Err(Error::validation("the MultiClusterHub CR already exists"));
        }
        DeploymentMode::Hosted if !standalone_exists => {
            return Err(Error::validation(
                "a hosted MultiClusterHub requires a standalone MultiClusterHub to exist",
            ));
        }
        _ => {}
    }
    check_components(hub)
}

/// Validate a change to an existing hub
pub fn validate_update(old: &MultiClusterHub, new: &MultiClusterHub) -> Result<()> {
    if old.deployment_mode() != new.deployment_mode() {
        return Err(Error::validation("changes cannot be made to DeploymentMode"));
    }
    if old.spec.separate_certificate_management != new.spec.separate_certificate_management {
        return Err(Error::validation(
            "updating SeparateCertificateManagement is forbidden",
        ));
    }
    if old.spec.hive != new.spec.hive {
        return Err(Error::validation("hive updates are forbidden"));
    }
    let availability = &new.spec.availability_config;
    if !availability.is_empty() && AvailabilityType::parse(availability).is_none() {
        return Err(Error::validation(format!(
            "invalid AvailabilityConfig given: {availability}"
        )));
    }
    check_components(new)
}

/// Validate deleting `hub`, listing the blocking kinds through `client`
///
/// A kind whose API is not served counts as empty.
pub async fn validate_delete(client: &dyn HubClient, hub: &MultiClusterHub) -> Result<()> {
    if hub.deployment_mode() == DeploymentMode::Hosted {
        return Ok(());
    }
    for (gvk, allowed) in BLOCKING_KINDS {
        let Some(items) = client.list(*gvk, None, None).await? else {
            debug!(kind = gvk.kind, "API not served, not blocking");
            continue;
        };
        if items.iter().any(|obj| !allowed.contains(&obj.name_any().as_str())) {
            return Err(Error::validation(format!(
                "Cannot delete MultiClusterHub resource because {} resource(s) exist",
                gvk.kind
            )));
        }
    }
    Ok(())
}

/// Evaluate an admission request and build the response
pub async fn review(
    client: &dyn HubClient,
    req: &AdmissionRequest<MultiClusterHub>,
) -> AdmissionResponse {
    let allowed = AdmissionResponse::from(req);
    let outcome = match (&req.operation, &req.object, &req.old_object) {
        (Operation::Create, Some(hub), _) => match client.list_hubs().await {
            Ok(existing) => validate_create(hub, &existing),
            Err(e) => Err(e),
        },
        (Operation::Update, Some(new), Some(old)) => validate_update(old, new),
        (Operation::Delete, _, Some(old)) => validate_delete(client, old).await,
        (Operation::Connect, _, _) => Ok(()),
        _ => Err(Error::validation("admission request is missing its object")),
    };

    match outcome {
        Ok(()) => {
            debug!(uid = %req.uid, operation = ?req.operation, "admitted");
            allowed
        }
        Err(Error::Validation(msg)) => {
            info!(uid = %req.uid, operation = ?req.operation, reason = %msg, "denied");
            allowed.deny(msg)
        }
        Err(e) => allowed.deny(e.to_string()),
    }
}
