//! Reconcile entry point and the standalone pipeline
//!
//! A pass takes one snapshot of what it needs for status, runs the pipeline
//! until a step asks to stop, then always writes status from the in-memory
//! hub. The pipeline's requeue and the status requeue are merged, the sooner
//! one winning.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

use super::defaults::{apply_defaults, log_deprecations};
use super::lifecycle::{ensure_component, ensure_no_component, PassInputs};
use super::{engine, finalizer, hosted, infra, removals, sts, typed, Context, Flow};
use crate::components::Registry;
use crate::crd::{
    ConditionStatus, DeploymentMode, HubCondition, HubPhase, MultiClusterHub, MultiClusterHubStatus,
};
use crate::kinds::{self, ObjectKey};
use crate::metrics::Outcome;
use crate::overrides::{
    image_overrides_configmap, resolve_images, resolve_templates, template_overrides_configmap,
};
use crate::status::aggregate::{
    all_successful, calculate_status, component_statuses, Observed, PlatformFlags,
};
use crate::status::conditions::{reason, PROGRESSING, TERMINATING};
use crate::{Error, Result, REFRESH_INTERVAL, RESYNC_PERIOD, STS_RETRY_INTERVAL};

const UPGRADEABLE: &str = "Upgradeable";

/// Reconcile a MultiClusterHub
#[instrument(skip(hub, ctx), fields(hub = %hub.name_any()))]
pub async fn reconcile(hub: Arc<MultiClusterHub>, ctx: Arc<Context>) -> std::result::Result<Action, Error> {
    let started = Instant::now();
    let mut hub = (*hub).clone();

    let result = match hub.deployment_mode() {
        DeploymentMode::Standalone => reconcile_standalone(&ctx, &mut hub).await,
        DeploymentMode::Hosted => reconcile_hosted(&ctx, &mut hub).await,
    };

    let outcome = if result.is_ok() {
        Outcome::Success
    } else {
        Outcome::Error
    };
    ctx.metrics.record_reconcile(outcome, started.elapsed());
    result.map(Flow::into_action)
}

/// Log the failure and retry at the resync interval
pub fn error_policy(hub: Arc<MultiClusterHub>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(?error, hub = %hub.name_any(), "reconciliation failed");
    Action::requeue(RESYNC_PERIOD)
}

// =============================================================================
// Status write
// =============================================================================

/// Persist `status` if it differs from what the pass started with
async fn write_status(
    ctx: &Context,
    hub: &mut MultiClusterHub,
    original: Option<MultiClusterHubStatus>,
    status: MultiClusterHubStatus,
) -> Result<Flow> {
    ctx.state.log_transitions(&status.components);
    ctx.metrics.record_components(&status.components);
    ctx.metrics.record_phase(&status.phase);

    let phase = status.phase.clone();
    hub.status = Some(status);

    // Entries carry serde-skipped fields, so compare the stored form
    let changed = serde_json::to_value(&hub.status)? != serde_json::to_value(&original)?;
    if changed {
        match ctx.client.update_hub_status(hub).await {
            Ok(()) => debug!(phase = ?phase, "status updated"),
            Err(e) if e.is_conflict() => {
                info!("status write conflicted, retrying");
                return Ok(Flow::Requeue(RESYNC_PERIOD));
            }
            Err(e) if e.is_not_found() => return Ok(Flow::Done),
            Err(e) => {
                error!(error = %e, "failed to update status");
                return Err(e);
            }
        }
    }

    if phase != HubPhase::Running && !hub.is_paused() {
        return Ok(Flow::Requeue(RESYNC_PERIOD));
    }
    Ok(Flow::Continue)
}

/// Merge the pipeline's result with the status write's
///
/// The sooner of two requeues wins, so a hub that is not Running comes back
/// at the resync interval even when the pipeline scheduled the steady-state
/// refresh.
fn merge(pipeline: Result<Flow>, status: Result<Flow>) -> Result<Flow> {
    match (pipeline, status) {
        (Err(e), Err(status_err)) => {
            error!(error = %status_err, "status write failed after pipeline error");
            Err(e)
        }
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Err(e),
        (Ok(flow), Ok(status_flow)) => Ok(flow.sooner(status_flow)),
    }
}

/// Write `hub` back and keep the in-memory status
async fn write_back(ctx: &Context, hub: &mut MultiClusterHub) -> Result<()> {
    let status = hub.status.take();
    let mut updated = ctx.client.update_hub(hub).await?;
    updated.status = status;
    *hub = updated;
    Ok(())
}

// =============================================================================
// Pass preparation
// =============================================================================

async fn configmap(ctx: &Context, namespace: &str, name: &str) -> Result<ConfigMap> {
    let obj = ctx
        .client
        .get(kinds::CONFIG_MAP, &ObjectKey::namespaced(namespace, name))
        .await?
        .ok_or_else(|| Error::config(format!("override configmap {namespace}/{name} not found")))?;
    typed(obj)
}

/// Resolve everything the renderer needs for this pass
async fn pass_inputs(ctx: &Context, hub: &MultiClusterHub, sts: bool) -> Result<PassInputs> {
    let ns = hub.namespace().unwrap_or_default();
    let image_cm = match image_overrides_configmap(hub) {
        Some(name) => Some(configmap(ctx, &ns, &name).await?),
        None => None,
    };
    let template_cm = match template_overrides_configmap(hub) {
        Some(name) => Some(configmap(ctx, &ns, &name).await?),
        None => None,
    };
    Ok(PassInputs {
        images: resolve_images(&ctx.config, hub, image_cm.as_ref())?,
        templates: resolve_templates(&ctx.config, template_cm.as_ref())?,
        sts,
    })
}

/// Inputs for rendering charts during teardown
///
/// Override configmaps may already be gone when the hub is deleted. Teardown
/// then falls back to the operator's own manifest so deletion is never held
/// up by a missing override.
async fn teardown_inputs(ctx: &Context, hub: &MultiClusterHub, sts: bool) -> PassInputs {
    match pass_inputs(ctx, hub, sts).await {
        Ok(inputs) => inputs,
        Err(e) => {
            warn!(error = %e, "overrides unavailable during teardown, using operator defaults");
            PassInputs {
                images: resolve_images(&ctx.config, hub, None).unwrap_or_default(),
                templates: resolve_templates(&ctx.config, None).unwrap_or_default(),
                sts,
            }
        }
    }
}

/// Read what status computation needs, once per pass
async fn observe(ctx: &Context, hub: &MultiClusterHub, registry: &Registry) -> Result<Observed> {
    let mut namespaces = BTreeSet::from([hub.namespace().unwrap_or_default()]);
    for component in registry.iter().filter(|c| hub.enabled(c.name)) {
        if let Some(ns) = component.namespace {
            namespaces.insert(ns.to_string());
        }
    }

    let mut deployments = Vec::new();
    for ns in &namespaces {
        deployments.extend(ctx.client.list_deployments(ns).await?);
    }

    let engine_subscription = engine::find_subscription(ctx).await?;
    let engine_csv = match &engine_subscription {
        Some(sub) => engine::find_csv(ctx, sub).await?,
        None => None,
    };
    Ok(Observed {
        deployments,
        engine_subscription,
        engine_csv,
        engine: engine::find_engine(ctx).await?,
    })
}

/// Publish whether the operator may be upgraded; returns true mid-upgrade
async fn publish_upgradeable(ctx: &Context, hub: &MultiClusterHub) -> Result<bool> {
    let current = hub.current_version();
    let upgrading = !current.is_empty() && current != ctx.config.version;

    let Some(name) = ctx.config.operator_condition.as_deref() else {
        return Ok(upgrading);
    };
    let (status, reason, message) = if upgrading {
        ("False", "HubUpgrading", "Hub is upgrading and cannot be upgraded until it completes")
    } else {
        ("True", "HubReady", "Hub is at the desired version")
    };
    let patch = json!({
        "spec": {
            "conditions": [{
                "type": UPGRADEABLE,
                "status": status,
                "reason": reason,
                "message": message,
                "lastTransitionTime": Utc::now().to_rfc3339(),
            }]
        }
    });
    let key = ObjectKey::namespaced(ctx.config.operator_namespace.clone(), name);
    match ctx.client.patch(kinds::OPERATOR_CONDITION, &key, &patch).await {
        Ok(()) => Ok(upgrading),
        Err(e) if e.is_not_found() => {
            warn!(condition = %key, "operator condition not found, upgradeable not published");
            Ok(upgrading)
        }
        Err(e) => Err(e),
    }
}

/// Record pause and resume on the Progressing condition; true while paused
fn update_paused_condition(hub: &mut MultiClusterHub) -> bool {
    let paused = hub.is_paused();
    let status = hub.status_mut();
    if paused && !status.is_paused() {
        status.set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::Unknown,
            reason::PAUSED,
            "Multiclusterhub is paused",
        ));
    } else if !paused && status.is_paused() {
        status.set_condition(HubCondition::new(
            PROGRESSING,
            ConditionStatus::True,
            reason::RESUMED,
            "Multiclusterhub is resumed",
        ));
    }
    paused
}

/// Fail early with a condition if the hub's pull secret does not exist
async fn verify_pull_secret(ctx: &Context, hub: &mut MultiClusterHub) -> Result<()> {
    let Some(name) = hub.spec.image_pull_secret.clone().filter(|s| !s.is_empty()) else {
        return Ok(());
    };
    let ns = hub.namespace().unwrap_or_default();
    if ctx
        .client
        .get(kinds::SECRET, &ObjectKey::namespaced(ns.clone(), name.clone()))
        .await?
        .is_some()
    {
        return Ok(());
    }
    let message = format!("Error fetching Pull Secret: {ns}/{name} not found");
    hub.status_mut().set_condition(HubCondition::new(
        PROGRESSING,
        ConditionStatus::False,
        reason::PREREQUISITE_FAILED,
        message.clone(),
    ));
    Err(Error::internal(message))
}

// =============================================================================
// Pipelines
// =============================================================================

async fn reconcile_standalone(ctx: &Context, hub: &mut MultiClusterHub) -> Result<Flow> {
    info!("reconciling hub");
    let registry = ctx.registry()?;

    if let Some(status) = hub.status.as_mut() {
        status.strip_failures();
    }
    log_deprecations(ctx, hub);
    let upgrading = publish_upgradeable(ctx, hub).await?;

    let original = hub.status.clone();
    let observed = observe(ctx, hub, &registry).await?;
    let flags = PlatformFlags {
        ocp_console: infra::console_enabled(ctx).await?,
    };
    let sts = match sts::detect(ctx).await {
        Ok(enabled) => enabled,
        Err(e) => {
            warn!(error = %e, "STS detection failed");
            return Ok(Flow::Requeue(STS_RETRY_INTERVAL));
        }
    };

    let pipeline = run_standalone(ctx, hub, &registry, &observed, flags, sts, upgrading).await;
    let status = calculate_status(hub, &observed, &registry, flags, &ctx.config.version);
    let written = write_status(ctx, hub, original, status).await;
    merge(pipeline, written)
}

async fn run_standalone(
    ctx: &Context,
    hub: &mut MultiClusterHub,
    registry: &Registry,
    observed: &Observed,
    flags: PlatformFlags,
    sts: bool,
    upgrading: bool,
) -> Result<Flow> {
    if hub.is_deleting() {
        hub.status_mut().set_condition(HubCondition::new(
            TERMINATING,
            ConditionStatus::True,
            reason::DELETION_TIMESTAMP_PRESENT,
            "Multiclusterhub is being cleaned up.",
        ));
        if hub.has_finalizer() {
            let inputs = teardown_inputs(ctx, hub, sts).await;
            if let Err(e) = finalizer::finalize(ctx, hub, &inputs).await {
                info!(error = %e, "finalizing");
                return Ok(Flow::Requeue(RESYNC_PERIOD));
            }
            hub.remove_finalizer();
            write_back(ctx, hub).await?;
        }
        return Ok(Flow::Done);
    }

    if apply_defaults(hub, registry) {
        info!("hub defaults applied");
        write_back(ctx, hub).await?;
        return Ok(Flow::Requeue(Duration::ZERO));
    }

    let inputs = pass_inputs(ctx, hub, sts).await?;

    infra::ensure_namespace_label(ctx, hub).await?;

    if update_paused_condition(hub) {
        info!("reconciliation is paused");
        return Ok(Flow::Done);
    }

    let flow = infra::gate_platform_version(ctx, hub).await?;
    if !flow.is_continue() {
        return Ok(flow);
    }
    infra::install_crds(ctx, hub).await?;
    verify_pull_secret(ctx, hub).await?;

    let flow = engine::ensure(ctx, hub, registry.mode()).await?;
    if !flow.is_continue() {
        return Ok(flow);
    }

    infra::discover_platform(ctx).await?;
    infra::ensure_trust_bundle(ctx, hub).await?;
    infra::ensure_metrics_service(ctx, hub).await?;
    infra::ensure_service_monitor(ctx, hub).await?;

    let flow = engine::ready(hub, observed.engine.as_ref());
    if !flow.is_continue() {
        return Ok(flow);
    }

    for component in registry.iter() {
        let wanted = hub.enabled(component.name) && (flags.ocp_console || !component.requires_console);
        let flow = if wanted {
            ensure_component(ctx, hub, component, &inputs).await?
        } else {
            ensure_no_component(ctx, hub, component, &inputs).await?
        };
        if !flow.is_continue() {
            return Ok(flow);
        }
    }

    if all_successful(&component_statuses(hub, observed, registry, flags)) {
        let flow = removals::ensure_removals_gone(ctx, hub).await?;
        if !flow.is_continue() {
            return Ok(flow);
        }
    }

    Ok(Flow::Requeue(if upgrading {
        RESYNC_PERIOD
    } else {
        REFRESH_INTERVAL
    }))
}

async fn reconcile_hosted(ctx: &Context, hub: &mut MultiClusterHub) -> Result<Flow> {
    info!("reconciling hosted hub");
    let original = hub.status.clone();
    log_deprecations(ctx, hub);

    let pipeline = hosted::reconcile_hosted(ctx, hub).await;
    update_paused_condition(hub);
    let written = match hosted::hosted_status(ctx, hub).await {
        Ok(status) => write_status(ctx, hub, original, status).await,
        Err(e) => Err(e),
    };
    merge(pipeline, written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use crate::controller::MockHubClient;
    use crate::render::{MockApplier, MockRenderer};
    use crate::{ANNOTATION_PAUSE, HUB_FINALIZER};

    fn hub() -> MultiClusterHub {
        let mut h = MultiClusterHub::new("multiclusterhub", Default::default());
        h.metadata.namespace = Some("open-cluster-management".to_string());
        h
    }

    fn context(client: MockHubClient, config: OperatorConfig) -> Context {
        Context::for_testing(
            Arc::new(client),
            Arc::new(MockRenderer::new()),
            Arc::new(MockApplier::new()),
            config,
        )
    }

    fn config_with_images() -> OperatorConfig {
        OperatorConfig {
            image_manifest: [("multiclusterhub_operator".to_string(), "quay.io/stolostron/mch@sha256:abc".to_string())]
                .into(),
            ..Default::default()
        }
    }

    mod merging {
        use super::*;

        #[test]
        fn sooner_requeue_wins() {
            let merged = merge(
                Ok(Flow::Requeue(REFRESH_INTERVAL)),
                Ok(Flow::Requeue(RESYNC_PERIOD)),
            )
            .expect("merge");
            assert_eq!(merged, Flow::Requeue(RESYNC_PERIOD));
        }

        #[test]
        fn status_requeue_fills_in_when_pipeline_scheduled_nothing() {
            let merged = merge(Ok(Flow::Done), Ok(Flow::Requeue(RESYNC_PERIOD))).expect("merge");
            assert_eq!(merged, Flow::Requeue(RESYNC_PERIOD));
            let merged = merge(Ok(Flow::Requeue(Duration::ZERO)), Ok(Flow::Continue)).expect("merge");
            assert_eq!(merged, Flow::Requeue(Duration::ZERO));
        }

        /// Story: a pipeline error is reported even when the status write
        /// succeeded, and a status error surfaces when the pipeline was fine
        #[test]
        fn story_errors_are_never_swallowed() {
            assert!(merge(Err(Error::internal("pipeline")), Ok(Flow::Continue)).is_err());
            assert!(merge(Ok(Flow::Done), Err(Error::internal("status"))).is_err());
        }
    }

    mod pause {
        use super::*;

        /// Story: pausing records MCHPaused and un-pausing records MCHResumed
        #[test]
        fn story_pause_then_resume() {
            let mut h = hub();
            h.annotations_mut()
                .insert(ANNOTATION_PAUSE.to_string(), "true".to_string());
            assert!(update_paused_condition(&mut h));
            let cond = h.status.as_ref().and_then(|s| s.condition(PROGRESSING)).expect("cond");
            assert_eq!(cond.reason, reason::PAUSED);

            h.annotations_mut().remove(ANNOTATION_PAUSE);
            assert!(!update_paused_condition(&mut h));
            let cond = h.status.as_ref().and_then(|s| s.condition(PROGRESSING)).expect("cond");
            assert_eq!(cond.reason, reason::RESUMED);
        }

        #[test]
        fn unpaused_hub_gets_no_condition() {
            let mut h = hub();
            assert!(!update_paused_condition(&mut h));
            assert!(h.status.as_ref().map_or(true, |s| s.conditions.is_empty()));
        }
    }

    mod upgradeable {
        use super::*;

        #[tokio::test]
        async fn fresh_install_is_upgradeable() {
            let ctx = context(MockHubClient::new(), OperatorConfig::default());
            assert!(!publish_upgradeable(&ctx, &hub()).await.expect("publish"));
        }

        /// Story: mid-upgrade the OperatorCondition says False so OLM holds
        /// the next upgrade back
        #[tokio::test]
        async fn story_mid_upgrade_blocks_operator_upgrade() {
            let mut client = MockHubClient::new();
            client
                .expect_patch()
                .withf(|gvk, key, patch| {
                    *gvk == kinds::OPERATOR_CONDITION
                        && key.name == "advanced-cluster-management.v2.12.0"
                        && patch["spec"]["conditions"][0]["status"] == "False"
                })
                .times(1)
                .returning(|_, _, _| Ok(()));
            let ctx = context(
                client,
                OperatorConfig {
                    operator_condition: Some("advanced-cluster-management.v2.12.0".to_string()),
                    version: "2.13.0".to_string(),
                    ..Default::default()
                },
            );
            let mut h = hub();
            h.status_mut().current_version = "2.12.0".to_string();
            assert!(publish_upgradeable(&ctx, &h).await.expect("publish"));
        }
    }

    mod status_write {
        use super::*;

        fn api_error(code: u16) -> Error {
            Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".to_string(),
                message: "boom".to_string(),
                reason: "Whatever".to_string(),
                code,
            }))
        }

        fn running() -> MultiClusterHubStatus {
            MultiClusterHubStatus {
                phase: HubPhase::Running,
                current_version: "2.13.0".to_string(),
                desired_version: "2.13.0".to_string(),
                ..Default::default()
            }
        }

        /// Story: losing an optimistic-concurrency race is a requeue, not an
        /// error
        #[tokio::test]
        async fn story_conflict_requeues() {
            let mut client = MockHubClient::new();
            client
                .expect_update_hub_status()
                .returning(|_| Err(api_error(409)));
            let ctx = context(client, OperatorConfig::default());
            let flow = write_status(&ctx, &mut hub(), None, running())
                .await
                .expect("write");
            assert_eq!(flow, Flow::Requeue(RESYNC_PERIOD));
        }

        #[tokio::test]
        async fn vanished_hub_is_done() {
            let mut client = MockHubClient::new();
            client
                .expect_update_hub_status()
                .returning(|_| Err(api_error(404)));
            let ctx = context(client, OperatorConfig::default());
            let flow = write_status(&ctx, &mut hub(), None, running())
                .await
                .expect("write");
            assert_eq!(flow, Flow::Done);
        }

        #[tokio::test]
        async fn unchanged_running_status_is_not_written() {
            let mut client = MockHubClient::new();
            client.expect_update_hub_status().never();
            let ctx = context(client, OperatorConfig::default());
            let mut h = hub();
            h.status = Some(running());
            let flow = write_status(&ctx, &mut h, Some(running()), running())
                .await
                .expect("write");
            assert_eq!(flow, Flow::Continue);
        }

        #[tokio::test]
        async fn non_running_phase_requeues() {
            let mut client = MockHubClient::new();
            client.expect_update_hub_status().returning(|_| Ok(()));
            let ctx = context(client, OperatorConfig::default());
            let flow = write_status(&ctx, &mut hub(), None, MultiClusterHubStatus::default())
                .await
                .expect("write");
            assert_eq!(flow, Flow::Requeue(RESYNC_PERIOD));
        }
    }

    mod standalone {
        use super::*;

        /// Story: a new hub is defaulted and written back before anything is
        /// installed, and the pass comes straight back
        #[tokio::test]
        async fn story_new_hub_is_defaulted_first() {
            let mut client = MockHubClient::new();
            client
                .expect_update_hub()
                .withf(|h| h.has_finalizer() && h.enabled(crate::components::SEARCH))
                .times(1)
                .returning(|h| Ok(h.clone()));
            client.expect_apply().never();
            let ctx = context(client, config_with_images());
            let registry = ctx.registry().expect("registry");
            let mut h = hub();

            let flow = run_standalone(&ctx, &mut h, &registry, &Observed::default(), PlatformFlags::default(), false, false)
                .await
                .expect("pass");
            assert_eq!(flow, Flow::Requeue(Duration::ZERO));
        }

        #[tokio::test]
        async fn missing_images_stop_the_pass() {
            let ctx = context(MockHubClient::new(), OperatorConfig::default());
            let registry = ctx.registry().expect("registry");
            let mut h = hub();
            apply_defaults(&mut h, &registry);
            let err = run_standalone(&ctx, &mut h, &registry, &Observed::default(), PlatformFlags::default(), false, false)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Config(_)));
        }

        /// Story: a hub whose override configmap was deleted first can still
        /// be torn down; teardown renders with the operator's own images
        #[tokio::test]
        async fn story_missing_override_configmap_does_not_block_deletion() {
            let mut client = MockHubClient::new();
            client.expect_get().returning(|_, _| Ok(None));
            client.expect_list().returning(|gvk, _, _| {
                if gvk == kinds::APP_SUBSCRIPTION {
                    Ok(Some(vec![gvk.object("grc-sub", Some("open-cluster-management"))]))
                } else {
                    Ok(None)
                }
            });
            client.expect_delete().returning(|_, _| Ok(()));
            client.expect_update_hub().never();
            let ctx = context(client, config_with_images());
            let registry = ctx.registry().expect("registry");
            let mut h = hub();
            apply_defaults(&mut h, &registry);
            h.annotations_mut().insert(
                crate::ANNOTATION_IMAGE_OVERRIDES_CM.to_string(),
                "gone".to_string(),
            );
            h.metadata.deletion_timestamp = Some(
                k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(Utc::now()),
            );

            let flow = run_standalone(&ctx, &mut h, &registry, &Observed::default(), PlatformFlags::default(), false, false)
                .await
                .expect("teardown proceeds");
            assert_eq!(flow, Flow::Requeue(RESYNC_PERIOD));
            assert!(h.status.as_ref().is_some_and(|s| s.has_condition(TERMINATING)));
        }

        #[tokio::test]
        async fn teardown_inputs_fall_back_to_the_operator_manifest() {
            let mut client = MockHubClient::new();
            client.expect_get().returning(|_, _| Ok(None));
            let ctx = context(client, config_with_images());
            let mut h = hub();
            h.annotations_mut().insert(
                crate::ANNOTATION_TEMPLATE_OVERRIDES_CM.to_string(),
                "gone".to_string(),
            );
            let inputs = teardown_inputs(&ctx, &h, true).await;
            assert!(inputs.images.contains_key("multiclusterhub_operator"));
            assert!(inputs.sts);
        }

        /// Story: a paused hub stops after defaulting and records why
        #[tokio::test]
        async fn story_paused_hub_stops_early() {
            let mut client = MockHubClient::new();
            client.expect_get().returning(|gvk, key| Ok(Some(gvk.object(&key.name, None))));
            client.expect_patch().returning(|_, _, _| Ok(()));
            client.expect_apply().never();
            let ctx = context(client, config_with_images());
            let registry = ctx.registry().expect("registry");
            let mut h = hub();
            apply_defaults(&mut h, &registry);
            h.annotations_mut()
                .insert(ANNOTATION_PAUSE.to_string(), "true".to_string());

            let flow = run_standalone(&ctx, &mut h, &registry, &Observed::default(), PlatformFlags::default(), false, false)
                .await
                .expect("pass");
            assert_eq!(flow, Flow::Done);
            assert!(h.status.as_ref().is_some_and(|s| s.is_paused()));
        }

        /// Story: a failing teardown keeps the finalizer and retries at the
        /// resync interval with a Terminating condition
        #[tokio::test]
        async fn story_blocked_teardown_keeps_finalizer() {
            let mut client = MockHubClient::new();
            client.expect_list().returning(|gvk, _, _| {
                if gvk == kinds::APP_SUBSCRIPTION {
                    Ok(Some(vec![gvk.object("grc-sub", Some("open-cluster-management"))]))
                } else {
                    Ok(None)
                }
            });
            client.expect_delete().returning(|_, _| Ok(()));
            client.expect_update_hub().never();
            let ctx = context(client, config_with_images());
            let registry = ctx.registry().expect("registry");
            let mut h = hub();
            apply_defaults(&mut h, &registry);
            h.metadata.deletion_timestamp = Some(
                k8s_openapi::apimachinery::pkg::apis::meta::v1::Time(Utc::now()),
            );

            let flow = run_standalone(&ctx, &mut h, &registry, &Observed::default(), PlatformFlags::default(), false, false)
                .await
                .expect("pass");
            assert_eq!(flow, Flow::Requeue(RESYNC_PERIOD));
            assert!(h.finalizers().iter().any(|f| f == HUB_FINALIZER));
            assert!(h.status.as_ref().is_some_and(|s| s.has_condition(TERMINATING)));
        }
    }
}
