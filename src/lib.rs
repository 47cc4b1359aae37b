//! Hub operator - lifecycle management for a multi-component cluster management hub
//!
//! A single `MultiClusterHub` resource describes the desired installation. The
//! operator converges the cluster toward it by installing, upgrading and removing
//! a registry of named components, and reports aggregated health back onto the
//! resource's status.
//!
//! # Architecture
//!
//! - Every reconcile pass is level-triggered and idempotent; waiting is expressed
//!   as a requeue, never as an in-pass sleep.
//! - Each enabled component is tracked by an `InternalHubComponent` marker whose
//!   existence is the authoritative "currently managed" signal.
//! - Status is recomputed from scratch on every pass and written back through a
//!   deferred step that runs no matter where the pipeline stopped.
//! - Two topologies are supported: standalone (the operator installs everything
//!   itself) and hosted (only a delegated engine resource is managed).
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (MultiClusterHub, InternalHubComponent)
//! - [`components`] - Static component registry and per-component hooks
//! - [`status`] - Condition model, typed field accessors and status aggregation
//! - [`controller`] - Reconciliation pipeline, teardown and hosted mode
//! - [`webhook`] - Admission validation rules and HTTP handlers
//! - [`render`] - Chart rendering and the resource applier
//! - [`overrides`] - Image and template override resolution
//! - [`kinds`] - Group/version/kind table for the dynamically-typed resources
//! - [`config`] - Environment-driven operator configuration
//! - [`metrics`] - Prometheus metrics
//! - [`leader`] - Lease-based leader election
//! - [`retry`] - Backoff helper for startup operations
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

use std::time::Duration;

pub mod components;
pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod kinds;
pub mod leader;
pub mod metrics;
pub mod overrides;
pub mod render;
pub mod retry;
pub mod status;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Timing
// =============================================================================

/// Standard requeue interval while the hub is converging
pub const RESYNC_PERIOD: Duration = Duration::from_secs(20);

/// Requeue interval once the hub has settled
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Requeue interval after a failed STS environment probe
pub const STS_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Requeue interval after a failed hosted teardown
pub const HOSTED_TEARDOWN_RETRY: Duration = Duration::from_secs(5);

// =============================================================================
// Names
// =============================================================================

/// API group shared by the hub and marker CRDs
pub const API_GROUP: &str = "operator.open-cluster-management.io";

/// Finalizer placed on every hub
pub const HUB_FINALIZER: &str = "finalizer.operator.open-cluster-management.io";

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "multiclusterhub-operator";

/// Label naming the hub that owns a resource
pub const INSTALLER_NAME_LABEL: &str = "installer.name";

/// Label naming the namespace of the hub that owns a resource
pub const INSTALLER_NAMESPACE_LABEL: &str = "installer.namespace";

/// Label marking an engine adopted from a prior installation
pub const ENGINE_MANAGED_BY_LABEL: &str = "multiclusterhubs.operator.open-cluster-management.io/managed-by";

/// Namespace of the multicluster engine in standalone mode
pub const ENGINE_NAMESPACE: &str = "multicluster-engine";

/// Name of the multicluster engine resource in standalone mode
pub const ENGINE_NAME: &str = "multiclusterengine";

/// Dedicated namespace for the cluster backup component
pub const BACKUP_NAMESPACE: &str = "open-cluster-management-backup";

// =============================================================================
// Annotations
// =============================================================================

/// Annotation selecting the deployment mode (`Hosted` or absent)
pub const ANNOTATION_DEPLOYMENT_MODE: &str = "deploymentmode";

/// Annotation pausing reconciliation
pub const ANNOTATION_PAUSE: &str = "installer.open-cluster-management.io/pause";

/// Legacy pause annotation
pub const ANNOTATION_PAUSE_LEGACY: &str = "mch-pause";

/// Annotation overriding the image repository for every image
pub const ANNOTATION_IMAGE_REPOSITORY: &str = "installer.open-cluster-management.io/image-repository";

/// Annotation naming a configmap with image overrides
pub const ANNOTATION_IMAGE_OVERRIDES_CM: &str =
    "installer.open-cluster-management.io/image-overrides-configmap";

/// Annotation naming a configmap with template overrides
pub const ANNOTATION_TEMPLATE_OVERRIDES_CM: &str =
    "installer.open-cluster-management.io/template-override-configmap";

/// Annotation skipping the host platform version gate
pub const ANNOTATION_IGNORE_OCP_VERSION: &str =
    "installer.open-cluster-management.io/ignore-ocp-version";

/// Annotation carrying a JSON override for the engine subscription spec
pub const ANNOTATION_ENGINE_SUBSCRIPTION_SPEC: &str =
    "installer.open-cluster-management.io/mce-subscription-spec";

/// Annotation stamped on every rendered object with the operator version
pub const ANNOTATION_RELEASE_VERSION: &str = "installer.open-cluster-management.io/release-version";

/// Annotation telling the applier to leave an existing object alone
pub const ANNOTATION_EDITABLE: &str = "installer.open-cluster-management.io/is-editable";

/// Annotation naming the kubeconfig secret in hosted mode
pub const ANNOTATION_ENGINE_KUBECONFIG: &str = "mce-kubeconfig";

/// Deprecated annotations still honoured but logged once
pub const DEPRECATED_ANNOTATIONS: &[&str] = &["ignoreOCPVersion", "mch-imageOverridesCM", "mch-imageRepository"];
