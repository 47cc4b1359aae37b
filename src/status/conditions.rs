//! Hub condition model
//!
//! Conditions are unique by type. Writing a condition with the same status and
//! reason leaves the stored entry untouched; writing the same status with a new
//! reason keeps the transition time.

use chrono::Utc;

use crate::crd::{ConditionStatus, HubCondition, MultiClusterHubStatus};

/// Condition type tracking in-flight work
pub const PROGRESSING: &str = "Progressing";
/// Condition type set once every component is available
pub const COMPLETE: &str = "Complete";
/// Condition type set while the hub is being deleted
pub const TERMINATING: &str = "Terminating";
/// Condition type that holds an upgrade back
pub const BLOCKED: &str = "Blocked";
/// Prefix of per-resource apply failure condition types
pub const FAILURE_PREFIX: &str = "ComponentFailure";

/// Reasons written by the operator
pub mod reason {
    /// Every component is available
    pub const COMPONENTS_AVAILABLE: &str = "ComponentsAvailable";
    /// At least one component is unavailable
    pub const COMPONENTS_UNAVAILABLE: &str = "ComponentsUnavailable";
    /// A rendered object is being moved to a new version
    pub const COMPONENTS_UPDATING: &str = "ComponentsUpdating";
    /// A rendered object failed to apply
    pub const FAILED_APPLYING_COMPONENT: &str = "FailedApplyingComponent";
    /// A legacy resource was removed
    pub const OLD_RESOURCE_DELETED: &str = "OldResourceDeleted";
    /// A legacy resource could not be removed yet
    pub const OLD_RESOURCE_DELETE_FAILED: &str = "OldResourceDeleteFailed";
    /// Every legacy resource is gone
    pub const ALL_OLD_RESOURCES_DELETED: &str = "AllOldResourcesDeleted";
    /// The deletion timestamp is set
    pub const DELETION_TIMESTAMP_PRESENT: &str = "DeletionTimestampPresent";
    /// Reconciliation paused by annotation
    pub const PAUSED: &str = "MCHPaused";
    /// Reconciliation resumed after a pause
    pub const RESUMED: &str = "MCHResumed";
    /// Generic reconciling reason
    pub const RECONCILING: &str = "MCHReconciling";
    /// Waiting for application helm releases to go away
    pub const HELM_RELEASE_TERMINATING: &str = "HelmReleaseTerminating";
    /// Chart rendering failed
    pub const FAILED_RENDERING: &str = "FailedRenderingResource";
    /// CRD rendering failed
    pub const FAILED_RENDERING_CRD: &str = "FailedRenderingCRD";
    /// A prerequisite could not be ensured
    pub const PREREQUISITE_FAILED: &str = "PrerequisiteFailed";
    /// The host platform is older than supported
    pub const PLATFORM_UNSUPPORTED: &str = "PlatformVersionUnsupported";
    /// The engine has not reached the required version
    pub const ENGINE_NOT_READY: &str = "MultiClusterEngineNotReady";
    /// The image manifest could not be resolved
    pub const IMAGES_UNAVAILABLE: &str = "ImageOverridesUnavailable";
    /// The hosted kubeconfig secret is not configured
    pub const KUBECONFIG_MISSING: &str = "HostedKubeconfigMissing";
}

impl HubCondition {
    /// Create a condition stamped with the current time
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            type_: type_.into(),
            status,
            last_update_time: Some(now),
            last_transition_time: Some(now),
            reason: reason.into(),
            message: message.into(),
        }
    }
}

/// Condition type for a failed apply of `name` of `kind`
pub fn failure_type(name: &str, kind: &str) -> String {
    format!("{FAILURE_PREFIX}: {name} (Kind:{kind})")
}

impl MultiClusterHubStatus {
    /// Condition of the given type, if present
    pub fn condition(&self, type_: &str) -> Option<&HubCondition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// True if a condition of the given type is present
    pub fn has_condition(&self, type_: &str) -> bool {
        self.condition(type_).is_some()
    }

    /// Insert or replace a condition, preserving identity rules
    pub fn set_condition(&mut self, mut condition: HubCondition) {
        if let Some(current) = self.condition(&condition.type_) {
            if current.status == condition.status && current.reason == condition.reason {
                return;
            }
            if current.status == condition.status {
                condition.last_transition_time = current.last_transition_time;
            }
        }
        self.remove_condition(&condition.type_);
        self.conditions.push(condition);
    }

    /// Remove every condition of the given type
    pub fn remove_condition(&mut self, type_: &str) {
        self.conditions.retain(|c| c.type_ != type_);
    }

    /// Drop per-resource failure conditions from a previous pass
    pub fn strip_failures(&mut self) -> bool {
        let before = self.conditions.len();
        self.conditions
            .retain(|c| !c.type_.starts_with(FAILURE_PREFIX));
        before != self.conditions.len()
    }

    /// True if any per-resource failure condition is present
    pub fn has_failure(&self) -> bool {
        self.conditions
            .iter()
            .any(|c| c.type_.starts_with(FAILURE_PREFIX))
    }

    /// True while legacy resources are still being pruned
    pub fn is_pruning(&self) -> bool {
        self.condition(PROGRESSING).is_some_and(|c| {
            c.reason == reason::OLD_RESOURCE_DELETED
                || c.reason == reason::OLD_RESOURCE_DELETE_FAILED
        })
    }

    /// True if the Progressing condition records a pause
    pub fn is_paused(&self) -> bool {
        self.condition(PROGRESSING)
            .is_some_and(|c| c.reason == reason::PAUSED)
    }
}
