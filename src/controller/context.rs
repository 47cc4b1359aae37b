//! Shared controller context
//!
//! The context carries the client seams, operator configuration and the small
//! amount of state that must survive between passes. That state lives here,
//! behind locks, instead of in process globals.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kube::Client;
use parking_lot::Mutex;

use super::client::{HubClient, KubeHubClient};
use crate::components::Registry;
use crate::config::OperatorConfig;
use crate::crd::ComponentStatuses;
use crate::metrics::HubMetrics;
use crate::render::{Applier, ChartRenderer, KubeApplier, Renderer};
use crate::status::aggregate::log_availability_transitions;
use crate::{Error, Result};

/// Facts about the host platform discovered during infra setup
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    /// Platform version, e.g. `4.15.2`
    pub version: Option<String>,
    /// Cluster ingress domain
    pub ingress_domain: Option<String>,
    /// API server URL
    pub api_url: Option<String>,
}

/// State retained across passes
///
/// Every value here is a cache or a log-edge detector; nothing of record.
#[derive(Debug, Default)]
pub struct ReconcileState {
    availability: Mutex<HashMap<String, bool>>,
    sts: Mutex<Option<bool>>,
    platform: Mutex<PlatformInfo>,
    deprecated_logged: Mutex<HashSet<(String, String)>>,
}

impl ReconcileState {
    /// Log availability flips since the previous pass
    pub fn log_transitions(&self, components: &ComponentStatuses) -> usize {
        log_availability_transitions(&mut self.availability.lock(), components)
    }

    /// Record the latest STS posture; returns the previous value
    pub fn swap_sts(&self, enabled: bool) -> Option<bool> {
        self.sts.lock().replace(enabled)
    }

    /// Last STS posture, if detected
    pub fn sts(&self) -> Option<bool> {
        *self.sts.lock()
    }

    /// Snapshot of the platform facts
    pub fn platform(&self) -> PlatformInfo {
        self.platform.lock().clone()
    }

    /// Update platform facts in place; returns whether anything changed
    pub fn update_platform(&self, f: impl FnOnce(&mut PlatformInfo)) -> bool {
        let mut platform = self.platform.lock();
        let before = platform.clone();
        f(&mut platform);
        *platform != before
    }

    /// True the first time `field` is reported for `hub`
    pub fn first_deprecation(&self, hub: &str, field: &str) -> bool {
        self.deprecated_logged
            .lock()
            .insert((hub.to_string(), field.to_string()))
    }
}

/// Shared context for the hub controller
///
/// ```ignore
/// let ctx = Context::builder(client, OperatorConfig::from_env()).build()?;
/// ```
pub struct Context {
    /// Cluster access
    pub client: Arc<dyn HubClient>,
    /// Chart renderer
    pub renderer: Arc<dyn Renderer>,
    /// Writer for rendered objects
    pub applier: Arc<dyn Applier>,
    /// Environment-driven configuration
    pub config: OperatorConfig,
    /// Prometheus metrics
    pub metrics: Arc<HubMetrics>,
    /// Caches and log-edge state
    pub state: ReconcileState,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client, config: OperatorConfig) -> ContextBuilder {
        ContextBuilder::new(client, config)
    }

    /// Component table for the configured package mode
    ///
    /// An illegal package mode surfaces here on every pass.
    pub fn registry(&self) -> Result<Registry> {
        Ok(Registry::new(self.config.package_mode()?))
    }

    /// Create a context for testing with mock seams
    #[cfg(test)]
    pub fn for_testing(
        client: Arc<dyn HubClient>,
        renderer: Arc<dyn Renderer>,
        applier: Arc<dyn Applier>,
        config: OperatorConfig,
    ) -> Self {
        Self {
            client,
            renderer,
            applier,
            config,
            metrics: Arc::new(HubMetrics::new().expect("metrics registry")),
            state: ReconcileState::default(),
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    client: Client,
    config: OperatorConfig,
    hub_client: Option<Arc<dyn HubClient>>,
    renderer: Option<Arc<dyn Renderer>>,
    applier: Option<Arc<dyn Applier>>,
    metrics: Option<Arc<HubMetrics>>,
}

impl ContextBuilder {
    fn new(client: Client, config: OperatorConfig) -> Self {
        Self {
            client,
            config,
            hub_client: None,
            renderer: None,
            applier: None,
            metrics: None,
        }
    }

    /// Override the cluster client (primarily for testing)
    pub fn hub_client(mut self, client: Arc<dyn HubClient>) -> Self {
        self.hub_client = Some(client);
        self
    }

    /// Override the renderer
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Override the applier
    pub fn applier(mut self, applier: Arc<dyn Applier>) -> Self {
        self.applier = Some(applier);
        self
    }

    /// Share a metrics instance with the metrics server
    pub fn metrics(mut self, metrics: Arc<HubMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the Context
    pub fn build(self) -> Result<Context> {
        let metrics = match self.metrics {
            Some(m) => m,
            None => Arc::new(
                HubMetrics::new().map_err(|e| Error::internal(format!("metrics: {e}")))?,
            ),
        };
        Ok(Context {
            client: self
                .hub_client
                .unwrap_or_else(|| Arc::new(KubeHubClient::new(self.client.clone()))),
            renderer: self
                .renderer
                .unwrap_or_else(|| Arc::new(ChartRenderer::new())),
            applier: self
                .applier
                .unwrap_or_else(|| Arc::new(KubeApplier::new(self.client.clone()))),
            config: self.config,
            metrics,
            state: ReconcileState::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sts_swap_reports_previous_value() {
        let state = ReconcileState::default();
        assert_eq!(state.swap_sts(true), None);
        assert_eq!(state.swap_sts(false), Some(true));
        assert_eq!(state.sts(), Some(false));
    }

    #[test]
    fn platform_update_reports_change() {
        let state = ReconcileState::default();
        assert!(state.update_platform(|p| p.version = Some("4.15.0".to_string())));
        assert!(!state.update_platform(|p| p.version = Some("4.15.0".to_string())));
        assert_eq!(state.platform().version.as_deref(), Some("4.15.0"));
    }

    /// Story: each deprecated field is reported once per hub
    #[test]
    fn story_deprecations_are_reported_once_per_hub() {
        let state = ReconcileState::default();
        assert!(state.first_deprecation("ns/a", "hive"));
        assert!(!state.first_deprecation("ns/a", "hive"));
        assert!(state.first_deprecation("ns/b", "hive"));
    }
}
