//! Prometheus metrics for the hub operator
//!
//! The registry belongs to the process rather than the prometheus default
//! registry, so tests can build as many independent instances as they like.

use std::time::Duration;

use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

use crate::crd::{ComponentStatuses, HubPhase};

/// Outcome label for a reconcile pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The pass finished without error
    Success,
    /// The pass returned an error
    Error,
}

impl Outcome {
    fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// Metrics recorded by the reconciler
#[derive(Clone, Debug)]
pub struct HubMetrics {
    reconcile_total: IntCounterVec,
    reconcile_duration: Histogram,
    component_available: GaugeVec,
    phase: GaugeVec,
    registry: Registry,
}

impl HubMetrics {
    /// Create and register every metric
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconcile_total = IntCounterVec::new(
            Opts::new("hub_reconcile_total", "Reconcile passes by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reconcile_total.clone()))?;

        let reconcile_duration = Histogram::with_opts(
            HistogramOpts::new(
                "hub_reconcile_duration_seconds",
                "Wall time of a reconcile pass",
            )
            .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(reconcile_duration.clone()))?;

        let component_available = GaugeVec::new(
            Opts::new(
                "hub_component_available",
                "1 if the component status entry is available",
            ),
            &["component"],
        )?;
        registry.register(Box::new(component_available.clone()))?;

        let phase = GaugeVec::new(
            Opts::new("hub_phase", "1 for the hub's current phase"),
            &["phase"],
        )?;
        registry.register(Box::new(phase.clone()))?;

        Ok(Self {
            reconcile_total,
            reconcile_duration,
            component_available,
            phase,
            registry,
        })
    }

    /// Count a finished pass and observe its duration
    pub fn record_reconcile(&self, outcome: Outcome, elapsed: Duration) {
        self.reconcile_total
            .with_label_values(&[outcome.as_str()])
            .inc();
        self.reconcile_duration.observe(elapsed.as_secs_f64());
    }

    /// Replace the component gauges with the latest status map
    pub fn record_components(&self, components: &ComponentStatuses) {
        self.component_available.reset();
        for (name, status) in components {
            let value = if status.available { 1.0 } else { 0.0 };
            self.component_available
                .with_label_values(&[name.as_str()])
                .set(value);
        }
    }

    /// Set the phase gauge to one-hot on `current`
    pub fn record_phase(&self, current: &HubPhase) {
        for phase in HubPhase::ALL.iter() {
            let value = if phase == current { 1.0 } else { 0.0 };
            self.phase
                .with_label_values(&[phase.to_string().as_str()])
                .set(value);
        }
    }

    /// Registry holding every hub metric
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every metric
    pub fn export_text(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::StatusCondition;

    #[test]
    fn instances_do_not_share_state() {
        let a = HubMetrics::new().expect("metrics");
        let b = HubMetrics::new().expect("metrics");
        a.record_reconcile(Outcome::Success, Duration::from_millis(10));
        assert!(a.export_text().expect("text").contains("hub_reconcile_total{outcome=\"success\"} 1"));
        assert!(!b.export_text().expect("text").contains("outcome=\"success\"} 1"));
    }

    /// Story: the phase gauge is one-hot so dashboards can sum by phase
    #[test]
    fn story_phase_gauge_is_one_hot() {
        let m = HubMetrics::new().expect("metrics");
        m.record_phase(&HubPhase::Installing);
        m.record_phase(&HubPhase::Running);
        let text = m.export_text().expect("text");
        assert!(text.contains("hub_phase{phase=\"Running\"} 1"));
        assert!(text.contains("hub_phase{phase=\"Installing\"} 0"));
    }

    /// Story: a component that drops out of the status map stops being reported
    #[test]
    fn story_component_gauges_follow_latest_map() {
        let m = HubMetrics::new().expect("metrics");
        let mut map = ComponentStatuses::new();
        map.insert(
            "search-v2-operator-controller-manager".to_string(),
            StatusCondition {
                available: true,
                ..Default::default()
            },
        );
        m.record_components(&map);
        assert!(m
            .export_text()
            .expect("text")
            .contains("hub_component_available{component=\"search-v2-operator-controller-manager\"} 1"));

        m.record_components(&ComponentStatuses::new());
        assert!(!m.export_text().expect("text").contains("search-v2-operator"));
    }
}
