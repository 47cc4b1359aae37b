//! Controller for MultiClusterHub resources
//!
//! The reconciler follows an observe-diff-act loop. Each step of the pipeline
//! returns a [`Flow`] telling the caller whether to keep going, stop and
//! requeue, or stop for good. Status is written after the pipeline no matter
//! where it stopped.

mod client;
mod context;
mod defaults;
mod engine;
mod finalizer;
mod hosted;
mod infra;
mod lifecycle;
mod reconcile;
mod removals;
mod sts;

use std::time::Duration;

use kube::runtime::controller::Action;

pub use client::{typed, HubClient, KubeHubClient};
pub use context::{Context, ContextBuilder, PlatformInfo, ReconcileState};
pub use defaults::{apply_defaults, deprecated_fields};
pub use engine::{version_at_least, MIN_ENGINE_VERSION};
pub use reconcile::{error_policy, reconcile};

#[cfg(test)]
pub use client::MockHubClient;

/// Result of one pipeline step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Run the next step
    Continue,
    /// Stop this pass and run again after the delay
    Requeue(Duration),
    /// Stop this pass; nothing is scheduled
    Done,
}

impl Flow {
    /// True if the pipeline should keep going
    pub fn is_continue(self) -> bool {
        matches!(self, Flow::Continue)
    }

    /// Requeue delay, if any
    pub fn delay(self) -> Option<Duration> {
        match self {
            Flow::Requeue(d) => Some(d),
            _ => None,
        }
    }

    /// The earlier of two requeues; a requeue beats no requeue
    pub fn sooner(self, other: Flow) -> Flow {
        match (self.delay(), other.delay()) {
            (Some(a), Some(b)) => Flow::Requeue(a.min(b)),
            (Some(_), None) => self,
            (None, Some(_)) => other,
            (None, None) => self,
        }
    }

    /// Controller action for this flow
    pub fn into_action(self) -> Action {
        match self {
            Flow::Requeue(d) => Action::requeue(d),
            Flow::Continue | Flow::Done => Action::await_change(),
        }
    }
}
