//! Leader election over a coordination Lease
//!
//! Only one replica runs the controller. Every write to the Lease carries the
//! resourceVersion that was read, so two replicas racing for an expired lease
//! cannot both win: the loser gets a 409 and tries again later.

use std::time::Duration;

use chrono::{DateTime, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, PostParams};
use kube::Client;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::Result;

/// Name of the Lease the operator replicas compete for
pub const LEASE_NAME: &str = "multicloudhub-operator-lock";

const LEASE_DURATION: Duration = Duration::from_secs(30);
const RENEW_INTERVAL: Duration = Duration::from_secs(10);
const RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// What to do with the lease as read
#[derive(Clone, Debug, PartialEq, Eq)]
enum Claim {
    /// No lease exists yet
    Create,
    /// We hold it; bump the renew time
    Renew,
    /// Someone else held it but let it expire
    TakeOver {
        /// Transition count to record
        transitions: i32,
    },
    /// Someone else holds a live lease
    Wait,
}

fn expired(spec: &LeaseSpec, now: DateTime<Utc>) -> bool {
    match (&spec.renew_time, spec.lease_duration_seconds) {
        (Some(renewed), Some(secs)) => now > renewed.0 + chrono::Duration::seconds(i64::from(secs)),
        _ => true,
    }
}

fn claim(existing: Option<&Lease>, identity: &str, now: DateTime<Utc>) -> Claim {
    let Some(lease) = existing else {
        return Claim::Create;
    };
    let spec = lease.spec.clone().unwrap_or_default();
    if spec.holder_identity.as_deref() == Some(identity) {
        Claim::Renew
    } else if spec.holder_identity.is_none() || expired(&spec, now) {
        Claim::TakeOver {
            transitions: spec.lease_transitions.unwrap_or(0) + 1,
        }
    } else {
        Claim::Wait
    }
}

/// Competes for the operator Lease
pub struct LeaderElector {
    api: Api<Lease>,
    identity: String,
}

impl LeaderElector {
    /// Elector for `identity` (normally the pod name) in `namespace`
    pub fn new(client: Client, namespace: &str, identity: impl Into<String>) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            identity: identity.into(),
        }
    }

    fn lease(&self, resource_version: Option<String>, spec: LeaseSpec) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(LEASE_NAME.to_string()),
                resource_version,
                ..Default::default()
            },
            spec: Some(spec),
        }
    }

    fn held_spec(&self, now: DateTime<Utc>, acquired: Option<MicroTime>, transitions: i32) -> LeaseSpec {
        LeaseSpec {
            holder_identity: Some(self.identity.clone()),
            lease_duration_seconds: Some(LEASE_DURATION.as_secs() as i32),
            acquire_time: Some(acquired.unwrap_or(MicroTime(now))),
            renew_time: Some(MicroTime(now)),
            lease_transitions: Some(transitions),
            ..Default::default()
        }
    }

    /// One acquire-or-renew attempt; true while we hold the lease
    async fn try_hold(&self) -> Result<bool> {
        let now = Utc::now();
        let existing = self.api.get_opt(LEASE_NAME).await?;
        let version = existing
            .as_ref()
            .and_then(|l| l.metadata.resource_version.clone());

        let lease = match claim(existing.as_ref(), &self.identity, now) {
            Claim::Wait => return Ok(false),
            Claim::Create => {
                let lease = self.lease(None, self.held_spec(now, None, 0));
                return match self.api.create(&PostParams::default(), &lease).await {
                    Ok(_) => {
                        info!(identity = %self.identity, "lease created");
                        Ok(true)
                    }
                    Err(kube::Error::Api(e)) if e.code == 409 => Ok(false),
                    Err(e) => Err(e.into()),
                };
            }
            Claim::Renew => {
                let current = existing.and_then(|l| l.spec).unwrap_or_default();
                let spec = self.held_spec(
                    now,
                    current.acquire_time,
                    current.lease_transitions.unwrap_or(0),
                );
                self.lease(version, spec)
            }
            Claim::TakeOver { transitions } => {
                info!(identity = %self.identity, transitions, "taking over expired lease");
                self.lease(version, self.held_spec(now, None, transitions))
            }
        };

        match self.api.replace(LEASE_NAME, &PostParams::default(), &lease).await {
            Ok(_) => Ok(true),
            Err(kube::Error::Api(e)) if e.code == 409 => {
                debug!(identity = %self.identity, "lease changed underneath us");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Block until the lease is ours, then keep renewing it in the background
    pub async fn acquire(self) -> Result<LeaderGuard> {
        info!(identity = %self.identity, lease = LEASE_NAME, "waiting for leadership");
        loop {
            match self.try_hold().await {
                Ok(true) => break,
                Ok(false) => debug!(identity = %self.identity, "lease held elsewhere"),
                Err(e) => warn!(identity = %self.identity, error = %e, "lease attempt failed"),
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
        info!(identity = %self.identity, "leadership acquired");

        let (lost_tx, lost_rx) = oneshot::channel();
        let renewal = tokio::spawn(async move {
            loop {
                tokio::time::sleep(RENEW_INTERVAL).await;
                match self.try_hold().await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => {
                        warn!(identity = %self.identity, error = %e, "lease renewal failed");
                        break;
                    }
                }
            }
            warn!(identity = %self.identity, "leadership lost");
            let _ = lost_tx.send(());
        });

        Ok(LeaderGuard {
            renewal,
            lost: Some(lost_rx),
        })
    }
}

/// Held while this replica leads; renewal stops when dropped
pub struct LeaderGuard {
    renewal: JoinHandle<()>,
    lost: Option<oneshot::Receiver<()>>,
}

impl LeaderGuard {
    /// Resolve once the lease could not be renewed
    pub async fn lost(&mut self) {
        if let Some(rx) = self.lost.take() {
            let _ = rx.await;
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renewal.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held_by(holder: &str, renewed_secs_ago: i64) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(LEASE_NAME.to_string()),
                resource_version: Some("7".to_string()),
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(holder.to_string()),
                lease_duration_seconds: Some(30),
                renew_time: Some(MicroTime(Utc::now() - chrono::Duration::seconds(renewed_secs_ago))),
                lease_transitions: Some(2),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn missing_lease_is_created() {
        assert_eq!(claim(None, "pod-a", Utc::now()), Claim::Create);
    }

    #[test]
    fn own_lease_is_renewed() {
        assert_eq!(claim(Some(&held_by("pod-a", 5)), "pod-a", Utc::now()), Claim::Renew);
    }

    /// Story: a standby replica waits while the leader keeps renewing, and
    /// takes over once the leader has been silent past the lease duration
    #[test]
    fn story_standby_takes_over_only_after_expiry() {
        let now = Utc::now();
        assert_eq!(claim(Some(&held_by("pod-a", 5)), "pod-b", now), Claim::Wait);
        assert_eq!(
            claim(Some(&held_by("pod-a", 45)), "pod-b", now),
            Claim::TakeOver { transitions: 3 }
        );
    }

    #[test]
    fn released_lease_can_be_taken() {
        let mut lease = held_by("pod-a", 1);
        if let Some(spec) = lease.spec.as_mut() {
            spec.holder_identity = None;
        }
        assert!(matches!(claim(Some(&lease), "pod-b", Utc::now()), Claim::TakeOver { .. }));
    }
}
