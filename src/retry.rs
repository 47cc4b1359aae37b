//! Backoff for operations the operator cannot start without
//!
//! Reconcile passes never sleep; waiting there is a requeue. Startup is
//! different: installing CRDs or reaching the API server must succeed before
//! the controller is worth running, so those calls are retried in place.
//!
//! ```ignore
//! let crds = retry_with_backoff(&Backoff::startup(), "apply hub CRDs", || {
//!     apply_crds(client.clone())
//! })
//! .await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, warn};

/// Exponential backoff schedule with jitter
#[derive(Clone, Debug)]
pub struct Backoff {
    /// Attempts before giving up; 0 retries forever
    pub max_attempts: u32,
    /// Delay after the first failure
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor between attempts
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl Backoff {
    /// Schedule for startup work: ten attempts over roughly two minutes
    pub fn startup() -> Self {
        Self {
            max_attempts: 10,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }

    /// Retry until success
    pub fn forever() -> Self {
        Self::default()
    }

    /// Undithered delay before attempt `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt >= self.max_attempts
    }
}

/// Run `operation` until it succeeds or the schedule runs out
///
/// Returns the last error once `max_attempts` is reached.
pub async fn retry_with_backoff<F, Fut, T, E>(
    backoff: &Backoff,
    what: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let e = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        if backoff.exhausted(attempt) {
            error!(operation = what, attempt, error = %e, "giving up");
            return Err(e);
        }

        // 0.5x to 1.5x so replicas restarting together spread out
        let jitter = rand::thread_rng().gen_range(0.5..1.5);
        let delay = backoff.delay(attempt).mul_f64(jitter);
        warn!(
            operation = what,
            attempt,
            error = %e,
            delay_ms = delay.as_millis() as u64,
            "retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
