//! Bounded, cancellable polling for eventually-consistent external state.
//!
//! Unlike an error-driven retry, the probe here succeeds normally and simply
//! reports "not yet" by returning `None`; the loop waits a fixed interval
//! between empty results and gives up after a fixed number of attempts.

use crate::shutdown::ShutdownSignal;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Maximum number of probes, at least one is always issued
    pub max_attempts: u32,
    /// Sleep between empty results
    pub interval: Duration,
    /// Optional overall budget measured from the first probe
    pub deadline: Option<Duration>,
}

impl PollPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready { value: T, attempts: u32 },
    Exhausted { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Probe until it yields a value, attempts run out, the deadline passes or
/// `shutdown` fires.
///
/// The probe receives the 1-based attempt number. No sleep follows the final
/// attempt.
pub async fn poll_until<F, Fut, T>(
    policy: &PollPolicy,
    shutdown: &ShutdownSignal,
    operation_name: &str,
    mut probe: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        if shutdown.is_cancelled() {
            return PollOutcome::Cancelled { attempts };
        }

        attempts += 1;
        if let Some(value) = probe(attempts).await {
            info!(operation = %operation_name, attempts, "poll condition met");
            return PollOutcome::Ready { value, attempts };
        }

        if attempts >= policy.max_attempts {
            warn!(operation = %operation_name, attempts, "poll attempts exhausted");
            return PollOutcome::Exhausted { attempts };
        }

        if let Some(deadline) = policy.deadline {
            if started.elapsed() + policy.interval > deadline {
                warn!(operation = %operation_name, attempts, ?deadline, "poll deadline reached");
                return PollOutcome::Exhausted { attempts };
            }
        }

        debug!(
            operation = %operation_name,
            attempt = attempts,
            max_attempts = policy.max_attempts,
            delay_ms = policy.interval.as_millis() as u64,
            "condition not met, waiting"
        );

        tokio::select! {
            _ = tokio::time::sleep(policy.interval) => {}
            _ = shutdown.cancelled() => {
                return PollOutcome::Cancelled { attempts };
            }
        }
    }
}
