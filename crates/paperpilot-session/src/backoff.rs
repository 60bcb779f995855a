// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Reconnect backoff for the event stream, exponential with jitter.
//
// The stream itself never gives up: a document under review must keep
// receiving pushes for as long as its session is open.  Only the delay
// between attempts grows.

use std::time::Duration;

use paperpilot_core::ClientConfig;
use paperpilot_core::error::PaperPilotError;
use paperpilot_core::types::ErrorClass;
use tracing::{debug, warn};

/// Reconnect configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl From<&ClientConfig> for BackoffConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            base_delay: config.reconnect_base_delay(),
            max_delay: config.reconnect_max_delay(),
        }
    }
}

/// Delay before reconnect attempt number `attempt` (0-based) after `err`.
///
/// Permanent errors (e.g. the server rejecting the stream URL) jump straight
/// to the maximum delay instead of hammering the server.
pub fn reconnect_delay(err: &PaperPilotError, attempt: u32, config: &BackoffConfig) -> Duration {
    match err.class() {
        ErrorClass::Transient => {
            let delay = compute_delay(attempt, config);
            debug!(attempt, delay_ms = delay.as_millis(), "scheduling reconnect");
            delay
        }
        class => {
            warn!(?class, error = %err, "event stream rejected, backing off to maximum delay");
            config.max_delay
        }
    }
}

/// Compute exponential backoff delay with jitter.
///
/// delay = min(base * 2^attempt + jitter, max_delay)
/// jitter is a value in [0, base) to spread out reconnecting clients.
pub fn compute_delay(attempt: u32, config: &BackoffConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << attempt.min(10));

    let jitter_ms = jitter(base_ms, attempt);
    let total_ms = exp_ms.saturating_add(jitter_ms);
    let capped_ms = total_ms.min(config.max_delay.as_millis() as u64);

    Duration::from_millis(capped_ms)
}

/// Deterministic jitter: a multiplicative hash of the attempt number,
/// reduced into [0, base).
fn jitter(base_ms: u64, attempt: u32) -> u64 {
    let hash = (attempt as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
