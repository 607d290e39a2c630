// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Poll-Until
//!
//! Repeatedly run an async probe until it yields a value, the attempt budget
//! runs out, or the caller cancels.
//!
//! ## Strategy
//!
//! 1. Before every probe call, check the cancellation token.
//! 2. `Ok(Some(value))` ends the loop; `Err(e)` is returned as-is and never
//!    retried. Only `Ok(None)` ("not ready yet") triggers another attempt.
//! 3. Between attempts, sleep for the configured delay plus jitter. The sleep
//!    races the cancellation token, so a cancel mid-sleep returns at once.
//!
//! ## Bounds
//!
//! No sleep follows the final attempt, so the total time spent waiting is at
//! most [`PollOptions::max_total_wait`], plus whatever the probe itself takes.
//! Pick upstream HTTP timeouts accordingly.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

const DEFAULT_MAX_POLLS: u32 = 60;
const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

/// Configuration for a single [`poll_until`] call.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Maximum number of probe calls.
    pub max_polls: u32,
    /// Base delay between attempts.
    pub interval: Duration,
    /// Ceiling for the backoff delay; `None` means `interval`.
    pub max_interval: Option<Duration>,
    /// Double the delay after every attempt, up to `max_interval`.
    pub backoff: bool,
    /// Upper bound (exclusive) of the uniform random delay added per sleep.
    pub jitter: Duration,
    /// Token checked before every probe and raced against every sleep.
    pub cancellation: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_polls: DEFAULT_MAX_POLLS,
            interval: DEFAULT_INTERVAL,
            max_interval: None,
            backoff: false,
            jitter: Duration::ZERO,
            cancellation: None,
        }
    }
}

impl PollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    pub fn with_backoff(mut self, backoff: bool) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Effective backoff ceiling.
    pub fn max_interval(&self) -> Duration {
        self.max_interval.unwrap_or(self.interval)
    }

    /// Delay (without jitter) to sleep after the zero-based `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if !self.backoff {
            return self.interval;
        }
        let cap = self.max_interval();
        2u32.checked_pow(attempt)
            .and_then(|factor| self.interval.checked_mul(factor))
            .map_or(cap, |delay| delay.min(cap))
    }

    /// Worst-case total sleep time across all attempts.
    pub fn max_total_wait(&self) -> Duration {
        let step = if self.backoff {
            self.max_interval()
        } else {
            self.interval
        };
        let sleeps = self.max_polls.saturating_sub(1);
        step.saturating_add(self.jitter).saturating_mul(sleeps)
    }
}

/// Why a [`poll_until`] call did not produce a value.
#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("polling was cancelled")]
    Cancelled,

    #[error("condition not met after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("probe failed: {0}")]
    Probe(E),
}

impl<E> PollError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PollError::Cancelled)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout { .. })
    }
}

/// Call `probe` until it returns `Ok(Some(_))`.
///
/// With `max_polls == 0` the probe is never called and the result is
/// `Timeout { attempts: 0 }`.
pub async fn poll_until<T, E, F, Fut>(mut probe: F, options: PollOptions) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let cancel = options.cancellation.clone().unwrap_or_default();

    for attempt in 0..options.max_polls {
        if cancel.is_cancelled() {
            debug!(attempt, "Polling cancelled before probe");
            return Err(PollError::Cancelled);
        }

        match probe().await {
            Ok(Some(value)) => {
                trace!(attempt, "Probe returned a value");
                return Ok(value);
            }
            Ok(None) => {}
            Err(e) => return Err(PollError::Probe(e)),
        }

        if attempt + 1 == options.max_polls {
            break;
        }

        let delay = options
            .delay_for_attempt(attempt)
            .saturating_add(sample_jitter(options.jitter));
        trace!(attempt, delay_ms = delay.as_millis() as u64, "Probe not ready, sleeping");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(attempt, "Polling cancelled during sleep");
                return Err(PollError::Cancelled);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!(attempts = options.max_polls, "Polling gave up");
    Err(PollError::Timeout {
        attempts: options.max_polls,
    })
}

/// Uniform random duration in `[0, bound)`.
fn sample_jitter(bound: Duration) -> Duration {
    let nanos = u64::try_from(bound.as_nanos()).unwrap_or(u64::MAX);
    if nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..nanos))
}
