// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Rate Limiter
//!
//! Fixed-window request counting per `(client, route)` pair.
//!
//! ## Strategy
//!
//! 1. The first request for a key (or the first after its window expired)
//!    opens a window of `window` length with `count = 1` and is admitted.
//! 2. Every later request inside the window increments `count` and is
//!    admitted while `count <= limit`.
//! 3. A background sweeper drops expired entries so abandoned clients do not
//!    grow the map without bound.
//!
//! A client can get up to `2 × limit` requests through across a window
//! boundary. This is accepted: the limiter is coarse abuse deterrence on a
//! handful of mutation routes, not a fairness guarantee.

pub mod client;
pub mod middleware;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub use client::{client_id_from_parts, normalize_route, UNKNOWN_CLIENT};
pub use middleware::rate_limit_middleware;

/// Request count for one `(client, route)` key within the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub reset_at: Instant,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub admitted: bool,
    /// Time left until the key's window resets.
    pub retry_after: Duration,
}

/// In-process registry of rate-limit windows.
///
/// Constructed explicitly and shared through `AppState`, so independent
/// instances never see each other's counts.
#[derive(Debug, Default)]
pub struct RateLimitStore {
    entries: Mutex<HashMap<String, RateLimitEntry>>,
}

impl RateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a request and report whether it is admitted.
    pub fn check_and_record(
        &self,
        client_id: &str,
        route: &str,
        limit: u32,
        window: Duration,
    ) -> bool {
        self.check_and_record_at(client_id, route, limit, window, Instant::now())
            .admitted
    }

    /// Same as [`check_and_record`](Self::check_and_record) with an explicit
    /// clock reading.
    pub fn check_and_record_at(
        &self,
        client_id: &str,
        route: &str,
        limit: u32,
        window: Duration,
        now: Instant,
    ) -> RateLimitDecision {
        let key = format!("{client_id}:{route}");
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match entries.get_mut(&key) {
            Some(entry) if now <= entry.reset_at => {
                entry.count = entry.count.saturating_add(1);
                RateLimitDecision {
                    admitted: entry.count <= limit,
                    retry_after: entry.reset_at.saturating_duration_since(now),
                }
            }
            _ => {
                entries.insert(
                    key,
                    RateLimitEntry {
                        count: 1,
                        reset_at: now + window,
                    },
                );
                RateLimitDecision {
                    admitted: true,
                    retry_after: window,
                }
            }
        }
    }

    /// Remove every entry whose window has already passed.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.reset_at);
        before - entries.len()
    }

    /// Current entry for a key, if any.
    pub fn entry(&self, client_id: &str, route: &str) -> Option<RateLimitEntry> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.get(&format!("{client_id}:{route}")).copied()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sweep expired entries every `interval` until `shutdown` fires.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(store.clone().run_sweeper(window, shutdown.clone()));
    /// ```
    pub async fn run_sweeper(
        self: std::sync::Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Rate limit sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Rate limit sweeper shutting down");
                    return;
                }
            }

            let removed = self.sweep_expired(Instant::now());
            if removed > 0 {
                debug!(
                    removed,
                    remaining = self.len(),
                    "Swept expired rate limit entries"
                );
            }
        }
    }
}
