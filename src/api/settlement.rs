// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Settlement status endpoints.
//!
//! `GET /v1/bridge/settlements/{id}` reads the status once.
//! `GET /v1/bridge/settlements/{id}/wait` polls the back-end until the
//! settlement reaches a terminal state, using [`poll_until`] with backoff.
//! The wait is cancelled on server shutdown, and dropped along with the
//! handler future if the client disconnects.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    poll::{poll_until, PollError, PollOptions},
    state::AppState,
    upstream::{SettlementStatus, UpstreamClient, UpstreamError},
};

const MAX_ID_LEN: usize = 128;

const DEFAULT_MAX_POLLS: u32 = 30;
const MAX_POLLS_LIMIT: u32 = 120;
const DEFAULT_INTERVAL_MS: u64 = 1_000;
const MIN_INTERVAL_MS: u64 = 100;
const MAX_INTERVAL_MS: u64 = 10_000;
const DEFAULT_MAX_INTERVAL_MS: u64 = 8_000;
const MAX_BACKOFF_CEILING_MS: u64 = 60_000;
const WAIT_JITTER: Duration = Duration::from_millis(250);

/// Query parameters for the wait endpoint.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WaitQuery {
    /// Maximum number of status checks (1-120, default 30).
    pub max_polls: Option<u32>,
    /// Base delay between checks in milliseconds (100-10000, default 1000).
    pub interval_ms: Option<u64>,
    /// Backoff ceiling in milliseconds (default 8000, at least `interval_ms`).
    pub max_interval_ms: Option<u64>,
    /// Double the delay after each check (default true).
    pub backoff: Option<bool>,
}

impl WaitQuery {
    fn into_options(self) -> Result<PollOptions, ApiError> {
        let max_polls = self.max_polls.unwrap_or(DEFAULT_MAX_POLLS);
        if !(1..=MAX_POLLS_LIMIT).contains(&max_polls) {
            return Err(ApiError::bad_request(format!(
                "max_polls must be between 1 and {MAX_POLLS_LIMIT}"
            )));
        }

        let interval_ms = self.interval_ms.unwrap_or(DEFAULT_INTERVAL_MS);
        if !(MIN_INTERVAL_MS..=MAX_INTERVAL_MS).contains(&interval_ms) {
            return Err(ApiError::bad_request(format!(
                "interval_ms must be between {MIN_INTERVAL_MS} and {MAX_INTERVAL_MS}"
            )));
        }

        let max_interval_ms = self
            .max_interval_ms
            .unwrap_or(DEFAULT_MAX_INTERVAL_MS.max(interval_ms));
        if !(interval_ms..=MAX_BACKOFF_CEILING_MS).contains(&max_interval_ms) {
            return Err(ApiError::bad_request(format!(
                "max_interval_ms must be between interval_ms and {MAX_BACKOFF_CEILING_MS}"
            )));
        }

        Ok(PollOptions::new()
            .with_max_polls(max_polls)
            .with_interval(Duration::from_millis(interval_ms))
            .with_max_interval(Duration::from_millis(max_interval_ms))
            .with_backoff(self.backoff.unwrap_or(true))
            .with_jitter(WAIT_JITTER))
    }
}

#[derive(Debug, thiserror::Error)]
enum StatusProbeError {
    #[error("settlement not found")]
    NotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

/// `Some` once the settlement is terminal, `None` while it is in flight.
async fn terminal_status(
    upstream: &UpstreamClient,
    settlement_id: &str,
) -> Result<Option<SettlementStatus>, StatusProbeError> {
    match upstream.settlement_status(settlement_id).await? {
        Some(status) if status.state.is_terminal() => Ok(Some(status)),
        Some(_) => Ok(None),
        None => Err(StatusProbeError::NotFound),
    }
}

fn validate_settlement_id(id: &str) -> Result<(), ApiError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ApiError::bad_request("Invalid settlement id"))
    }
}

/// Fetch the current settlement status.
#[utoipa::path(
    get,
    path = "/v1/bridge/settlements/{settlement_id}",
    tag = "Settlement",
    params(("settlement_id" = String, Path, description = "Settlement identifier")),
    responses(
        (status = 200, description = "Current status", body = SettlementStatus),
        (status = 400, description = "Invalid settlement id"),
        (status = 404, description = "Unknown settlement"),
        (status = 502, description = "Upstream unreachable")
    )
)]
pub async fn get_settlement(
    State(state): State<AppState>,
    Path(settlement_id): Path<String>,
) -> Result<Json<SettlementStatus>, ApiError> {
    validate_settlement_id(&settlement_id)?;

    match state.upstream.settlement_status(&settlement_id).await {
        Ok(Some(status)) => Ok(Json(status)),
        Ok(None) => Err(ApiError::not_found("Settlement not found")),
        Err(e) => {
            warn!(settlement_id = %settlement_id, error = %e, "Settlement status fetch failed");
            Err(ApiError::bad_gateway("Upstream service unavailable"))
        }
    }
}

/// Wait until a settlement completes or fails.
#[utoipa::path(
    get,
    path = "/v1/bridge/settlements/{settlement_id}/wait",
    tag = "Settlement",
    params(
        ("settlement_id" = String, Path, description = "Settlement identifier"),
        WaitQuery
    ),
    responses(
        (status = 200, description = "Terminal status", body = SettlementStatus),
        (status = 400, description = "Invalid id or polling parameters"),
        (status = 404, description = "Unknown settlement"),
        (status = 502, description = "Upstream unreachable"),
        (status = 503, description = "Server shutting down"),
        (status = 504, description = "Settlement still pending")
    )
)]
pub async fn wait_for_settlement(
    State(state): State<AppState>,
    Path(settlement_id): Path<String>,
    Query(query): Query<WaitQuery>,
) -> Result<Json<SettlementStatus>, ApiError> {
    validate_settlement_id(&settlement_id)?;
    let options = query
        .into_options()?
        .with_cancellation(state.shutdown.child_token());

    let upstream = &state.upstream;
    let result = poll_until(|| terminal_status(upstream, &settlement_id), options).await;

    match result {
        Ok(status) => {
            info!(settlement_id = %settlement_id, state = ?status.state, "Settlement reached terminal state");
            Ok(Json(status))
        }
        Err(PollError::Timeout { attempts }) => {
            info!(settlement_id = %settlement_id, attempts, "Settlement still pending");
            Err(ApiError::gateway_timeout("Settlement still pending"))
        }
        Err(PollError::Cancelled) => Err(ApiError::unavailable("Server is shutting down")),
        Err(PollError::Probe(StatusProbeError::NotFound)) => {
            Err(ApiError::not_found("Settlement not found"))
        }
        Err(PollError::Probe(StatusProbeError::Upstream(e))) => {
            warn!(settlement_id = %settlement_id, error = %e, "Settlement polling failed");
            Err(ApiError::bad_gateway("Upstream service unavailable"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::test_support::{spawn_backend, FakeBackend, SLOW_SETTLEMENT_POLLS};
    use crate::upstream::SettlementState;
    use axum::http::StatusCode;
    use std::sync::atomic::Ordering;
    use url::Url;

    async fn state_with_backend() -> (AppState, FakeBackend) {
        let (addr, backend) = spawn_backend().await;
        let state = AppState::default()
            .with_upstream_url(Url::parse(&format!("http://{addr}/api")).unwrap())
            .unwrap();
        (state, backend)
    }

    fn fast_query(max_polls: u32) -> WaitQuery {
        WaitQuery {
            max_polls: Some(max_polls),
            interval_ms: Some(MIN_INTERVAL_MS),
            max_interval_ms: Some(MIN_INTERVAL_MS),
            backoff: Some(false),
        }
    }

    #[test]
    fn settlement_id_validation() {
        assert!(validate_settlement_id("abc-123_DEF").is_ok());
        assert!(validate_settlement_id("").is_err());
        assert!(validate_settlement_id("../admin").is_err());
        assert!(validate_settlement_id(&"a".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn query_defaults_produce_backoff_options() {
        let options = WaitQuery::default().into_options().unwrap();
        assert_eq!(options.max_polls, DEFAULT_MAX_POLLS);
        assert_eq!(options.interval, Duration::from_millis(DEFAULT_INTERVAL_MS));
        assert_eq!(options.max_interval(), Duration::from_millis(DEFAULT_MAX_INTERVAL_MS));
        assert!(options.backoff);
        assert_eq!(options.jitter, WAIT_JITTER);
    }

    #[test]
    fn query_bounds_are_enforced() {
        let too_many = WaitQuery {
            max_polls: Some(MAX_POLLS_LIMIT + 1),
            ..Default::default()
        };
        assert!(too_many.into_options().is_err());

        let zero = WaitQuery {
            max_polls: Some(0),
            ..Default::default()
        };
        assert!(zero.into_options().is_err());

        let too_fast = WaitQuery {
            interval_ms: Some(10),
            ..Default::default()
        };
        assert!(too_fast.into_options().is_err());

        let inverted = WaitQuery {
            interval_ms: Some(2_000),
            max_interval_ms: Some(1_000),
            ..Default::default()
        };
        assert!(inverted.into_options().is_err());
    }

    #[test]
    fn max_interval_defaults_to_at_least_interval() {
        let options = WaitQuery {
            interval_ms: Some(MAX_INTERVAL_MS),
            ..Default::default()
        }
        .into_options()
        .unwrap();
        assert_eq!(options.max_interval(), Duration::from_millis(MAX_INTERVAL_MS));
    }

    #[tokio::test]
    async fn get_returns_current_status() {
        let (state, _) = state_with_backend().await;
        let Json(status) = get_settlement(State(state.clone()), Path("abc".to_string()))
            .await
            .unwrap();
        assert_eq!(status.state, SettlementState::Pending);

        let err = get_settlement(State(state), Path("missing".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wait_returns_once_terminal() {
        let (state, backend) = state_with_backend().await;

        let Json(status) = wait_for_settlement(
            State(state),
            Path("slow-1".to_string()),
            Query(fast_query(10)),
        )
        .await
        .unwrap();

        assert_eq!(status.state, SettlementState::Completed);
        assert_eq!(
            backend.status_calls.load(Ordering::SeqCst),
            SLOW_SETTLEMENT_POLLS
        );
    }

    #[tokio::test]
    async fn wait_reports_failed_settlement_as_terminal() {
        let (state, _) = state_with_backend().await;
        let Json(status) =
            wait_for_settlement(State(state), Path("failed".to_string()), Query(fast_query(3)))
                .await
                .unwrap();
        assert_eq!(status.state, SettlementState::Failed);
    }

    #[tokio::test]
    async fn wait_times_out_with_504() {
        let (state, backend) = state_with_backend().await;

        let err = wait_for_settlement(State(state), Path("stuck".to_string()), Query(fast_query(2)))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn wait_maps_unknown_and_broken_settlements() {
        let (state, _) = state_with_backend().await;

        let err = wait_for_settlement(
            State(state.clone()),
            Path("missing".to_string()),
            Query(fast_query(5)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = wait_for_settlement(State(state), Path("broken".to_string()), Query(fast_query(5)))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn wait_is_cancelled_on_shutdown() {
        let (state, backend) = state_with_backend().await;
        state.shutdown.cancel();

        let err = wait_for_settlement(State(state), Path("stuck".to_string()), Query(fast_query(5)))
            .await
            .unwrap_err();

        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }
}
