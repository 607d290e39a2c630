// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay endpoints for wallet and bridge mutations.
//!
//! Each handler checks that the body is a JSON object and forwards it to the
//! matching upstream path. The upstream status and body come back verbatim.
//! All three routes are rate limited (see `config::RATE_LIMIT_RULES`).

use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use tracing::{info, warn};

use crate::{error::ApiError, state::AppState, upstream::UpstreamError};

async fn relay(
    state: &AppState,
    upstream_path: &str,
    body: Value,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if !body.is_object() {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    }

    match state.upstream.forward(upstream_path, &body).await {
        Ok((status, response)) => {
            info!(path = upstream_path, status = status.as_u16(), "Relayed request");
            Ok((status, Json(response)))
        }
        Err(e @ UpstreamError::InvalidBody { .. }) => {
            warn!(path = upstream_path, error = %e, "Upstream returned a non-JSON body");
            Err(ApiError::bad_gateway("Upstream returned an invalid response"))
        }
        Err(e) => {
            warn!(path = upstream_path, error = %e, "Upstream relay failed");
            Err(ApiError::bad_gateway("Upstream service unavailable"))
        }
    }
}

/// Create a custodial wallet.
#[utoipa::path(
    post,
    path = "/v1/wallet/create",
    tag = "Relay",
    responses(
        (status = 200, description = "Upstream response, passed through"),
        (status = 400, description = "Body is not a JSON object"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 502, description = "Upstream unreachable")
    )
)]
pub async fn create_wallet(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    relay(&state, "/wallet/create", body).await
}

/// Transfer funds from a custodial wallet.
#[utoipa::path(
    post,
    path = "/v1/transfer",
    tag = "Relay",
    responses(
        (status = 200, description = "Upstream response, passed through"),
        (status = 400, description = "Body is not a JSON object"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 502, description = "Upstream unreachable")
    )
)]
pub async fn transfer(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    relay(&state, "/transfer", body).await
}

/// Start a cross-chain bridge settlement.
#[utoipa::path(
    post,
    path = "/v1/bridge/initiate",
    tag = "Relay",
    responses(
        (status = 200, description = "Upstream response, passed through"),
        (status = 400, description = "Body is not a JSON object"),
        (status = 429, description = "Rate limit exceeded"),
        (status = 502, description = "Upstream unreachable")
    )
)]
pub async fn initiate_bridge(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    relay(&state, "/bridge/initiate", body).await
}
