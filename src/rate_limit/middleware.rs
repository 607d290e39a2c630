// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum middleware applying the rate limiter to configured routes.
//!
//! A rule matches on method and normalized path. The check runs before
//! routing, so `POST /v1/transfer/` counts against the `/v1/transfer` budget
//! even though the router answers it with 404.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/v1/transfer", post(relay::transfer))
//!     .layer(axum::middleware::from_fn_with_state(
//!         state.clone(),
//!         rate_limit_middleware,
//!     ));
//! ```

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use super::{client_id_from_parts, normalize_route};
use crate::error::ApiError;
use crate::state::AppState;

/// Reject requests over the per-client limit with `429 Too Many Requests`.
///
/// Routes without a configured limit pass through untouched.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let route = normalize_route(request.uri().path()).to_string();

    let Some(limit) = state
        .config
        .rate_limit
        .limit_for(request.method().as_str(), &route)
    else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let client_id = client_id_from_parts(&parts);
    let request = Request::from_parts(parts, body);

    let decision = state.rate_limiter.check_and_record_at(
        &client_id,
        &route,
        limit,
        state.config.rate_limit.window,
        std::time::Instant::now(),
    );

    if !decision.admitted {
        warn!(
            client_id = %client_id,
            route = %route,
            limit,
            retry_after_ms = decision.retry_after.as_millis() as u64,
            "Rate limit exceeded"
        );
        return ApiError::too_many_requests(decision.retry_after).into_response();
    }

    next.run(request).await
}
