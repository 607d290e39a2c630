// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    rate_limit::rate_limit_middleware,
    state::AppState,
    upstream::{SettlementState, SettlementStatus},
};

pub mod health;
pub mod relay;
pub mod settlement;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/wallet/create", post(relay::create_wallet))
        .route("/transfer", post(relay::transfer))
        .route("/bridge/initiate", post(relay::initiate_bridge))
        .route(
            "/bridge/settlements/{settlement_id}",
            get(settlement::get_settlement),
        )
        .route(
            "/bridge/settlements/{settlement_id}/wait",
            get(settlement::wait_for_settlement),
        );

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        relay::create_wallet,
        relay::transfer,
        relay::initiate_bridge,
        settlement::get_settlement,
        settlement::wait_for_settlement
    ),
    components(
        schemas(
            SettlementStatus,
            SettlementState,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Relay", description = "Rate-limited wallet and bridge mutations"),
        (name = "Settlement", description = "Cross-chain settlement status")
    )
)]
struct ApiDoc;
