// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client identity and route normalization for rate-limit keys.

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::request::Parts};

/// Client id used when neither proxy headers nor a peer address are known.
pub const UNKNOWN_CLIENT: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";

/// Resolve the client identifier for a request.
///
/// Order: first `X-Forwarded-For` entry (set by the trusted proxy),
/// then `X-Real-IP`, then the socket peer address, then [`UNKNOWN_CLIENT`].
pub fn client_id_from_parts(parts: &Parts) -> String {
    let from_header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    from_header(FORWARDED_FOR)
        .or_else(|| from_header(REAL_IP))
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Strip trailing slashes so `/v1/transfer/` and `/v1/transfer` share a key.
pub fn normalize_route(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}
