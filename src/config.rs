// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values, and the
//! static rate-limit route table. Configuration is loaded from the
//! environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `UPSTREAM_URL` | Base URL of the wallet/bridge back-end | `http://127.0.0.1:4000` |
//! | `RATE_LIMIT_WINDOW_MS` | Rate-limit window length in milliseconds | `60000` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

/// Environment variable name for the bind host.
pub const HOST_ENV: &str = "HOST";

/// Environment variable name for the bind port.
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the upstream back-end base URL.
///
/// Relay and settlement routes forward to paths under this URL.
pub const UPSTREAM_URL_ENV: &str = "UPSTREAM_URL";

/// Environment variable name for the rate-limit window length.
pub const RATE_LIMIT_WINDOW_ENV: &str = "RATE_LIMIT_WINDOW_MS";

/// Environment variable name for the log output format.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_URL: &str = "http://127.0.0.1:4000";

/// Default rate-limit window (60 seconds).
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_millis(60_000);

/// Request limit for a single rate-limited route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    /// HTTP method the limit applies to.
    pub method: &'static str,
    /// Normalized request path.
    pub route: &'static str,
    /// Max requests per client per window.
    pub limit: u32,
}

/// Routes protected by the rate limiter. Anything not listed passes through.
pub const RATE_LIMIT_RULES: &[RateLimitRule] = &[
    RateLimitRule {
        method: "POST",
        route: "/v1/wallet/create",
        limit: 5,
    },
    RateLimitRule {
        method: "POST",
        route: "/v1/transfer",
        limit: 10,
    },
    RateLimitRule {
        method: "POST",
        route: "/v1/bridge/initiate",
        limit: 10,
    },
];

/// Configuration errors raised while reading the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid port: {value}")]
    InvalidPort { var: &'static str, value: String },

    #[error("{var} is not a valid bind address: {value}")]
    InvalidAddress { var: &'static str, value: String },

    #[error("{var} is not a valid http(s) URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} must be a positive number of milliseconds, got {value}")]
    InvalidWindow { var: &'static str, value: String },
}

/// Rate limiter settings: the window length plus the static route table.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub rules: &'static [RateLimitRule],
}

impl RateLimitConfig {
    /// Look up the limit configured for a method and normalized route.
    pub fn limit_for(&self, method: &str, route: &str) -> Option<u32> {
        self.rules
            .iter()
            .find(|rule| rule.route == route && rule.method.eq_ignore_ascii_case(method))
            .map(|rule| rule.limit)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_RATE_LIMIT_WINDOW,
            rules: RATE_LIMIT_RULES,
        }
    }
}

/// Process-wide configuration loaded at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub upstream_url: Url,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());

        let port = match lookup(PORT_ENV) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                var: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };

        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|_| ConfigError::InvalidAddress {
                    var: HOST_ENV,
                    value: host.clone(),
                })?;

        let upstream_raw =
            lookup(UPSTREAM_URL_ENV).unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());
        let upstream_url = parse_upstream_url(&upstream_raw)?;

        let window = match lookup(RATE_LIMIT_WINDOW_ENV) {
            Some(value) => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => {
                    return Err(ConfigError::InvalidWindow {
                        var: RATE_LIMIT_WINDOW_ENV,
                        value,
                    })
                }
            },
            None => DEFAULT_RATE_LIMIT_WINDOW,
        };

        Ok(Self {
            bind_addr,
            upstream_url,
            rate_limit: RateLimitConfig {
                window,
                rules: RATE_LIMIT_RULES,
            },
        })
    }
}

fn parse_upstream_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        var: UPSTREAM_URL_ENV,
        value: raw.to_string(),
    };
    let url = Url::parse(raw).map_err(|_| invalid())?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(invalid()),
    }
}
