// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::AppConfig;
use crate::rate_limit::RateLimitStore;
use crate::upstream::{UpstreamClient, UpstreamError};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rate_limiter: Arc<RateLimitStore>,
    pub upstream: UpstreamClient,
    /// Cancelled on shutdown; long-running waits listen on child tokens.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, shutdown: CancellationToken) -> Result<Self, UpstreamError> {
        let upstream = UpstreamClient::new(config.upstream_url.clone())?;
        Ok(Self {
            config: Arc::new(config),
            rate_limiter: Arc::new(RateLimitStore::new()),
            upstream,
            shutdown,
        })
    }

    /// Same state pointed at a different upstream.
    pub fn with_upstream_url(mut self, url: Url) -> Result<Self, UpstreamError> {
        self.upstream = UpstreamClient::new(url.clone())?;
        let mut config = (*self.config).clone();
        config.upstream_url = url;
        self.config = Arc::new(config);
        Ok(self)
    }
}

/// Default configuration with a fresh shutdown token, for tests.
#[cfg(test)]
impl Default for AppState {
    fn default() -> Self {
        let config = AppConfig::from_lookup(|_| None)
            .expect("built-in defaults form a valid configuration");
        Self::new(config, CancellationToken::new())
            .expect("default HTTP client builds")
    }
}
