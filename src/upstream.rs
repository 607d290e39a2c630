// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the wallet/bridge back-end the relay forwards to.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

/// Per-request timeout for upstream calls.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);

const PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(StatusCode),

    #[error("invalid upstream URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("upstream returned HTTP {status} with a non-JSON body: {source}")]
    InvalidBody {
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },
}

/// Lifecycle of a cross-chain settlement as reported by the back-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SettlementState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SettlementState {
    /// Whether no further transitions are expected.
    pub fn is_terminal(self) -> bool {
        matches!(self, SettlementState::Completed | SettlementState::Failed)
    }
}

/// Settlement status document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SettlementStatus {
    pub id: String,
    pub state: SettlementState,
    /// Destination-chain transaction digest, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Thin JSON client for the upstream service.
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: Url,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(base_url: Url) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, UpstreamError> {
        // Keep any path prefix on the base URL.
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    /// Whether the back-end answers HTTP at all. Any status counts.
    pub async fn ping(&self) -> bool {
        self.client
            .get(self.base_url.clone())
            .timeout(PING_TIMEOUT)
            .send()
            .await
            .is_ok()
    }

    /// POST `body` to `path` and hand back the upstream status and JSON body.
    ///
    /// An empty upstream body comes back as `null`; any other body must be
    /// JSON or the call fails with [`UpstreamError::InvalidBody`].
    pub async fn forward(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(StatusCode, serde_json::Value), UpstreamError> {
        let url = self.endpoint(path)?;
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok((status, serde_json::Value::Null));
        }
        let json = serde_json::from_slice(&bytes)
            .map_err(|source| UpstreamError::InvalidBody { status, source })?;
        Ok((status, json))
    }

    /// Fetch the current status of a settlement; `None` if the back-end does
    /// not know the id.
    pub async fn settlement_status(
        &self,
        settlement_id: &str,
    ) -> Result<Option<SettlementStatus>, UpstreamError> {
        let url = self.endpoint(&format!("bridge/settlements/{settlement_id}"))?;
        let response = self.client.get(url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(UpstreamError::Status(status)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::spawn_backend;
    use super::*;

    async fn client() -> UpstreamClient {
        let (addr, _) = spawn_backend().await;
        UpstreamClient::new(Url::parse(&format!("http://{addr}/api")).unwrap()).unwrap()
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = UpstreamClient::new(Url::parse("http://solver.internal/api").unwrap()).unwrap();
        assert_eq!(
            client.endpoint("/transfer").unwrap().as_str(),
            "http://solver.internal/api/transfer"
        );

        let client = UpstreamClient::new(Url::parse("http://solver.internal").unwrap()).unwrap();
        assert_eq!(
            client.endpoint("bridge/initiate").unwrap().as_str(),
            "http://solver.internal/bridge/initiate"
        );
    }

    #[test]
    fn terminal_states() {
        assert!(SettlementState::Completed.is_terminal());
        assert!(SettlementState::Failed.is_terminal());
        assert!(!SettlementState::Pending.is_terminal());
        assert!(!SettlementState::Processing.is_terminal());
    }

    #[tokio::test]
    async fn forward_passes_status_and_body_through() {
        let client = client().await;

        let (status, body) = client
            .forward("/wallet/create", &serde_json::json!({ "owner": "alice" }))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["echo"]["owner"], "alice");

        let (status, body) = client
            .forward("/transfer", &serde_json::json!({ "amount": "1" }))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "insufficient balance");
    }

    #[tokio::test]
    async fn forward_rejects_non_json_body() {
        let client = client().await;

        let err = client
            .forward("/text", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidBody { status, .. } if status == StatusCode::OK));

        let (status, body) = client.forward("/empty", &serde_json::json!({})).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn settlement_status_maps_responses() {
        let client = client().await;

        let done = client.settlement_status("done").await.unwrap().unwrap();
        assert_eq!(done.state, SettlementState::Completed);
        assert_eq!(done.tx_digest.as_deref(), Some("0xdigest"));

        let pending = client.settlement_status("abc").await.unwrap().unwrap();
        assert_eq!(pending.state, SettlementState::Pending);
        assert!(pending.tx_digest.is_none());

        assert!(client.settlement_status("missing").await.unwrap().is_none());

        let err = client.settlement_status("broken").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
    }
}
