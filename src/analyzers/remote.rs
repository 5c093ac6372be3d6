//! Analyzers backed by an external tool server.
//!
//! Request: `POST <endpoint>` with `{"tool": "<tool_name>", "arguments": {...}}`
//! and an optional bearer token. Response: `{"score": <int>, "evidence": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Analyzer, AnalyzerInput};
use crate::error::{AnalyzerError, ConfigError};
use crate::triage::types::{Signal, SignalKind};

/// How much of an error body is kept in the failure reason.
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct ToolResponse {
    score: i64,
    #[serde(default)]
    evidence: String,
}

/// Calls a remote tool endpoint for one signal.
pub struct RemoteAnalyzer {
    kind: SignalKind,
    name: String,
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Option<Duration>,
    client: reqwest::Client,
}

impl RemoteAnalyzer {
    pub fn new(
        kind: SignalKind,
        endpoint: impl Into<String>,
        api_key: Option<SecretString>,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mailguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            kind,
            name: format!("remote:{}", kind.tool_name()),
            endpoint: endpoint.into(),
            api_key,
            timeout: None,
            client,
        })
    }

    /// Override the coordinator's default timeout for this analyzer.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Analyzer for RemoteAnalyzer {
    fn kind(&self) -> SignalKind {
        self.kind
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn analyze(&self, input: &AnalyzerInput) -> Result<Signal, AnalyzerError> {
        if input.kind() != self.kind {
            return Err(AnalyzerError::InvalidResponse {
                name: self.name.clone(),
                reason: format!("received {} input", input.kind()),
            });
        }

        let body = json!({
            "tool": self.kind.tool_name(),
            "arguments": input.arguments(),
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        debug!(analyzer = %self.name, endpoint = %self.endpoint, "Calling remote analyzer");

        let response = request
            .send()
            .await
            .map_err(|e| AnalyzerError::Transport {
                name: self.name.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(ERROR_BODY_CHARS).collect();
            return Err(AnalyzerError::Failed {
                name: self.name.clone(),
                reason: format!("HTTP {status}: {excerpt}"),
            });
        }

        let payload: ToolResponse =
            response
                .json()
                .await
                .map_err(|e| AnalyzerError::InvalidResponse {
                    name: self.name.clone(),
                    reason: e.to_string(),
                })?;

        Ok(Signal::new(payload.score, payload.evidence))
    }
}
