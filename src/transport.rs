//! Pluggable GraphQL transport
//!
//! The client only sees [`GraphqlTransport`]; production traffic goes through
//! [`HttpTransport`] on reqwest, while tests may substitute a scripted
//! transport to exercise retry and classification paths without a network.

use crate::error::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde_json::{Value, json};
use std::time::Duration;

static USER_AGENT_VALUE: Lazy<String> =
    Lazy::new(|| format!("polpo/{}", env!("CARGO_PKG_VERSION")));

/// Executes a single GraphQL operation against the provider
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// POST the operation and return the raw response document
    ///
    /// `auth_token`, when present, is sent verbatim in the `Authorization`
    /// header; the Kraken API expects the bare token with no `Bearer` prefix.
    async fn execute(
        &self,
        query: &str,
        variables: Value,
        auth_token: Option<&str>,
    ) -> Result<Value>;
}

/// HTTPS transport for the Kraken GraphQL endpoint
pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport for the given endpoint with a per-request timeout
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn execute(
        &self,
        query: &str,
        variables: Value,
        auth_token: Option<&str>,
    ) -> Result<Value> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, USER_AGENT_VALUE.as_str())
            .json(&json!({ "query": query, "variables": variables }));

        if let Some(token) = auth_token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request.send().await?;
        let body: Value = response.json().await?;
        Ok(body)
    }
}
