//! HTTP implementation of [`ResourceApi`]
//!
//! - `GET  {base}/{endpoint}` for resource lists, answered with `{"data": [...]}`
//! - `POST {base}/{kind}` for mutations
//!
//! A 401 triggers one re-authentication through the shared session and a
//! single retry of the request.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{FieldSyncError, Result};
use crate::sdk::HttpClientConfig;
use crate::session::SessionProvider;
use crate::storage::ResourceRecord;
use crate::sync::{ResourceApi, ResourceType, ResponseEnvelope, SubmitAck};

pub struct HttpResourceApi {
    client: Client,
    base_url: String,
    session: Option<Arc<dyn SessionProvider>>,
}

impl HttpResourceApi {
    pub fn new(
        config: &HttpClientConfig,
        base_url: &str,
        session: Option<Arc<dyn SessionProvider>>,
    ) -> Result<Self> {
        let mut builder = Client::builder();

        if let Some(timeout) = config.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(timeout));
        }

        if let Some(timeout) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| FieldSyncError::Config(format!("failed to build HTTP client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        info!("✅ HTTP client created (base_url: {})", base_url);
        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Send with the current token; on 401 refresh once and resend
    async fn send<F>(&self, build: F) -> Result<Vec<u8>>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let token = match &self.session {
            Some(session) => session.access_token().await?,
            None => None,
        };
        let mut response = Self::authorized(build(&self.client), token.as_deref())
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if let Some(session) = &self.session {
                warn!("401 from server, refreshing session");
                let fresh = session.reauthenticate(token.as_deref()).await?;
                response = Self::authorized(build(&self.client), Some(&fresh))
                    .send()
                    .await?;
            }
        }

        let status = response.status();
        let body = response.bytes().await?.to_vec();
        if status.is_success() {
            return Ok(body);
        }
        Err(FieldSyncError::from_status(status.as_u16(), error_message(&body, status)))
    }

    fn authorized(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Prefer the server's `message` field, fall back to the status reason
fn error_message(body: &[u8], status: StatusCode) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    status
        .canonical_reason()
        .unwrap_or("unexpected status")
        .to_string()
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn fetch(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        let url = self.url(resource_type.endpoint());
        debug!("GET {}", url);
        let body = self.send(|client| client.get(&url)).await?;
        ResponseEnvelope::parse_records(&body)
    }

    async fn submit(&self, kind: &str, payload: &Value) -> Result<SubmitAck> {
        let url = self.url(kind);
        debug!("POST {}", url);
        let body = self.send(|client| client.post(&url).json(payload)).await?;
        if body.is_empty() {
            return Ok(SubmitAck::from_body(Value::Null));
        }
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| FieldSyncError::InvalidData(format!("unexpected submit response: {}", e)))?;
        Ok(SubmitAck::from_body(value))
    }
}
