//! HTTP transport implementation.
//!
//! Exchanges JSON with the sync server over `reqwest`. Push bodies may be
//! wrapped in a gzip+base64 envelope when the request asks for
//! compression.

use crate::error::{EngineError, EngineResult};
use crate::transport::Transport;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use syncline_protocol::{
    PullRequest, PullResponse, PushEnvelope, PushRequest, PushResponse, ResolveRequest, SyncItem,
};

/// Supplies the bearer token attached to every request.
///
/// Token refresh is the provider's concern; the transport only reads the
/// current value per request.
pub trait TokenProvider: Send + Sync {
    /// Returns the current token, or `None` for unauthenticated requests.
    fn token(&self) -> Option<String>;
}

/// A provider handing out one fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// HTTP-based sync transport.
///
/// Endpoints:
/// - `GET  <sync>/pull?lastSyncTime=..&collections=..&compress=..`
/// - `POST <sync>/push`
/// - `GET  <collections>/<collection>/<id>`
/// - `PUT  <collections>/<collection>/<id>/resolve`
pub struct HttpTransport {
    client: reqwest::Client,
    sync_endpoint: String,
    collection_endpoint: String,
    token_provider: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl HttpTransport {
    /// Creates a transport against the given endpoints.
    pub fn new(
        sync_endpoint: impl Into<String>,
        collection_endpoint: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            sync_endpoint: trim_trailing_slash(sync_endpoint.into()),
            collection_endpoint: trim_trailing_slash(collection_endpoint.into()),
            token_provider,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout);
        match self.token_provider.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn read_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> EngineResult<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EngineError::from_status(status.as_u16(), message));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::Protocol(format!("failed to decode response: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn pull(&self, request: &PullRequest) -> EngineResult<PullResponse> {
        let url = format!("{}/pull", self.sync_endpoint);
        let response = self
            .authorize(self.client.get(&url).query(&request.query_pairs()))
            .send()
            .await
            .map_err(map_request_error)?;

        Self::read_response(response).await
    }

    async fn push(&self, request: &PushRequest) -> EngineResult<PushResponse> {
        let url = format!("{}/push", self.sync_endpoint);
        let builder = self.client.post(&url);
        let builder = if request.compress {
            builder.json(&compress_push_body(request)?)
        } else {
            builder.json(request)
        };

        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(map_request_error)?;

        Self::read_response(response).await
    }

    async fn fetch_item(&self, collection: &str, id: &str) -> EngineResult<Option<SyncItem>> {
        let url = format!("{}/{collection}/{id}", self.collection_endpoint);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::read_response(response).await.map(Some)
    }

    async fn resolve_item(
        &self,
        collection: &str,
        id: &str,
        request: &ResolveRequest,
    ) -> EngineResult<SyncItem> {
        let url = format!("{}/{collection}/{id}/resolve", self.collection_endpoint);
        let response = self
            .authorize(self.client.put(&url).json(request))
            .send()
            .await
            .map_err(map_request_error)?;

        Self::read_response(response).await
    }
}

/// Maps a client-side request failure into the engine taxonomy.
fn map_request_error(error: reqwest::Error) -> EngineError {
    if error.is_timeout() {
        EngineError::Timeout
    } else {
        EngineError::network_retryable(error.to_string())
    }
}

/// Wraps a push body in the compressed envelope.
fn compress_push_body(request: &PushRequest) -> EngineResult<PushEnvelope> {
    let json = serde_json::to_vec(request)
        .map_err(|e| EngineError::InvalidPayload(format!("failed to encode push body: {e}")))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .and_then(|()| encoder.finish())
        .map(|compressed| PushEnvelope {
            compressed: true,
            data: BASE64.encode(compressed),
        })
        .map_err(|e| EngineError::InvalidPayload(format!("failed to compress push body: {e}")))
}

fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}
