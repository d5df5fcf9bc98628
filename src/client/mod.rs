//! Caller-facing entry point: one request in, an ordered list of candidate
//! streams out.

mod fanout;
mod models;

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::auth::Credentials;
use crate::config::AppConfig;
use crate::error::StreamError;
use crate::protocol::EndpointKind;
use crate::stream::CandidateStream;
use crate::transport::{HttpTransport, PreparedUpstream};

/// A streaming completion request. Immutable once built.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    endpoint: EndpointKind,
    parameters: Map<String, Value>,
    candidate_count: usize,
}

impl StreamRequest {
    /// Build a request from its parameter object.
    ///
    /// The candidate count is taken from the `n` parameter; a missing, zero or
    /// non-integer `n` means one candidate.
    #[must_use]
    pub fn new(endpoint: EndpointKind, parameters: Map<String, Value>) -> Self {
        let candidate_count = parameters
            .get("n")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        Self {
            endpoint,
            parameters,
            candidate_count,
        }
    }

    /// Build a request from a JSON value, which must be an object.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] when `parameters` is not an object.
    pub fn from_value(endpoint: EndpointKind, parameters: Value) -> Result<Self, StreamError> {
        match parameters {
            Value::Object(map) => Ok(Self::new(endpoint, map)),
            _ => Err(StreamError::InvalidRequest(
                "request parameters must be a JSON object".to_string(),
            )),
        }
    }

    /// Override the candidate count. Zero is treated as one.
    #[must_use]
    pub fn with_candidate_count(mut self, candidate_count: usize) -> Self {
        self.candidate_count = candidate_count.max(1);
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> EndpointKind {
        self.endpoint
    }

    #[must_use]
    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    #[must_use]
    pub fn candidate_count(&self) -> usize {
        self.candidate_count
    }

    /// Body sent on every physical request: the caller's parameters with
    /// `stream: true` and `n: 1` forced.
    pub(crate) fn upstream_body(&self) -> Result<Bytes, StreamError> {
        let mut body = self.parameters.clone();
        body.insert("stream".to_string(), Value::Bool(true));
        body.insert("n".to_string(), Value::from(1));
        serde_json::to_vec(&body)
            .map(Bytes::from)
            .map_err(|err| StreamError::InvalidRequest(format!("unserializable parameters: {err}")))
    }
}

/// Streaming completion client for one upstream service.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct CompletionClient {
    transport: Arc<HttpTransport>,
    upstream: Arc<PreparedUpstream>,
}

impl CompletionClient {
    /// Build a client from application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] when the upstream section is invalid.
    pub fn new(config: &AppConfig) -> Result<Self, StreamError> {
        Ok(Self::from_parts(
            HttpTransport::new(&config.client),
            PreparedUpstream::new(&config.upstream)?,
        ))
    }

    #[must_use]
    pub fn from_parts(transport: HttpTransport, upstream: PreparedUpstream) -> Self {
        Self {
            transport: Arc::new(transport),
            upstream: Arc::new(upstream),
        }
    }

    /// Open every candidate connection for `request` and return their event
    /// streams ordered by candidate index.
    ///
    /// Returns once all connections have received response headers. Setup
    /// races `cancel`. Each returned stream is driven by a child of `cancel`:
    /// cancelling `cancel` stops them all, [`CandidateStream::cancel`] stops one.
    ///
    /// # Errors
    ///
    /// Returns the first [`StreamError::Upstream`] or [`StreamError::Transport`]
    /// any connection hits during setup, or [`StreamError::Cancelled`] when
    /// `cancel` fires before every connection is up. In-flight requests are
    /// dropped either way and no partial result is returned.
    pub async fn stream(
        &self,
        request: &StreamRequest,
        credentials: &Credentials,
        cancel: &CancellationToken,
    ) -> Result<Vec<CandidateStream>, StreamError> {
        fanout::open_candidates(&self.transport, &self.upstream, request, credentials, cancel)
            .await
    }

    /// List the model ids the upstream offers, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Upstream`] when the upstream reports an error and
    /// [`StreamError::Transport`] when the request or body read fails.
    pub async fn list_models(&self, credentials: &Credentials) -> Result<Vec<String>, StreamError> {
        models::fetch_models(&self.transport, &self.upstream, credentials).await
    }
}
