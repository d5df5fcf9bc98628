use http::HeaderValue;

use crate::config::UpstreamConfig;
use crate::error::StreamError;

/// Environment variable consulted when the configuration carries no key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const KNOWN_KEY_PREFIXES: [&str; 3] = ["sk-", "sk-proj-", "sk-or-"];

/// Bearer credentials for the upstream completion service.
#[derive(Clone)]
pub struct Credentials {
    api_key: Box<str>,
    bearer: HeaderValue,
}

impl Credentials {
    /// Build credentials from a raw API key.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::InvalidRequest`] when the key is empty or cannot
    /// be carried in an `Authorization` header.
    pub fn new(api_key: impl Into<String>) -> Result<Self, StreamError> {
        let api_key = api_key.into();
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            return Err(StreamError::InvalidRequest("API key is empty".to_string()));
        }
        let mut bearer = HeaderValue::from_str(&format!("Bearer {trimmed}")).map_err(|_| {
            StreamError::InvalidRequest("API key contains invalid header characters".to_string())
        })?;
        bearer.set_sensitive(true);
        Ok(Self {
            api_key: trimmed.into(),
            bearer,
        })
    }

    /// Resolve credentials from configuration, falling back to
    /// [`API_KEY_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] when neither source provides a key, or
    /// [`StreamError::InvalidRequest`] when the key is unusable.
    pub fn resolve(upstream: &UpstreamConfig) -> Result<Self, StreamError> {
        let key = match upstream.api_key.as_deref() {
            Some(key) => key.to_string(),
            None => std::env::var(API_KEY_ENV).map_err(|_| {
                StreamError::Config(format!(
                    "no upstream.api_key configured and {API_KEY_ENV} is not set"
                ))
            })?,
        };
        let credentials = Self::new(key)?;
        if !credentials.has_known_key_prefix() {
            tracing::warn!("API key does not start with a known prefix (sk-, sk-proj-, sk-or-)");
        }
        Ok(credentials)
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// `Authorization` header value, marked sensitive.
    #[must_use]
    pub fn bearer_header(&self) -> &HeaderValue {
        &self.bearer
    }

    /// Whether the key starts with one of the prefixes the upstream issues.
    #[must_use]
    pub fn has_known_key_prefix(&self) -> bool {
        KNOWN_KEY_PREFIXES
            .iter()
            .any(|prefix| self.api_key.starts_with(prefix))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}
