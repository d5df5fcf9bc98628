use http::header::{HeaderName, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};

use crate::auth::Credentials;
use crate::config::UpstreamConfig;
use crate::error::StreamError;
use crate::protocol::EndpointKind;

const HTTP_REFERER: HeaderName = HeaderName::from_static("http-referer");
const X_TITLE: HeaderName = HeaderName::from_static("x-title");

/// Precomputed endpoint URLs and identification headers for the upstream.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    chat_url: url::Url,
    completions_url: url::Url,
    models_url: url::Url,
    static_headers: HeaderMap,
}

impl PreparedUpstream {
    /// Build a prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Config`] when the base URL or identification
    /// header values are invalid.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, StreamError> {
        let base = upstream.base_url.trim().trim_end_matches('/');
        let parse = |path: &str| {
            url::Url::parse(&format!("{base}{path}"))
                .map_err(|err| StreamError::Config(format!("Invalid upstream base_url: {err}")))
        };

        Ok(Self {
            chat_url: parse("/chat/completions")?,
            completions_url: parse("/completions")?,
            models_url: parse("/models")?,
            static_headers: Self::build_static_headers(upstream)?,
        })
    }

    fn build_static_headers(upstream: &UpstreamConfig) -> Result<HeaderMap, StreamError> {
        let header_value = |name: &str, value: &str| {
            HeaderValue::from_str(value)
                .map_err(|_| StreamError::Config(format!("Invalid {name} header value")))
        };

        let mut headers = HeaderMap::with_capacity(4);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HTTP_REFERER, header_value("HTTP-Referer", &upstream.referer)?);
        headers.insert(X_TITLE, header_value("X-Title", &upstream.title)?);
        Ok(headers)
    }

    #[must_use]
    pub fn endpoint_url(&self, endpoint: EndpointKind) -> &url::Url {
        match endpoint {
            EndpointKind::Chat => &self.chat_url,
            EndpointKind::Completions => &self.completions_url,
        }
    }

    #[must_use]
    pub fn models_url(&self) -> &url::Url {
        &self.models_url
    }

    /// Identification headers plus the bearer authorization for `credentials`.
    #[must_use]
    pub fn request_headers(&self, credentials: &Credentials) -> HeaderMap {
        let mut headers = self.static_headers.clone();
        headers.insert(AUTHORIZATION, credentials.bearer_header().clone());
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_upstream(base_url: &str) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.to_string(),
            api_key: None,
            referer: "https://example.com/forest".to_string(),
            title: "Forest".to_string(),
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let prepared = PreparedUpstream::new(&make_upstream("https://openrouter.ai/api/v1")).unwrap();
        assert_eq!(
            prepared.endpoint_url(EndpointKind::Chat).as_str(),
            "https://openrouter.ai/api/v1/chat/completions"
        );
        assert_eq!(
            prepared.endpoint_url(EndpointKind::Completions).as_str(),
            "https://openrouter.ai/api/v1/completions"
        );
        assert_eq!(
            prepared.models_url().as_str(),
            "https://openrouter.ai/api/v1/models"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let prepared = PreparedUpstream::new(&make_upstream("http://127.0.0.1:9000/v1/")).unwrap();
        assert_eq!(
            prepared.endpoint_url(EndpointKind::Chat).as_str(),
            "http://127.0.0.1:9000/v1/chat/completions"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            PreparedUpstream::new(&make_upstream("no scheme")),
            Err(StreamError::Config(_))
        ));
    }

    #[test]
    fn test_request_headers() {
        let prepared = PreparedUpstream::new(&make_upstream("https://openrouter.ai/api/v1")).unwrap();
        let creds = Credentials::new("sk-or-test").unwrap();
        let headers = prepared.request_headers(&creds);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer sk-or-test");
        assert_eq!(headers.get("http-referer").unwrap(), "https://example.com/forest");
        assert_eq!(headers.get("x-title").unwrap(), "Forest");
    }
}
