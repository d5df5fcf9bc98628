use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::StreamError;

/// Resolved client settings, kept so the client can be built lazily.
#[derive(Debug, Clone)]
struct ClientSettings {
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    connect_timeout: Duration,
    timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<String>,
}

fn build_reqwest_client(settings: &ClientSettings) -> Result<reqwest::Client, StreamError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .pool_idle_timeout(settings.pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(settings.connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(settings.timeout);

    if let Some(proxy_url) = settings.proxy_url.as_deref() {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| StreamError::Transport(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !settings.use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| StreamError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Pooled HTTP client shared by every connection a fan-out opens.
///
/// Requests are sent once. Failures are returned to the caller, never retried.
pub struct HttpTransport {
    client: OnceLock<Arc<reqwest::Client>>,
    settings: ClientSettings,
}

impl HttpTransport {
    /// Create a transport with connection pooling and timeouts from the given client config.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let proxy_url = config
            .proxy
            .as_deref()
            .map(str::trim)
            .filter(|proxy| !proxy.is_empty())
            .map(ToString::to_string);

        Self {
            client: OnceLock::new(),
            settings: ClientSettings {
                pool_max_idle_per_host: config.http_pool_max_idle_per_host.max(1),
                pool_idle_timeout,
                connect_timeout: Duration::from_secs(config.connect_timeout),
                timeout: Duration::from_secs(config.timeout),
                use_env_proxy: config.http_use_env_proxy,
                proxy_url,
            },
        }
    }

    fn client(&self) -> Result<Arc<reqwest::Client>, StreamError> {
        if let Some(existing) = self.client.get() {
            return Ok(existing.clone());
        }

        let built = Arc::new(build_reqwest_client(&self.settings)?);
        let _ = self.client.set(built.clone());
        Ok(self.client.get().cloned().unwrap_or(built))
    }

    /// Send a request and return the response once its headers arrive.
    ///
    /// The body is left unread so the caller can consume it as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Transport`] when the client cannot be built or
    /// the request fails before a response status is received.
    pub async fn send(
        &self,
        url: &url::Url,
        method: http::Method,
        headers: http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, StreamError> {
        let client = self.client()?;
        let mut request = reqwest::Request::new(method, url.clone());
        *request.headers_mut() = headers;
        if !body.is_empty() {
            *request.body_mut() = Some(reqwest::Body::from(body));
        }

        client.execute(request).await.map_err(|err| {
            tracing::debug!(url = %url, error = %err, "upstream request failed");
            StreamError::Transport(err.to_string())
        })
    }
}
