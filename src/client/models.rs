use bytes::Bytes;
use http::Method;
use serde_json::Value;

use crate::auth::Credentials;
use crate::error::{sanitize_upstream_error, StreamError};
use crate::transport::{HttpTransport, PreparedUpstream};

pub(super) async fn fetch_models(
    transport: &HttpTransport,
    upstream: &PreparedUpstream,
    credentials: &Credentials,
) -> Result<Vec<String>, StreamError> {
    let response = transport
        .send(
            upstream.models_url(),
            Method::GET,
            upstream.request_headers(credentials),
            Bytes::new(),
        )
        .await?;
    let status = response.status();
    let body = response.bytes().await?;

    let Ok(payload) = serde_json::from_slice::<Value>(&body) else {
        if status.is_success() {
            return Err(StreamError::Transport(
                "models response is not valid JSON".to_string(),
            ));
        }
        return Err(StreamError::Upstream {
            status: status.as_u16(),
            message: sanitize_upstream_error(&body),
        });
    };

    if let Some(error) = payload.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Failed to fetch models")
            .to_string();
        tracing::warn!(status = status.as_u16(), error = %message, "models request failed");
        return Err(StreamError::Upstream {
            status: status.as_u16(),
            message,
        });
    }
    if !status.is_success() {
        return Err(StreamError::Upstream {
            status: status.as_u16(),
            message: sanitize_upstream_error(&body),
        });
    }

    Ok(extract_model_ids(&payload))
}

/// Sorted ids from a `{"data": [{"id": ...}]}` listing. A missing or
/// non-array `data` yields an empty list.
fn extract_model_ids(payload: &Value) -> Vec<String> {
    let Some(data) = payload.get("data").and_then(Value::as_array) else {
        tracing::warn!("unexpected models response shape");
        return Vec::new();
    };
    let mut ids: Vec<String> = data
        .iter()
        .filter_map(|model| model.get("id").and_then(Value::as_str))
        .map(ToString::to_string)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
