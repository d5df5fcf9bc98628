use bytes::Bytes;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::StreamRequest;
use crate::auth::Credentials;
use crate::error::{upstream_error_message, StreamError};
use crate::protocol::EndpointKind;
use crate::stream::{process_stream, CandidateStream};
use crate::transport::{HttpTransport, PreparedUpstream};

/// Issue one physical request per candidate and wrap each response body in a
/// stream processor.
///
/// With more than one candidate the requests run concurrently; results are
/// collected in whatever order connections come up and then re-sorted by
/// originating index. The first failure aborts the whole fan-out and drops
/// the requests still in flight. Every wait for response headers races
/// `cancel`; a fired token drops all in-flight requests and no stream is
/// created.
pub(super) async fn open_candidates(
    transport: &HttpTransport,
    upstream: &PreparedUpstream,
    request: &StreamRequest,
    credentials: &Credentials,
    cancel: &CancellationToken,
) -> Result<Vec<CandidateStream>, StreamError> {
    let endpoint = request.endpoint();
    let count = request.candidate_count();
    let url = upstream.endpoint_url(endpoint);
    let headers = upstream.request_headers(credentials);
    let body = request.upstream_body()?;

    tracing::info!(
        endpoint = endpoint.as_str(),
        candidates = count,
        url = %url,
        "opening completion streams"
    );

    if count == 1 {
        let response = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(setup_cancelled(endpoint)),
            response = open_connection(transport, url, headers, body, None) => response?,
        };
        return Ok(vec![into_candidate(0, response, endpoint, cancel)]);
    }

    let mut pending: FuturesUnordered<_> = (0..count)
        .map(|index| {
            let headers = headers.clone();
            let body = body.clone();
            async move {
                tracing::debug!(index, of = count, "sending candidate request");
                open_connection(transport, url, headers, body, Some(index))
                    .await
                    .map(|response| (index, response))
            }
        })
        .collect();

    let mut opened = Vec::with_capacity(count);
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(setup_cancelled(endpoint)),
            next = pending.next() => next,
        };
        let Some(result) = next else {
            break;
        };
        let (index, response) = result?;
        tracing::debug!(index, "candidate connection established");
        opened.push((index, response));
    }

    opened.sort_unstable_by_key(|(index, _)| *index);
    Ok(opened
        .into_iter()
        .map(|(index, response)| into_candidate(index, response, endpoint, cancel))
        .collect())
}

fn setup_cancelled(endpoint: EndpointKind) -> StreamError {
    tracing::debug!(endpoint = endpoint.as_str(), "fan-out cancelled during setup");
    StreamError::Cancelled
}

/// Send one request and check its status. `tag` is the candidate index when
/// the request is part of a multi-candidate fan-out.
async fn open_connection(
    transport: &HttpTransport,
    url: &url::Url,
    headers: http::HeaderMap,
    body: Bytes,
    tag: Option<usize>,
) -> Result<reqwest::Response, StreamError> {
    let response = transport
        .send(url, http::Method::POST, headers, body)
        .await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let message = upstream_error_message(&body)
        .unwrap_or_else(|| status_message(status, tag));
    tracing::warn!(
        status = status.as_u16(),
        candidate = ?tag,
        error = %message,
        "upstream rejected completion request"
    );
    Err(StreamError::Upstream {
        status: status.as_u16(),
        message,
    })
}

fn status_message(status: http::StatusCode, tag: Option<usize>) -> String {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    match tag {
        None => format!("upstream returned status {}: {reason}", status.as_u16()),
        Some(index) => format!(
            "upstream request {} returned status {}: {reason}",
            index + 1,
            status.as_u16()
        ),
    }
}

fn into_candidate(
    index: usize,
    response: reqwest::Response,
    endpoint: EndpointKind,
    cancel: &CancellationToken,
) -> CandidateStream {
    let token = cancel.child_token();
    let events = process_stream(endpoint, response.bytes_stream(), token.clone());
    CandidateStream::new(index, token, events)
}
