use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use forest_stream::auth::Credentials;
use forest_stream::client::CompletionClient;
use forest_stream::config::{ClientConfig, UpstreamConfig};
use forest_stream::error::StreamError;
use forest_stream::transport::{HttpTransport, PreparedUpstream};
use serde_json::json;

fn build_client(base_url: String) -> CompletionClient {
    let client_config = ClientConfig {
        http_use_env_proxy: false,
        ..ClientConfig::default()
    };
    let upstream = UpstreamConfig {
        base_url,
        ..UpstreamConfig::default()
    };
    CompletionClient::from_parts(
        HttpTransport::new(&client_config),
        PreparedUpstream::new(&upstream).expect("prepared upstream"),
    )
}

async fn serve_models(app: Router) -> (CompletionClient, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock upstream");
    let addr = listener.local_addr().expect("mock upstream addr");
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (build_client(format!("http://{addr}/api/v1")), server)
}

#[tokio::test]
async fn test_list_models_sorted() {
    let app = Router::new().route(
        "/api/v1/models",
        get(|headers: HeaderMap| async move {
            assert_eq!(
                headers.get("authorization").map(|v| v.to_str().unwrap_or_default()),
                Some("Bearer sk-or-models")
            );
            Json(json!({"data": [
                {"id": "openai/gpt-4o-mini"},
                {"id": "anthropic/claude-3.5-haiku"},
                {"id": "meta-llama/llama-3.1-70b"},
            ]}))
        }),
    );
    let (client, server) = serve_models(app).await;

    let models = client
        .list_models(&Credentials::new("sk-or-models").expect("credentials"))
        .await
        .expect("model listing");
    assert_eq!(
        models,
        vec![
            "anthropic/claude-3.5-haiku",
            "meta-llama/llama-3.1-70b",
            "openai/gpt-4o-mini",
        ]
    );

    server.abort();
}

#[tokio::test]
async fn test_list_models_error_body() {
    let app = Router::new().route(
        "/api/v1/models",
        get(|| async {
            Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"error": {"message": "No auth credentials found", "code": 401}})
                        .to_string(),
                ))
                .expect("error response")
        }),
    );
    let (client, server) = serve_models(app).await;

    let err = client
        .list_models(&Credentials::new("sk-or-bad").expect("credentials"))
        .await
        .expect_err("listing must fail");
    match err {
        StreamError::Upstream { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "No auth credentials found");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    server.abort();
}

#[tokio::test]
async fn test_list_models_missing_data_is_empty() {
    let app = Router::new().route(
        "/api/v1/models",
        get(|| async { Json(json!({"object": "list"})) }),
    );
    let (client, server) = serve_models(app).await;

    let models = client
        .list_models(&Credentials::new("sk-or-models").expect("credentials"))
        .await
        .expect("model listing");
    assert!(models.is_empty());

    server.abort();
}
