// Shared test helpers: stub collector endpoint and settings fixture

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;

/// One request captured by the stub collector.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub app_key: Option<String>,
    pub app_token: Option<String>,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

pub type Received = Arc<Mutex<Vec<ReceivedRequest>>>;

type StubState = (Received, serde_json::Value);

async fn record(
    State((received, reply)): State<StubState>,
    headers: HeaderMap,
    body: String,
) -> axum::Json<serde_json::Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let parsed = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    received.lock().unwrap().push(ReceivedRequest {
        app_key: header("APP-KEY"),
        app_token: header("APP-TOKEN"),
        content_type: header("content-type"),
        body: parsed,
    });
    axum::Json(reply)
}

/// Serves a stub collector on an ephemeral port, always answering `reply`.
/// Returns the endpoint URL and the requests received so far.
pub async fn stub_collector(reply: serde_json::Value) -> (String, Received) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/", post(record))
        .with_state((received.clone(), reply));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{}", addr), received)
}

pub fn test_settings(endpoint: &str) -> server_exporter::config::Settings {
    server_exporter::config::Settings {
        server_name: "test-server".into(),
        endpoint: endpoint.into(),
        app_token: "token".into(),
        app_secret: "secret".into(),
        log_level: "info".into(),
    }
}
