use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use mapress_core::orchestrator::{Adapters, ProgressEvent, StreamRequest};
use mapress_core::{
    CategoryStats, MapRequest, MapressConfig, SuperCategory, TopicMap, category_stats,
    generate_super_categories, nodes_for_category,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Progress events buffered between the pipeline task and the SSE response.
const EVENT_BUFFER: usize = 16;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<MapressConfig>,
    pub adapters: Adapters,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/stream", post(stream))
        .route("/api/map", post(topic_map))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // outermost layer runs first: the id must be set before it is propagated
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// JSON error body `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Run the outline pipeline and forward each progress event as one SSE frame.
///
/// The pipeline runs on its own task; when the client disconnects the stream
/// is dropped and the pipeline stops at its next event.
async fn stream(
    State(state): State<AppState>,
    Json(request): Json<StreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::bad_request("query is required"));
    }

    let adapters = if request.mock {
        Adapters::mock()
    } else {
        state.adapters.clone()
    };
    let pipeline = adapters.pipeline(&state.config);
    info!(query = %request.query, mock = request.mock, "stream requested");

    let (tx, rx) = mpsc::channel::<ProgressEvent>(EVENT_BUFFER);
    tokio::spawn(async move {
        let _ = pipeline.run(&request, &tx).await;
    });

    let events = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapQuery {
    /// Restrict the returned nodes to one super category, e.g. `super-cat-0`.
    super_category: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MapResponse {
    #[serde(flatten)]
    map: TopicMap,
    super_categories: Vec<SuperCategory>,
    category_stats: CategoryStats,
}

async fn topic_map(
    State(state): State<AppState>,
    Query(query): Query<MapQuery>,
    Json(request): Json<MapRequest>,
) -> Result<Json<MapResponse>, ApiError> {
    if request.validate().is_err() {
        return Err(ApiError::bad_request("prompt is required"));
    }
    let request = request.clamped();
    info!(prompt = %request.prompt, depth = request.depth, "topic map requested");

    let mut map = state
        .adapters
        .agent(&state.config)
        .generate_or_placeholder(&request)
        .await;
    let super_categories = generate_super_categories(map.nodes.values());

    if let Some(category_id) = &query.super_category {
        let keep: HashSet<String> =
            nodes_for_category(map.nodes.values(), category_id, &super_categories)
                .into_iter()
                .map(|node| node.id.clone())
                .collect();
        map.nodes.retain(|id, _| keep.contains(id));
        map.edges
            .retain(|edge| keep.contains(&edge.from) && keep.contains(&edge.to));
    }

    Ok(Json(MapResponse {
        map,
        category_stats: category_stats(&super_categories),
        super_categories,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use mapress_core::orchestrator::{MockCompletion, MockFetch, MockSearch};
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppState {
            config: Arc::new(MapressConfig::default()),
            adapters: Adapters::mock(),
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_version() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn mock_stream_emits_progress_then_graph() {
        let response = app()
            .oneshot(post_json(
                "/api/stream",
                json!({ "query": "AI regulation", "mock": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "text/event-stream"
        );

        let text = body_text(response).await;
        let search = text.find(r#""step":"search""#).unwrap();
        let sources = text.find(r#""type":"sources""#).unwrap();
        let graph = text.find(r#""type":"graph""#).unwrap();
        let done = text.find(r#""step":"done""#).unwrap();
        assert!(search < sources && sources < graph && graph < done);
        assert!(!text.contains(r#""type":"error""#));
    }

    #[tokio::test]
    async fn stream_failure_is_reported_in_band() {
        let app = router(AppState {
            config: Arc::new(MapressConfig::default()),
            adapters: Adapters {
                search: Arc::new(MockSearch),
                fetch: Arc::new(MockFetch::default()),
                llm: Arc::new(MockCompletion::new().with_json_failure(429)),
            },
        });
        let response = app
            .oneshot(post_json("/api/stream", json!({ "query": "AI regulation" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let text = body_text(response).await;
        assert!(text.contains(r#""type":"error""#));
        assert!(text.contains("429"));
        assert!(!text.contains(r#""type":"graph""#));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let response = app()
            .oneshot(post_json("/api/stream", json!({ "query": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["error"], "query is required");
    }

    #[tokio::test]
    async fn map_without_prompt_is_rejected() {
        for body in [json!({}), json!({ "prompt": "" })] {
            let response = app().oneshot(post_json("/api/map", body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
            assert_eq!(body["error"], "prompt is required");
        }
    }

    #[tokio::test]
    async fn map_falls_back_to_placeholder_with_super_categories() {
        let response = app()
            .oneshot(post_json(
                "/api/map",
                json!({ "prompt": "AI regulation", "depth": 9 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["topic"], "AI regulation");
        assert_eq!(body["depth"], 3);
        assert!(body["nodes"].as_object().is_some_and(|n| !n.is_empty()));
        assert!(body["superCategories"].is_array());
        assert_eq!(body["categoryStats"]["total"], 0);
    }

    #[tokio::test]
    async fn map_limits_are_lenient() {
        let response = app()
            .oneshot(post_json(
                "/api/map",
                json!({ "prompt": "AI regulation", "depth": 1000, "maxSources": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["depth"], 3);
    }

    const TWO_THEME_MAP: &str = r#"{
        "nodes": {
            "act": {
                "id": "act",
                "title": "EU AI Act",
                "summary": "The EU adopted the AI Act.",
                "citations": [{"url": "https://www.reuters.com/technology/eu-ai-act"}],
                "relatedTopics": ["Politics"]
            },
            "vote": {
                "id": "vote",
                "title": "Parliament vote",
                "summary": "Parliament approved the text.",
                "citations": [{"url": "https://apnews.com/article/eu-vote"}],
                "relatedTopics": ["Politics"]
            },
            "chips": {
                "id": "chips",
                "title": "Chip research",
                "summary": "Labs published new accelerator results.",
                "citations": [{"url": "https://www.nature.com/articles/chips"}],
                "relatedTopics": ["Science"]
            }
        },
        "edges": [
            {"from": "act", "to": "vote"},
            {"from": "act", "to": "chips"}
        ]
    }"#;

    fn app_with_map(content: &str) -> Router {
        router(AppState {
            config: Arc::new(MapressConfig::default()),
            adapters: Adapters {
                search: Arc::new(MockSearch),
                fetch: Arc::new(MockFetch::default()),
                llm: Arc::new(MockCompletion::new().then_content(content)),
            },
        })
    }

    #[tokio::test]
    async fn map_reports_category_stats() {
        let response = app_with_map(TWO_THEME_MAP)
            .oneshot(post_json("/api/map", json!({ "prompt": "AI regulation" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["nodes"].as_object().unwrap().len(), 3);
        assert_eq!(body["categoryStats"]["total"], 3);
        assert_eq!(body["categoryStats"]["categories"][0]["name"], "Politics");
        assert_eq!(body["categoryStats"]["categories"][0]["count"], 2);
        assert_eq!(body["categoryStats"]["categories"][1]["name"], "Science");
    }

    #[tokio::test]
    async fn map_can_be_filtered_to_one_super_category() {
        let response = app_with_map(TWO_THEME_MAP)
            .oneshot(post_json(
                "/api/map?superCategory=super-cat-0",
                json!({ "prompt": "AI regulation" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        let nodes = body["nodes"].as_object().unwrap();
        let mut ids: Vec<&str> = nodes.keys().map(String::as_str).collect();
        ids.sort();
        assert_eq!(ids, ["act", "vote"]);
        let edges = body["edges"].as_array().unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0]["to"], "vote");
        assert_eq!(body["superCategories"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_super_category_keeps_every_node() {
        let response = app_with_map(TWO_THEME_MAP)
            .oneshot(post_json(
                "/api/map?superCategory=super-cat-9",
                json!({ "prompt": "AI regulation" }),
            ))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["nodes"].as_object().unwrap().len(), 3);
        assert_eq!(body["edges"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn client_request_id_is_echoed() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/stream")
            .header("content-type", "application/json")
            .header("x-request-id", "trace-42")
            .body(Body::from(json!({ "query": "" }).to_string()))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["x-request-id"], "trace-42");
    }
}
