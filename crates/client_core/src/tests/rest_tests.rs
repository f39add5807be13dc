use super::*;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use shared::domain::TaskOrder;
use std::{collections::HashMap, sync::Arc};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone)]
struct SeenRequest {
    method: Method,
    query: HashMap<String, String>,
    prefer: Option<String>,
    apikey: Option<String>,
    authorization: Option<String>,
}

#[derive(Clone, Default)]
struct MockState {
    rows: Arc<Mutex<Vec<Task>>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl MockState {
    async fn record(&self, method: Method, headers: &HeaderMap, query: HashMap<String, String>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().await.push(SeenRequest {
            method,
            query,
            prefer: header("prefer"),
            apikey: header("apikey"),
            authorization: header("authorization"),
        });
    }

    async fn last_seen(&self) -> SeenRequest {
        self.seen.lock().await.last().cloned().expect("request seen")
    }
}

fn at(ms: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(1_700_000_000_000 + ms).expect("timestamp")
}

fn seed_rows(count: i64) -> Vec<Task> {
    (1..=count)
        .map(|id| Task {
            id: TaskId(id),
            title: format!("row {id}"),
            completed: false,
            updated_at: at(id),
        })
        .collect()
}

async fn list_rows(
    State(state): State<MockState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    state.record(method, &headers, query.clone()).await;
    let mut rows = state.rows.lock().await.clone();
    let total = rows.len();

    match query.get("order").map(String::as_str) {
        Some("id.asc") => rows.sort_by_key(|t| t.id),
        _ => rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
    }
    let offset: usize = query.get("offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: usize = query
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(usize::MAX);
    let window: Vec<Task> = rows.into_iter().skip(offset).take(limit).collect();

    let range = if window.is_empty() {
        format!("*/{total}")
    } else {
        format!("{}-{}/{total}", offset, offset + window.len() - 1)
    };
    ([(header::CONTENT_RANGE, range)], Json(window))
}

async fn insert_row(
    State(state): State<MockState>,
    method: Method,
    headers: HeaderMap,
    Json(record): Json<NewTaskRecord>,
) -> impl IntoResponse {
    state.record(method, &headers, HashMap::new()).await;
    let mut rows = state.rows.lock().await;
    let task = Task {
        id: TaskId(rows.len() as i64 + 1),
        title: record.title,
        completed: record.completed,
        updated_at: record.updated_at,
    };
    rows.push(task.clone());
    (StatusCode::CREATED, Json(vec![task]))
}

async fn update_row(
    State(state): State<MockState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(patch): Json<TaskPatch>,
) -> impl IntoResponse {
    state.record(method, &headers, query.clone()).await;
    let id = query
        .get("id")
        .and_then(|raw| raw.strip_prefix("eq."))
        .and_then(|raw| raw.parse::<i64>().ok());
    if let Some(id) = id {
        let mut rows = state.rows.lock().await;
        if let Some(row) = rows.iter_mut().find(|t| t.id == TaskId(id)) {
            row.completed = patch.completed;
            row.updated_at = patch.updated_at;
        }
    }
    StatusCode::NO_CONTENT
}

async fn broken_relation() -> impl IntoResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "message": "relation \"public.broken\" does not exist",
            "code": "42P01",
        })),
    )
}

async fn flaky_gateway() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded")
}

async fn spawn_rest_server(rows: Vec<Task>) -> anyhow::Result<(String, MockState)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = MockState {
        rows: Arc::new(Mutex::new(rows)),
        seen: Arc::new(Mutex::new(Vec::new())),
    };
    let app = Router::new()
        .route("/rest/v1/combined_todos", get(list_rows))
        .route(
            "/rest/v1/todos",
            axum::routing::post(insert_row).patch(update_row),
        )
        .route("/rest/v1/broken", get(broken_relation))
        .route("/rest/v1/flaky", get(flaky_gateway))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn client(server_url: &str, api_key: Option<&str>) -> RestDataService {
    RestDataService::new(
        server_url,
        api_key.map(str::to_string),
        Duration::from_secs(5),
    )
    .expect("rest client")
}

#[tokio::test]
async fn count_reads_total_from_content_range() {
    let (server_url, state) = spawn_rest_server(seed_rows(1_000)).await.expect("server");
    let service = client(&server_url, Some("anon-key"));

    let total = service.count("combined_todos").await.expect("count");
    assert_eq!(total, 1_000);

    let seen = state.last_seen().await;
    assert_eq!(seen.method, Method::HEAD);
    assert_eq!(seen.prefer.as_deref(), Some("count=exact"));
    assert_eq!(seen.query.get("select").map(String::as_str), Some("*"));
    assert_eq!(seen.apikey.as_deref(), Some("anon-key"));
    assert_eq!(seen.authorization.as_deref(), Some("Bearer anon-key"));
}

#[tokio::test]
async fn query_sends_order_offset_and_limit() {
    let (server_url, state) = spawn_rest_server(seed_rows(50)).await.expect("server");
    let service = client(&server_url, None);

    let window = WindowQuery {
        order: TaskOrder::IdAsc,
        offset: 20,
        limit: 10,
    };
    let rows = service.query("combined_todos", &window).await.expect("query");
    let ids: Vec<i64> = rows.iter().map(|t| t.id.0).collect();
    assert_eq!(ids, (21..=30).collect::<Vec<_>>());

    let seen = state.last_seen().await;
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.query.get("order").map(String::as_str), Some("id.asc"));
    assert_eq!(seen.query.get("offset").map(String::as_str), Some("20"));
    assert_eq!(seen.query.get("limit").map(String::as_str), Some("10"));
    assert!(seen.apikey.is_none());
}

#[tokio::test]
async fn query_past_the_end_returns_empty_window() {
    let (server_url, _state) = spawn_rest_server(seed_rows(5)).await.expect("server");
    let service = client(&server_url, None);

    let window = WindowQuery {
        order: TaskOrder::UpdatedAtDesc,
        offset: 100,
        limit: 10,
    };
    let rows = service.query("combined_todos", &window).await.expect("query");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn insert_returns_server_representation() {
    let (server_url, state) = spawn_rest_server(seed_rows(2)).await.expect("server");
    let service = client(&server_url, Some("anon-key"));

    let record = NewTaskRecord::open("Buy milk", at(99));
    let created = service.insert("todos", &record).await.expect("insert");
    assert_eq!(created.id, TaskId(3));
    assert_eq!(created.title, "Buy milk");
    assert!(!created.completed);

    let seen = state.last_seen().await;
    assert_eq!(seen.method, Method::POST);
    assert_eq!(seen.prefer.as_deref(), Some("return=representation"));
}

#[tokio::test]
async fn update_filters_by_primary_key() {
    let (server_url, state) = spawn_rest_server(seed_rows(10)).await.expect("server");
    let service = client(&server_url, None);

    let patch = TaskPatch {
        completed: true,
        updated_at: at(5_000),
    };
    service
        .update("todos", TaskId(7), &patch)
        .await
        .expect("update");

    let seen = state.last_seen().await;
    assert_eq!(seen.method, Method::PATCH);
    assert_eq!(seen.query.get("id").map(String::as_str), Some("eq.7"));
    assert_eq!(seen.prefer.as_deref(), Some("return=minimal"));

    let rows = state.rows.lock().await;
    let row = rows.iter().find(|t| t.id == TaskId(7)).expect("row 7");
    assert!(row.completed);
    assert_eq!(row.updated_at, at(5_000));
}

#[tokio::test]
async fn json_error_message_becomes_service_detail() {
    let (server_url, _state) = spawn_rest_server(Vec::new()).await.expect("server");
    let service = client(&server_url, None);

    let err = service.count("broken").await.expect_err("count fails");
    assert_eq!(err.code, ErrorCode::Service);

    let window = WindowQuery {
        order: TaskOrder::UpdatedAtDesc,
        offset: 0,
        limit: 10,
    };
    let err = service.query("broken", &window).await.expect_err("query fails");
    assert_eq!(err.detail(), "relation \"public.broken\" does not exist");
}

#[tokio::test]
async fn plain_text_error_keeps_status_and_body() {
    let (server_url, _state) = spawn_rest_server(Vec::new()).await.expect("server");
    let service = client(&server_url, None);

    let window = WindowQuery {
        order: TaskOrder::UpdatedAtDesc,
        offset: 0,
        limit: 10,
    };
    let err = service.query("flaky", &window).await.expect_err("query fails");
    assert_eq!(err.detail(), "500 Internal Server Error: upstream exploded");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let service = client(&format!("http://{addr}"), None);
    let err = service.count("combined_todos").await.expect_err("refused");
    assert_eq!(err.code, ErrorCode::Transport);
}

#[tokio::test]
async fn rejects_row_set_names_that_are_not_identifiers() {
    let service = client("http://127.0.0.1:9", None);
    for name in ["", "todos?select=*", "../auth/users", "todos/1"] {
        let err = service.count(name).await.expect_err("invalid name");
        assert_eq!(err.code, ErrorCode::NotFound, "{name}");
    }
}

#[test]
fn builds_rest_base_from_service_url() {
    let service = client("https://project.example.co/", None);
    assert_eq!(
        service.base_url().as_str(),
        "https://project.example.co/rest/v1/"
    );

    let err = RestDataService::new("project.example.co", None, Duration::from_secs(1))
        .err()
        .expect("scheme required");
    assert_eq!(err.code, ErrorCode::Transport);
}

#[test]
fn parses_content_range_totals() {
    assert_eq!(parse_content_range_total("0-9/1000"), Some(1_000));
    assert_eq!(parse_content_range_total("*/0"), Some(0));
    assert_eq!(parse_content_range_total(" 10-19/25 "), Some(25));
    assert_eq!(parse_content_range_total("0-9/*"), None);
    assert_eq!(parse_content_range_total("garbage"), None);
}
