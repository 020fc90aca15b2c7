use super::*;
use std::{collections::BTreeSet, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use shared::{
    filter::{FilterPredicate, FilterSet},
    protocol::SortSpec,
};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    received: Arc<Mutex<Vec<Value>>>,
}

#[derive(Deserialize)]
struct DataQuery {
    data: String,
}

async fn handle_vendors(
    State(state): State<ServerState>,
    Query(query): Query<DataQuery>,
) -> Json<Value> {
    let data: Value = serde_json::from_str(&query.data).expect("data is json");
    state.received.lock().await.push(data);
    Json(json!({
        "items": [{ "id": "1", "name": "acme" }, { "id": "2", "name": "acme eu" }],
        "total": 42,
    }))
}

async fn handle_forbidden() -> impl IntoResponse {
    (
        StatusCode::FORBIDDEN,
        Json(ApiError::new(ErrorCode::Forbidden, "missing ORG_VENDORS_VIEW")),
    )
}

async fn handle_broken() -> impl IntoResponse {
    (StatusCode::BAD_GATEWAY, "")
}

async fn spawn_list_server() -> anyhow::Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/api/vendors/pagination", get(handle_vendors))
        .route("/api/forbidden", get(handle_forbidden))
        .route("/api/broken", get(handle_broken))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

fn vendor_query() -> ListQuery {
    let mut base_where = Map::new();
    base_where.insert("organizationId".into(), json!("org1"));
    let filters = FilterSet::new().with(FilterPredicate::equals("name", "acme"));
    ListQuery::build(
        &base_where,
        &BTreeSet::from(["tags".to_string()]),
        None,
        1,
        10,
        &filters,
        &[SortSpec::asc("name")],
    )
}

#[tokio::test]
async fn sends_the_query_as_json_data_parameter() {
    let (server_url, state) = spawn_list_server().await.expect("spawn server");
    let transport = HttpListTransport::new(&format!("{server_url}/")).expect("transport");

    let page = transport
        .fetch_page("api/vendors/pagination", &vendor_query())
        .await
        .expect("fetch");

    assert_eq!(page.total, 42);
    assert_eq!(page.items.len(), 2);
    let received = state.received.lock().await;
    assert_eq!(
        received[0],
        json!({
            "relations": ["tags"],
            "findInput": { "organizationId": "org1", "name": "acme" },
            "page": 1,
            "pageSize": 10,
            "sort": { "name": "ASC" },
        })
    );
}

#[tokio::test]
async fn api_error_body_is_surfaced_on_rejection() {
    let (server_url, _state) = spawn_list_server().await.expect("spawn server");
    let transport = HttpListTransport::new(&server_url).expect("transport");

    let err = transport
        .fetch_page("/api/forbidden", &vendor_query())
        .await
        .expect_err("forbidden");

    match err {
        ListError::Rejected {
            status, source, ..
        } => {
            assert_eq!(status, 403);
            assert_eq!(source.code, ErrorCode::Forbidden);
            assert_eq!(source.message, "missing ORG_VENDORS_VIEW");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn empty_error_body_falls_back_to_status_reason() {
    let (server_url, _state) = spawn_list_server().await.expect("spawn server");
    let transport = HttpListTransport::new(&server_url).expect("transport");

    let err = transport
        .fetch_page("/api/broken", &vendor_query())
        .await
        .expect_err("bad gateway");

    match err {
        ListError::Rejected { status, source, .. } => {
            assert_eq!(status, 502);
            assert_eq!(source.code, ErrorCode::Internal);
            assert_eq!(source.message, "Bad Gateway");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let transport = HttpListTransport::new(&format!("http://{addr}")).expect("transport");

    let err = transport
        .fetch_page("/api/vendors/pagination", &vendor_query())
        .await
        .expect_err("connection refused");
    assert!(matches!(err, ListError::Transport { .. }));
}

#[test]
fn rejects_malformed_server_url() {
    assert!(matches!(
        HttpListTransport::new("not a url"),
        Err(ListError::InvalidServerUrl(_))
    ));
}

#[test]
fn maps_statuses_to_error_codes() {
    assert_eq!(
        error_code_for_status(StatusCode::UNAUTHORIZED),
        ErrorCode::Unauthorized
    );
    assert_eq!(
        error_code_for_status(StatusCode::UNPROCESSABLE_ENTITY),
        ErrorCode::Validation
    );
    assert_eq!(
        error_code_for_status(StatusCode::TOO_MANY_REQUESTS),
        ErrorCode::RateLimited
    );
}
