//! Drives the HTTP client and the endpoint data sources against an
//! in-process fake backend.

use axum::extract::{Path, Query};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use dms_client::api::{ActivityLogSource, DmsApiClient, DocumentsSource, UsersSource};
use dms_client::data::{PageChange, PaginationMode, Row, TabularView, ViewStatus};
use dms_client::services::load_dashboard;
use dms_client::session::{Role, Session};
use dms_client::{ApiError, ViewError};

const USER_COUNT: u64 = 23;
const USER_DOC_COUNT: u64 = 12;

fn token(user_id: u64, is_admin: bool) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({"user_id": user_id, "is_admin": is_admin}).to_string())
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "))
}

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let (id, is_admin) = match body["email"].as_str() {
        Some("admin@x.com") => (1, 1),
        Some("user@x.com") => (7, 0),
        _ => (0, 0),
    };
    if id == 0 || body["password"] != "secret" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"message": "Invalid email or password"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "token": token(id, is_admin == 1),
            "is_admin": is_admin,
            "message": "Login successful"
        })),
    )
}

async fn register(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["email"] == "taken@x.com" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"message": "Email already exists"})),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({"message": "User registered successfully"})),
    )
}

async fn users(headers: HeaderMap, Query(q): Query<HashMap<String, usize>>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Token is missing"})));
    }
    let page = q.get("page").copied().unwrap_or(1);
    let limit = q.get("limit").copied().unwrap_or(10);
    if page == 99 {
        return (
            StatusCode::OK,
            Json(json!({"success": false, "error": "Failed to load users"})),
        );
    }
    if limit == 13 {
        return (
            StatusCode::OK,
            Json(json!({"success": true, "users": "oops", "total": 1})),
        );
    }
    let users: Vec<Value> = (1..=USER_COUNT)
        .skip((page - 1) * limit)
        .take(limit)
        .map(|id| {
            json!({
                "id": id,
                "email": format!("user{:02}@x.com", id),
                "role": if id == 1 { "admin" } else { "user" },
                "is_active": id % 2,
            })
        })
        .collect();
    (
        StatusCode::OK,
        Json(json!({"success": true, "users": users, "total": USER_COUNT})),
    )
}

async fn user_documents() -> Json<Value> {
    let documents: Vec<Value> = (0..USER_DOC_COUNT)
        .map(|i| {
            json!({
                "id": 100 + i,
                "name": format!("doc{:02}.pdf", i),
                "upload_date": format!("2024-10-{:02} 09:00:00", i + 1),
            })
        })
        .collect();
    Json(json!({"success": true, "documents": documents}))
}

async fn documents(Query(q): Query<HashMap<String, usize>>) -> Json<Value> {
    let limit = q.get("limit").copied().unwrap_or(10);
    let documents: Vec<Value> = (0..limit as u64)
        .map(|i| json!({"id": 500 + i, "name": format!("all{}.pdf", i), "user_id": 7}))
        .collect();
    Json(json!({"success": true, "documents": documents, "total": 40}))
}

async fn activity_logs(Json(body): Json<Value>) -> Json<Value> {
    let term = body["search_term"].as_str().unwrap_or("").to_lowercase();
    let logs: Vec<Value> = [
        (1, "User logged in", "2024-10-15 09:00:00"),
        (2, "Uploaded report.pdf", "2024-10-15 09:05:00"),
        (3, "Deactivated user 4", "2024-10-15 09:10:00"),
    ]
    .iter()
    .filter(|(_, action, _)| action.to_lowercase().contains(&term))
    .map(|(id, action, ts)| json!({"id": id, "user_id": 1, "action": action, "timestamp": ts}))
    .collect();
    Json(json!({"success": true, "logs": logs}))
}

async fn dashboard() -> Json<Value> {
    Json(json!({
        "total_documents": 12,
        "total_users": USER_COUNT,
        "recent_activities": [{"action": "User logged in", "timestamp": "2024-10-15 09:00:00"}]
    }))
}

async fn admin_name() -> Json<Value> {
    Json(json!({"admin_name": "admin@x.com"}))
}

async fn user_name() -> Json<Value> {
    Json(json!({"user_name": "user@x.com"}))
}

async fn document_count() -> Json<Value> {
    Json(json!({"success": true, "count": USER_DOC_COUNT}))
}

async fn download(Path(id): Path<u64>) -> impl IntoResponse {
    (
        [(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"doc{}.pdf\"", id),
        )],
        b"%PDF-1.4".to_vec(),
    )
}

async fn admin_delete(Path(id): Path<u64>) -> Json<Value> {
    Json(json!({"success": true, "message": format!("Document {} deleted", id)}))
}

async fn spawn_backend() -> String {
    let app = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/get_users", get(users))
        .route("/get_documents", get(documents))
        .route("/get_user_documents", get(user_documents))
        .route("/get_activity_logs", post(activity_logs))
        .route("/get_dashboard_data", get(dashboard))
        .route("/get_admin_name", get(admin_name))
        .route("/get_user_name", get(user_name))
        .route("/get-document-count", get(document_count))
        .route("/user/document/:id/download", get(download))
        .route("/admin/document/:id/delete", delete(admin_delete));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn client() -> DmsApiClient {
    let base = spawn_backend().await;
    DmsApiClient::new(&base, Duration::from_secs(5)).unwrap()
}

async fn admin(client: &DmsApiClient) -> Session {
    client.login("admin@x.com", "secret", Role::Admin).await.unwrap()
}

fn ids(rows: &[Row]) -> Vec<&str> {
    rows.iter().map(Row::id).collect()
}

#[tokio::test]
async fn test_login_builds_session_from_token() {
    let client = client().await;
    let session = admin(&client).await;
    assert_eq!(session.role(), Role::Admin);
    assert_eq!(session.actor.id, "1");
    assert_eq!(session.email, "admin@x.com");
}

#[tokio::test]
async fn test_login_with_wrong_role_is_refused() {
    let client = client().await;
    let err = client
        .login("user@x.com", "secret", Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::RoleMismatch { .. }));
}

#[tokio::test]
async fn test_bad_credentials_carry_server_message() {
    let client = client().await;
    let err = client
        .login("admin@x.com", "wrong", Role::Admin)
        .await
        .unwrap_err();
    match err {
        ApiError::Status { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid email or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_register_checks_confirmation_then_posts() {
    let client = client().await;
    let err = client.register("new@x.com", "pw1", "pw2").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidInput(_)));

    let message = client.register("new@x.com", "pw1", "pw1").await.unwrap();
    assert_eq!(message, "User registered successfully");

    let err = client.register("taken@x.com", "pw", "pw").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_users_view_is_server_paginated() {
    let client = client().await;
    let session = admin(&client).await;
    let source = UsersSource::new(client.clone(), session);
    assert_eq!(source.mode(), PaginationMode::ServerDriven);

    let view = TabularView::new(source, PaginationMode::ServerDriven, 10).unwrap();
    view.load(1, 10).await.unwrap();
    assert_eq!(view.total(), USER_COUNT as usize);
    assert_eq!(view.total_pages(), 3);
    assert_eq!(view.render().len(), 10);

    assert_eq!(view.go_to_page(3).await.unwrap(), PageChange::Moved(3));
    assert_eq!(ids(&view.render()), vec!["21", "22", "23"]);
    assert_eq!(view.next_page().await.unwrap(), PageChange::Unchanged);
}

#[tokio::test]
async fn test_rejected_reply_keeps_last_good_page() {
    let client = client().await;
    let session = admin(&client).await;
    let view = TabularView::new(
        UsersSource::new(client.clone(), session),
        PaginationMode::ServerDriven,
        10,
    )
    .unwrap();
    view.load(1, 10).await.unwrap();

    let err = view.load(99, 10).await.unwrap_err();
    assert!(matches!(err, ViewError::Fetch { ref message } if message.contains("Failed to load users")));
    assert_eq!(view.status(), ViewStatus::LoadFailed);
    assert_eq!(view.state().page, 1);
    assert_eq!(view.render().len(), 10);
}

#[tokio::test]
async fn test_malformed_payload_is_parse_error() {
    let client = client().await;
    let session = admin(&client).await;
    let view = TabularView::new(
        UsersSource::new(client.clone(), session),
        PaginationMode::ServerDriven,
        13,
    )
    .unwrap();
    let err = view.load(1, 13).await.unwrap_err();
    assert!(matches!(err, ViewError::Parse { .. }));
    assert_eq!(view.status(), ViewStatus::LoadFailed);
}

#[tokio::test]
async fn test_user_documents_are_client_paginated() {
    let client = client().await;
    let session = client.login("user@x.com", "secret", Role::User).await.unwrap();
    let source = DocumentsSource::new(client.clone(), session);
    assert_eq!(source.mode(), PaginationMode::ClientDriven);

    let view = TabularView::new(source, PaginationMode::ClientDriven, 5).unwrap();
    view.load(1, 5).await.unwrap();
    assert_eq!(view.total(), USER_DOC_COUNT as usize);
    assert_eq!(view.total_pages(), 3);
    assert_eq!(view.render().len(), 5);

    view.set_filter("doc1", ["name"]);
    assert_eq!(ids(&view.render()), vec!["110", "111"]);
    assert_eq!(view.total_pages(), 1);
}

#[tokio::test]
async fn test_admin_documents_use_server_total() {
    let client = client().await;
    let session = admin(&client).await;
    let source = DocumentsSource::new(client.clone(), session);
    assert_eq!(source.mode(), PaginationMode::ServerDriven);

    let view = TabularView::new(source, PaginationMode::ServerDriven, 10).unwrap();
    view.load(1, 10).await.unwrap();
    assert_eq!(view.total(), 40);
    assert_eq!(view.total_pages(), 4);
}

#[tokio::test]
async fn test_activity_search_term_is_sent() {
    let client = client().await;
    let session = admin(&client).await;
    let source = ActivityLogSource::new(client.clone(), session, "upload");
    let view = TabularView::new(source, PaginationMode::ClientDriven, 10).unwrap();
    view.load(1, 10).await.unwrap();
    assert_eq!(ids(&view.render()), vec!["2"]);
}

#[tokio::test]
async fn test_download_names_file_from_header() {
    let client = client().await;
    let session = client.login("user@x.com", "secret", Role::User).await.unwrap();
    let file = client.download_document(&session, "104").await.unwrap();
    assert_eq!(file.filename, "doc104.pdf");
    assert_eq!(file.bytes, b"%PDF-1.4");

    let dir = tempfile::tempdir().unwrap();
    let path = file.save_to(dir.path()).await.unwrap();
    assert!(path.ends_with("doc104.pdf"));
}

#[tokio::test]
async fn test_admin_delete_uses_admin_route() {
    let client = client().await;
    let session = admin(&client).await;
    let message = client.delete_document(&session, "42").await.unwrap();
    assert_eq!(message, "Document 42 deleted");
}

#[tokio::test]
async fn test_dashboard_summary() {
    let client = client().await;
    let session = admin(&client).await;
    let summary = load_dashboard(&client, &session).await.unwrap();
    assert_eq!(summary.display_name, "admin@x.com");
    assert_eq!(summary.total_users, USER_COUNT);
    assert_eq!(summary.recent_activities.len(), 1);
    assert_eq!(summary.own_documents, None);
}

#[tokio::test]
async fn test_user_dashboard_counts_own_documents() {
    let client = client().await;
    let session = client.login("user@x.com", "secret", Role::User).await.unwrap();
    let summary = load_dashboard(&client, &session).await.unwrap();
    assert_eq!(summary.display_name, "user@x.com");
    assert_eq!(summary.own_documents, Some(USER_DOC_COUNT));
}
