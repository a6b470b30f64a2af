mod support;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use serde_json::{Value, json};
use tower::ServiceExt;

use taskhub::api::router;

use support::*;

async fn app() -> Router {
    let db = setup_db().await;
    router(test_state(db))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let response = app.clone().oneshot(request).await.expect("send request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("parse body")
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "Password1!",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().expect("token").to_string();
    let user_id = body["user"]["id"].as_str().expect("user id").to_string();
    (token, user_id)
}

#[tokio::test]
async fn register_login_me_flow() {
    let app = app().await;

    // First account bootstraps as admin.
    let (_, _) = register(&app, "root").await;
    let (_, alice_id) = register(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({
            "username_or_email": "alice@example.com",
            "password": "Password1!",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"]["last_login_at"].is_string());
    let token = body["token"].as_str().expect("token");

    let (status, body) = send(&app, "GET", "/auth/me", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], alice_id.as_str());
    assert_eq!(body["username"], "alice");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = app().await;
    register(&app, "root").await;

    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({
            "username_or_email": "root",
            "password": "wrong-password",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn task_crud_respects_ownership() {
    let app = app().await;
    let (admin_token, _) = register(&app, "root").await;
    let (alice_token, _) = register(&app, "alice").await;
    let (bob_token, _) = register(&app, "bob").await;

    let (status, task) = send(
        &app,
        "POST",
        "/tasks",
        Some(&alice_token),
        Some(json!({
            "title": "write report",
            "due_date": Utc::now(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let task_id = task["id"].as_str().expect("task id").to_string();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["category"], "personal");

    // Owner reads it; a stranger gets Forbidden, not NotFound.
    let uri = format!("/tasks/{task_id}");
    let (status, _) = send(&app, "GET", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, Some(&bob_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);

    // Stranger cannot mutate either.
    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&bob_token),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = send(
        &app,
        "PATCH",
        &uri,
        Some(&alice_token),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(updated["completed_at"].is_string());

    let (status, _) = send(&app, "DELETE", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_admin_cannot_create_for_someone_else() {
    let app = app().await;
    register(&app, "root").await;
    let (alice_token, _) = register(&app, "alice").await;
    let (_, bob_id) = register(&app, "bob").await;

    let (status, _) = send(
        &app,
        "POST",
        "/tasks",
        Some(&alice_token),
        Some(json!({
            "title": "sneaky",
            "due_date": Utc::now(),
            "user_id": bob_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_assignment_endpoint() {
    let app = app().await;
    let (admin_token, admin_id) = register(&app, "root").await;
    let (alice_token, alice_id) = register(&app, "alice").await;

    let (status, task) = send(
        &app,
        "POST",
        "/admin/tasks/assign",
        Some(&admin_token),
        Some(json!({
            "title": "assigned work",
            "due_date": Utc::now(),
            "user_id": alice_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["user_id"], alice_id.as_str());
    assert_eq!(task["assigned_by"], admin_id.as_str());

    // Regular users are turned away at the admin boundary.
    let (status, _) = send(
        &app,
        "POST",
        "/admin/tasks/assign",
        Some(&alice_token),
        Some(json!({
            "title": "nope",
            "due_date": Utc::now(),
            "user_id": alice_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn validation_and_parameter_errors_map_to_http() {
    let app = app().await;
    let (token, _) = register(&app, "root").await;

    let (status, body) = send(
        &app,
        "POST",
        "/tasks",
        Some(&token),
        Some(json!({
            "title": "   ",
            "due_date": Utc::now(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"][0]["field"], "title");

    let (status, _) = send(&app, "GET", "/tasks?group=bogus", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/tasks/search", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_or_bad_token_is_unauthorized() {
    let app = app().await;
    register(&app, "root").await;

    let (status, _) = send(&app, "GET", "/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/tasks", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_surfaces_are_admin_only() {
    let app = app().await;
    let (admin_token, _) = register(&app, "root").await;
    let (alice_token, _) = register(&app, "alice").await;

    for uri in [
        "/admin/users",
        "/admin/analytics/top-users",
        "/admin/analytics/weekly",
    ] {
        let (status, _) = send(&app, "GET", uri, Some(&alice_token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri} should be admin-only");
        let (status, _) = send(&app, "GET", uri, Some(&admin_token), None).await;
        assert_eq!(status, StatusCode::OK, "{uri} should work for admins");
    }
}

#[tokio::test]
async fn analytics_scope_is_clamped_for_users() {
    let app = app().await;
    let (admin_token, _) = register(&app, "root").await;
    let (alice_token, alice_id) = register(&app, "alice").await;
    let (bob_token, bob_id) = register(&app, "bob").await;

    for token in [&alice_token, &alice_token, &bob_token] {
        let (status, _) = send(
            &app,
            "POST",
            "/tasks",
            Some(token),
            Some(json!({"title": "work item", "due_date": Utc::now()})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Alice asking for Bob's numbers still gets her own.
    let uri = format!("/analytics/summary?user_id={bob_id}");
    let (status, body) = send(&app, "GET", &uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    // An admin may narrow to any user.
    let uri = format!("/analytics/summary?user_id={alice_id}");
    let (status, body) = send(&app, "GET", &uri, Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, body) = send(&app, "GET", "/analytics/summary", Some(&admin_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn deactivated_user_loses_access() {
    let app = app().await;
    let (admin_token, _) = register(&app, "root").await;
    let (alice_token, alice_id) = register(&app, "alice").await;

    let uri = format!("/admin/users/{alice_id}");
    let (status, body) = send(
        &app,
        "PATCH",
        &uri,
        Some(&admin_token),
        Some(json!({"is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = send(&app, "GET", "/auth/me", Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/auth/login",
        None,
        Some(json!({
            "username_or_email": "alice",
            "password": "Password1!",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn last_admin_deactivation_conflicts_over_http() {
    let app = app().await;
    let (admin_token, admin_id) = register(&app, "root").await;

    let uri = format!("/admin/users/{admin_id}");
    let (status, _) = send(
        &app,
        "PATCH",
        &uri,
        Some(&admin_token),
        Some(json!({"is_active": false})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
