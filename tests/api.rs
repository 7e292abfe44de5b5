use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use useraccounts::{app::build_app, auth::mailer::MemoryMailer, state::AppState};

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Reply {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
        Some(b) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply { status, cookie, body }
}

async fn register(app: &Router, user_name: &str, email: &str) -> String {
    let reply = send(
        app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({ "userName": user_name, "email": email, "password": "secret1" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
    reply.body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health() {
    let app = build_app(AppState::fake());
    let reply = send(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
}

#[tokio::test]
async fn register_login_and_me() {
    let app = build_app(AppState::fake());
    let t1 = register(&app, "alice_1", "a@b.com").await;

    let login = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "userName": "alice_1", "password": "secret1" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["success"], true);
    let t2 = login.body["token"].as_str().unwrap().to_string();
    let cookie = login.cookie.expect("session cookie");
    assert!(cookie.starts_with(&format!("token={t2};")));
    assert!(cookie.contains("HttpOnly"));

    for token in [t1.as_str(), t2.as_str()] {
        let me = send(&app, Method::GET, "/api/v1/auth/me", Some(token), None).await;
        assert_eq!(me.status, StatusCode::OK);
        assert_eq!(me.body["data"]["userName"], "alice_1");
        assert_eq!(me.body["data"]["profileImage"], "no-photo.jpg");
        assert!(me.body["data"].get("passwordHash").is_none());
    }

    let bad = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "userName": "alice_1", "password": "wrong" })),
    )
    .await;
    assert_eq!(bad.status, StatusCode::UNAUTHORIZED);
    assert_eq!(bad.body, json!({ "success": false, "message": "Invalid credentials" }));
}

#[tokio::test]
async fn session_cookie_authenticates() {
    let app = build_app(AppState::fake());
    let token = register(&app, "alice_1", "a@b.com").await;

    let req = Request::builder()
        .uri("/api/v1/auth/me")
        .header(header::COOKIE, format!("theme=dark; token={token}"))
        .body(Body::empty())
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn me_without_or_with_bad_token() {
    let app = build_app(AppState::fake());
    let reply = send(&app, Method::GET, "/api/v1/auth/me", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["success"], false);

    let reply = send(&app, Method::GET, "/api/v1/auth/me", Some("not.a.token"), None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_cookie() {
    let app = build_app(AppState::fake());
    let reply = send(&app, Method::GET, "/api/v1/auth/logout", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!({ "success": true, "data": {} }));
    let cookie = reply.cookie.unwrap();
    assert!(cookie.starts_with("token=none;"));
    assert!(cookie.contains("Max-Age=10"));
}

#[tokio::test]
async fn duplicates_conflict() {
    let app = build_app(AppState::fake());
    register(&app, "alice_1", "a@b.com").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({ "userName": "alice_1", "email": "x@b.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["message"], "User Name already taken! Change the User Name");

    let reply = send(
        &app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({ "userName": "bob", "email": "a@b.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["message"], "Email address already exists!");
}

#[tokio::test]
async fn invalid_registration_is_bad_request() {
    let app = build_app(AppState::fake());
    let reply = send(
        &app,
        Method::POST,
        "/api/v1/auth",
        None,
        Some(json!({ "userName": "alice", "email": "a@b.com", "password": "123" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["success"], false);
}

#[tokio::test]
async fn update_details_and_password() {
    let app = build_app(AppState::fake());
    let token = register(&app, "alice_1", "a@b.com").await;

    let reply = send(
        &app,
        Method::PUT,
        "/api/v1/auth/updatedetails",
        Some(token.as_str()),
        Some(json!({ "userName": "alice_2", "phoneNumber": "0123456789" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["userName"], "alice_2");
    assert_eq!(reply.body["data"]["phoneNumber"], "0123456789");

    let reply = send(
        &app,
        Method::PUT,
        "/api/v1/auth/updatepassword",
        Some(token.as_str()),
        Some(json!({ "currentPassword": "nope-nope", "newPassword": "secret2" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["message"], "Password is incorrect");

    let reply = send(
        &app,
        Method::PUT,
        "/api/v1/auth/updatepassword",
        Some(token.as_str()),
        Some(json!({ "currentPassword": "secret1", "newPassword": "secret2" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["token"].is_string());

    let login = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "email": "a@b.com", "password": "secret2" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_routes_require_admin() {
    let app = build_app(AppState::fake());
    let user_token = register(&app, "alice_1", "a@b.com").await;
    let admin_token = register(&app, "root", "admin@example.com").await;

    let reply = send(&app, Method::GET, "/api/v1/users", Some(user_token.as_str()), None).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);

    let reply = send(&app, Method::GET, "/api/v1/users", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let reply = send(&app, Method::GET, "/api/v1/users", Some(admin_token.as_str()), None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["total"], 2);
    assert_eq!(reply.body["count"], 2);

    let alice = reply.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["userName"] == "alice_1")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let reply = send(
        &app,
        Method::PUT,
        &format!("/api/v1/users/block/{alice}"),
        Some(admin_token.as_str()),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["data"]["isActive"], false);

    let reply = send(
        &app,
        Method::PUT,
        &format!("/api/v1/users/block/{alice}"),
        Some(admin_token.as_str()),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "User already blocked");

    let login = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "userName": "alice_1", "password": "secret1" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::UNAUTHORIZED);
    assert_eq!(login.body["message"], "Your account is not active please contact support!");

    let reply = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/users/{alice}"),
        Some(admin_token.as_str()),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);

    let reply = send(
        &app,
        Method::GET,
        &format!("/api/v1/users/{alice}"),
        Some(admin_token.as_str()),
        None,
    )
    .await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);

    let reply = send(&app, Method::GET, "/api/v1/users/not-a-uuid", Some(admin_token.as_str()), None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn forgot_and_reset_password() {
    let mailer = Arc::new(MemoryMailer::default());
    let app = build_app(AppState::fake().with_mailer(mailer.clone()));
    register(&app, "alice_1", "a@b.com").await;

    let reply = send(
        &app,
        Method::POST,
        "/api/v1/auth/forgotpassword",
        None,
        Some(json!({ "email": "a@b.com" })),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    let unknown = send(
        &app,
        Method::POST,
        "/api/v1/auth/forgotpassword",
        None,
        Some(json!({ "email": "ghost@b.com" })),
    )
    .await;
    assert_eq!(unknown.status, reply.status);
    assert_eq!(unknown.body, reply.body);

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    let token = mailer.last_token().unwrap();
    assert!(sent[0]
        .reset_url
        .ends_with(&format!("/api/v1/auth/resetpassword/{token}")));

    let uri = format!("/api/v1/auth/resetpassword/{token}");
    let reply = send(&app, Method::PUT, &uri, None, Some(json!({ "password": "newsecret" }))).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.body["token"].is_string());

    let again = send(&app, Method::PUT, &uri, None, Some(json!({ "password": "another1" }))).await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
    assert_eq!(again.body["message"], "Invalid reset token");

    let login = send(
        &app,
        Method::POST,
        "/api/v1/auth/login",
        None,
        Some(json!({ "userName": "alice_1", "password": "newsecret" })),
    )
    .await;
    assert_eq!(login.status, StatusCode::OK);
}
