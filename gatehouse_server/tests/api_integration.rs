//! End-to-end API tests over an in-memory store.
//!
//! Each test builds the full router and drives it with `tower::ServiceExt::
//! oneshot`, asserting on status codes, cookies, and JSON bodies the way a
//! browser client would see them.

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use gatehouse::{
    MailSettings, SecretCodec, SessionIssuer,
    auth::{AuthManager, Role},
    email::MemoryMailer,
    identity::{StaticVerifier, VerifiedIdentity},
    store::MemoryStore,
};
use gatehouse_server::api::{AppState, create_router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

const AGENT_A: &str = "Mozilla/5.0 (X11; Linux x86_64) laptop";
const AGENT_B: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) phone";

struct Harness {
    app: Router,
    auth: Arc<AuthManager>,
    mailer: Arc<MemoryMailer>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let mailer = Arc::new(MemoryMailer::new());
    let identity = VerifiedIdentity {
        name: "Carol".to_string(),
        email: "carol@example.com".to_string(),
        picture: Some("https://example.com/carol.png".to_string()),
        subject_id: "google-sub-1".to_string(),
    };
    let auth = Arc::new(AuthManager::new(
        store.clone(),
        store,
        mailer.clone(),
        Arc::new(StaticVerifier::new(identity)),
        SecretCodec::new("integration-code-key"),
        SessionIssuer::new("integration-jwt-secret-with-length".to_string()),
        "integration-pepper".to_string(),
        MailSettings {
            from: "accounts@example.com".to_string(),
            reply_to: "noreply@example.com".to_string(),
            frontend_url: "https://app.example.com".to_string(),
        },
    ));
    let state = AppState {
        auth_manager: auth.clone(),
    };
    let app = create_router(state, &["https://app.example.com".to_string()]);
    Harness { app, auth, mailer }
}

fn json_request(method: &str, uri: &str, agent: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, agent)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bare_request(method: &str, uri: &str, agent: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, agent)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, cookie, body)
}

/// Pull the bare token value out of a `Set-Cookie` header.
fn cookie_token(cookie: &str) -> String {
    cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("token="))
        .unwrap()
        .to_string()
}

async fn register_alice(app: &Router) -> (String, Value) {
    let (status, cookie, body) = send(
        app,
        json_request(
            "POST",
            "/api/users/register",
            AGENT_A,
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "hunter22",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (cookie_token(&cookie.expect("register sets the session cookie")), body)
}

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let h = harness();
    let (status, _, body) = send(&h.app, bare_request("GET", "/health", AGENT_A)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn register_sets_a_hardened_session_cookie() {
    let h = harness();
    let (status, cookie, body) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/register",
            AGENT_A,
            json!({
                "name": "Alice",
                "email": "alice@example.com",
                "password": "hunter22",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("token="));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=None"));

    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["role"], "user");
    assert_eq!(body["isVerified"], false);
    assert!(body["token"].is_string());
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());
}

#[tokio::test]
async fn login_from_known_device_omits_the_body_token() {
    let h = harness();
    register_alice(&h.app).await;

    let (status, cookie, body) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login",
            AGENT_A,
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());
    assert_eq!(body["email"], "alice@example.com");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn login_from_unknown_device_is_challenged_without_a_cookie() {
    let h = harness();
    register_alice(&h.app).await;

    let (status, cookie, body) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login",
            AGENT_B,
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(cookie.is_none(), "no session on a challenged login");
    assert!(body["error"].as_str().unwrap().contains("code"));
}

#[tokio::test]
async fn challenge_flow_trusts_the_new_device() {
    let h = harness();
    register_alice(&h.app).await;

    // Unknown device trips the challenge.
    let (status, _, _) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login",
            AGENT_B,
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The code arrives by email in plaintext.
    let (status, _, _) = send(
        &h.app,
        bare_request("GET", "/api/users/send-login-code/alice@example.com", AGENT_B),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let code = h.mailer.last().await.expect("code email was sent").link;

    // Wrong code is rejected.
    let (status, _, _) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login-with-code/alice@example.com",
            AGENT_B,
            json!({ "loginCode": "000000" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Correct code issues a session and the body token.
    let (status, cookie, body) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login-with-code/alice@example.com",
            AGENT_B,
            json!({ "loginCode": code }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(cookie.is_some());
    assert!(body["token"].is_string());

    // The device is now trusted for plain login.
    let (status, _, _) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login",
            AGENT_B,
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_reject_missing_and_garbage_cookies() {
    let h = harness();

    let (status, _, _) = send(&h.app, bare_request("GET", "/api/users/get-user", AGENT_A)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .method("GET")
        .uri("/api/users/get-user")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, "token=not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_grants_access_to_the_profile() {
    let h = harness();
    let (token, _) = register_alice(&h.app).await;

    let request = Request::builder()
        .method("GET")
        .uri("/api/users/get-user")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Alice");
    assert!(body.get("token").is_none());
}

#[tokio::test]
async fn login_status_tracks_cookie_validity() {
    let h = harness();
    let (token, _) = register_alice(&h.app).await;

    let (status, _, body) = send(
        &h.app,
        bare_request("GET", "/api/users/login-status", AGENT_A),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Bool(false));

    let request = Request::builder()
        .method("GET")
        .uri("/api/users/login-status")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let (_, _, body) = send(&h.app, request).await;
    assert_eq!(body, Value::Bool(true));
}

#[tokio::test]
async fn logout_expires_the_cookie_at_the_epoch() {
    let h = harness();
    let (status, cookie, _) = send(
        &h.app,
        bare_request("GET", "/api/users/logout", AGENT_A),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("token=;"));
    assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
}

#[tokio::test]
async fn admin_listing_is_gated_by_role() {
    let h = harness();
    let (token, body) = register_alice(&h.app).await;
    let alice_id = body["id"].as_str().unwrap().parse().unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/users")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    h.auth.upgrade_role(alice_id, Role::Admin).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/users")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn suspended_users_cannot_use_their_session() {
    let h = harness();
    let (token, body) = register_alice(&h.app).await;
    let alice_id = body["id"].as_str().unwrap().parse().unwrap();

    h.auth.upgrade_role(alice_id, Role::Suspended).await.unwrap();

    let request = Request::builder()
        .method("GET")
        .uri("/api/users/get-user")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("suspended"));
}

#[tokio::test]
async fn identity_login_provisions_a_verified_account() {
    let h = harness();

    let (status, cookie, body) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/google/callback",
            AGENT_A,
            json!({ "userToken": "opaque-provider-token" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert!(cookie.is_some());
    assert_eq!(body["email"], "carol@example.com");
    assert_eq!(body["isVerified"], true);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let h = harness();
    register_alice(&h.app).await;

    let (status, _, body) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/register",
            AGENT_B,
            json!({
                "name": "Alice Again",
                "email": "alice@example.com",
                "password": "hunter23",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already"));
}

#[tokio::test]
async fn verification_email_round_trip() {
    let h = harness();
    let (token, _) = register_alice(&h.app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/users/send-verification-email")
        .header(header::USER_AGENT, AGENT_A)
        .header(header::COOKIE, format!("token={token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, request).await;
    assert_eq!(status, StatusCode::OK);

    let link = h.mailer.last().await.unwrap().link;
    let raw = link.rsplit('/').next().unwrap().to_string();

    let (status, _, _) = send(
        &h.app,
        bare_request("PATCH", &format!("/api/users/verify-user/{raw}"), AGENT_A),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // The raw token is single-use.
    let (status, _, _) = send(
        &h.app,
        bare_request("PATCH", &format!("/api/users/verify-user/{raw}"), AGENT_A),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn password_reset_round_trip() {
    let h = harness();
    register_alice(&h.app).await;

    let (status, _, _) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/forgot-password",
            AGENT_A,
            json!({ "email": "alice@example.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let link = h.mailer.last().await.unwrap().link;
    let raw = link.rsplit('/').next().unwrap().to_string();

    let (status, _, _) = send(
        &h.app,
        json_request(
            "PUT",
            &format!("/api/users/reset-password/{raw}"),
            AGENT_A,
            json!({ "password": "n3w-secret" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old password no longer works; the new one does.
    let (status, _, _) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login",
            AGENT_A,
            json!({ "email": "alice@example.com", "password": "hunter22" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &h.app,
        json_request(
            "POST",
            "/api/users/login",
            AGENT_A,
            json!({ "email": "alice@example.com", "password": "n3w-secret" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}
