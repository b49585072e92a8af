use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use splus_domain::config::SameSite;
use splus_sessions::{CookiePayload, Session, SessionError, SessionLayer};
use std::time::Duration;
use tower::ServiceExt;

const COOKIE: &str = "__session_cookie";

async fn counter(session: Session) -> String {
    let count = session.get::<u64>("count").unwrap_or(0) + 1;
    session.insert("count", count).expect("serializable");
    count.to_string()
}

async fn peek(session: Session) -> String {
    session.get::<u64>("count").unwrap_or(0).to_string()
}

async fn logout(session: Session) -> &'static str {
    session.clear();
    "bye"
}

fn layer() -> SessionLayer {
    SessionLayer::builder().secret("test-secret").build().expect("valid layer")
}

fn app(sessions: &SessionLayer) -> Router {
    Router::new()
        .route("/count", get(counter))
        .route("/peek", get(peek))
        .route("/logout", get(logout))
        .layer(sessions.clone())
}

fn request(path: &str, cookie: Option<&str>) -> Request {
    let mut builder = Request::builder().uri(path);
    if let Some(value) = cookie {
        builder = builder.header(header::COOKIE, format!("{COOKIE}={value}"));
    }
    builder.body(Body::empty()).expect("valid request")
}

fn set_cookie(response: &Response) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// The cookie value out of a `Set-Cookie` header.
fn cookie_of(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().expect("pair");
    let (_, value) = pair.split_once('=').expect("name=value");
    value.to_owned()
}

async fn body(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8")
}

#[tokio::test]
async fn test_session_persists_between_requests() {
    let sessions = layer();
    let app = app(&sessions);

    let first = app.clone().oneshot(request("/count", None)).await.expect("infallible");
    let cookie = cookie_of(&set_cookie(&first).expect("session cookie"));
    assert_eq!(body(first).await, "1");

    let second = app.clone().oneshot(request("/count", Some(&cookie))).await.expect("infallible");
    let renewed = cookie_of(&set_cookie(&second).expect("renewed cookie"));
    assert_eq!(body(second).await, "2");

    let third = app.clone().oneshot(request("/peek", Some(&renewed))).await.expect("infallible");
    assert_eq!(body(third).await, "2");
    assert_eq!(sessions.storage().len(), 1);
}

#[tokio::test]
async fn test_renewal_keeps_storage_key() {
    let sessions = layer();
    let app = app(&sessions);

    let first = app.clone().oneshot(request("/count", None)).await.expect("infallible");
    let cookie = cookie_of(&set_cookie(&first).expect("session cookie"));
    let second = app.clone().oneshot(request("/count", Some(&cookie))).await.expect("infallible");
    let renewed = cookie_of(&set_cookie(&second).expect("renewed cookie"));

    let key_of = |value: &str| CookiePayload::decode(value, sessions.signer()).expect("valid cookie").key;
    assert_eq!(key_of(&cookie), key_of(&renewed));
}

#[tokio::test]
async fn test_untouched_session_sets_no_cookie() {
    let app = app(&layer());

    let response = app.oneshot(request("/peek", None)).await.expect("infallible");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookie(&response).is_none());
}

#[tokio::test]
async fn test_cookie_flags() {
    let sessions = SessionLayer::builder()
        .secret("test-secret")
        .name("sid")
        .max_age(Duration::from_secs(3600))
        .same_site(SameSite::Strict)
        .secure(false)
        .build()
        .expect("valid layer");
    let app = app(&sessions);

    let response = app.oneshot(request("/count", None)).await.expect("infallible");
    let header = set_cookie(&response).expect("session cookie");

    assert!(header.starts_with("sid="));
    assert!(header.ends_with("; HttpOnly; SameSite=strict; Path=/; Max-Age=3600"));
    assert!(!header.contains("secure"));
}

#[tokio::test]
async fn test_cookie_is_signed_pointer() {
    let sessions = layer();
    let app = app(&sessions);

    let response = app.oneshot(request("/count", None)).await.expect("infallible");
    let cookie = cookie_of(&set_cookie(&response).expect("session cookie"));

    let signed = String::from_utf8(STANDARD.decode(&cookie).expect("base64")).expect("utf-8");
    assert!(!signed.contains("count"));

    let payload = CookiePayload::decode(&cookie, sessions.signer()).expect("valid cookie");
    assert!(!payload.is_expired());
    assert!(payload.key.len() >= 64);
}

#[tokio::test]
async fn test_clearing_deletes_session() {
    let sessions = layer();
    let app = app(&sessions);

    let first = app.clone().oneshot(request("/count", None)).await.expect("infallible");
    let cookie = cookie_of(&set_cookie(&first).expect("session cookie"));
    assert_eq!(sessions.storage().len(), 1);

    let response = app.clone().oneshot(request("/logout", Some(&cookie))).await.expect("infallible");
    let header = set_cookie(&response).expect("clearing cookie");
    assert!(header.starts_with("__session_cookie=null;"));
    assert!(header.ends_with("Max-Age=0"));
    assert_eq!(sessions.storage().len(), 0);

    let after = app.oneshot(request("/peek", Some(&cookie))).await.expect("infallible");
    assert_eq!(body(after).await, "0");
}

#[tokio::test]
async fn test_tampered_cookie_starts_fresh_session() {
    let sessions = layer();
    let app = app(&sessions);

    let first = app.clone().oneshot(request("/count", None)).await.expect("infallible");
    app.clone().oneshot(request("/count", None)).await.expect("infallible");
    let cookie = cookie_of(&set_cookie(&first).expect("session cookie"));

    let forged = SessionLayer::builder().secret("other-secret").build().expect("valid layer");
    let payload = CookiePayload::decode(&cookie, sessions.signer()).expect("valid cookie");
    let tampered = payload.encode(forged.signer()).expect("encode");

    let response = app.oneshot(request("/count", Some(&tampered))).await.expect("infallible");
    assert_eq!(body(response).await, "1");
}

#[tokio::test]
async fn test_stale_cookie_is_cleared() {
    let app = app(&layer());

    let response = app.oneshot(request("/peek", Some("garbage"))).await.expect("infallible");
    let header = set_cookie(&response).expect("clearing cookie");

    assert!(header.starts_with("__session_cookie=null;"));
    assert!(header.ends_with("Max-Age=0"));
}

#[tokio::test]
async fn test_generated_secret_still_signs() {
    let sessions = SessionLayer::builder().build().expect("valid layer");
    let app = app(&sessions);

    let first = app.clone().oneshot(request("/count", None)).await.expect("infallible");
    let cookie = cookie_of(&set_cookie(&first).expect("session cookie"));

    let second = app.oneshot(request("/count", Some(&cookie))).await.expect("infallible");
    assert_eq!(body(second).await, "2");
}

#[test]
fn test_invalid_cookie_name_is_rejected() {
    for name in ["", "  ", "a=b", "a;b"] {
        let result = SessionLayer::builder().secret("s").name(name).build();
        assert!(matches!(result, Err(SessionError::Internal { .. })), "{name:?}");
    }
}
