use axum::body::Body;
use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use splus::middleware::Ratelimiter;
use splus::types::Limit;
use splus::{Application, Route};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use tracing_subscriber::registry::LookupSpan;

#[derive(Debug, Default)]
struct AccessEvent {
    request: String,
    status: u64,
}

impl Visit for AccessEvent {
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "status" {
            self.status = value;
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "request" {
            self.request = format!("{value:?}");
        }
    }
}

/// The `request` field of an access span.
struct RequestLine(String);

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<AccessEvent>>>);

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut access = AccessEvent::default();
        attrs.record(&mut access);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(RequestLine(access.request));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if event.metadata().target() != "splus::access" {
            return;
        }
        let mut access = AccessEvent::default();
        event.record(&mut access);
        if let Some(span) = ctx.event_span(event) {
            if let Some(line) = span.extensions().get::<RequestLine>() {
                access.request.clone_from(&line.0);
            }
        }
        self.0.lock().expect("capture lock").push(access);
    }
}

fn request(path: &str) -> Request {
    Request::builder()
        .uri(path)
        .extension(ConnectInfo(SocketAddr::from(([198, 51, 100, 7], 41_000))))
        .body(Body::empty())
        .expect("valid request")
}

#[tokio::test]
async fn test_access_log_records_request_and_status() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

    let app = Application::builder()
        .ratelimiter(Ratelimiter::builder())
        .route(Route::get("/", || async { "home" }).limit(Limit::new(1, Duration::from_secs(60))))
        .build()
        .expect("valid application");
    let router = app.into_router();

    let ok = router.clone().oneshot(request("/?q=1")).await.expect("infallible");
    let denied = router.oneshot(request("/")).await.expect("infallible");
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    let events = capture.0.lock().expect("capture lock");
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].request, "198.51.100.7:41000 - \"GET / HTTP/1.1\"");
    assert_eq!(events[1].request, "198.51.100.7:41000 - \"GET / HTTP/1.1\"");
    assert_eq!(events[0].status, 200);
    assert_eq!(events[1].status, 429);
}

#[tokio::test]
async fn test_access_log_can_be_disabled() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

    let app = Application::builder()
        .access_log(false)
        .route(Route::get("/", || async { "home" }))
        .build()
        .expect("valid application");

    app.into_router().oneshot(request("/")).await.expect("infallible");

    assert!(capture.0.lock().expect("capture lock").is_empty());
}

#[tokio::test]
async fn test_websocket_upgrade_is_not_logged() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture.clone()));

    let app = Application::builder()
        .route(Route::get("/ws", || async { "upgrade" }))
        .build()
        .expect("valid application");

    let mut req = request("/ws");
    req.headers_mut().insert(axum::http::header::UPGRADE, "websocket".parse().expect("header value"));
    app.into_router().oneshot(req).await.expect("infallible");

    assert!(capture.0.lock().expect("capture lock").is_empty());
}
