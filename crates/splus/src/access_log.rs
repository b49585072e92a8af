//! Per-request access logging on top of `tower_http::trace`.
//!
//! Each HTTP request opens an `access` span on the [`ACCESS_LOG_TARGET`] target
//! whose `request` field holds `{client} - "{METHOD} {path} HTTP/{version}"`.
//! When the response is ready one `info` event is emitted inside that span,
//! carrying the response code in a `status` field. The console formatter of
//! `splus-logger` renders both on one line and colours the status.

use axum::http::{Request, Response, Version, header};
use splus_domain::constants::ACCESS_LOG_TARGET;
use splus_kernel::net::peer_addr;
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnBodyChunk, DefaultOnEos, MakeSpan, OnResponse, TraceLayer};
use tracing::{Span, info, info_span};

/// The access log middleware returned by [`access_log`].
pub type AccessLogLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    AccessSpan,
    (),
    AccessResponse,
    DefaultOnBodyChunk,
    DefaultOnEos,
    (),
>;

/// Builds the access log layer.
///
/// Websocket upgrades get no span and are not logged.
#[must_use]
pub fn access_log() -> AccessLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(AccessSpan)
        .on_request(())
        .on_response(AccessResponse)
        .on_failure(())
}

/// Opens the `access` span for a request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessSpan;

impl<B> MakeSpan<B> for AccessSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        if is_websocket_upgrade(request) {
            return Span::none();
        }
        info_span!(target: ACCESS_LOG_TARGET, "access", request = %request_line(request))
    }
}

/// Emits the access event once the response head is ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessResponse;

impl<B> OnResponse<B> for AccessResponse {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        if span.is_none() {
            return;
        }
        info!(
            target: ACCESS_LOG_TARGET,
            parent: span,
            status = response.status().as_u16(),
            latency = ?latency,
            "response"
        );
    }
}

/// `{client} - "{METHOD} {path} HTTP/{version}"`, with `-` for an unknown client.
pub(crate) fn request_line<B>(req: &Request<B>) -> String {
    let client = peer_addr(req).map_or_else(|| "-".to_owned(), |addr| addr.to_string());
    format!(
        "{client} - \"{} {} HTTP/{}\"",
        req.method(),
        req.uri().path(),
        http_version(req.version())
    )
}

fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn is_websocket_upgrade<B>(req: &Request<B>) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
}
