use std::convert::Infallible;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::{request::Parts, HeaderName, Request, Response};
use axum::{body::Body, middleware::Next};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::request_id::{MakeRequestId, RequestId};
use tower_http::trace::{DefaultOnRequest, TraceLayer};
use tracing::{field::Empty, Span};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MISSING: &str = "n/a";

pub fn header() -> HeaderName {
    HeaderName::from_static(REQUEST_ID_HEADER)
}

fn header_value<B>(req: &Request<B>) -> Option<&str> {
    req.headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// The request id as seen by handlers. Extracting it never fails.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct XRequestId(pub String);

impl XRequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for XRequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<XRequestId>()
            .cloned()
            .unwrap_or_else(|| XRequestId(MISSING.to_string())))
    }
}

/// Generates ids for requests that arrive without `x-request-id`.
#[derive(Clone, Default)]
pub struct MakeNanoId;

impl MakeRequestId for MakeNanoId {
    fn make_request_id<B>(&mut self, _req: &Request<B>) -> Option<RequestId> {
        let id = nanoid::nanoid!();
        Some(RequestId::new(id.parse().ok()?))
    }
}

/// Stores the request id in extensions and records it on the current span.
pub async fn push_req_id_to_extensions(
    mut req: Request<Body>,
    next: Next,
) -> axum::response::Response {
    let rid = header_value(&req).unwrap_or(MISSING).to_owned();

    Span::current().record("request_id", tracing::field::display(&rid));
    req.extensions_mut().insert(XRequestId(rid));

    next.run(req).await
}

type MakeSpan = fn(&Request<Body>) -> Span;
type OnResponse = fn(&Response<Body>, Duration, &Span);

fn make_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
        version = ?req.version(),
        request_id = header_value(req).unwrap_or(MISSING),
        status = Empty,
        latency_ms = Empty
    )
}

fn on_response(resp: &Response<Body>, latency: Duration, span: &Span) {
    let status = resp.status().as_u16();
    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    span.record("status", status);
    span.record("latency_ms", latency_ms);
    if resp.status().is_server_error() {
        tracing::warn!(status, latency_ms, "request finished with server error");
    } else {
        tracing::debug!(status, latency_ms, "request finished");
    }
}

/// Request span carrying method, path, request id, final status and latency.
pub fn create_trace_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, MakeSpan, DefaultOnRequest, OnResponse> {
    TraceLayer::new_for_http()
        .make_span_with(make_span as MakeSpan)
        .on_response(on_response as OnResponse)
}
