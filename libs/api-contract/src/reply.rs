//! Rendering envelopes as HTTP responses with `Accept`-based content negotiation.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{
        header::{ACCEPT, CONTENT_TYPE, VARY},
        request::Parts,
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::envelope::{Envelope, Outcome, UntypedEnvelope};
use crate::error::{PageError, RenderError};

/// Response encodings an envelope can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Json,
    Xml,
}

impl MediaType {
    pub const fn as_str(self) -> &'static str {
        match self {
            MediaType::Json => "application/json",
            MediaType::Xml => "application/xml",
        }
    }

    fn matches(self, range: &mime::Mime) -> bool {
        let (ty, subtype) = (range.type_().as_str(), range.subtype().as_str());
        if ty == "*" {
            return subtype == "*";
        }
        match self {
            MediaType::Json => ty == "application" && (subtype == "json" || subtype == "*"),
            MediaType::Xml => {
                (ty == "application" || ty == "text") && (subtype == "xml" || subtype == "*")
            }
        }
    }
}

/// Parse an `Accept` header into media ranges ordered by preference.
/// Ranges with `q=0` are dropped; equal weights keep header order.
fn accepted_ranges(accept: &str) -> Vec<mime::Mime> {
    let mut ranges: Vec<(mime::Mime, f32)> = accept
        .split(',')
        .filter_map(|part| part.trim().parse::<mime::Mime>().ok())
        .map(|range| {
            let q = range
                .get_param("q")
                .and_then(|q| q.as_str().parse::<f32>().ok())
                .unwrap_or(1.0);
            (range, q)
        })
        .filter(|(_, q)| *q > 0.0)
        .collect();
    ranges.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranges.into_iter().map(|(range, _)| range).collect()
}

/// Pick the first declared media type the client accepts.
/// Falls back to the first declared type when nothing matches or no header was sent.
pub fn negotiate(accept: Option<&str>, declared: &[MediaType]) -> MediaType {
    let fallback = declared.first().copied().unwrap_or(MediaType::Json);
    let Some(accept) = accept.filter(|a| !a.trim().is_empty()) else {
        return fallback;
    };

    accepted_ranges(accept)
        .iter()
        .find_map(|range| declared.iter().copied().find(|m| m.matches(range)))
        .unwrap_or(fallback)
}

/// Default HTTP status for an outcome when the handler does not pick one.
pub const fn default_status(outcome: Outcome) -> StatusCode {
    match outcome {
        Outcome::Success | Outcome::Warning | Outcome::Empty => StatusCode::OK,
        Outcome::Error | Outcome::ValidationError => StatusCode::BAD_REQUEST,
        Outcome::NotFound => StatusCode::NOT_FOUND,
    }
}

/// An envelope bound to a status code and the encodings it may be written in.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    status: StatusCode,
    envelope: Envelope<T>,
    content_types: Vec<MediaType>,
}

impl<T> Reply<T> {
    pub fn new(status: StatusCode, envelope: Envelope<T>) -> Self {
        Self {
            status,
            envelope,
            content_types: vec![MediaType::Json],
        }
    }

    pub fn ok(envelope: Envelope<T>) -> Self {
        Self::new(StatusCode::OK, envelope)
    }

    pub fn created(envelope: Envelope<T>) -> Self {
        Self::new(StatusCode::CREATED, envelope)
    }

    pub fn bad_request(envelope: Envelope<T>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, envelope)
    }

    pub fn not_found(envelope: Envelope<T>) -> Self {
        Self::new(StatusCode::NOT_FOUND, envelope)
    }

    /// Declare the acceptable encodings explicitly, in preference order.
    /// An empty list leaves the current declaration untouched.
    pub fn with_content_types(mut self, types: impl IntoIterator<Item = MediaType>) -> Self {
        let types: Vec<MediaType> = types.into_iter().collect();
        if !types.is_empty() {
            self.content_types = types;
        }
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn envelope(&self) -> &Envelope<T> {
        &self.envelope
    }

    pub fn content_types(&self) -> &[MediaType] {
        &self.content_types
    }
}

impl<T: Serialize> Reply<T> {
    /// Encode the envelope in the negotiated media type.
    pub fn render(self, accept: Option<&str>) -> Response {
        let media = negotiate(accept, &self.content_types);
        let encoded = match media {
            MediaType::Json => serde_json::to_vec(&self.envelope).map_err(RenderError::from),
            MediaType::Xml => crate::xml::envelope_to_xml(&self.envelope),
        };

        match encoded {
            Ok(body) => {
                let mut resp = (self.status, body).into_response();
                let headers = resp.headers_mut();
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(media.as_str()));
                if self.content_types.len() > 1 {
                    headers.insert(VARY, HeaderValue::from_static("accept"));
                }
                resp
            }
            Err(err) => {
                tracing::error!(
                    error = %err,
                    media_type = media.as_str(),
                    outcome = %self.envelope.outcome(),
                    "failed to render response envelope"
                );
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        self.render(None)
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Reply::new(default_status(self.outcome()), self).into_response()
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        tracing::debug!(error = %self, "rejected paging arguments");
        Reply::bad_request(UntypedEnvelope::failed(self.to_string())).into_response()
    }
}

/// The request's `Accept` header, for handlers that negotiate like the validation gate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptHeader(Option<String>);

impl AcceptHeader {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self(
            headers
                .get(ACCEPT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn respond<T: Serialize>(&self, reply: Reply<T>) -> Response {
        reply.render(self.as_str())
    }
}

impl<S> FromRequestParts<S> for AcceptHeader
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
