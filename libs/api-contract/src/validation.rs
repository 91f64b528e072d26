//! Short-circuiting request validation.
//!
//! A binding stage records per-field errors in a [`ModelState`] request extension.
//! [`validation_gate`] inspects it before the handler runs: any invalid field turns
//! the request into a `400` carrying a ValidationError envelope, and the handler is
//! never invoked. Otherwise the downstream response is passed through untouched.

use axum::{extract::Request, middleware::Next, response::Response};
use indexmap::IndexMap;

use crate::envelope::UntypedEnvelope;
use crate::reply::{AcceptHeader, MediaType, Reply};

/// Encodings a rejected request may be answered in, in preference order.
pub const GATE_CONTENT_TYPES: [MediaType; 2] = [MediaType::Json, MediaType::Xml];

/// Field name to its error messages, in the order fields were discovered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    fields: IndexMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one message to `field`, registering the field on first use.
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Replace every message recorded for `field`.
    pub fn insert(&mut self, field: impl Into<String>, messages: Vec<String>) {
        self.fields.insert(field.into(), messages);
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True when no field carries a message. Fields with an empty list count as valid.
    pub fn is_valid(&self) -> bool {
        self.fields.values().all(Vec::is_empty)
    }

    pub fn invalid_fields(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields
            .iter()
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(field, _)| field.as_str())
    }

    /// The first message of every invalid field, in field order.
    pub fn first_messages(&self) -> Vec<String> {
        self.fields
            .values()
            .filter_map(|messages| messages.first().cloned())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

impl<F, M> FromIterator<(F, M)> for FieldErrors
where
    F: Into<String>,
    M: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (F, M)>>(iter: I) -> Self {
        let mut errors = FieldErrors::new();
        for (field, message) in iter {
            errors.push(field, message);
        }
        errors
    }
}

/// Validation state attached to a request by the binding stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelState(pub FieldErrors);

impl ModelState {
    pub fn errors(&self) -> &FieldErrors {
        &self.0
    }
}

impl From<FieldErrors> for ModelState {
    fn from(errors: FieldErrors) -> Self {
        Self(errors)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Valid,
    Invalid(UntypedEnvelope),
}

pub fn classify(errors: &FieldErrors) -> GateDecision {
    if errors.is_valid() {
        GateDecision::Valid
    } else {
        GateDecision::Invalid(UntypedEnvelope::validation_error(errors.first_messages()))
    }
}

/// Middleware for `axum::middleware::from_fn`.
///
/// Requests without a [`ModelState`] extension are treated as valid.
pub async fn validation_gate(request: Request, next: Next) -> Response {
    let decision = request
        .extensions()
        .get::<ModelState>()
        .map_or(GateDecision::Valid, |state| classify(state.errors()));

    match decision {
        GateDecision::Valid => next.run(request).await,
        GateDecision::Invalid(envelope) => {
            tracing::debug!(
                method = %request.method(),
                uri = %request.uri(),
                invalid_fields = envelope.validation_messages().len(),
                "request rejected by validation gate"
            );
            let accept = AcceptHeader::from_headers(request.headers());
            accept.respond(Reply::bad_request(envelope).with_content_types(GATE_CONTENT_TYPES))
        }
    }
}
