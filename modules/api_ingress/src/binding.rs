//! JSON model binding feeding the validation gate.
//!
//! [`bind_json`] reads the body, deserializes and validates it, and records the
//! outcome as a [`ModelState`]. A valid model is stored for the handler, which takes
//! it with the [`Bound`] extractor. [`validated`] wires binder and gate onto a route.

use api_contract::{validation_gate, FieldErrors, ModelState, Reply, UntypedEnvelope};
use axum::{
    body::Body,
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::MethodRouter,
};
use http_body_util::LengthLimitError;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Field name used for errors that concern the body as a whole.
pub const BODY_FIELD: &str = "body";

/// A request model that passed binding and validation.
#[derive(Debug, Clone)]
pub struct Bound<T>(pub T);

impl<T, S> FromRequestParts<S> for Bound<T>
where
    T: Clone + Send + Sync + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.remove::<Bound<T>>().ok_or_else(|| {
            tracing::error!(
                model = std::any::type_name::<T>(),
                "handler expects a bound model but no binder ran for this route"
            );
            Reply::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                UntypedEnvelope::failed("request model was not bound"),
            )
            .into_response()
        })
    }
}

fn message_of(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => error.code.to_string(),
    }
}

/// Message recorded when validation failed without naming any field.
const INVALID_MODEL: &str = "request model is invalid";

fn collect_fields(errors: &ValidationErrors, prefix: &str, out: &mut Vec<(String, Vec<String>)>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                out.push((path, errs.iter().map(message_of).collect()));
            }
            ValidationErrorsKind::Struct(inner) => collect_fields(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect_fields(inner, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

/// Flatten `validator` errors into field order. Nested models are reported under
/// dotted paths (`address.street`, `lines[0].amount`). `validator` reports an
/// unordered map, so fields are sorted by path to keep responses stable.
pub fn field_errors_from(errors: &ValidationErrors) -> FieldErrors {
    let mut fields = Vec::new();
    collect_fields(errors, "", &mut fields);
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = FieldErrors::new();
    for (field, messages) in fields {
        out.insert(field, messages);
    }
    out
}

fn bind<T>(bytes: &[u8]) -> Result<T, FieldErrors>
where
    T: DeserializeOwned + Validate,
{
    let model: T = serde_json::from_slice(bytes).map_err(|err| {
        let mut errors = FieldErrors::new();
        errors.push(BODY_FIELD, err.to_string());
        errors
    })?;
    model.validate().map_err(|err| {
        let mut errors = field_errors_from(&err);
        if errors.is_valid() {
            errors.push(BODY_FIELD, INVALID_MODEL);
        }
        errors
    })?;
    Ok(model)
}

fn exceeds_body_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(err) = source {
        if err.is::<LengthLimitError>() {
            return true;
        }
        source = err.source();
    }
    false
}

/// Middleware for `from_fn`: binds `T` from a JSON body and records the `ModelState`.
pub async fn bind_json<T>(request: Request, next: Next) -> Response
where
    T: DeserializeOwned + Validate + Clone + Send + Sync + 'static,
{
    let (mut parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) if exceeds_body_limit(&err) => {
            tracing::debug!(error = %err, "request body over the configured limit");
            return Reply::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                UntypedEnvelope::failed("request body is too large"),
            )
            .into_response();
        }
        Err(err) => {
            tracing::debug!(error = %err, "failed to read request body");
            return Reply::bad_request(UntypedEnvelope::failed("failed to read request body"))
                .into_response();
        }
    };

    let state = match bind::<T>(&bytes) {
        Ok(model) => {
            parts.extensions.insert(Bound(model));
            FieldErrors::new()
        }
        Err(errors) => errors,
    };
    parts.extensions.insert(ModelState(state));

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Bind `T` and run the validation gate in front of `route`.
pub fn validated<T, S>(route: MethodRouter<S>) -> MethodRouter<S>
where
    T: DeserializeOwned + Validate + Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    route
        .route_layer(from_fn(validation_gate))
        .route_layer(from_fn(bind_json::<T>))
}
