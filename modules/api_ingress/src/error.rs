use api_contract::{NotFoundPolicy, PageError, Reply, UntypedEnvelope};
use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Handler error. Every variant renders as an envelope.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{message}")]
    NotFound {
        policy: NotFoundPolicy,
        message: String,
    },
    /// Request input that failed to bind; each entry becomes one validation message.
    #[error("invalid request: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{0}")]
    Conflict(String),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    /// Not-found answer with the legacy wire tag.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::not_found_as(NotFoundPolicy::Legacy, message)
    }

    pub fn not_found_as(policy: NotFoundPolicy, message: impl Into<String>) -> Self {
        AppError::NotFound {
            policy,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(&self) -> UntypedEnvelope {
        match self {
            AppError::BadRequest(m) | AppError::Conflict(m) => UntypedEnvelope::failed(m.as_str()),
            AppError::NotFound { policy, message } => {
                UntypedEnvelope::not_found_as(*policy, message.as_str())
            }
            AppError::Validation(messages) => UntypedEnvelope::validation_error(messages.clone()),
            // The source is logged, never returned to the client.
            AppError::Internal(_) => UntypedEnvelope::failed("internal error"),
        }
    }
}

impl From<PageError> for AppError {
    fn from(err: PageError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(vec![rejection.body_text()])
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Internal(err) => tracing::error!(
                error = ?err,
                status = status.as_u16(),
                "request failed"
            ),
            other => tracing::warn!(
                error = %other,
                status = status.as_u16(),
                "request failed"
            ),
        }

        Reply::new(status, self.envelope()).into_response()
    }
}
