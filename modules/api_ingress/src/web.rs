use api_contract::{AcceptHeader, Envelope, MediaType, NotFoundPolicy, Reply, UntypedEnvelope};
use axum::{
    http::Uri,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    #[serde(rename = "Status")]
    pub status: &'static str,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

pub async fn health_check(accept: AcceptHeader) -> Response {
    let status = HealthStatus {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    accept.respond(
        Reply::ok(Envelope::success_with(status))
            .with_content_types([MediaType::Json, MediaType::Xml]),
    )
}

/// Answer for paths no route matched.
pub async fn route_not_found(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "no route matched");
    Reply::not_found(UntypedEnvelope::not_found_as(
        NotFoundPolicy::Distinct,
        format!("No resource at {}", uri.path()),
    ))
    .into_response()
}
