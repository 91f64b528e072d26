use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{middleware::from_fn, routing::get, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

pub mod binding;
mod config;
pub mod error;
pub mod request_id;
mod web;

pub use binding::{bind_json, validated, Bound};
pub use config::ApiIngressConfig;
pub use error::AppError;

/// Name of the `modules.<name>` config section read by [`ApiIngress::from_app_config`].
pub const MODULE_NAME: &str = "api_ingress";

/// HTTP host: owns the middleware stack and the listener. Feature routes are
/// handed in as a plain `Router` and merged under the shared layers.
#[derive(Debug, Clone, Default)]
pub struct ApiIngress {
    config: ApiIngressConfig,
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self { config }
    }

    pub fn from_app_config(app: &runtime::AppConfig) -> Result<Self> {
        let config = app.module_config::<ApiIngressConfig>(MODULE_NAME)?;
        tracing::debug!(module = MODULE_NAME, bind_addr = %config.bind_addr, "module configured");
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ApiIngressConfig {
        &self.config
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.config
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.config.bind_addr))
    }

    /// Merge `routes` with `/health` and wrap everything in the shared middleware.
    pub fn build_router(&self, routes: Router) -> Router {
        let mut router = Router::new()
            .route("/health", get(web::health_check))
            .merge(routes)
            .fallback(web::route_not_found);

        // Layers are added innermost first. Requests pass through them as:
        // SetRequestId -> PropagateRequestId -> Trace -> push_req_id_to_extensions -> Timeout -> CORS -> BodyLimit
        router = router.layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes));

        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        if self.config.request_timeout_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )));
        }

        let x_request_id = request_id::header();
        router
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(request_id::create_trace_layer())
            .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
            .layer(SetRequestIdLayer::new(x_request_id, request_id::MakeNanoId))
    }

    /// Bind the configured address and serve until `cancel` fires.
    pub async fn serve(&self, routes: Router, cancel: CancellationToken) -> Result<()> {
        let addr = self.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        self.serve_with_listener(listener, routes, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires.
    pub async fn serve_with_listener(
        &self,
        listener: TcpListener,
        routes: Router,
        cancel: CancellationToken,
    ) -> Result<()> {
        let router = self.build_router(routes);
        let local = listener.local_addr()?;
        tracing::info!("HTTP server bound on {}", local);

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}
