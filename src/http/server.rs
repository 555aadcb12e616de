//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the mirror handler
//! - Wire up middleware (tracing, metrics, timeout, body limit, panic recovery)
//! - Apply the response header policy
//! - Bind server to listener and shut down gracefully

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Extension, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::MirrorConfig;
use crate::http::response::{handle_panic, with_security_headers};
use crate::mirror::{mirror_handler, ListenerPort, MirrorState};
use crate::observability::metrics::track_requests;

/// HTTP server for the mirror endpoint.
pub struct HttpServer {
    router: Router,
    config: MirrorConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: MirrorConfig) -> Self {
        let router = build_router(&config);
        Self { router, config }
    }

    /// Run the server until the shutdown channel fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            strict_headers = self.config.security.strict_headers,
            "HTTP server starting"
        );

        let app = self
            .router
            .layer(Extension(ListenerPort(addr.port())))
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// A clone of the router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &MirrorConfig) -> Router {
    let state = MirrorState::new(&config.security);

    let router = Router::new()
        .route(
            "/mirror",
            get(mirror_handler)
                .post(mirror_handler)
                .put(mirror_handler)
                .delete(mirror_handler),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.security.max_body_size))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn(track_requests));

    let router = if config.security.strict_headers {
        with_security_headers(router)
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
