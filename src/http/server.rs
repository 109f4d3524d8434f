//! HTTP server setup and dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers and middleware layers
//! - Hold the shared application state (config, route table, limiter,
//!   upstream forwarders)
//! - Run the listener with graceful shutdown and a hard drain deadline
//!
//! # Layer order (outermost first)
//! ```text
//! AccessLog → CorrelationID → CORS → SecurityHeaders → Recover
//!     → [per route: Resolve → RateLimit → Authenticate → Forward]
//! ```
//! Recover sits inside the log and header layers so a recovered panic still
//! produces an access-log line and a response carrying the correlation id
//! and security headers.

use std::any::Any;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::request::{self, RequestId};
use crate::http::response::{error_response, HealthBody};
use crate::lifecycle::Shutdown;
use crate::observability::access_log;
use crate::proxy::forwarder::{build_client, Forwarder, InvalidUpstream};
use crate::routing::router::resolve_route;
use crate::routing::{MatchedRoute, RouteTable, Target};
use crate::security::auth::{self, Principal};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::security::{cors, headers};

/// How long in-flight requests may take to finish after the shutdown signal.
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub routes: RouteTable,
    pub limiter: Arc<dyn RateLimiter>,
    pub identity: Arc<Forwarder>,
    pub solver: Arc<Forwarder>,
}

/// The gateway's single HTTP listener.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new server with the given configuration. The pooled upstream
    /// client is created here, once.
    pub fn new(
        config: Arc<GatewayConfig>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Result<Self, InvalidUpstream> {
        let client = build_client();
        let identity = Arc::new(Forwarder::new(
            "identity",
            &config.services.auth_url,
            client.clone(),
        )?);
        let solver = Arc::new(Forwarder::new(
            "solver",
            &config.services.captcha_url,
            client,
        )?);

        let state = AppState {
            config,
            routes: RouteTable::new(),
            limiter,
            identity,
            solver,
        };

        let router = Self::build_router(state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        // Route-resolution, rate-limit, and auth stages run only on the
        // forwarded surface, not on the local health probe.
        let api = Router::new()
            .route("/", any(forward_handler))
            .route("/{*path}", any(forward_handler))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::authenticate,
            ))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .route_layer(middleware::from_fn_with_state(state.clone(), resolve_route));

        Router::new()
            .route("/health", get(health_handler))
            .merge(api)
            .method_not_allowed_fallback(not_found_handler)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                headers::security_headers,
            ))
            .layer(middleware::from_fn_with_state(state.clone(), cors::cors))
            .layer(middleware::from_fn(request::correlation_id))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                access_log::access_log,
            ))
            .with_state(state)
    }

    /// Log upstream reachability once at startup. Purely informational.
    pub async fn probe_upstreams(&self) {
        self.state.identity.probe_health().await;
        self.state.solver.probe_health().await;
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }

    /// Run the server until the shutdown signal fires, then drain in-flight
    /// requests up to the deadline.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> std::io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut graceful_rx = shutdown.subscribe();
        let mut deadline_rx = shutdown.subscribe();

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = graceful_rx.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .into_future();

        tokio::select! {
            result = serve => result?,
            _ = async {
                let _ = deadline_rx.recv().await;
                tokio::time::sleep(DRAIN_DEADLINE).await;
            } => {
                tracing::warn!(
                    deadline_secs = DRAIN_DEADLINE.as_secs(),
                    "Drain deadline exceeded, forcing shutdown"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Local health probe; does not touch upstreams.
async fn health_handler() -> impl IntoResponse {
    Json(HealthBody::current())
}

async fn not_found_handler() -> Response {
    GatewayError::NotFound.into_response()
}

/// Terminal stage: hand the request to the matched target's forwarder.
async fn forward_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let Some(MatchedRoute(route)) = req.extensions().get::<MatchedRoute>().copied() else {
        tracing::error!("Forwarder invoked without a matched route");
        return GatewayError::Internal.into_response();
    };
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or(Principal::Anonymous);
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let forwarder = match route.target {
        Target::Identity => &state.identity,
        Target::Solver => &state.solver,
    };

    match forwarder
        .forward(
            req,
            addr.ip(),
            &principal,
            &request_id,
            state.config.max_body_bytes,
        )
        .await
    {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Recovered panics become the standard 500 envelope; the process lives on.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Request handler panicked");

    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal_error",
        "Internal server error",
    )
}
