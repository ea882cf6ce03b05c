//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all gateway handler
//! - Wire up middleware (request ID, tracing, request ID propagation)
//! - Bind the transport handle of each connection into the request
//! - Build a `GatewayContext` per request and run the filter chain
//! - Release the inbound buffer and write the response back
//! - Apply rule reloads and stop on the shutdown signal
//!
//! # Design Decisions
//! - The whole chain runs under the request timeout; expiry answers 504
//! - Filter errors become JSON error responses here, not inside filters
//! - The inbound buffer is released before write-back, whatever the outcome

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::context::GatewayContext;
use crate::error::GatewayError;
use crate::filter::FilterChain;
use crate::http::{GatewayRequest, GatewayResponse};
use crate::net::TransportHandle;
use crate::observability::metrics;
use crate::routing::RuleRouter;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RuleRouter>,
    pub chain: FilterChain,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

/// HTTP front end of the gateway.
pub struct GatewayServer {
    app: Router,
    router: Arc<RuleRouter>,
}

impl GatewayServer {
    /// Create a server running the standard filter chain.
    pub fn new(config: GatewayConfig) -> Self {
        let chain = FilterChain::standard(Duration::from_secs(config.timeouts.connect_secs));
        Self::with_chain(config, chain)
    }

    /// Create a server running a caller-supplied filter chain.
    pub fn with_chain(config: GatewayConfig, chain: FilterChain) -> Self {
        let router = Arc::new(RuleRouter::from_config(&config.rules));
        tracing::info!(rules = router.len(), filters = ?chain, "Gateway initialized");

        let state = AppState {
            router: Arc::clone(&router),
            chain,
            max_body_bytes: config.listener.max_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        Self {
            app: Self::build_router(state),
            router,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// The live rule set; reloads swap it in place.
    pub fn router(&self) -> Arc<RuleRouter> {
        Arc::clone(&self.router)
    }

    /// Run the server on `listener` until `shutdown` fires.
    ///
    /// Every config received on `config_updates` replaces the rule set.
    /// Requests already holding a rule keep it until they finish.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                router.reload(&config.rules);
            }
        });

        let app = self.app.into_make_service_with_connect_info::<TransportHandle>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: decode, route, build the context, run the chain.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(transport): ConnectInfo<TransportHandle>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let body = match collect_body(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return reject("none", e, start),
    };
    let request = GatewayRequest::new(parts, body);

    tracing::debug!(
        request_id = %request.unique_id(),
        connection = %transport.id(),
        method = %request.method(),
        path = %request.path(),
        "Gateway request"
    );

    let Some(rule) = state.router.resolve(&request) else {
        tracing::warn!(request_id = %request.unique_id(), path = %request.path(), "No rule matched");
        let err = GatewayError::NoRoute(request.path().to_string());
        return reject("none", err, start);
    };
    let rule_id = rule.id().to_string();

    let keep_alive = request.keep_alive();
    let built = GatewayContext::builder()
        .protocol(rule.protocol())
        .transport(transport)
        .request(request)
        .rule(rule)
        .keep_alive(keep_alive)
        .build();
    let mut ctx = match built {
        Ok(ctx) => ctx,
        Err(e) => return reject(&rule_id, e.into(), start),
    };

    let response = conclude(&state, &mut ctx).await;

    metrics::record_request(&rule_id, response.status().as_u16(), start);
    response.into_response()
}

/// Run the chain under the request deadline, release the inbound buffer and
/// produce the response to write back.
async fn conclude(state: &AppState, ctx: &mut GatewayContext) -> GatewayResponse {
    let outcome = match tokio::time::timeout(state.request_timeout, state.chain.run(ctx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            tracing::warn!(request_id = %ctx.unique_id(), rule = %ctx.rule().id(), "Request timed out");
            Err(GatewayError::Timeout(state.request_timeout))
        }
    };
    if let Err(e) = outcome {
        ctx.set_response(GatewayResponse::from_error(&e));
    }

    ctx.release_request();

    let mut response = ctx.take_response().unwrap_or_else(|| {
        tracing::error!(request_id = %ctx.unique_id(), rule = %ctx.rule().id(), "Filter chain produced no response");
        GatewayResponse::from_error(&GatewayError::Upstream("no response produced".into()))
    });
    if !ctx.keep_alive() {
        response
            .headers_mut()
            .insert(header::CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

/// Buffer the inbound body, refusing anything over `limit` bytes.
async fn collect_body(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            tracing::warn!(limit, "Request body exceeds limit");
            Err(GatewayError::PayloadTooLarge(limit))
        }
        Err(e) => Err(GatewayError::Body(e.to_string())),
    }
}

fn reject(rule: &str, err: GatewayError, start: Instant) -> Response {
    let response = GatewayResponse::from_error(&err);
    metrics::record_request(rule, response.status().as_u16(), start);
    response.into_response()
}
