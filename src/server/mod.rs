mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use crate::error::{Error, Result};
use crate::CrmDash;

const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub dash: Arc<CrmDash>,
    /// `Content-Security-Policy` value sent with every response.
    csp: HeaderValue,
}

impl AppState {
    /// `crm_origin` is the only non-self origin allowed to frame responses.
    pub fn new(dash: Arc<CrmDash>, crm_origin: &str) -> Result<Self> {
        let csp = HeaderValue::from_str(&format!("frame-ancestors 'self' {crm_origin}"))
            .map_err(|e| Error::Config(format!("invalid CRM origin {crm_origin:?}: {e}")))?;
        Ok(Self { dash, csp })
    }
}

/// Router exposing the dashboard endpoints.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/api/pipelines", get(handlers::pipelines))
        .route("/api/users", get(handlers::users))
        .route("/api/metrics", get(handlers::metrics))
        .route("/api/funnels", get(handlers::funnels))
        .route("/api/timeseries", get(handlers::timeseries))
        .route("/api/tasks", get(handlers::tasks))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            response_headers_middleware,
        ))
        .layer(middleware::from_fn(request_log_middleware))
        .with_state(state)
}

/// Bind `addr` and serve until ctrl-c.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    use anyhow::Context;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("listening on {addr}"))?;
    let local_addr: SocketAddr = listener.local_addr().context("getting local address")?;
    log::info!("dashboard API listening on {local_addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("failed to listen for shutdown signal: {e}");
            }
            log::info!("shutting down");
        })
        .await
        .context("serving dashboard API")?;
    Ok(())
}

async fn response_headers_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(axum::http::header::CONTENT_SECURITY_POLICY, state.csp.clone());
    headers.insert(X_ROBOTS_TAG, HeaderValue::from_static("noindex, nofollow"));
    response
}

async fn request_log_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    log::info!(
        "{method} {path} -> {} in {}ms",
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}
