//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    estimate_cost, generation_status, get_provider, get_session, health, list_providers,
    oauth_callback, prompt_quality, ready, reconcile_form, sign_in, sign_in_page, sign_out,
    studio, submit_generation,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    session_gate, ClientRateLimiter,
};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let auth_routes = Router::new()
        .route("/auth/session", get(get_session))
        .route("/auth/signin/:provider", get(sign_in))
        .route("/auth/callback/:provider", get(oauth_callback))
        .route("/auth/signout", post(sign_out));

    let provider_routes = Router::new()
        .route("/providers", get(list_providers))
        .route("/providers/:id", get(get_provider));

    let form_routes = Router::new()
        .route("/form/reconcile", post(reconcile_form))
        .route("/form/estimate", post(estimate_cost))
        .route("/form/prompt-quality", post(prompt_quality));

    let generation_routes = Router::new()
        .route("/generate", post(submit_generation))
        .route("/generate/status", get(generation_status));

    let rate_limiter = Arc::new(ClientRateLimiter::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(auth_routes)
        .merge(provider_routes)
        .merge(form_routes)
        .merge(generation_routes)
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ));

    let view_routes = Router::new()
        .route("/", get(studio))
        .route("/signin", get(sign_in_page));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(view_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn_with_state(state.clone(), session_gate))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
