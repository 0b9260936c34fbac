//! Liveness and readiness probes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// GET /health, /healthz
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
    })
}

/// One dependency the generator needs before it can serve traffic.
#[derive(Debug, Serialize)]
pub struct ComponentCheck {
    pub name: &'static str,
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentCheck {
    fn new(name: &'static str, ready: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ready,
            detail: (!ready).then(|| detail.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub providers: usize,
    pub sign_in_providers: usize,
    pub checks: Vec<ComponentCheck>,
}

/// GET /ready
///
/// 503 until the catalog has providers, the generation endpoint is
/// configured, and at least one social sign-in provider is available.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let sign_in_providers = state.oauth.sign_in_options(None).len();

    let checks = vec![
        ComponentCheck::new("catalog", !state.catalog.is_empty(), "provider catalog is empty"),
        ComponentCheck::new(
            "generation_api",
            state.generations.is_configured(),
            "GENERATION_API_URL is not set",
        ),
        ComponentCheck::new(
            "sign_in",
            sign_in_providers > 0,
            "no social sign-in provider is configured",
        ),
    ];

    let ready = checks.iter().all(|c| c.ready);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            providers: state.catalog.len(),
            sign_in_providers,
            checks,
        }),
    )
}
