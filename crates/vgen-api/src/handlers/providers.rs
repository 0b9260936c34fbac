//! Provider catalog handlers.

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use vgen_models::ProviderDescriptor;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderDescriptor>,
    pub default_provider: String,
}

/// GET /api/providers
pub async fn list_providers(
    State(state): State<AppState>,
    _session: Session,
) -> Json<ProvidersResponse> {
    Json(ProvidersResponse {
        providers: state.catalog.providers().to_vec(),
        default_provider: state.catalog.default_provider().id.to_string(),
    })
}

/// GET /api/providers/:id
pub async fn get_provider(
    State(state): State<AppState>,
    _session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<ProviderDescriptor>> {
    state
        .catalog
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Provider '{}'", id)))
}
