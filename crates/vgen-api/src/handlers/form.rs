//! Derived form state: reconciliation, cost estimate and prompt quality.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use vgen_models::{
    assess, reconcile, CostEstimate, FieldAdjustment, FormState, PromptAssessment,
    ProviderDescriptor,
};

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::security::{MAX_NEGATIVE_PROMPT_LENGTH, MAX_PROMPT_LENGTH};
use crate::state::AppState;

/// Text fields checked on every form endpoint.
#[derive(Debug, Validate)]
pub(crate) struct PromptFields {
    #[validate(length(max = MAX_PROMPT_LENGTH, message = "Prompt is too long"))]
    pub prompt: String,
    #[validate(length(max = MAX_NEGATIVE_PROMPT_LENGTH, message = "Negative prompt is too long"))]
    pub negative_prompt: String,
}

impl PromptFields {
    pub(crate) fn check(form: &FormState) -> ApiResult<()> {
        Self {
            prompt: form.prompt.clone(),
            negative_prompt: form.negative_prompt.clone(),
        }
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))
    }
}

/// A reconciled form with everything the generator view shows next to it.
#[derive(Debug, Clone, Serialize)]
pub struct DerivedForm {
    pub form: FormState,
    pub adjustments: Vec<FieldAdjustment>,
    pub provider: ProviderDescriptor,
    pub cost: CostEstimate,
    pub prompt: PromptAssessment,
}

impl DerivedForm {
    /// Reconcile `form` against `provider` and derive cost and prompt quality.
    pub fn new(mut form: FormState, provider: &ProviderDescriptor) -> Self {
        form.provider = provider.id.clone();
        let reconciliation = reconcile(&mut form, provider);
        let cost = CostEstimate::new(provider, form.duration, form.video_count);
        let prompt = assess(&form.prompt);
        Self {
            form,
            adjustments: reconciliation.adjustments,
            provider: provider.clone(),
            cost,
            prompt,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub form: FormState,
    /// Newly selected provider; defaults to the form's provider.
    #[serde(default)]
    pub provider_id: Option<String>,
}

/// POST /api/form/reconcile
pub async fn reconcile_form(
    State(state): State<AppState>,
    _session: Session,
    Json(request): Json<ReconcileRequest>,
) -> ApiResult<Json<DerivedForm>> {
    PromptFields::check(&request.form)?;

    let provider_id = request
        .provider_id
        .unwrap_or_else(|| request.form.provider.to_string());
    let provider = state
        .catalog
        .get(&provider_id)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown provider: {}", provider_id)))?;

    Ok(Json(DerivedForm::new(request.form, provider)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct EstimateRequest {
    pub provider_id: String,
    /// Seconds; defaults to the provider's default duration.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default = "default_count")]
    #[validate(range(max = 100, message = "Video count is too large"))]
    pub video_count: u32,
}

fn default_count() -> u32 {
    1
}

/// POST /api/form/estimate
pub async fn estimate_cost(
    State(state): State<AppState>,
    _session: Session,
    Json(request): Json<EstimateRequest>,
) -> ApiResult<Json<CostEstimate>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let provider = state.catalog.get(&request.provider_id).ok_or_else(|| {
        ApiError::bad_request(format!("Unknown provider: {}", request.provider_id))
    })?;
    let duration = request.duration.unwrap_or_else(|| provider.default_duration());

    Ok(Json(CostEstimate::new(provider, duration, request.video_count)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PromptQualityRequest {
    #[serde(default)]
    #[validate(length(max = MAX_PROMPT_LENGTH, message = "Prompt is too long"))]
    pub prompt: String,
}

/// POST /api/form/prompt-quality
pub async fn prompt_quality(
    _session: Session,
    Json(request): Json<PromptQualityRequest>,
) -> ApiResult<Json<PromptAssessment>> {
    request
        .validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;
    Ok(Json(assess(&request.prompt)))
}
