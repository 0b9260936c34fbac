//! Generation submission handlers.

use std::collections::BTreeMap;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::debug;

use vgen_models::{
    AspectRatio, FormState, GenerationCycle, GenerationMeta, GenerationPhase, GenerationResult,
    ProviderId, ProviderOptions, ReferenceImage,
};

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::handlers::form::PromptFields;
use crate::security::sanitize_string;
use crate::state::AppState;

/// Largest accepted reference image.
const MAX_REFERENCE_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Generation state as reported to the client.
#[derive(Debug, Serialize)]
pub struct GenerationReport {
    pub phase: GenerationPhase,
    pub attempts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<GenerationMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    /// Attempt number assigned to the submission this report answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitted_attempt: Option<u64>,
    /// True when this submission was overtaken by a newer one
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub superseded: bool,
}

impl From<GenerationCycle> for GenerationReport {
    fn from(cycle: GenerationCycle) -> Self {
        Self {
            phase: cycle.phase,
            attempts: cycle.attempts,
            meta: cycle.meta,
            result: cycle.result,
            submitted_attempt: None,
            superseded: false,
        }
    }
}

/// POST /api/generate
///
/// Multipart fields: `prompt`, `negative_prompt`, `video_count`,
/// `aspect_ratio`, `duration`, `provider`, `resolution`, `frame_rate`,
/// `options[<key>]`, optional `options_provider`, and a `reference_image`
/// file part. Out-of-range or unparsable values are normalized against the
/// provider rather than rejected.
pub async fn submit_generation(
    State(state): State<AppState>,
    session: Session,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<GenerationReport>)> {
    let form = read_form(&state, multipart).await?;
    PromptFields::check(&form)?;

    let outcome = state.generations.submit(session.user_id(), form).await?;

    let mut report = GenerationReport::from(outcome.cycle);
    report.submitted_attempt = Some(outcome.attempt);
    if !outcome.applied {
        report.superseded = true;
        return Ok((StatusCode::OK, Json(report)));
    }

    let status = if outcome.error.is_some() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    Ok((status, Json(report)))
}

/// GET /api/generate/status
pub async fn generation_status(
    State(state): State<AppState>,
    session: Session,
) -> Json<GenerationReport> {
    Json(state.generations.status(session.user_id()).await.into())
}

/// Build a form from multipart fields.
async fn read_form(state: &AppState, mut multipart: Multipart) -> ApiResult<FormState> {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut options: BTreeMap<String, String> = BTreeMap::new();
    let mut image: Option<ReferenceImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "reference_image" {
            let file_name = field.file_name().unwrap_or("reference").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read reference image: {}", e)))?;

            // Browsers send an empty part when no file is chosen
            if data.is_empty() {
                continue;
            }
            if !content_type.starts_with("image/") {
                return Err(ApiError::Validation(
                    "Reference image must be an image file".to_string(),
                ));
            }
            if data.len() > MAX_REFERENCE_IMAGE_BYTES {
                return Err(ApiError::Validation(format!(
                    "Reference image exceeds {} MB",
                    MAX_REFERENCE_IMAGE_BYTES / (1024 * 1024)
                )));
            }
            image = Some(ReferenceImage::new(file_name, content_type, data.to_vec()));
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid field '{}': {}", name, e)))?;

        match option_key(&name) {
            Some(key) => {
                options.insert(key.to_string(), value);
            }
            None => {
                fields.insert(name, value);
            }
        }
    }

    let provider = match fields.get("provider").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(id) => state
            .catalog
            .get(id)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown provider: {}", id)))?,
        None => state.catalog.default_provider(),
    };

    let mut form = FormState::for_provider(provider);
    let text = |key: &str| fields.get(key).map(|s| sanitize_string(s));
    let number = |key: &str| fields.get(key).and_then(|s| s.trim().parse::<u32>().ok());

    form.prompt = text("prompt").unwrap_or_default();
    form.negative_prompt = text("negative_prompt").unwrap_or_default();
    if let Some(count) = number("video_count") {
        form.video_count = count;
    }
    if let Some(ratio) = fields.get("aspect_ratio").and_then(|s| s.parse::<AspectRatio>().ok()) {
        form.aspect_ratio = ratio;
    }
    if let Some(duration) = number("duration") {
        form.duration = duration;
    }
    if let Some(resolution) = text("resolution").filter(|s| !s.is_empty()) {
        form.resolution = Some(resolution);
    }
    if let Some(fps) = number("frame_rate") {
        form.frame_rate = Some(fps);
    }
    form.reference_image = image;

    if !options.is_empty() {
        let owner = text("options_provider")
            .filter(|s| !s.is_empty())
            .map(ProviderId::from)
            .unwrap_or_else(|| provider.id.clone());
        form.provider_options = ProviderOptions {
            provider: Some(owner),
            values: options,
        };
    }

    debug!(
        provider = %form.provider,
        fields = fields.len(),
        options = form.provider_options.values.len(),
        "Parsed generation form"
    );
    Ok(form)
}

/// `options[mode]` -> `mode`
fn option_key(name: &str) -> Option<&str> {
    name.strip_prefix("options[")
        .and_then(|rest| rest.strip_suffix(']'))
        .filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_key() {
        assert_eq!(option_key("options[mode]"), Some("mode"));
        assert_eq!(option_key("options[]"), None);
        assert_eq!(option_key("options"), None);
        assert_eq!(option_key("prompt"), None);
    }

    #[test]
    fn test_report_hides_empty_fields() {
        let json = serde_json::to_value(GenerationReport::from(GenerationCycle::new())).unwrap();
        assert_eq!(json["phase"], "idle");
        assert!(json.get("meta").is_none());
        assert!(json.get("superseded").is_none());
    }
}
