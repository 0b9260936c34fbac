//! Generation API request/response types.

use std::collections::BTreeMap;

use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use vgen_models::{FormState, GenerationOutput, ProviderId, ReferenceImage};

use crate::error::ClientResult;

/// Multipart payload assembled from a reconciled form.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationPayload {
    pub prompt: String,
    pub negative_prompt: String,
    pub video_count: u32,
    pub aspect_ratio: String,
    pub duration: u32,
    pub provider: ProviderId,
    pub resolution: Option<String>,
    pub frame_rate: Option<u32>,
    /// Provider sub-options, only when they belong to the selected provider.
    pub options: BTreeMap<String, String>,
    pub reference_image: Option<ReferenceImage>,
}

impl GenerationPayload {
    /// Build the payload for a form that has already been reconciled.
    pub fn from_form(form: &FormState) -> Self {
        let options = if form.provider_options.belongs_to(&form.provider) {
            form.provider_options.values.clone()
        } else {
            BTreeMap::new()
        };

        Self {
            prompt: form.trimmed_prompt().to_string(),
            negative_prompt: form.negative_prompt.trim().to_string(),
            video_count: form.video_count,
            aspect_ratio: form.aspect_ratio.to_string(),
            duration: form.duration,
            provider: form.provider.clone(),
            resolution: form.resolution.clone(),
            frame_rate: form.frame_rate,
            options,
            reference_image: form.reference_image.clone(),
        }
    }

    /// Text fields in submission order.
    pub fn text_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("prompt".to_string(), self.prompt.clone()),
            ("negative_prompt".to_string(), self.negative_prompt.clone()),
            ("video_count".to_string(), self.video_count.to_string()),
            ("aspect_ratio".to_string(), self.aspect_ratio.clone()),
            ("duration".to_string(), self.duration.to_string()),
            ("provider".to_string(), self.provider.to_string()),
        ];
        if let Some(resolution) = &self.resolution {
            fields.push(("resolution".to_string(), resolution.clone()));
        }
        if let Some(fps) = self.frame_rate {
            fields.push(("frame_rate".to_string(), fps.to_string()));
        }
        for (key, value) in &self.options {
            fields.push((format!("options[{}]", key), value.clone()));
        }
        fields
    }

    /// Encode as a multipart form.
    pub fn into_multipart(self) -> ClientResult<Form> {
        let mut form = Form::new();
        for (name, value) in self.text_fields() {
            form = form.text(name, value);
        }

        if let Some(image) = self.reference_image {
            let part = Part::bytes(image.data)
                .file_name(image.file_name)
                .mime_str(&image.content_type)?;
            form = form.part("reference_image", part);
        }

        Ok(form)
    }
}

/// Successful response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    #[serde(default)]
    pub videos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

impl From<GenerationResponse> for GenerationOutput {
    fn from(r: GenerationResponse) -> Self {
        Self {
            videos: r.videos,
            provider: r.provider.map(ProviderId::from),
            cost: r.cost,
        }
    }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}`,
/// `{"message": "..."}` and `{"detail": "..."}`.
pub(crate) fn error_message_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let candidates = [
        value.get("error").and_then(|e| e.as_str()),
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str()),
        value.get("message").and_then(|m| m.as_str()),
        value.get("detail").and_then(|m| m.as_str()),
    ];
    let message = candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string);
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_models::{ProviderCatalog, ProviderOptions};

    fn veo_form() -> FormState {
        let catalog = ProviderCatalog::builtin();
        let mut form = FormState::for_provider(catalog.get("veo3").unwrap());
        form.prompt = "  drone shot over a glacier  ".to_string();
        form.negative_prompt = "text, watermark".to_string();
        form.video_count = 2;
        form
    }

    #[test]
    fn test_payload_fields() {
        let payload = GenerationPayload::from_form(&veo_form());
        let fields = payload.text_fields();
        let get = |k: &str| fields.iter().find(|(n, _)| n == k).map(|(_, v)| v.as_str());

        assert_eq!(get("prompt"), Some("drone shot over a glacier"));
        assert_eq!(get("negative_prompt"), Some("text, watermark"));
        assert_eq!(get("video_count"), Some("2"));
        assert_eq!(get("aspect_ratio"), Some("16:9"));
        assert_eq!(get("duration"), Some("8"));
        assert_eq!(get("provider"), Some("veo3"));
        assert_eq!(get("resolution"), Some("720p"));
        assert_eq!(get("frame_rate"), Some("24"));
        assert_eq!(get("options[generate_audio]"), Some("true"));
        assert_eq!(get("options[person_generation]"), Some("allow_adult"));
    }

    #[test]
    fn test_foreign_options_are_not_sent() {
        let mut form = veo_form();
        form.provider_options = ProviderOptions {
            provider: Some(ProviderId::from("kling-2")),
            values: [("mode".to_string(), "pro".to_string())].into_iter().collect(),
        };
        let payload = GenerationPayload::from_form(&form);
        assert!(payload.options.is_empty());
        assert!(!payload
            .text_fields()
            .iter()
            .any(|(name, _)| name.starts_with("options[")));
    }

    #[test]
    fn test_optional_fields_omitted() {
        let catalog = ProviderCatalog::builtin();
        let mut form = FormState::for_provider(catalog.get("ltx-video").unwrap());
        form.prompt = "forest".to_string();
        let fields = GenerationPayload::from_form(&form).text_fields();
        assert!(!fields.iter().any(|(n, _)| n == "resolution" || n == "frame_rate"));
    }

    #[test]
    fn test_multipart_with_image_builds() {
        let mut form = veo_form();
        form.reference_image = Some(ReferenceImage::new("ref.png", "image/png", vec![0x89, 0x50]));
        let payload = GenerationPayload::from_form(&form);
        assert!(payload.into_multipart().is_ok());
    }

    #[test]
    fn test_error_message_from_body() {
        assert_eq!(
            error_message_from_body(r#"{"error": "Insufficient credits"}"#).as_deref(),
            Some("Insufficient credits")
        );
        assert_eq!(
            error_message_from_body(r#"{"error": {"message": "Bad prompt"}}"#).as_deref(),
            Some("Bad prompt")
        );
        assert_eq!(
            error_message_from_body(r#"{"message": "Slow down"}"#).as_deref(),
            Some("Slow down")
        );
        assert_eq!(error_message_from_body("<html>oops</html>"), None);
        assert_eq!(error_message_from_body(r#"{"error": ""}"#), None);
    }

    #[test]
    fn test_response_into_output() {
        let response: GenerationResponse =
            serde_json::from_str(r#"{"videos": ["a.mp4", "b.mp4"], "cost": 1.5}"#).unwrap();
        let output: GenerationOutput = response.into();
        assert_eq!(output.videos.len(), 2);
        assert_eq!(output.cost, Some(1.5));
        assert!(output.provider.is_none());
    }
}
