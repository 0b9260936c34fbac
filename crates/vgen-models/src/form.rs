//! Generation form state and provider reconciliation.
//!
//! The form keeps whatever the user typed; [`reconcile`] brings every field
//! back inside the bounds declared by the selected provider. Normalization is
//! silent and total: any input maps to a valid form.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::aspect::AspectRatio;
use crate::provider::{ProviderDescriptor, ProviderId};

/// Reference (conditioning) image attached to the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReferenceImage {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Raw image bytes. Only present for multipart submissions.
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl ReferenceImage {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            size_bytes: data.len() as u64,
            data,
        }
    }
}

/// Provider-specific sub-option values, tagged with the provider that defined them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl ProviderOptions {
    /// Declared defaults of a provider.
    pub fn defaults_for(provider: &ProviderDescriptor) -> Self {
        Self {
            provider: Some(provider.id.clone()),
            values: provider
                .capabilities
                .options
                .iter()
                .map(|o| (o.key.clone(), o.default.clone()))
                .collect(),
        }
    }

    /// Check whether these values were defined by the given provider.
    pub fn belongs_to(&self, provider: &ProviderId) -> bool {
        self.provider.as_ref() == Some(provider)
    }
}

/// User-editable generation form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormState {
    pub provider: ProviderId,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub negative_prompt: String,
    #[serde(default = "default_video_count")]
    pub video_count: u32,
    #[serde(default)]
    #[schemars(with = "String")]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<ReferenceImage>,
    #[serde(default)]
    pub provider_options: ProviderOptions,
}

fn default_video_count() -> u32 {
    1
}

impl FormState {
    /// Fresh form for a provider, already within its bounds.
    pub fn for_provider(provider: &ProviderDescriptor) -> Self {
        let mut form = Self {
            provider: provider.id.clone(),
            prompt: String::new(),
            negative_prompt: String::new(),
            video_count: 1,
            aspect_ratio: provider.default_aspect_ratio(),
            duration: provider.default_duration(),
            resolution: None,
            frame_rate: None,
            reference_image: None,
            provider_options: ProviderOptions::defaults_for(provider),
        };
        reconcile(&mut form, provider);
        form
    }

    /// Switch to another provider and normalize dependent fields.
    pub fn select_provider(&mut self, provider: &ProviderDescriptor) -> Reconciliation {
        self.provider = provider.id.clone();
        reconcile(self, provider)
    }

    /// Prompt with surrounding whitespace removed.
    pub fn trimmed_prompt(&self) -> &str {
        self.prompt.trim()
    }
}

/// A single field change made during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum FieldAdjustment {
    VideoCount { from: u32, to: u32 },
    ReferenceImageCleared,
    NegativePromptCleared,
    AspectRatio { from: String, to: String },
    Duration { from: u32, to: u32 },
    Resolution { from: Option<String>, to: Option<String> },
    FrameRate { from: Option<u32>, to: Option<u32> },
    ProviderOptions { reset: Vec<String> },
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Reconciliation {
    pub adjustments: Vec<FieldAdjustment>,
}

impl Reconciliation {
    pub fn is_unchanged(&self) -> bool {
        self.adjustments.is_empty()
    }

    fn push(&mut self, adjustment: FieldAdjustment) {
        self.adjustments.push(adjustment);
    }
}

/// Normalize every provider-dependent field of `form` against `provider`.
///
/// Rules run in a fixed order and do not depend on each other. Running the
/// pass twice yields no further adjustments.
pub fn reconcile(form: &mut FormState, provider: &ProviderDescriptor) -> Reconciliation {
    let caps = &provider.capabilities;
    let mut report = Reconciliation::default();

    // 1. Video count
    let count = form.video_count.clamp(1, caps.video_limit());
    if count != form.video_count {
        report.push(FieldAdjustment::VideoCount {
            from: form.video_count,
            to: count,
        });
        form.video_count = count;
    }

    // 2. Reference image
    if !caps.conditioning_image && form.reference_image.take().is_some() {
        report.push(FieldAdjustment::ReferenceImageCleared);
    }

    // 3. Negative prompt
    if !caps.negative_prompt && !form.negative_prompt.is_empty() {
        form.negative_prompt.clear();
        report.push(FieldAdjustment::NegativePromptCleared);
    }

    // 4. Aspect ratio
    if !provider.supports_aspect_ratio(&form.aspect_ratio) {
        let to = provider.default_aspect_ratio();
        if to != form.aspect_ratio {
            report.push(FieldAdjustment::AspectRatio {
                from: form.aspect_ratio.to_string(),
                to: to.to_string(),
            });
            form.aspect_ratio = to;
        }
    }

    // 5. Duration
    let duration = match caps.durations.first() {
        Some(first) if !caps.durations.contains(&form.duration) => *first,
        Some(_) => form.duration,
        // 0 means unset
        None if form.duration == 0 => provider.default_duration(),
        None => form.duration.min(provider.max_duration),
    };
    if duration != form.duration {
        report.push(FieldAdjustment::Duration {
            from: form.duration,
            to: duration,
        });
        form.duration = duration;
    }

    // 6. Resolution
    let resolution = pick_supported(form.resolution.as_ref(), &caps.resolutions);
    if resolution != form.resolution {
        report.push(FieldAdjustment::Resolution {
            from: form.resolution.clone(),
            to: resolution.clone(),
        });
        form.resolution = resolution;
    }

    // 7. Frame rate
    let frame_rate = pick_supported(form.frame_rate.as_ref(), &caps.frame_rates);
    if frame_rate != form.frame_rate {
        report.push(FieldAdjustment::FrameRate {
            from: form.frame_rate,
            to: frame_rate,
        });
        form.frame_rate = frame_rate;
    }

    // 8. Provider sub-options
    let reset = reconcile_options(&mut form.provider_options, provider);
    if !reset.is_empty() {
        report.push(FieldAdjustment::ProviderOptions { reset });
    }

    report
}

fn pick_supported<T: Clone + PartialEq>(current: Option<&T>, supported: &[T]) -> Option<T> {
    match current {
        Some(v) if supported.contains(v) => Some(v.clone()),
        _ => supported.first().cloned(),
    }
}

/// Returns the keys that were dropped or reset.
fn reconcile_options(options: &mut ProviderOptions, provider: &ProviderDescriptor) -> Vec<String> {
    let mut reset = Vec::new();

    if !options.belongs_to(&provider.id) {
        reset.extend(options.values.keys().cloned());
        *options = ProviderOptions::defaults_for(provider);
        return reset;
    }

    let caps = &provider.capabilities;
    options.values.retain(|key, _| {
        let known = caps.option(key).is_some();
        if !known {
            reset.push(key.clone());
        }
        known
    });

    for spec in &caps.options {
        match options.values.get(&spec.key) {
            Some(v) if spec.accepts(v) => {}
            _ => {
                options.values.insert(spec.key.clone(), spec.default.clone());
                reset.push(spec.key.clone());
            }
        }
    }

    reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderCatalog, ProviderCapabilities};

    fn catalog() -> ProviderCatalog {
        ProviderCatalog::builtin()
    }

    fn filled_form(provider: &ProviderDescriptor) -> FormState {
        let mut form = FormState::for_provider(provider);
        form.prompt = "A lighthouse at dusk".to_string();
        form.negative_prompt = "blurry".to_string();
        form.reference_image = Some(ReferenceImage::new("ref.png", "image/png", vec![1, 2, 3]));
        form
    }

    #[test]
    fn test_count_normalizes_to_one_when_switching_to_single_video_provider() {
        let catalog = catalog();
        let veo = catalog.get("veo3").unwrap();
        let runway = catalog.get("runway-gen4").unwrap();

        let mut form = filled_form(veo);
        form.video_count = 4;
        assert!(reconcile(&mut form, veo).is_unchanged());

        let report = form.select_provider(runway);
        assert_eq!(form.video_count, 1);
        assert!(report
            .adjustments
            .contains(&FieldAdjustment::VideoCount { from: 4, to: 1 }));
    }

    #[test]
    fn test_count_clamped_to_max_videos() {
        let catalog = catalog();
        let kling = catalog.get("kling-2").unwrap();
        let mut form = FormState::for_provider(kling);
        form.video_count = 9;
        reconcile(&mut form, kling);
        assert_eq!(form.video_count, 2);

        form.video_count = 0;
        reconcile(&mut form, kling);
        assert_eq!(form.video_count, 1);
    }

    #[test]
    fn test_reference_image_and_negative_prompt() {
        let catalog = catalog();
        let veo = catalog.get("veo3").unwrap();
        let luma = catalog.get("luma-ray2").unwrap();
        let ltx = catalog.get("ltx-video").unwrap();

        // Luma keeps the image but has no negative prompt
        let mut form = filled_form(veo);
        form.select_provider(luma);
        assert!(form.reference_image.is_some());
        assert!(form.negative_prompt.is_empty());

        // LTX drops the image but keeps the negative prompt
        let mut form = filled_form(veo);
        let report = form.select_provider(ltx);
        assert!(form.reference_image.is_none());
        assert_eq!(form.negative_prompt, "blurry");
        assert!(report
            .adjustments
            .contains(&FieldAdjustment::ReferenceImageCleared));

        // Prompt is never touched
        assert_eq!(form.prompt, "A lighthouse at dusk");
    }

    #[test]
    fn test_aspect_ratio_falls_back_to_first_supported() {
        let catalog = catalog();
        let runway = catalog.get("runway-gen4").unwrap();
        let veo = catalog.get("veo3").unwrap();

        let mut form = FormState::for_provider(runway);
        form.aspect_ratio = AspectRatio::new(21, 9);
        form.select_provider(veo);
        assert_eq!(form.aspect_ratio, AspectRatio::LANDSCAPE);

        // Supported values are preserved
        let mut form = FormState::for_provider(runway);
        form.aspect_ratio = AspectRatio::PORTRAIT;
        form.select_provider(veo);
        assert_eq!(form.aspect_ratio, AspectRatio::PORTRAIT);
    }

    #[test]
    fn test_empty_aspect_ratio_list_falls_back_to_landscape() {
        let mut provider = catalog().get("ltx-video").unwrap().clone();
        provider.aspect_ratios.clear();

        let mut form = FormState::for_provider(&provider);
        form.aspect_ratio = AspectRatio::SQUARE;
        reconcile(&mut form, &provider);
        assert_eq!(form.aspect_ratio.to_string(), "16:9");
    }

    #[test]
    fn test_duration_discrete_and_continuous() {
        let catalog = catalog();
        let runway = catalog.get("runway-gen4").unwrap();
        let ltx = catalog.get("ltx-video").unwrap();

        let mut form = FormState::for_provider(runway);
        form.duration = 10;
        reconcile(&mut form, runway);
        assert_eq!(form.duration, 10);

        form.duration = 7;
        reconcile(&mut form, runway);
        assert_eq!(form.duration, 5);

        let mut form = FormState::for_provider(ltx);
        form.duration = 7;
        reconcile(&mut form, ltx);
        assert_eq!(form.duration, 7);

        form.duration = 25;
        reconcile(&mut form, ltx);
        assert_eq!(form.duration, 10);

        form.duration = 0;
        reconcile(&mut form, ltx);
        assert_eq!(form.duration, ltx.default_duration());
        assert!(form.duration > 0);
    }

    #[test]
    fn test_resolution_and_frame_rate() {
        let catalog = catalog();
        let luma = catalog.get("luma-ray2").unwrap();
        let kling = catalog.get("kling-2").unwrap();
        let ltx = catalog.get("ltx-video").unwrap();

        let mut form = FormState::for_provider(luma);
        form.resolution = Some("4k".to_string());
        form.select_provider(kling);
        assert_eq!(form.resolution.as_deref(), Some("720p"));

        form.frame_rate = Some(30);
        reconcile(&mut form, kling);
        assert_eq!(form.frame_rate, Some(30));

        form.select_provider(ltx);
        assert_eq!(form.resolution, None);
        assert_eq!(form.frame_rate, None);
    }

    #[test]
    fn test_provider_options_follow_selected_provider() {
        let catalog = catalog();
        let veo = catalog.get("veo3").unwrap();
        let kling = catalog.get("kling-2").unwrap();

        let mut form = FormState::for_provider(veo);
        form.provider_options
            .values
            .insert("generate_audio".to_string(), "false".to_string());

        form.select_provider(kling);
        assert!(form.provider_options.belongs_to(&kling.id));
        assert_eq!(form.provider_options.values.get("mode").map(String::as_str), Some("standard"));
        assert!(!form.provider_options.values.contains_key("generate_audio"));

        // Invalid values and unknown keys are reset
        form.provider_options.values.insert("mode".to_string(), "ultra".to_string());
        form.provider_options.values.insert("seed".to_string(), "42".to_string());
        let report = reconcile(&mut form, kling);
        assert_eq!(form.provider_options.values.len(), 1);
        assert_eq!(form.provider_options.values["mode"], "standard");
        assert!(matches!(
            report.adjustments.last(),
            Some(FieldAdjustment::ProviderOptions { reset }) if reset.len() == 2
        ));
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let catalog = catalog();
        for provider in catalog.iter() {
            let mut form = filled_form(catalog.get("veo3").unwrap());
            form.video_count = 7;
            form.duration = 99;
            form.select_provider(provider);
            let snapshot = form.clone();
            assert!(reconcile(&mut form, provider).is_unchanged());
            assert_eq!(form, snapshot);
        }
    }

    #[test]
    fn test_reconciled_state_within_bounds_for_all_providers() {
        let catalog = catalog();
        let counts = [0, 1, 2, 3, 4, 5, 100];
        let durations = [0, 1, 5, 6, 8, 9, 10, 11, 60];
        let aspects = [
            AspectRatio::LANDSCAPE,
            AspectRatio::PORTRAIT,
            AspectRatio::SQUARE,
            AspectRatio::new(21, 9),
            AspectRatio::new(2, 1),
        ];

        for provider in catalog.iter() {
            let caps: &ProviderCapabilities = &provider.capabilities;
            let max_count = if caps.multiple_videos { caps.max_videos } else { 1 };

            for &count in &counts {
                for &duration in &durations {
                    for aspect in &aspects {
                        let mut form = filled_form(catalog.default_provider());
                        form.video_count = count;
                        form.duration = duration;
                        form.aspect_ratio = *aspect;
                        form.resolution = Some("8k".to_string());
                        form.frame_rate = Some(120);
                        form.select_provider(provider);

                        assert!((1..=max_count).contains(&form.video_count));
                        if !provider.aspect_ratios.is_empty() {
                            assert!(provider.aspect_ratios.contains(&form.aspect_ratio));
                        }
                        assert!(
                            caps.durations.contains(&form.duration)
                                || (1..=provider.max_duration).contains(&form.duration)
                        );
                        if !caps.conditioning_image {
                            assert!(form.reference_image.is_none());
                        }
                        if !caps.negative_prompt {
                            assert!(form.negative_prompt.is_empty());
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_form_deserializes_with_defaults() {
        let form: FormState = serde_json::from_str(r#"{"provider": "veo3"}"#).unwrap();
        assert_eq!(form.video_count, 1);
        assert_eq!(form.aspect_ratio, AspectRatio::LANDSCAPE);
        assert!(form.provider_options.provider.is_none());
    }
}
