//! Video generation provider catalog.
//!
//! A [`ProviderDescriptor`] declares what a third-party backend can do through
//! a closed [`ProviderCapabilities`] schema. The form reconciler, the cost
//! estimator and the request payload all read from it; nothing probes
//! providers for ad hoc fields.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::aspect::AspectRatio;

/// Provider identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Create from an existing string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProviderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProviderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Provider pricing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Pricing {
    /// USD per generated second. Missing pricing is treated as free.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_second: Option<f64>,
    /// Free tier description shown next to the price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_tier: Option<String>,
}

/// A provider-specific sub-option (e.g. audio generation toggle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderOptionSpec {
    pub key: String,
    pub label: String,
    /// Allowed values. Empty means free text.
    #[serde(default)]
    pub choices: Vec<String>,
    pub default: String,
}

impl ProviderOptionSpec {
    /// Check whether a value is acceptable for this option.
    pub fn accepts(&self, value: &str) -> bool {
        self.choices.is_empty() || self.choices.iter().any(|c| c == value)
    }
}

/// Optional features a provider supports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderCapabilities {
    /// Whether more than one video can be requested at once.
    #[serde(default)]
    pub multiple_videos: bool,
    /// Upper bound for the video count when `multiple_videos` is set.
    #[serde(default = "default_max_videos")]
    pub max_videos: u32,
    /// Whether a reference (conditioning) image is accepted.
    #[serde(default)]
    pub conditioning_image: bool,
    #[serde(default)]
    pub negative_prompt: bool,
    /// Discrete durations in seconds. Empty means any value up to `max_duration`.
    #[serde(default)]
    pub durations: Vec<u32>,
    #[serde(default)]
    pub resolutions: Vec<String>,
    #[serde(default)]
    pub frame_rates: Vec<u32>,
    #[serde(default)]
    pub options: Vec<ProviderOptionSpec>,
}

fn default_max_videos() -> u32 {
    1
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self {
            multiple_videos: false,
            max_videos: default_max_videos(),
            conditioning_image: false,
            negative_prompt: false,
            durations: Vec::new(),
            resolutions: Vec::new(),
            frame_rates: Vec::new(),
            options: Vec::new(),
        }
    }
}

impl ProviderCapabilities {
    /// Largest video count this provider accepts.
    pub fn video_limit(&self) -> u32 {
        if self.multiple_videos {
            self.max_videos.max(1)
        } else {
            1
        }
    }

    /// Look up a sub-option declaration by key.
    pub fn option(&self, key: &str) -> Option<&ProviderOptionSpec> {
        self.options.iter().find(|o| o.key == key)
    }
}

/// Static description of a video generation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderDescriptor {
    pub id: ProviderId,
    pub name: String,
    pub description: String,
    /// Feature tags shown on the provider card.
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub pricing: Pricing,
    /// Maximum duration in seconds.
    pub max_duration: u32,
    #[schemars(with = "Vec<String>")]
    pub aspect_ratios: Vec<AspectRatio>,
    #[serde(default)]
    pub capabilities: ProviderCapabilities,
}

impl ProviderDescriptor {
    /// Cost per second, treating missing pricing as free.
    pub fn cost_per_second(&self) -> f64 {
        self.pricing.cost_per_second.unwrap_or(0.0)
    }

    /// Check whether an aspect ratio is supported.
    pub fn supports_aspect_ratio(&self, ratio: &AspectRatio) -> bool {
        self.aspect_ratios.contains(ratio)
    }

    /// Check whether a duration is valid for this provider.
    pub fn supports_duration(&self, duration: u32) -> bool {
        if self.capabilities.durations.is_empty() {
            duration <= self.max_duration
        } else {
            self.capabilities.durations.contains(&duration)
        }
    }

    /// Default duration for a fresh form.
    pub fn default_duration(&self) -> u32 {
        self.capabilities
            .durations
            .first()
            .copied()
            .unwrap_or(self.max_duration)
    }

    /// Default aspect ratio for a fresh form.
    pub fn default_aspect_ratio(&self) -> AspectRatio {
        self.aspect_ratios.first().copied().unwrap_or_default()
    }
}

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Provider catalog is empty")]
    Empty,

    #[error("Duplicate provider id: {0}")]
    DuplicateId(String),

    #[error("Provider {id}: {reason}")]
    InvalidProvider { id: String, reason: String },

    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Immutable set of providers, loaded once at startup. Only built through
/// [`ProviderCatalog::new`], so it is never empty.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ProviderCatalog {
    providers: Vec<ProviderDescriptor>,
}

impl ProviderCatalog {
    /// Build a catalog from descriptors, validating them.
    pub fn new(providers: Vec<ProviderDescriptor>) -> CatalogResult<Self> {
        let catalog = Self { providers };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parse a catalog from a JSON array of descriptors.
    pub fn from_json_str(json: &str) -> CatalogResult<Self> {
        let providers: Vec<ProviderDescriptor> = serde_json::from_str(json)?;
        Self::new(providers)
    }

    /// Load a catalog from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        info!(path = %path.display(), providers = catalog.len(), "Loaded provider catalog");
        Ok(catalog)
    }

    fn validate(&self) -> CatalogResult<()> {
        if self.providers.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        for p in &self.providers {
            if !seen.insert(p.id.as_str()) {
                return Err(CatalogError::DuplicateId(p.id.to_string()));
            }

            let invalid = |reason: &str| CatalogError::InvalidProvider {
                id: p.id.to_string(),
                reason: reason.to_string(),
            };

            if p.id.as_str().trim().is_empty() {
                return Err(invalid("id cannot be empty"));
            }
            if p.max_duration == 0 {
                return Err(invalid("max_duration must be positive"));
            }
            if p.capabilities.multiple_videos && p.capabilities.max_videos < 1 {
                return Err(invalid("max_videos must be at least 1"));
            }
            if let Some(cost) = p.pricing.cost_per_second {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(invalid("cost_per_second must be a non-negative number"));
                }
            }
            if p.capabilities.durations.iter().any(|d| *d > p.max_duration) {
                return Err(invalid("durations cannot exceed max_duration"));
            }
            for opt in &p.capabilities.options {
                if !opt.accepts(&opt.default) {
                    return Err(invalid(&format!(
                        "option '{}' default is not one of its choices",
                        opt.key
                    )));
                }
            }
        }

        debug!(providers = self.providers.len(), "Provider catalog validated");
        Ok(())
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.id.as_str() == id)
    }

    /// The provider preselected in a fresh form.
    pub fn default_provider(&self) -> &ProviderDescriptor {
        // validate() guarantees at least one entry
        &self.providers[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderDescriptor> {
        self.providers.iter()
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Built-in catalog used when no catalog file is configured.
    pub fn builtin() -> Self {
        Self {
            providers: builtin_providers(),
        }
    }
}

impl Default for ProviderCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn ratios(list: &[(u32, u32)]) -> Vec<AspectRatio> {
    list.iter().map(|(w, h)| AspectRatio::new(*w, *h)).collect()
}

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn choice(key: &str, label: &str, choices: &[&str], default: &str) -> ProviderOptionSpec {
    ProviderOptionSpec {
        key: key.to_string(),
        label: label.to_string(),
        choices: strings(choices),
        default: default.to_string(),
    }
}

fn builtin_providers() -> Vec<ProviderDescriptor> {
    vec![
        ProviderDescriptor {
            id: ProviderId::from("veo3"),
            name: "Veo 3".to_string(),
            description: "Google's flagship model with native audio and strong prompt adherence."
                .to_string(),
            features: strings(&["Native audio", "Up to 4 videos", "Image to video"]),
            pricing: Pricing {
                cost_per_second: Some(0.75),
                free_tier: None,
            },
            max_duration: 8,
            aspect_ratios: ratios(&[(16, 9), (9, 16)]),
            capabilities: ProviderCapabilities {
                multiple_videos: true,
                max_videos: 4,
                conditioning_image: true,
                negative_prompt: true,
                durations: vec![8],
                resolutions: strings(&["720p", "1080p"]),
                frame_rates: vec![24],
                options: vec![
                    choice("generate_audio", "Generate audio", &["true", "false"], "true"),
                    choice(
                        "person_generation",
                        "Person generation",
                        &["allow_adult", "dont_allow"],
                        "allow_adult",
                    ),
                ],
            },
        },
        ProviderDescriptor {
            id: ProviderId::from("runway-gen4"),
            name: "Runway Gen-4 Turbo".to_string(),
            description: "Fast image-to-video with consistent characters and camera control."
                .to_string(),
            features: strings(&["Fast turnaround", "Many aspect ratios"]),
            pricing: Pricing {
                cost_per_second: Some(0.05),
                free_tier: Some("125 one-time credits".to_string()),
            },
            max_duration: 10,
            aspect_ratios: ratios(&[(16, 9), (9, 16), (1, 1), (4, 3), (3, 4), (21, 9)]),
            capabilities: ProviderCapabilities {
                multiple_videos: false,
                max_videos: 1,
                conditioning_image: true,
                negative_prompt: false,
                durations: vec![5, 10],
                resolutions: strings(&["720p"]),
                frame_rates: vec![24],
                options: Vec::new(),
            },
        },
        ProviderDescriptor {
            id: ProviderId::from("luma-ray2"),
            name: "Luma Ray 2".to_string(),
            description: "Realistic motion and physics, up to 4K output.".to_string(),
            features: strings(&["4K output", "Looping"]),
            pricing: Pricing {
                cost_per_second: Some(0.32),
                free_tier: None,
            },
            max_duration: 9,
            aspect_ratios: ratios(&[(16, 9), (9, 16), (1, 1), (4, 3), (3, 4), (21, 9), (9, 21)]),
            capabilities: ProviderCapabilities {
                multiple_videos: false,
                max_videos: 1,
                conditioning_image: true,
                negative_prompt: false,
                durations: vec![5, 9],
                resolutions: strings(&["540p", "720p", "1080p", "4k"]),
                frame_rates: vec![24],
                options: vec![choice("loop", "Seamless loop", &["true", "false"], "false")],
            },
        },
        ProviderDescriptor {
            id: ProviderId::from("kling-2"),
            name: "Kling 2.1".to_string(),
            description: "Cinematic motion with standard and professional render modes."
                .to_string(),
            features: strings(&["Pro mode", "Negative prompts", "Up to 2 videos"]),
            pricing: Pricing {
                cost_per_second: Some(0.07),
                free_tier: Some("66 daily credits".to_string()),
            },
            max_duration: 10,
            aspect_ratios: ratios(&[(16, 9), (9, 16), (1, 1)]),
            capabilities: ProviderCapabilities {
                multiple_videos: true,
                max_videos: 2,
                conditioning_image: true,
                negative_prompt: true,
                durations: vec![5, 10],
                resolutions: strings(&["720p", "1080p"]),
                frame_rates: vec![24, 30],
                options: vec![choice("mode", "Render mode", &["standard", "pro"], "standard")],
            },
        },
        ProviderDescriptor {
            id: ProviderId::from("ltx-video"),
            name: "LTX Video".to_string(),
            description: "Open-weights model for quick drafts at any length up to 10 seconds."
                .to_string(),
            features: strings(&["Open weights", "Free drafts"]),
            pricing: Pricing {
                cost_per_second: None,
                free_tier: Some("Free while in preview".to_string()),
            },
            max_duration: 10,
            aspect_ratios: ratios(&[(16, 9), (9, 16), (1, 1)]),
            capabilities: ProviderCapabilities {
                multiple_videos: true,
                max_videos: 2,
                conditioning_image: false,
                negative_prompt: true,
                durations: Vec::new(),
                resolutions: Vec::new(),
                frame_rates: Vec::new(),
                options: Vec::new(),
            },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = ProviderCatalog::builtin();
        assert!(catalog.validate().is_ok());
        assert_eq!(catalog.default_provider().id.as_str(), "veo3");
        assert!(catalog.get("kling-2").is_some());
        assert!(catalog.get("unknown").is_none());
    }

    #[test]
    fn test_video_limit() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.get("veo3").unwrap().capabilities.video_limit(), 4);
        assert_eq!(catalog.get("runway-gen4").unwrap().capabilities.video_limit(), 1);

        let caps = ProviderCapabilities {
            multiple_videos: true,
            max_videos: 0,
            ..Default::default()
        };
        assert_eq!(caps.video_limit(), 1);
    }

    #[test]
    fn test_supports_duration() {
        let catalog = ProviderCatalog::builtin();
        let runway = catalog.get("runway-gen4").unwrap();
        assert!(runway.supports_duration(5));
        assert!(!runway.supports_duration(7));

        let ltx = catalog.get("ltx-video").unwrap();
        assert!(ltx.supports_duration(7));
        assert!(!ltx.supports_duration(11));
    }

    #[test]
    fn test_missing_pricing_is_free() {
        let catalog = ProviderCatalog::builtin();
        assert_eq!(catalog.get("ltx-video").unwrap().cost_per_second(), 0.0);
    }

    #[test]
    fn test_from_json_applies_capability_defaults() {
        let json = r#"[{
            "id": "mini",
            "name": "Mini",
            "description": "Minimal provider",
            "max_duration": 6,
            "aspect_ratios": ["16:9"]
        }]"#;
        let catalog = ProviderCatalog::from_json_str(json).unwrap();
        let mini = catalog.get("mini").unwrap();
        assert!(!mini.capabilities.multiple_videos);
        assert_eq!(mini.capabilities.max_videos, 1);
        assert!(mini.capabilities.durations.is_empty());
        assert_eq!(mini.pricing, Pricing::default());
    }

    #[test]
    fn test_default_capabilities_allow_one_video() {
        let caps = ProviderCapabilities::default();
        assert_eq!(caps.max_videos, 1);
        assert_eq!(caps.video_limit(), 1);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let mut providers = ProviderCatalog::builtin().providers().to_vec();
        providers.push(providers[0].clone());
        assert!(matches!(
            ProviderCatalog::new(providers),
            Err(CatalogError::DuplicateId(id)) if id == "veo3"
        ));
    }

    #[test]
    fn test_rejects_empty_and_invalid() {
        assert!(matches!(ProviderCatalog::new(vec![]), Err(CatalogError::Empty)));
        assert!(matches!(ProviderCatalog::from_json_str("[]"), Err(CatalogError::Empty)));

        let mut p = ProviderCatalog::builtin().providers()[1].clone();
        p.capabilities.durations = vec![5, 30];
        assert!(matches!(
            ProviderCatalog::new(vec![p]),
            Err(CatalogError::InvalidProvider { .. })
        ));

        assert!(matches!(
            ProviderCatalog::from_json_str("not json"),
            Err(CatalogError::Json(_))
        ));
    }
}
