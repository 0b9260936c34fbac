//! Shared data models for VGen Studio.
//!
//! This crate provides:
//! - The provider catalog and its closed capability schema
//! - Form state and provider reconciliation
//! - Cost estimation and the prompt quality heuristic
//! - The generation request lifecycle

pub mod aspect;
pub mod cost;
pub mod form;
pub mod generation;
pub mod prompt;
pub mod provider;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use cost::{estimate, format_usd, total_cost, CostEstimate};
pub use form::{reconcile, FieldAdjustment, FormState, ProviderOptions, Reconciliation, ReferenceImage};
pub use generation::{
    AttemptTicket, GenerationCycle, GenerationError, GenerationMeta, GenerationOutput,
    GenerationPhase, GenerationResult, PROMPT_REQUIRED_MESSAGE,
};
pub use prompt::{assess, PromptAssessment, PromptTier};
pub use provider::{
    CatalogError, CatalogResult, Pricing, ProviderCapabilities, ProviderCatalog,
    ProviderDescriptor, ProviderId, ProviderOptionSpec,
};
