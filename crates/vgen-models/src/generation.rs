//! Generation request lifecycle.
//!
//! One [`GenerationCycle`] per user tracks `idle -> submitting -> succeeded |
//! failed`. Every submission gets an attempt number; completions carrying an
//! older attempt number are discarded, so a slow stale response can never
//! overwrite a newer one.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cost::format_usd;
use crate::form::FormState;
use crate::provider::ProviderId;

/// Inline validation message for an empty prompt.
pub const PROMPT_REQUIRED_MESSAGE: &str = "Please enter a prompt to generate a video.";

/// Submission validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("{}", PROMPT_REQUIRED_MESSAGE)]
    PromptRequired,
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

impl GenerationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPhase::Idle => "idle",
            GenerationPhase::Submitting => "submitting",
            GenerationPhase::Succeeded => "succeeded",
            GenerationPhase::Failed => "failed",
        }
    }
}

impl std::fmt::Display for GenerationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata for one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationMeta {
    pub attempt: u64,
    pub provider: ProviderId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationMeta {
    /// Time from start to completion, if completed.
    pub fn elapsed_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}

/// Videos returned by a successful attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationResult {
    pub videos: Vec<String>,
    pub message: String,
}

/// What the provider returned for a successful call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationOutput {
    pub videos: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}

/// Handle for an in-flight attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptTicket {
    pub attempt: u64,
    pub provider: ProviderId,
    pub started_at: DateTime<Utc>,
}

/// Per-user generation state machine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationCycle {
    pub phase: GenerationPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<GenerationMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GenerationResult>,
    /// Number of attempts started so far.
    pub attempts: u64,
}

impl GenerationCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `submitting` for a new attempt.
    ///
    /// Rejects an empty (after trim) prompt and leaves the cycle untouched.
    /// Allowed from any phase; a new attempt supersedes the previous one.
    pub fn begin(
        &mut self,
        form: &FormState,
        now: DateTime<Utc>,
    ) -> Result<AttemptTicket, GenerationError> {
        if form.trimmed_prompt().is_empty() {
            return Err(GenerationError::PromptRequired);
        }

        self.attempts += 1;
        self.phase = GenerationPhase::Submitting;
        self.result = None;
        self.meta = Some(GenerationMeta {
            attempt: self.attempts,
            provider: form.provider.clone(),
            cost: None,
            started_at: now,
            completed_at: None,
            error: None,
        });

        Ok(AttemptTicket {
            attempt: self.attempts,
            provider: form.provider.clone(),
            started_at: now,
        })
    }

    /// Whether `ticket` is still the latest attempt.
    pub fn is_current(&self, ticket: &AttemptTicket) -> bool {
        ticket.attempt == self.attempts && self.phase == GenerationPhase::Submitting
    }

    /// Record a successful response. Returns false if the ticket is stale.
    pub fn succeed(
        &mut self,
        ticket: &AttemptTicket,
        output: GenerationOutput,
        provider_name: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        let message = success_message(output.videos.len(), provider_name, output.cost);
        self.phase = GenerationPhase::Succeeded;
        self.meta = Some(GenerationMeta {
            attempt: ticket.attempt,
            provider: output.provider.unwrap_or_else(|| ticket.provider.clone()),
            cost: output.cost,
            started_at: ticket.started_at,
            completed_at: Some(now),
            error: None,
        });
        self.result = Some(GenerationResult {
            videos: output.videos,
            message,
        });
        true
    }

    /// Record a failed attempt. Returns false if the ticket is stale.
    pub fn fail(&mut self, ticket: &AttemptTicket, error: impl Into<String>, now: DateTime<Utc>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }

        self.phase = GenerationPhase::Failed;
        self.meta = Some(GenerationMeta {
            attempt: ticket.attempt,
            provider: ticket.provider.clone(),
            cost: None,
            started_at: ticket.started_at,
            completed_at: Some(now),
            error: Some(error.into()),
        });
        self.result = None;
        true
    }
}

fn success_message(count: usize, provider_name: &str, cost: Option<f64>) -> String {
    let noun = if count == 1 { "video" } else { "videos" };
    match cost {
        Some(cost) => format!(
            "Generated {} {} with {}. Cost: {}",
            count,
            noun,
            provider_name,
            format_usd(cost)
        ),
        None => format!("Generated {} {} with {}.", count, noun, provider_name),
    }
}
