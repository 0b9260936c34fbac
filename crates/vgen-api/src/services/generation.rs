//! Generation orchestration.
//!
//! Holds one [`GenerationCycle`] per signed-in user. The map lock is taken
//! to begin an attempt and again to record its outcome, never across the
//! outbound call, so slow providers do not block other users.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use vgen_models::{reconcile, FormState, GenerationCycle, ProviderCatalog};
use vgen_provider_client::{ClientError, GenerationClient, GenerationPayload};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Result of one submission.
#[derive(Debug)]
pub struct SubmissionOutcome {
    /// Attempt number assigned to this submission
    pub attempt: u64,
    /// Cycle snapshot after the outcome was applied (or discarded)
    pub cycle: GenerationCycle,
    /// False when a newer attempt superseded this one
    pub applied: bool,
    /// Provider failure, if any
    pub error: Option<ClientError>,
}

#[derive(Clone)]
pub struct GenerationService {
    client: Arc<GenerationClient>,
    catalog: Arc<ProviderCatalog>,
    cycles: Arc<RwLock<HashMap<String, GenerationCycle>>>,
}

impl GenerationService {
    pub fn new(client: Arc<GenerationClient>, catalog: Arc<ProviderCatalog>) -> Self {
        Self {
            client,
            catalog,
            cycles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_configured()
    }

    /// Current cycle for a user (idle if they never submitted).
    pub async fn status(&self, user_id: &str) -> GenerationCycle {
        self.cycles
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Reconcile, validate and submit a form.
    ///
    /// An empty prompt is rejected before any state changes. Provider
    /// failures are recorded on the cycle and reported in the outcome rather
    /// than as an error.
    pub async fn submit(&self, user_id: &str, mut form: FormState) -> ApiResult<SubmissionOutcome> {
        let provider = self
            .catalog
            .get(form.provider.as_str())
            .ok_or_else(|| ApiError::bad_request(format!("Unknown provider: {}", form.provider)))?;

        let adjustments = reconcile(&mut form, provider);
        if !adjustments.is_unchanged() {
            debug!(
                user_id = %user_id,
                provider = %provider.id,
                adjustments = adjustments.adjustments.len(),
                "Form normalized before submission"
            );
        }

        let ticket = {
            let mut cycles = self.cycles.write().await;
            let cycle = cycles.entry(user_id.to_string()).or_default();
            cycle.begin(&form, Utc::now())?
        };

        info!(
            user_id = %user_id,
            attempt = ticket.attempt,
            provider = %provider.id,
            videos = form.video_count,
            duration = form.duration,
            has_image = form.reference_image.is_some(),
            "Generation submitted"
        );
        metrics::record_generation_started(provider.id.as_str());

        let start = Instant::now();
        let result = self.client.generate(GenerationPayload::from_form(&form)).await;
        let elapsed = start.elapsed().as_secs_f64();

        let mut cycles = self.cycles.write().await;
        let cycle = cycles.entry(user_id.to_string()).or_default();

        let (applied, error) = match result {
            Ok(response) => {
                let applied = cycle.succeed(&ticket, response.into(), &provider.name, Utc::now());
                if applied {
                    metrics::record_generation_succeeded(provider.id.as_str(), elapsed);
                }
                (applied, None)
            }
            Err(e) => {
                let applied = cycle.fail(&ticket, e.user_message(), Utc::now());
                if applied {
                    warn!(
                        user_id = %user_id,
                        attempt = ticket.attempt,
                        provider = %provider.id,
                        "Generation failed: {}",
                        e
                    );
                    metrics::record_generation_failed(provider.id.as_str(), e.status());
                }
                (applied, Some(e))
            }
        };

        if !applied {
            info!(
                user_id = %user_id,
                attempt = ticket.attempt,
                latest = cycle.attempts,
                "Discarding completion of superseded attempt"
            );
            metrics::record_generation_stale(provider.id.as_str());
        }

        Ok(SubmissionOutcome {
            attempt: ticket.attempt,
            cycle: cycle.clone(),
            applied,
            error,
        })
    }
}
