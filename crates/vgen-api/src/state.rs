//! Application state.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use vgen_models::ProviderCatalog;
use vgen_provider_client::GenerationClient;

use crate::auth::SessionKeys;
use crate::config::ApiConfig;
use crate::oauth::OAuthRegistry;
use crate::services::GenerationService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub catalog: Arc<ProviderCatalog>,
    pub sessions: Arc<SessionKeys>,
    pub oauth: Arc<OAuthRegistry>,
    pub generations: GenerationService,
}

impl AppState {
    /// Create new application state from configuration and environment.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let catalog = match &config.provider_catalog_path {
            Some(path) => ProviderCatalog::from_file(path)?,
            None => ProviderCatalog::builtin(),
        };
        info!(providers = catalog.len(), "Provider catalog ready");

        let client = GenerationClient::from_env()?;
        if !client.is_configured() {
            warn!("GENERATION_API_URL is not set; generation requests will fail");
        }

        let secret = match &config.auth.secret {
            Some(secret) => secret.clone(),
            None if config.is_production() => {
                return Err("AUTH_SECRET must be set in production".into());
            }
            None => {
                warn!("AUTH_SECRET is not set; using an ephemeral secret, sessions will not survive restarts");
                format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
            }
        };
        let sessions = SessionKeys::new(&secret, config.auth.session_ttl, config.is_production());
        let oauth = OAuthRegistry::from_config(&config.public_url, &config.auth)?;

        Ok(Self::from_parts(config, catalog, client, sessions, oauth))
    }

    /// Assemble state from already-built components.
    pub fn from_parts(
        config: ApiConfig,
        catalog: ProviderCatalog,
        client: GenerationClient,
        sessions: SessionKeys,
        oauth: OAuthRegistry,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let generations = GenerationService::new(Arc::new(client), Arc::clone(&catalog));

        Self {
            config,
            catalog,
            sessions: Arc::new(sessions),
            oauth: Arc::new(oauth),
            generations,
        }
    }
}
