//! Render-level session gate: the studio view and the sign-in view.

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use vgen_models::{FormState, GenerationCycle, ProviderCatalog, ProviderDescriptor};

use crate::auth::{MaybeSession, Session, SessionUser};
use crate::handlers::form::DerivedForm;
use crate::oauth::{OAuthRegistry, SignInOption};
use crate::security::safe_callback_url;
use crate::state::AppState;

const SIGN_IN_MESSAGE: &str = "Sign in to start generating videos.";

/// What the root page shows.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum StudioView {
    /// Signed out: only the sign-in prompt, no generator controls.
    SignIn {
        message: String,
        providers: Vec<SignInOption>,
    },
    /// Signed in: the full generator.
    Generator {
        user: SessionUser,
        providers: Vec<ProviderDescriptor>,
        #[serde(flatten)]
        derived: DerivedForm,
        generation: GenerationCycle,
    },
}

impl StudioView {
    /// Choose the view for the current session.
    pub fn for_session(
        session: Option<&Session>,
        catalog: &ProviderCatalog,
        oauth: &OAuthRegistry,
    ) -> Self {
        match session {
            None => StudioView::SignIn {
                message: SIGN_IN_MESSAGE.to_string(),
                providers: oauth.sign_in_options(None),
            },
            Some(session) => {
                let provider = catalog.default_provider();
                StudioView::Generator {
                    user: session.user.clone(),
                    providers: catalog.providers().to_vec(),
                    derived: DerivedForm::new(FormState::for_provider(provider), provider),
                    generation: GenerationCycle::default(),
                }
            }
        }
    }

    pub fn is_generator(&self) -> bool {
        matches!(self, StudioView::Generator { .. })
    }
}

/// GET /
pub async fn studio(
    State(state): State<AppState>,
    MaybeSession(session): MaybeSession,
) -> Json<StudioView> {
    let mut view = StudioView::for_session(session.as_ref(), &state.catalog, &state.oauth);
    if let (Some(session), StudioView::Generator { generation, .. }) = (&session, &mut view) {
        *generation = state.generations.status(session.user_id()).await;
    }
    Json(view)
}

#[derive(Debug, Deserialize)]
pub struct SignInPageQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SignInPage {
    pub callback_url: String,
    pub providers: Vec<SignInOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /signin
pub async fn sign_in_page(
    State(state): State<AppState>,
    Query(query): Query<SignInPageQuery>,
) -> Json<SignInPage> {
    let callback_url = safe_callback_url(query.callback_url.as_deref(), &state.config.public_url);
    Json(SignInPage {
        providers: state.oauth.sign_in_options(Some(&callback_url)),
        callback_url,
        error: query.error,
    })
}
