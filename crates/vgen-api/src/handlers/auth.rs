//! Sign-in, callback, session and sign-out handlers.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{removal_cookie, MaybeSession, OAuthState, Session, SESSION_COOKIE, STATE_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::oauth::{OAuthError, OAuthRegistry};
use crate::security::safe_callback_url;
use crate::state::AppState;

/// GET /api/auth/session
pub async fn get_session(MaybeSession(session): MaybeSession) -> Json<Option<Session>> {
    Json(session)
}

#[derive(Debug, Deserialize)]
pub struct SignInQuery {
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

/// GET /api/auth/signin/:provider
pub async fn sign_in(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<SignInQuery>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Redirect)> {
    let client = state.oauth.client(&provider).map_err(oauth_error)?;

    let oauth_state = OAuthState {
        state: OAuthRegistry::new_state(),
        provider: client.provider.as_str().to_string(),
        callback_url: safe_callback_url(query.callback_url.as_deref(), &state.config.public_url),
    };
    let authorize_url = state
        .oauth
        .authorize_url(client, &oauth_state.state)
        .map_err(oauth_error)?;
    let cookie = state.sessions.state_cookie(&oauth_state)?;

    Ok((jar.add(cookie), Redirect::to(&authorize_url)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// GET /api/auth/callback/:provider
pub async fn oauth_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> ApiResult<Response> {
    let client = state.oauth.client(&provider).map_err(oauth_error)?;

    if let Some(error) = query.error {
        warn!(provider = %provider, "Provider returned sign-in error: {}", error);
        let jar = jar.remove(removal_cookie(STATE_COOKIE));
        return Ok((jar, Redirect::to("/signin?error=OAuthCallback")).into_response());
    }

    let expected = jar
        .get(STATE_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Missing OAuth state"))?;
    let expected = state.sessions.verify_state(&expected)?;

    let returned = query.state.as_deref().unwrap_or_default();
    if returned.is_empty() || returned != expected.state || expected.provider != client.provider.as_str() {
        warn!(provider = %provider, "OAuth state mismatch");
        return Err(ApiError::unauthorized("OAuth state mismatch"));
    }

    let code = query
        .code
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing authorization code"))?;

    let user = state.oauth.complete(client, code).await.map_err(oauth_error)?;
    let token = state.sessions.issue(&user, client.provider.as_str())?;

    let destination = safe_callback_url(Some(&expected.callback_url), &state.config.public_url);

    let jar = jar
        .remove(removal_cookie(STATE_COOKIE))
        .add(state.sessions.session_cookie(token));
    Ok((jar, Redirect::to(&destination)).into_response())
}

/// POST /api/auth/signout
pub async fn sign_out(MaybeSession(session): MaybeSession, jar: CookieJar) -> (CookieJar, Redirect) {
    if let Some(session) = session {
        info!(user_id = %session.user_id(), "User signed out");
    }
    (jar.remove(removal_cookie(SESSION_COOKIE)), Redirect::to("/"))
}

fn oauth_error(e: OAuthError) -> ApiError {
    match e {
        OAuthError::UnknownProvider(id) => ApiError::not_found(format!("Sign-in provider '{}'", id)),
        OAuthError::InvalidUrl(e) => ApiError::internal(format!("Invalid provider URL: {}", e)),
        other => {
            warn!("Sign-in failed: {}", other);
            ApiError::Unauthorized("Sign-in failed".to_string())
        }
    }
}
