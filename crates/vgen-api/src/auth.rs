//! Session cookies and authentication extractors.
//!
//! Sessions are HS256 JWTs stored in the `vgen.session-token` cookie. The
//! OAuth `state` round-trip uses a second short-lived signed cookie.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiError;
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "vgen.session-token";

/// OAuth state cookie name.
pub const STATE_COOKIE: &str = "vgen.oauth-state";

/// Lifetime of the OAuth state cookie.
const STATE_TTL: Duration = Duration::from_secs(600); // 10 minutes

const SESSION_KIND: &str = "session";
const STATE_KIND: &str = "oauth_state";

/// Signed-in user as exposed to views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    /// Social provider the user signed in with
    pub provider: String,
    pub expires: DateTime<Utc>,
}

impl Session {
    /// Key for per-user state.
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    picture: Option<String>,
    provider: String,
    kind: String,
    iat: i64,
    exp: i64,
}

/// Signed OAuth round-trip state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthState {
    pub state: String,
    pub provider: String,
    pub callback_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateClaims {
    state: String,
    provider: String,
    callback_url: String,
    kind: String,
    exp: i64,
}

/// Signing keys and cookie policy for sessions.
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    secure_cookies: bool,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl: Duration, secure_cookies: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            secure_cookies,
        }
    }

    /// Sign a session token for a user.
    pub fn issue(&self, user: &SessionUser, provider: &str) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            picture: user.image.clone(),
            provider: provider.to_string(),
            kind: SESSION_KIND.to_string(),
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign session: {}", e)))
    }

    /// Verify a session token.
    pub fn verify(&self, token: &str) -> Result<Session, ApiError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| ApiError::unauthorized(format!("Invalid session: {}", e)))?;
        let claims = data.claims;

        if claims.kind != SESSION_KIND {
            return Err(ApiError::unauthorized("Invalid session: wrong token kind"));
        }

        let expires = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or_else(|| ApiError::unauthorized("Invalid session: bad expiry"))?;

        Ok(Session {
            user: SessionUser {
                id: claims.sub,
                name: claims.name,
                email: claims.email,
                image: claims.picture,
            },
            provider: claims.provider,
            expires,
        })
    }

    /// Read the session from request headers.
    ///
    /// Missing, malformed, expired or forged cookies all yield `None`.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        let jar = CookieJar::from_headers(headers);
        let token = jar.get(SESSION_COOKIE)?.value().to_string();
        match self.verify(&token) {
            Ok(session) => Some(session),
            Err(e) => {
                debug!("Ignoring session cookie: {}", e);
                None
            }
        }
    }

    /// Build the session cookie. Expiry is enforced by the token itself.
    pub fn session_cookie(&self, token: String) -> Cookie<'static> {
        self.cookie(SESSION_COOKIE, token)
    }

    /// Sign the OAuth state cookie.
    pub fn state_cookie(&self, state: &OAuthState) -> Result<Cookie<'static>, ApiError> {
        let claims = StateClaims {
            state: state.state.clone(),
            provider: state.provider.clone(),
            callback_url: state.callback_url.clone(),
            kind: STATE_KIND.to_string(),
            exp: Utc::now().timestamp() + STATE_TTL.as_secs() as i64,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("Failed to sign OAuth state: {}", e)))?;
        Ok(self.cookie(STATE_COOKIE, token))
    }

    /// Verify the OAuth state cookie.
    pub fn verify_state(&self, token: &str) -> Result<OAuthState, ApiError> {
        let data = decode::<StateClaims>(token, &self.decoding, &Validation::new(Algorithm::HS256))
            .map_err(|e| ApiError::unauthorized(format!("Invalid OAuth state: {}", e)))?;
        if data.claims.kind != STATE_KIND {
            return Err(ApiError::unauthorized("Invalid OAuth state: wrong token kind"));
        }
        Ok(OAuthState {
            state: data.claims.state,
            provider: data.claims.provider,
            callback_url: data.claims.callback_url,
        })
    }

    fn cookie(&self, name: &'static str, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .build()
    }
}

/// Removal cookie for `name`, matching the path it was set with.
pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// Axum extractor for a signed-in user. Rejects with 401.
#[axum::async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // The gate stores the verified session on the request
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        state
            .sessions
            .session_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Sign in required"))
    }
}

/// Axum extractor that never fails; `None` when signed out.
#[derive(Debug, Clone)]
pub struct MaybeSession(pub Option<Session>);

#[axum::async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(Self(Some(session.clone())));
        }
        Ok(Self(state.sessions.session_from_headers(&parts.headers)))
    }
}
