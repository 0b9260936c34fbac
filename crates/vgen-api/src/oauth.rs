//! Social sign-in (OAuth2 authorization code flow) for Google and GitHub.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::SessionUser;
use crate::config::{AuthConfig, OAuthCredentials};

const USER_AGENT: &str = concat!("vgen-api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("Unknown sign-in provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Token exchange failed ({status}): {body}")]
    TokenExchange { status: u16, body: String },

    #[error("User info request failed ({status})")]
    UserInfo { status: u16 },

    #[error("Provider response missing {0}")]
    MissingField(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Supported social providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    GitHub,
}

impl SocialProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialProvider::Google => "google",
            SocialProvider::GitHub => "github",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SocialProvider::Google => "Google",
            SocialProvider::GitHub => "GitHub",
        }
    }

    pub fn from_id(s: &str) -> Option<Self> {
        match s {
            "google" => Some(SocialProvider::Google),
            "github" => Some(SocialProvider::GitHub),
            _ => None,
        }
    }

    fn default_endpoints(&self) -> OAuthEndpoints {
        match self {
            SocialProvider::Google => OAuthEndpoints {
                authorize_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                scope: "openid email profile".to_string(),
            },
            SocialProvider::GitHub => OAuthEndpoints {
                authorize_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                userinfo_url: "https://api.github.com/user".to_string(),
                scope: "read:user user:email".to_string(),
            },
        }
    }

    /// Map a user-info document to a session user.
    fn user_from_info(&self, info: &Value) -> Result<SessionUser, OAuthError> {
        let text = |key: &str| info.get(key).and_then(Value::as_str).map(str::to_string);
        match self {
            SocialProvider::Google => {
                let sub = text("sub").ok_or(OAuthError::MissingField("sub"))?;
                Ok(SessionUser {
                    id: format!("google:{}", sub),
                    name: text("name"),
                    email: text("email"),
                    image: text("picture"),
                })
            }
            SocialProvider::GitHub => {
                let id = match info.get("id") {
                    Some(Value::Number(n)) => n.to_string(),
                    Some(Value::String(s)) => s.clone(),
                    _ => return Err(OAuthError::MissingField("id")),
                };
                Ok(SessionUser {
                    id: format!("github:{}", id),
                    name: text("name").or_else(|| text("login")),
                    email: text("email"),
                    image: text("avatar_url"),
                })
            }
        }
    }
}

impl std::fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider endpoints. Overridable for tests.
#[derive(Debug, Clone)]
pub struct OAuthEndpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scope: String,
}

/// One configured social provider.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub provider: SocialProvider,
    pub credentials: OAuthCredentials,
    pub endpoints: OAuthEndpoints,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Sign-in option shown on the sign-in view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignInOption {
    pub id: String,
    pub name: String,
    pub sign_in_url: String,
}

/// Configured social providers.
pub struct OAuthRegistry {
    http: Client,
    public_url: String,
    clients: BTreeMap<SocialProvider, OAuthClient>,
}

impl OAuthRegistry {
    pub fn new(public_url: impl Into<String>, clients: Vec<OAuthClient>) -> Result<Self, OAuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            public_url: public_url.into(),
            clients: clients.into_iter().map(|c| (c.provider, c)).collect(),
        })
    }

    /// Registry with every provider that has credentials configured.
    pub fn from_config(public_url: &str, auth: &AuthConfig) -> Result<Self, OAuthError> {
        let configured = [
            (SocialProvider::Google, auth.google.clone()),
            (SocialProvider::GitHub, auth.github.clone()),
        ];
        let clients: Vec<OAuthClient> = configured
            .into_iter()
            .filter_map(|(provider, credentials)| {
                credentials.map(|credentials| OAuthClient {
                    provider,
                    credentials,
                    endpoints: provider.default_endpoints(),
                })
            })
            .collect();

        if clients.is_empty() {
            warn!("No social sign-in providers configured; nobody will be able to sign in");
        } else {
            info!(
                providers = ?clients.iter().map(|c| c.provider.as_str()).collect::<Vec<_>>(),
                "Social sign-in providers configured"
            );
        }

        Self::new(public_url, clients)
    }

    pub fn client(&self, id: &str) -> Result<&OAuthClient, OAuthError> {
        SocialProvider::from_id(id)
            .and_then(|p| self.clients.get(&p))
            .ok_or_else(|| OAuthError::UnknownProvider(id.to_string()))
    }

    /// Sign-in options in display order.
    pub fn sign_in_options(&self, callback_url: Option<&str>) -> Vec<SignInOption> {
        self.clients
            .values()
            .map(|c| {
                let mut url = format!("/api/auth/signin/{}", c.provider);
                if let Some(cb) = callback_url {
                    url.push_str("?callbackUrl=");
                    url.push_str(&urlencoding::encode(cb));
                }
                SignInOption {
                    id: c.provider.as_str().to_string(),
                    name: c.provider.display_name().to_string(),
                    sign_in_url: url,
                }
            })
            .collect()
    }

    pub fn redirect_uri(&self, provider: SocialProvider) -> String {
        format!("{}/api/auth/callback/{}", self.public_url, provider)
    }

    /// Fresh random `state` value.
    pub fn new_state() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Provider authorize URL for a state value.
    pub fn authorize_url(&self, client: &OAuthClient, state: &str) -> Result<String, OAuthError> {
        let url = Url::parse_with_params(
            &client.endpoints.authorize_url,
            &[
                ("client_id", client.credentials.client_id.as_str()),
                ("redirect_uri", self.redirect_uri(client.provider).as_str()),
                ("response_type", "code"),
                ("scope", client.endpoints.scope.as_str()),
                ("state", state),
            ],
        )?;
        Ok(url.into())
    }

    /// Exchange an authorization code and resolve the signed-in user.
    pub async fn complete(&self, client: &OAuthClient, code: &str) -> Result<SessionUser, OAuthError> {
        debug!(provider = %client.provider, "Exchanging authorization code");

        let redirect_uri = self.redirect_uri(client.provider);
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
            ("client_id", client.credentials.client_id.as_str()),
            ("client_secret", client.credentials.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(&client.endpoints.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchange { status, body });
        }

        let body: Value = resp.json().await?;
        // GitHub reports exchange errors with a 200 status
        if let Some(error) = body.get("error").and_then(Value::as_str) {
            return Err(OAuthError::TokenExchange {
                status: 200,
                body: error.to_string(),
            });
        }
        let token: TokenResponse =
            serde_json::from_value(body).map_err(|_| OAuthError::MissingField("access_token"))?;

        let resp = self
            .http
            .get(&client.endpoints.userinfo_url)
            .bearer_auth(&token.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(OAuthError::UserInfo {
                status: resp.status().as_u16(),
            });
        }

        let info: Value = resp.json().await?;
        let user = client.provider.user_from_info(&info)?;
        info!(provider = %client.provider, user_id = %user.id, "User signed in");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> OAuthCredentials {
        OAuthCredentials {
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
        }
    }

    fn registry_with(provider: SocialProvider, endpoints: OAuthEndpoints) -> OAuthRegistry {
        OAuthRegistry::new(
            "https://studio.example.com",
            vec![OAuthClient {
                provider,
                credentials: credentials(),
                endpoints,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_only_configured_providers_offered() {
        let auth = AuthConfig {
            github: Some(credentials()),
            ..Default::default()
        };
        let registry = OAuthRegistry::from_config("http://localhost:8000", &auth).unwrap();
        let options = registry.sign_in_options(Some("/api/generate"));
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].id, "github");
        assert_eq!(
            options[0].sign_in_url,
            "/api/auth/signin/github?callbackUrl=%2Fapi%2Fgenerate"
        );
        assert!(registry.client("google").is_err());
    }

    #[test]
    fn test_authorize_url() {
        let registry = registry_with(SocialProvider::Google, SocialProvider::Google.default_endpoints());
        let client = registry.client("google").unwrap();
        let url = Url::parse(&registry.authorize_url(client, "xyz").unwrap()).unwrap();
        let params: BTreeMap<_, _> = url.query_pairs().into_owned().collect();

        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["state"], "xyz");
        assert_eq!(params["response_type"], "code");
        assert_eq!(
            params["redirect_uri"],
            "https://studio.example.com/api/auth/callback/google"
        );
    }

    #[test]
    fn test_github_user_mapping() {
        let info = serde_json::json!({ "id": 42, "login": "octo", "avatar_url": "https://a/x.png" });
        let user = SocialProvider::GitHub.user_from_info(&info).unwrap();
        assert_eq!(user.id, "github:42");
        assert_eq!(user.name.as_deref(), Some("octo"));
        assert_eq!(user.image.as_deref(), Some("https://a/x.png"));

        assert!(SocialProvider::Google
            .user_from_info(&serde_json::json!({ "email": "x@y" }))
            .is_err());
    }

    #[tokio::test]
    async fn test_complete_exchanges_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth-code"))
            .and(body_string_contains("client_secret=secret-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at-1",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .and(header("authorization", "Bearer at-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "sub": "1234",
                "name": "Ada",
                "email": "ada@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let registry = registry_with(
            SocialProvider::Google,
            OAuthEndpoints {
                authorize_url: format!("{}/authorize", server.uri()),
                token_url: format!("{}/token", server.uri()),
                userinfo_url: format!("{}/userinfo", server.uri()),
                scope: "openid".to_string(),
            },
        );
        let client = registry.client("google").unwrap();
        let user = registry.complete(client, "auth-code").await.unwrap();
        assert_eq!(user.id, "google:1234");
        assert_eq!(user.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn test_complete_reports_exchange_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "error": "bad_verification_code"
            })))
            .mount(&server)
            .await;

        let registry = registry_with(
            SocialProvider::GitHub,
            OAuthEndpoints {
                authorize_url: format!("{}/authorize", server.uri()),
                token_url: format!("{}/token", server.uri()),
                userinfo_url: format!("{}/user", server.uri()),
                scope: "read:user".to_string(),
            },
        );
        let client = registry.client("github").unwrap();
        let err = registry.complete(client, "stale").await.unwrap_err();
        assert!(matches!(err, OAuthError::TokenExchange { .. }));
    }
}
