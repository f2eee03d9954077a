//! Calendar Credentials
//!
//! Loads an OAuth "authorized user" credential (the `token.json` format) from
//! `GOOGLE_TOKEN_JSON` or a file, and refreshes the access token when it has
//! expired.
//!
//! A refreshed token is cached in this process only. It is never written back
//! to the environment variable or file it came from, so a restart falls back
//! to the stored (possibly expired) token plus its refresh token.

use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use crate::error::{ConciergeError, Result};

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed
const EXPIRY_MARGIN_SECS: i64 = 60;

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

/// OAuth authorized-user credential
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    #[serde(default, alias = "access_token")]
    pub token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default, deserialize_with = "deserialize_expiry")]
    pub expiry: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("token_uri", &self.token_uri)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}

impl AuthorizedUser {
    /// Whether the access token can be used as is
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.token.is_some()
            && self
                .expiry
                .is_none_or(|expiry| expiry - now > Duration::seconds(EXPIRY_MARGIN_SECS))
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some()
    }
}

/// Accepts RFC 3339 as well as the zone-less timestamps some tools write.
fn deserialize_expiry<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Supplies access tokens to the calendar client
pub struct CredentialProvider {
    http: reqwest::Client,
    user: RwLock<Option<AuthorizedUser>>,
}

impl CredentialProvider {
    pub fn new(user: Option<AuthorizedUser>) -> Self {
        Self::with_client(user, reqwest::Client::new())
    }

    pub fn with_client(user: Option<AuthorizedUser>, http: reqwest::Client) -> Self {
        Self {
            http,
            user: RwLock::new(user),
        }
    }

    /// Load from `GOOGLE_TOKEN_JSON`, else from `GOOGLE_TOKEN_PATH` (default `token.json`)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Self::from_env`] over an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let user = if let Some(json) = lookup("GOOGLE_TOKEN_JSON") {
            match serde_json::from_str::<AuthorizedUser>(&json) {
                Ok(user) => {
                    tracing::info!("Calendar credentials loaded from GOOGLE_TOKEN_JSON");
                    Some(user)
                }
                Err(e) => {
                    tracing::error!(error = %e, "GOOGLE_TOKEN_JSON is not a valid credential");
                    None
                }
            }
        } else {
            let path = lookup("GOOGLE_TOKEN_PATH").unwrap_or_else(|| "token.json".into());
            load_file(Path::new(&path))
        };

        if user.is_none() {
            tracing::warn!("No calendar credentials; calendar lookups will ask for authorization");
        }
        Self::new(user)
    }

    /// Whether any credential was loaded
    pub async fn is_configured(&self) -> bool {
        self.user.read().await.is_some()
    }

    /// A usable access token, refreshing it if needed
    pub async fn access_token(&self) -> Result<String> {
        {
            let guard = self.user.read().await;
            let user = guard.as_ref().ok_or_else(not_configured)?;
            if user.is_fresh(Utc::now()) {
                if let Some(token) = &user.token {
                    return Ok(token.clone());
                }
            }
            if !user.can_refresh() {
                return Err(ConciergeError::NotAuthenticated(
                    "credential expired and cannot be refreshed".into(),
                ));
            }
        }

        let mut guard = self.user.write().await;
        let user = guard.as_mut().ok_or_else(not_configured)?;
        // Another request may have refreshed while we waited for the lock
        if user.is_fresh(Utc::now()) {
            if let Some(token) = &user.token {
                return Ok(token.clone());
            }
        }

        tracing::info!("Calendar credential expired, refreshing");
        let refreshed = self.refresh(user).await?;
        user.token = Some(refreshed.access_token.clone());
        user.expiry = refreshed.expires_in.and_then(|secs| {
            let expiry = Duration::try_seconds(secs).and_then(|ttl| Utc::now().checked_add_signed(ttl));
            if expiry.is_none() {
                tracing::warn!(expires_in = secs, "Token lifetime out of range; expiry unknown");
            }
            expiry
        });

        tracing::warn!(
            "Calendar token refreshed in memory only; the stored credential is not updated"
        );
        Ok(refreshed.access_token)
    }

    async fn refresh(&self, user: &AuthorizedUser) -> Result<TokenResponse> {
        let mut params = vec![("grant_type", "refresh_token".to_string())];
        if let Some(token) = &user.refresh_token {
            params.push(("refresh_token", token.clone()));
        }
        if let Some(id) = &user.client_id {
            params.push(("client_id", id.clone()));
        }
        if let Some(secret) = &user.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let response = self
            .http
            .post(&user.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| ConciergeError::NotAuthenticated(format!("token refresh failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConciergeError::NotAuthenticated(format!(
                "token refresh rejected ({status})"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| ConciergeError::Credentials(format!("unexpected token response: {e}")))
    }
}

fn not_configured() -> ConciergeError {
    ConciergeError::NotAuthenticated("no calendar credential configured".into())
}

fn load_file(path: &Path) -> Option<AuthorizedUser> {
    if !path.exists() {
        return None;
    }

    let parsed = std::fs::read_to_string(path)
        .map_err(ConciergeError::from)
        .and_then(|raw| serde_json::from_str(&raw).map_err(ConciergeError::from));

    match parsed {
        Ok(user) => {
            tracing::info!(path = %path.display(), "Calendar credentials loaded from file");
            Some(user)
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Unreadable calendar credential file");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn expired_user(token_uri: String) -> AuthorizedUser {
        AuthorizedUser {
            token: Some("stale".into()),
            refresh_token: Some("refresh-me".into()),
            client_id: Some("client".into()),
            client_secret: Some("secret".into()),
            token_uri,
            expiry: Some(Utc::now() - Duration::hours(1)),
        }
    }

    #[test]
    fn test_parses_token_json_formats() {
        let json = r#"{"token": "abc", "refresh_token": "r", "client_id": "c", "expiry": "2030-01-01T00:00:00.123456Z"}"#;
        let user: AuthorizedUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.token_uri, DEFAULT_TOKEN_URI);
        assert!(user.is_fresh(Utc::now()));

        let naive = r#"{"token": "abc", "expiry": "2001-01-01T00:00:00.5"}"#;
        let user: AuthorizedUser = serde_json::from_str(naive).unwrap();
        assert!(!user.is_fresh(Utc::now()));
        assert!(!user.can_refresh());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let user = expired_user(DEFAULT_TOKEN_URI.into());
        let rendered = format!("{user:?}");
        assert!(!rendered.contains("stale"));
        assert!(!rendered.contains("refresh-me"));
    }

    #[tokio::test]
    async fn test_missing_credential_is_not_authenticated() {
        let provider = CredentialProvider::from_lookup(|key| match key {
            "GOOGLE_TOKEN_PATH" => Some("/nonexistent/token.json".into()),
            _ => None,
        });
        assert!(!provider.is_configured().await);
        assert!(matches!(
            provider.access_token().await,
            Err(ConciergeError::NotAuthenticated(_))
        ));

        let invalid = CredentialProvider::from_lookup(|key| {
            (key == "GOOGLE_TOKEN_JSON").then(|| "{not json".to_string())
        });
        assert!(!invalid.is_configured().await);
    }

    #[tokio::test]
    async fn test_fresh_token_used_without_refresh() {
        let user = AuthorizedUser {
            expiry: Some(Utc::now() + Duration::hours(1)),
            token: Some("live".into()),
            ..expired_user("http://127.0.0.1:9/token".into())
        };
        let provider = CredentialProvider::new(Some(user));
        assert_eq!(provider.access_token().await.unwrap(), "live");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CredentialProvider::new(Some(expired_user(format!("{}/token", server.uri()))));

        assert_eq!(provider.access_token().await.unwrap(), "fresh");
        assert_eq!(provider.access_token().await.unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_out_of_range_lifetime_leaves_expiry_unknown() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": i64::MAX
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CredentialProvider::new(Some(expired_user(format!("{}/token", server.uri()))));

        assert_eq!(provider.access_token().await.unwrap(), "fresh");
        let guard = provider.user.read().await;
        assert_eq!(guard.as_ref().unwrap().expiry, None);
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_not_authenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})))
            .mount(&server)
            .await;

        let provider = CredentialProvider::new(Some(expired_user(format!("{}/token", server.uri()))));
        assert!(matches!(
            provider.access_token().await,
            Err(ConciergeError::NotAuthenticated(msg)) if msg.contains("400")
        ));
    }
}
