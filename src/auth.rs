//! OAuth2 web flow and access-token management for the Gmail API
//!
//! The browser is sent to Google's consent page by `/login` and comes back on
//! the configured redirect URI with an authorization code. The code is traded
//! for [`StoredCredentials`], which live in the caller's session and are
//! refreshed on demand by [`valid_token`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use google_gmail1::yup_oauth2::{self, ApplicationSecret};
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    Scope, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{GmailError, Result};
use crate::session::SessionData;

/// Read-only access is all the size report needs
pub const READONLY_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are refreshed before use
const EXPIRY_SKEW_SECS: i64 = 60;

/// Bearer token for one Gmail API request
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// Credentials held in a user's session
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scopes: Vec<String>,
}

impl StoredCredentials {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            scopes: READONLY_SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Expired, or close enough to expiry that it should not be used
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now + Duration::seconds(EXPIRY_SKEW_SECS) >= expires_at,
            None => false,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired_at(now)
    }

    pub fn access_token(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone())
    }
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Where to send the browser, and the CSRF state it must bring back
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Source of OAuth2 credentials
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Start an authorization code flow
    fn authorization_url(&self) -> Result<AuthorizationRequest>;

    /// Trade an authorization code for credentials
    async fn exchange_code(&self, code: &str) -> Result<StoredCredentials>;

    /// Obtain a fresh access token using the credentials' refresh token
    async fn refresh(&self, credentials: &StoredCredentials) -> Result<StoredCredentials>;
}

/// Produce a usable access token for the session, refreshing if needed
///
/// Returns [`GmailError::Unauthenticated`] when the session holds no
/// credentials, or when they are expired and cannot be refreshed. Refreshed
/// credentials are written back into `session`.
pub async fn valid_token<P>(provider: &P, session: &mut SessionData) -> Result<AccessToken>
where
    P: TokenProvider + ?Sized,
{
    let Some(credentials) = session.credentials.as_ref() else {
        debug!("No credentials in session");
        return Err(GmailError::Unauthenticated);
    };

    if credentials.is_valid_at(Utc::now()) {
        return Ok(credentials.access_token());
    }

    if credentials.refresh_token.is_none() {
        debug!("Credentials expired and no refresh token available");
        return Err(GmailError::Unauthenticated);
    }

    debug!("Refreshing expired credentials");
    match provider.refresh(credentials).await {
        Ok(refreshed) => {
            let token = refreshed.access_token();
            session.credentials = Some(refreshed);
            Ok(token)
        }
        Err(e) => {
            warn!("Failed to refresh credentials: {}", e);
            Err(GmailError::Unauthenticated)
        }
    }
}

/// Google OAuth2 endpoints driven through the `oauth2` crate
pub struct GoogleTokenProvider {
    client: BasicClient,
    scopes: Vec<String>,
}

impl GoogleTokenProvider {
    pub fn new(secret: &ApplicationSecret, redirect_uri: &str) -> Result<Self> {
        let auth_uri = if secret.auth_uri.is_empty() {
            GOOGLE_AUTH_URI
        } else {
            secret.auth_uri.as_str()
        };
        let token_uri = if secret.token_uri.is_empty() {
            GOOGLE_TOKEN_URI
        } else {
            secret.token_uri.as_str()
        };

        let auth_url = AuthUrl::new(auth_uri.to_string())
            .map_err(|e| GmailError::ConfigError(format!("Invalid auth_uri: {}", e)))?;
        let token_url = TokenUrl::new(token_uri.to_string())
            .map_err(|e| GmailError::ConfigError(format!("Invalid token_uri: {}", e)))?;
        let redirect_url = RedirectUrl::new(redirect_uri.to_string())
            .map_err(|e| GmailError::ConfigError(format!("Invalid redirect_uri: {}", e)))?;

        let client_secret = if secret.client_secret.is_empty() {
            None
        } else {
            Some(ClientSecret::new(secret.client_secret.clone()))
        };

        let client = BasicClient::new(
            ClientId::new(secret.client_id.clone()),
            client_secret,
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url);

        Ok(Self {
            client,
            scopes: READONLY_SCOPES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Build from a Google client secrets file (`web` or `installed` form)
    pub async fn from_credentials_file(credentials_path: &Path, redirect_uri: &str) -> Result<Self> {
        let secret = yup_oauth2::read_application_secret(credentials_path)
            .await
            .map_err(|e| GmailError::AuthError(format!("Failed to read credentials: {}", e)))?;
        info!("Loaded OAuth client secrets from {:?}", credentials_path);
        Self::new(&secret, redirect_uri)
    }

    fn credentials_from_response<T>(&self, response: &T, previous: Option<&StoredCredentials>) -> StoredCredentials
    where
        T: TokenResponse<oauth2::basic::BasicTokenType>,
    {
        let expires_at = response
            .expires_in()
            .and_then(|d| Duration::from_std(d).ok())
            .map(|d| Utc::now() + d);

        // Google omits the refresh token on refresh responses
        let refresh_token = response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or_else(|| previous.and_then(|p| p.refresh_token.clone()));

        let scopes = response
            .scopes()
            .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_else(|| self.scopes.clone());

        StoredCredentials {
            access_token: response.access_token().secret().to_string(),
            refresh_token,
            expires_at,
            scopes,
        }
    }
}

#[async_trait]
impl TokenProvider for GoogleTokenProvider {
    fn authorization_url(&self) -> Result<AuthorizationRequest> {
        let (url, state) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.scopes.iter().map(|s| Scope::new(s.clone())))
            .add_extra_param("access_type", "offline")
            .add_extra_param("include_granted_scopes", "true")
            .url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            state: state.secret().to_string(),
        })
    }

    async fn exchange_code(&self, code: &str) -> Result<StoredCredentials> {
        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| GmailError::AuthError(format!("Token exchange failed: {}", e)))?;

        info!("Exchanged authorization code for credentials");
        Ok(self.credentials_from_response(&response, None))
    }

    async fn refresh(&self, credentials: &StoredCredentials) -> Result<StoredCredentials> {
        let refresh_token = credentials
            .refresh_token
            .as_ref()
            .ok_or_else(|| GmailError::AuthError("No refresh token".to_string()))?;

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.clone()))
            .request_async(async_http_client)
            .await
            .map_err(|e| GmailError::AuthError(format!("Token refresh failed: {}", e)))?;

        debug!("Refreshed access token");
        Ok(self.credentials_from_response(&response, Some(credentials)))
    }
}
