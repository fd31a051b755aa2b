//! Microsoft identity platform authentication
//!
//! Implements the OAuth2 client-credentials grant (app-only, no user
//! interaction). The bearer token is cached in memory and exchanged again
//! only when it is about to expire.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::transport::{HttpRequest, HttpTransport};
use crate::error::{GraphError, GraphResult};

/// Scope requesting every application permission granted to the client
pub const DEFAULT_SCOPE: &str = "https://graph.microsoft.com/.default";

/// App registration credentials for one tenant
#[derive(Clone)]
pub struct Credentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
}

impl Credentials {
    /// Create credentials requesting the default Graph scope
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: vec![DEFAULT_SCOPE.to_string()],
        }
    }

    /// Replace the scope list; an empty list keeps the default scope
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        if !scopes.is_empty() {
            self.scopes = scopes;
        }
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// A bearer token and the instant it stops being valid
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token outlives `now` by more than `margin`
    fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - now > margin
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token response from the identity endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

/// Error body from the identity endpoint
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

/// Hands out bearer tokens, exchanging credentials at most once per
/// validity window
///
/// The cache lock is held across the exchange, so concurrent callers wait
/// for a single exchange instead of starting their own.
pub struct TokenProvider {
    credentials: Credentials,
    authority: String,
    transport: Arc<dyn HttpTransport>,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    /// Public cloud identity endpoint
    pub const DEFAULT_AUTHORITY: &'static str = "https://login.microsoftonline.com";

    /// Refresh when the cached token has this little time left
    const REFRESH_MARGIN_SECS: i64 = 60;

    /// Assumed lifetime when the response omits `expires_in`
    const DEFAULT_LIFETIME_SECS: i64 = 3600;

    pub fn new(credentials: Credentials, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            credentials,
            authority: Self::DEFAULT_AUTHORITY.to_string(),
            transport,
            cached: Mutex::new(None),
        }
    }

    /// Use a different identity endpoint (sovereign clouds, tests)
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    /// Get a valid access token, exchanging credentials if the cached one
    /// is missing or about to expire
    pub fn get_token(&self) -> GraphResult<AccessToken> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| GraphError::Auth("token cache lock poisoned".to_string()))?;

        let margin = Duration::seconds(Self::REFRESH_MARGIN_SECS);
        if let Some(token) = cached.as_ref()
            && token.is_fresh(Utc::now(), margin)
        {
            return Ok(token.clone());
        }

        let fresh = self.exchange()?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority,
            urlencoding::encode(&self.credentials.tenant_id)
        )
    }

    /// Perform the client-credentials exchange
    fn exchange(&self) -> GraphResult<AccessToken> {
        debug!(
            "Requesting token for client {} in tenant {}",
            self.credentials.client_id, self.credentials.tenant_id
        );

        let form = vec![
            ("client_id".to_string(), self.credentials.client_id.clone()),
            ("client_secret".to_string(), self.credentials.client_secret.clone()),
            ("scope".to_string(), self.credentials.scopes.join(" ")),
            ("grant_type".to_string(), "client_credentials".to_string()),
        ];
        let response = self
            .transport
            .send(&HttpRequest::post_form(self.token_url(), form))?;

        if !response.is_success() {
            let detail = response
                .json::<TokenErrorResponse>()
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("token endpoint returned status {}", response.status));
            return Err(GraphError::Auth(format!("Failed to acquire token: {}", detail)));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| GraphError::Auth(format!("Failed to parse token response: {}", e)))?;
        if token.access_token.is_empty() {
            return Err(GraphError::Auth("Token response has an empty access_token".to_string()));
        }

        let lifetime = token.expires_in.unwrap_or(Self::DEFAULT_LIFETIME_SECS);
        let expires_at = Some(lifetime)
            .filter(|secs| *secs >= 0)
            .and_then(Duration::try_seconds)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .ok_or_else(|| {
                GraphError::Auth(format!("Token response has an invalid expires_in: {}", lifetime))
            })?;
        info!("Acquired access token valid until {}", expires_at.to_rfc3339());

        Ok(AccessToken::new(token.access_token, expires_at))
    }
}
