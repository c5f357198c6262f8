//! Session providers: where bearer tokens come from.
//!
//! The engine only needs two things from the login layer: the session it
//! currently holds, and a way to refresh it. Either may come back empty,
//! which callers treat as "the user is logged out".

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::models::session::Session;

/// Tokens this close to expiry are treated as expired.
const EXPIRY_SKEW_SECS: i64 = 30;

#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The session currently held, without any network traffic.
    async fn current_session(&self) -> Option<Session>;

    /// Refresh the session, possibly over the network. `None` means the
    /// session cannot be recovered.
    async fn refresh_session(&self) -> Option<Session>;

    /// Forget any held credentials.
    async fn logout(&self);
}

/// Serves a fixed bearer token.
#[derive(Debug, Default)]
pub struct StaticSessionProvider {
    session: Mutex<Option<Session>>,
}

impl StaticSessionProvider {
    pub fn new(access_token: Option<String>) -> Self {
        Self {
            session: Mutex::new(access_token.map(Session::new)),
        }
    }

    fn snapshot(&self) -> Option<Session> {
        match self.session.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn current_session(&self) -> Option<Session> {
        self.snapshot()
    }

    async fn refresh_session(&self) -> Option<Session> {
        self.snapshot()
    }

    async fn logout(&self) {
        match self.session.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }
}

/// Settings for the OAuth2 refresh-token grant.
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub token_url: String,
    pub client_id: String,
}

#[derive(Debug, Default)]
struct OidcTokens {
    access: Option<Session>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Keeps an access token alive with the OIDC refresh-token grant.
pub struct OidcSessionProvider {
    http: reqwest::Client,
    settings: OidcSettings,
    tokens: tokio::sync::Mutex<OidcTokens>,
}

impl OidcSessionProvider {
    pub fn new(
        http: reqwest::Client,
        settings: OidcSettings,
        access_token: Option<String>,
        refresh_token: String,
    ) -> Self {
        Self {
            http,
            settings,
            tokens: tokio::sync::Mutex::new(OidcTokens {
                access: access_token.map(Session::new),
                refresh_token: Some(refresh_token),
            }),
        }
    }

    async fn request_tokens(&self, refresh_token: &str) -> Result<TokenResponse, reqwest::Error> {
        self.http
            .post(&self.settings.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", self.settings.client_id.as_str()),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<TokenResponse>()
            .await
    }
}

#[async_trait]
impl SessionProvider for OidcSessionProvider {
    async fn current_session(&self) -> Option<Session> {
        let tokens = self.tokens.lock().await;
        tokens
            .access
            .clone()
            .filter(|s| !s.is_expired_at(Utc::now(), Duration::seconds(EXPIRY_SKEW_SECS)))
    }

    async fn refresh_session(&self) -> Option<Session> {
        let mut tokens = self.tokens.lock().await;
        if let Some(session) = tokens.access.as_ref() {
            if !session.is_expired_at(Utc::now(), Duration::seconds(EXPIRY_SKEW_SECS)) {
                return Some(session.clone());
            }
        }

        let refresh_token = tokens.refresh_token.clone()?;
        debug!("refreshing access token at {}", self.settings.token_url);
        match self.request_tokens(&refresh_token).await {
            Ok(resp) => {
                let session = match resp.expires_in {
                    Some(secs) => Session::expiring_at(
                        resp.access_token,
                        Utc::now() + Duration::seconds(secs),
                    ),
                    None => Session::new(resp.access_token),
                };
                if let Some(rotated) = resp.refresh_token {
                    tokens.refresh_token = Some(rotated);
                }
                tokens.access = Some(session.clone());
                info!("access token refreshed");
                Some(session)
            }
            Err(err) => {
                warn!("token refresh failed: {}", err);
                tokens.access = None;
                None
            }
        }
    }

    async fn logout(&self) {
        let mut tokens = self.tokens.lock().await;
        *tokens = OidcTokens::default();
    }
}
