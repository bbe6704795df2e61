//! Upstream session for the token-guarded ads service
//!
//! Owns the bearer token obtained by logging in with the service account.
//! Logins are single-flight: concurrent callers that find no usable token
//! queue on one mutex, and whoever arrives after a login completed reuses the
//! token it produced instead of logging in again.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use toolgate_core::{Clock, GatewayConfig, ServiceCredentials};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{truncate_chars, GatewayError, Result};
use crate::proxy::url::normalize_path;

/// Subtracted from the advertised lifetime so a token never expires mid-request
pub const EXPIRY_MARGIN_MS: i64 = 10_000;

const LOGIN_DETAILS_MAX_CHARS: usize = 2000;

/// A token issued by the upstream login endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    token: String,
    /// Epoch millis after which the token must not be used
    expires_at: Option<i64>,
    /// Incremented on every successful login
    generation: u64,
}

impl SessionToken {
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Without an expiry the token stays usable until the upstream rejects it
    pub fn is_valid_at(&self, now_millis: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now_millis < expires_at,
            None => true,
        }
    }
}

/// Expiry instant for a token issued at `now_millis` with a lifetime of
/// `secs`, less the safety margin. Saturates for absurd lifetimes.
pub fn expiry_from(now_millis: i64, secs: f64) -> i64 {
    // f64 -> i64 casts saturate
    let lifetime_ms = (secs * 1000.0) as i64;
    now_millis
        .saturating_add(lifetime_ms)
        .saturating_sub(EXPIRY_MARGIN_MS)
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

/// Login endpoint response
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: Option<String>,
    /// Seconds; some deployments send it as a numeric string
    #[serde(default)]
    pub expires_in: Option<Value>,
}

impl LoginResponse {
    /// Positive finite lifetime in seconds, if any
    pub fn expires_in_secs(&self) -> Option<f64> {
        let secs = match self.expires_in.as_ref()? {
            Value::Number(n) => n.as_f64()?,
            Value::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        (secs.is_finite() && secs > 0.0).then_some(secs)
    }
}

/// Login outcome for one upstream, shared by all requests
pub struct UpstreamSession {
    http: reqwest::Client,
    login_url: Url,
    credentials: Option<ServiceCredentials>,
    clock: Arc<dyn Clock>,
    current: RwLock<Option<SessionToken>>,
    login_lock: Mutex<()>,
}

impl UpstreamSession {
    pub fn new(
        http: reqwest::Client,
        login_url: Url,
        credentials: Option<ServiceCredentials>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http,
            login_url,
            credentials,
            clock,
            current: RwLock::new(None),
            login_lock: Mutex::new(()),
        }
    }

    /// Session for the ads upstream described by the gateway config
    pub fn from_config(
        http: reqwest::Client,
        config: &GatewayConfig,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, url::ParseError> {
        let login_url = config.ads.base_url.join(&normalize_path(&config.ads_login_path))?;
        Ok(Self::new(
            http,
            login_url,
            config.ads_credentials.clone(),
            clock,
        ))
    }

    /// Return a usable token, logging in when there is none, it has expired,
    /// or `force_refresh` is set.
    pub async fn ensure(&self, force_refresh: bool) -> Result<SessionToken> {
        let seen = {
            let current = self.current.read().await;
            if !force_refresh {
                if let Some(session) = current.as_ref() {
                    if session.is_valid_at(self.clock.now_millis()) {
                        return Ok(session.clone());
                    }
                }
            }
            current.as_ref().map(|s| s.generation).unwrap_or(0)
        };
        self.login_after(seen).await
    }

    /// Replace a token the upstream rejected.
    ///
    /// If another request already logged in since `stale` was handed out, the
    /// newer token is returned without a second login.
    pub async fn force_refresh(&self, stale: &SessionToken) -> Result<SessionToken> {
        self.login_after(stale.generation).await
    }

    async fn login_after(&self, seen_generation: u64) -> Result<SessionToken> {
        let _guard = self.login_lock.lock().await;

        if let Some(session) = self.current.read().await.as_ref() {
            if session.generation > seen_generation
                && session.is_valid_at(self.clock.now_millis())
            {
                debug!(
                    "[Session] Reusing token from concurrent login (generation {})",
                    session.generation
                );
                return Ok(session.clone());
            }
        }

        let next_generation = seen_generation.max(self.generation().await) + 1;
        let session = self.login(next_generation).await?;
        *self.current.write().await = Some(session.clone());
        Ok(session)
    }

    async fn generation(&self) -> u64 {
        self.current
            .read()
            .await
            .as_ref()
            .map(|s| s.generation)
            .unwrap_or(0)
    }

    async fn login(&self, generation: u64) -> Result<SessionToken> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            GatewayError::upstream_auth(
                "ADS_SERVICE_IDENTIFIER and ADS_SERVICE_PASSWORD must be set for ads login",
                None,
            )
        })?;

        info!("[Session] Logging in to {}", self.login_url);

        let response = self
            .http
            .post(self.login_url.clone())
            .json(&LoginRequest {
                identifier: &credentials.identifier,
                password: credentials.password.as_str(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::upstream_auth(format!("Ads login failed: {}", e), None))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::upstream_auth(format!("Ads login failed: {}", e), None))?;

        if !status.is_success() {
            warn!("[Session] Login rejected: HTTP {}", status);
            return Err(GatewayError::upstream_auth(
                format!("Ads login failed: HTTP {}", status),
                Some(truncate_chars(&text, LOGIN_DETAILS_MAX_CHARS)),
            ));
        }

        let parsed: LoginResponse = serde_json::from_str(&text).map_err(|_| {
            GatewayError::upstream_auth("Ads login failed: non-JSON response", None)
        })?;

        let token = parsed
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                GatewayError::upstream_auth("Ads login failed: access_token missing", None)
            })?
            .to_string();

        let lifetime = parsed.expires_in_secs();
        let expires_at = lifetime.map(|secs| expiry_from(self.clock.now_millis(), secs));

        match lifetime {
            Some(secs) => info!("[Session] Logged in (expires in {}s)", secs),
            None => info!("[Session] Logged in (no expiry advertised)"),
        }

        Ok(SessionToken {
            token,
            expires_at,
            generation,
        })
    }
}

#[cfg(test)]
impl UpstreamSession {
    pub(crate) async fn install(&self, token: &str, expires_at: Option<i64>) -> SessionToken {
        let generation = self.generation().await + 1;
        let session = SessionToken {
            token: token.to_string(),
            expires_at,
            generation,
        };
        *self.current.write().await = Some(session.clone());
        session
    }
}
