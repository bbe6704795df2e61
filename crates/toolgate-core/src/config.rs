//! Gateway configuration
//!
//! Loaded from environment variables. Parsing goes through a lookup closure so
//! tests can feed a plain map instead of mutating the process environment.
//! Blank values count as unset.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;
use zeroize::Zeroizing;

use crate::allowlist::Allowlist;
use crate::api_key::ApiKeyRegistry;
use crate::branding;

/// Environment variable names
pub mod vars {
    pub const PORT: &str = "PORT";
    pub const HOST: &str = "HOST";
    pub const ADS_BASE_URL: &str = "SCM_ADS_API_BASE_URL";
    pub const METRICS_BASE_URL: &str = "SCM_METRICS_API_BASE_URL";
    pub const POP_BASE_URL: &str = "SCM_POP_API_BASE_URL";
    pub const ADS_SERVICE_IDENTIFIER: &str = "ADS_SERVICE_IDENTIFIER";
    pub const ADS_SERVICE_PASSWORD: &str = "ADS_SERVICE_PASSWORD";
    pub const ADS_LOGIN_PATH: &str = "ADS_LOGIN_PATH";
    pub const CONTEXT_STORE_PATH: &str = "CONTEXT_STORE_PATH";
    pub const RATE_LIMIT_WINDOW_SECONDS: &str = "RATE_LIMIT_WINDOW_SECONDS";
    pub const RATE_LIMIT_MAX: &str = "RATE_LIMIT_MAX";
    pub const ADS_ALLOWLIST: &str = "ADS_ALLOWLIST";
    pub const METRICS_ALLOWLIST: &str = "METRICS_ALLOWLIST";
    pub const POP_ALLOWLIST: &str = "POP_ALLOWLIST";
    pub const API_KEYS: &str = "TOOL_GATEWAY_API_KEYS";
    pub const API_KEY: &str = "TOOL_GATEWAY_API_KEY";
    pub const UPSTREAM_TIMEOUT_SECONDS: &str = "UPSTREAM_TIMEOUT_SECONDS";
    pub const UPLOAD_CONCURRENCY: &str = "UPLOAD_CONCURRENCY";
    pub const LOG_DIR: &str = "LOG_DIR";
}

const DEFAULT_ADS_BASE_URL: &str = "http://localhost:9000";
const DEFAULT_METRICS_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_POP_BASE_URL: &str = "https://pop-api.citypost.us";
const DEFAULT_ADS_LOGIN_PATH: &str = "/api/v1/auth/login";
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: f64 = 60.0;
const DEFAULT_RATE_LIMIT_MAX: f64 = 120.0;
const DEFAULT_UPLOAD_CONCURRENCY: usize = 4;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{} or {} is required", vars::API_KEY, vars::API_KEYS)]
    MissingApiKeys,

    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} is not a valid URL ('{value}'): {reason}")]
    InvalidUrl {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// The three backend services the gateway fronts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamTarget {
    /// Ads service (requires a bearer-token session)
    Ads,
    Metrics,
    /// Proof-of-play record service
    Pop,
}

impl UpstreamTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ads => "ads",
            Self::Metrics => "metrics",
            Self::Pop => "pop",
        }
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream: where it lives and which paths may be reached
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub target: UpstreamTarget,
    pub base_url: Url,
    pub allowlist: Allowlist,
}

/// Service-account credentials for the ads upstream login
#[derive(Clone)]
pub struct ServiceCredentials {
    pub identifier: String,
    pub password: Zeroizing<String>,
}

impl ServiceCredentials {
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl fmt::Debug for ServiceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCredentials")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Fixed-window rate limit settings.
///
/// Kept as floats: a non-positive or non-finite value disables limiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitSettings {
    pub window_seconds: f64,
    pub max_requests: f64,
}

impl RateLimitSettings {
    pub fn new(window_seconds: f64, max_requests: f64) -> Self {
        Self {
            window_seconds,
            max_requests,
        }
    }

    /// Limiting switched off (trusted deployments)
    pub fn disabled() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn is_enabled(&self) -> bool {
        self.window_seconds.is_finite()
            && self.window_seconds > 0.0
            && self.max_requests.is_finite()
            && self.max_requests > 0.0
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_WINDOW_SECONDS, DEFAULT_RATE_LIMIT_MAX)
    }
}

/// Complete gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    pub ads: UpstreamConfig,
    pub metrics: UpstreamConfig,
    pub pop: UpstreamConfig,
    /// Login endpoint path on the ads upstream
    pub ads_login_path: String,
    /// `None` when either half of the credentials is missing
    pub ads_credentials: Option<ServiceCredentials>,
    pub api_keys: ApiKeyRegistry,
    pub rate_limit: RateLimitSettings,
    /// JSON file backing the context store (`None` = memory only)
    pub context_store_path: Option<PathBuf>,
    /// Bounded upstream timeout; `None` lets a hung upstream hang the request
    pub upstream_timeout: Option<Duration>,
    /// Max in-flight items during a bulk upload
    pub upload_concurrency: usize,
    pub log_dir: PathBuf,
}

impl GatewayConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| -> Option<String> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_keys: Vec<String> = [get(vars::API_KEYS), get(vars::API_KEY)]
            .into_iter()
            .flatten()
            .flat_map(|raw| split_csv(&raw))
            .collect();
        if api_keys.is_empty() {
            return Err(ConfigError::MissingApiKeys);
        }

        let port = match get(vars::PORT) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidNumber {
                var: vars::PORT,
                value: raw,
            })?,
            None => branding::DEFAULT_GATEWAY_PORT,
        };

        let upstream = |target, url_var: &'static str, default_url: &str, list_var: &str| {
            let raw = get(url_var).unwrap_or_else(|| default_url.to_string());
            let base_url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
                var: url_var,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
            Ok::<_, ConfigError>(UpstreamConfig {
                target,
                base_url,
                allowlist: get(list_var)
                    .map(|raw| Allowlist::parse_csv(&raw))
                    .unwrap_or_default(),
            })
        };

        let ads_credentials = match (
            get(vars::ADS_SERVICE_IDENTIFIER),
            get(vars::ADS_SERVICE_PASSWORD),
        ) {
            (Some(identifier), Some(password)) => {
                Some(ServiceCredentials::new(identifier, password))
            }
            (None, None) => None,
            _ => {
                warn!(
                    "Only one of {} / {} is set; ads login is disabled",
                    vars::ADS_SERVICE_IDENTIFIER,
                    vars::ADS_SERVICE_PASSWORD
                );
                None
            }
        };

        let rate_limit = RateLimitSettings::new(
            parse_f64(&get, vars::RATE_LIMIT_WINDOW_SECONDS, DEFAULT_RATE_LIMIT_WINDOW_SECONDS)?,
            parse_f64(&get, vars::RATE_LIMIT_MAX, DEFAULT_RATE_LIMIT_MAX)?,
        );

        let timeout_secs = parse_f64(&get, vars::UPSTREAM_TIMEOUT_SECONDS, 0.0)?;
        let upstream_timeout = (timeout_secs.is_finite() && timeout_secs > 0.0)
            .then(|| Duration::from_secs_f64(timeout_secs));

        let upload_concurrency = match get(vars::UPLOAD_CONCURRENCY) {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber {
                    var: vars::UPLOAD_CONCURRENCY,
                    value: raw,
                })?,
            None => DEFAULT_UPLOAD_CONCURRENCY,
        };

        Ok(Self {
            host: get(vars::HOST).unwrap_or_else(|| branding::DEFAULT_GATEWAY_HOST.to_string()),
            port,
            ads: upstream(
                UpstreamTarget::Ads,
                vars::ADS_BASE_URL,
                DEFAULT_ADS_BASE_URL,
                vars::ADS_ALLOWLIST,
            )?,
            metrics: upstream(
                UpstreamTarget::Metrics,
                vars::METRICS_BASE_URL,
                DEFAULT_METRICS_BASE_URL,
                vars::METRICS_ALLOWLIST,
            )?,
            pop: upstream(
                UpstreamTarget::Pop,
                vars::POP_BASE_URL,
                DEFAULT_POP_BASE_URL,
                vars::POP_ALLOWLIST,
            )?,
            ads_login_path: get(vars::ADS_LOGIN_PATH)
                .unwrap_or_else(|| DEFAULT_ADS_LOGIN_PATH.to_string()),
            ads_credentials,
            api_keys: ApiKeyRegistry::new(api_keys),
            rate_limit,
            context_store_path: get(vars::CONTEXT_STORE_PATH).map(PathBuf::from),
            upstream_timeout,
            upload_concurrency,
            log_dir: get(vars::LOG_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(branding::default_logs_dir),
        })
    }

    /// Address string for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Config for one upstream target
    pub fn upstream(&self, target: UpstreamTarget) -> &UpstreamConfig {
        match target {
            UpstreamTarget::Ads => &self.ads,
            UpstreamTarget::Metrics => &self.metrics,
            UpstreamTarget::Pop => &self.pop,
        }
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_f64<G>(get: &G, var: &'static str, default: f64) -> Result<f64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
        None => Ok(default),
    }
}
