//! Toolgate Gateway
//!
//! Authenticating reverse proxy in front of the ads, metrics and pop
//! services that provides:
//! - API key admission with a fixed-window rate limit
//! - A shared login session for the token-guarded ads upstream
//! - Allowlist-checked forwarding with verbatim response relay
//! - Upload of remote files by URL, single and bulk
//! - Dependency Injection for clean architecture

pub mod auth;
pub mod error;
pub mod logging;
pub mod proxy;
pub mod server;
pub mod session;

pub use auth::{admission_middleware, extract_api_key};
pub use error::{GatewayError, Result};
pub use proxy::{
    build_target_url, CreativeUploader, ProxyQuery, QueryValue, UploadResult, UpstreamClient,
    UpstreamResponse,
};
pub use server::{AppState, DependenciesBuilder, GatewayDependencies, GatewayServer, RateLimiter};
pub use session::{SessionToken, UpstreamSession};
