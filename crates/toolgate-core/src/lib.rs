//! Toolgate core domain
//!
//! Pure building blocks shared by the gateway and its tests: environment
//! configuration, upstream path allowlists, the caller key registry and the
//! injectable clock.

pub mod allowlist;
pub mod api_key;
pub mod branding;
pub mod clock;
pub mod config;

pub use allowlist::{Allowlist, AllowlistPattern};
pub use api_key::ApiKeyRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ConfigError, GatewayConfig, RateLimitSettings, ServiceCredentials, UpstreamConfig,
    UpstreamTarget,
};
