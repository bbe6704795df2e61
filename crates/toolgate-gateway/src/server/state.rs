//! Shared state handed to every handler

use std::sync::Arc;

use toolgate_core::{GatewayConfig, UpstreamTarget};
use toolgate_storage::ContextStore;
use url::Url;

use super::rate_limit::RateLimiter;
use crate::error::{GatewayError, Result};
use crate::proxy::{build_target_url, CreativeUploader, ProxyQuery, UpstreamClient};
use crate::session::UpstreamSession;

/// Handler state. Cloning is cheap: everything shared sits behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub rate_limiter: RateLimiter,
    pub session: Arc<UpstreamSession>,
    pub context_store: Arc<dyn ContextStore>,
    pub client: UpstreamClient,
    pub uploader: CreativeUploader,
}

impl AppState {
    /// Resolve `path` on an upstream and check the resolved path against that
    /// upstream's allowlist.
    pub fn target_url(
        &self,
        target: UpstreamTarget,
        path: &str,
        query: &ProxyQuery,
    ) -> Result<Url> {
        let upstream = self.config.upstream(target);
        let url = build_target_url(&upstream.base_url, path, query)
            .map_err(|e| GatewayError::bad_request(format!("Invalid upstream path: {}", e)))?;

        if !upstream.allowlist.permits(url.path()) {
            return Err(GatewayError::ForbiddenPath(format!(
                "{}{}",
                target,
                url.path()
            )));
        }
        Ok(url)
    }
}
