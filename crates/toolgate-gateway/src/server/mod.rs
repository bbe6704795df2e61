//! Gateway Server
//!
//! HTTP server fronting the ads, metrics and pop upstreams.
//! Self-contained with dependency injection for clean architecture.

mod dependencies;
pub mod handlers;
pub mod logging_middleware;
pub mod rate_limit;
mod state;

pub use dependencies::{DependenciesBuilder, GatewayDependencies};
pub use rate_limit::RateLimiter;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{any, get, post},
    Router,
};
use toolgate_core::GatewayConfig;
use toolgate_storage::{ContextStore, JsonFileContextStore};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::admission_middleware;
use crate::proxy::{CreativeUploader, UpstreamClient};
use crate::session::UpstreamSession;
use handlers::{ads, context, metrics, pop};

/// Body limit for JSON create and context routes
pub const JSON_BODY_LIMIT: usize = 1024 * 1024;

/// Body limit for upload-by-URL requests
pub const UPLOAD_BY_URL_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Toolgate Gateway Server
///
/// All external collaborators are injected through the constructor, so the
/// same server runs from the binary and from tests.
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    state: AppState,
}

impl GatewayServer {
    /// Create a new gateway server with dependency injection
    pub fn new(config: GatewayConfig, dependencies: GatewayDependencies) -> anyhow::Result<Self> {
        info!("[Gateway] Initializing with dependency injection...");

        let client = match dependencies.http_client {
            Some(http) => UpstreamClient::from_client(http),
            None => UpstreamClient::new(config.upstream_timeout)
                .context("failed to build upstream HTTP client")?,
        };

        let session = UpstreamSession::from_config(
            client.http().clone(),
            &config,
            dependencies.clock.clone(),
        )
        .context("invalid ads login URL")?;
        let session = Arc::new(session);

        let context_store: Arc<dyn ContextStore> = match dependencies.context_store {
            Some(store) => store,
            None => Arc::new(JsonFileContextStore::new(config.context_store_path.clone())),
        };

        let rate_limiter = RateLimiter::new(config.rate_limit, dependencies.clock);
        let uploader = CreativeUploader::new(client.clone(), session.clone());

        let config = Arc::new(config);
        let state = AppState {
            config: config.clone(),
            rate_limiter,
            session,
            context_store,
            client,
            uploader,
        };

        info!("[Gateway] Services initialized successfully");
        Ok(Self { config, state })
    }

    /// Get the handler state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router
    pub fn build_router(&self) -> Router {
        let state = self.state.clone();

        let ads_routes = Router::new()
            .route(
                "/ads/advertisers",
                get(ads::list_advertisers)
                    .post(ads::create_advertiser)
                    .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
            )
            .route(
                "/ads/campaigns",
                get(ads::list_campaigns)
                    .post(ads::create_campaign)
                    .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
            )
            .route(
                "/ads/campaigns/{id}/impressions",
                get(ads::campaign_impressions),
            )
            .route("/ads/projects", get(ads::list_projects))
            .route("/ads/projects/{name}", get(ads::get_project))
            .route("/ads/devices", get(ads::list_devices))
            .route("/ads/devices/counts/regions", get(ads::device_region_counts))
            // One parameter name for both: sibling routes must agree on it
            .route("/ads/devices/{device}", get(ads::get_device))
            .route("/ads/devices/{device}/venues", get(ads::device_venues))
            .route("/ads/venues", get(ads::list_venues))
            .route("/ads/venues/{id}", get(ads::get_venue))
            .route("/ads/venues/{id}/devices", get(ads::venue_devices))
            .route("/ads/creatives", get(ads::list_creatives))
            .route(
                "/ads/creatives/campaign/{campaign_id}",
                get(ads::campaign_creatives),
            )
            .route(
                "/ads/creatives/upload",
                post(ads::upload_creatives).layer(DefaultBodyLimit::disable()),
            )
            .route(
                "/ads/creatives/uploadByUrl",
                post(ads::upload_by_url).layer(DefaultBodyLimit::max(UPLOAD_BY_URL_BODY_LIMIT)),
            )
            .route(
                "/ads/creatives/uploadByUrls",
                post(ads::upload_by_urls).layer(DefaultBodyLimit::max(UPLOAD_BY_URL_BODY_LIMIT)),
            )
            // Catch-all; `{*rest}` never matches an empty remainder
            .route("/ads", any(ads::proxy_any))
            .route("/ads/", any(ads::proxy_any))
            .route("/ads/{*rest}", any(ads::proxy_any));

        let metrics_routes = Router::new()
            .route("/metrics/latest", get(metrics::latest))
            .route("/metrics/history", get(metrics::history))
            .route("/metrics", any(metrics::proxy_any))
            .route("/metrics/", any(metrics::proxy_any))
            .route("/metrics/{*rest}", any(metrics::proxy_any));

        let pop_routes = Router::new()
            .route(
                "/pop",
                get(pop::list)
                    .delete(pop::delete)
                    .layer(DefaultBodyLimit::disable()),
            )
            .route("/pop/search", get(pop::search))
            .route("/pop/stats", get(pop::stats))
            .route("/pop/impressions", get(pop::impressions))
            .route("/pop/", any(pop::proxy_any))
            .route("/pop/{*rest}", any(pop::proxy_any));

        let protected = Router::new()
            .route(
                "/context/{key}",
                get(context::get_context)
                    .put(context::put_context)
                    .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT)),
            )
            .merge(ads_routes)
            .merge(metrics_routes)
            .merge(pop_routes)
            .fallback(handlers::not_found)
            .layer(middleware::from_fn_with_state(
                state.clone(),
                admission_middleware,
            ));

        Router::new()
            // Health check (public)
            .route("/health", get(handlers::health))
            .merge(protected)
            .with_state(state)
            // One entry and one exit line per request; bodies are never read
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the gateway server until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.bind_addr();

        info!("[Gateway] Starting on {}", addr);
        info!(
            "[Gateway] Upstreams: ads={} metrics={} pop={}",
            self.config.ads.base_url, self.config.metrics.base_url, self.config.pop.base_url
        );
        info!("[Gateway] {} API key(s) registered", self.config.api_keys.len());
        if self.config.ads_credentials.is_none() {
            warn!("[Gateway] Ads service credentials not set: ads routes will fail to log in");
        }
        if !self.config.rate_limit.is_enabled() {
            warn!("[Gateway] Rate limiting: disabled");
        }
        for upstream in [&self.config.ads, &self.config.metrics, &self.config.pop] {
            if upstream.allowlist.is_unrestricted() {
                info!("[Gateway] {} allowlist: unrestricted", upstream.target);
            }
        }

        let router = self.build_router();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;

        info!("[Gateway] Ready to accept connections");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("[Gateway] Stopped");
        Ok(())
    }
}
