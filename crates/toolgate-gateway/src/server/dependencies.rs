//! Dependency Injection Container
//!
//! Collects the collaborators the gateway does not construct itself, so
//! tests can swap in a manual clock, an in-memory context store or a
//! preconfigured HTTP client.

use std::sync::Arc;

use toolgate_core::{Clock, SystemClock};
use toolgate_storage::ContextStore;

/// Dependency container for the gateway
#[derive(Clone)]
pub struct GatewayDependencies {
    /// Store behind `/context`; a JSON file store at the configured path when absent
    pub context_store: Option<Arc<dyn ContextStore>>,
    pub clock: Arc<dyn Clock>,
    /// Client for every upstream call; built from the config when absent
    pub http_client: Option<reqwest::Client>,
}

/// Builder for GatewayDependencies
#[derive(Default)]
pub struct DependenciesBuilder {
    context_store: Option<Arc<dyn ContextStore>>,
    clock: Option<Arc<dyn Clock>>,
    http_client: Option<reqwest::Client>,
}

impl DependenciesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context_store(mut self, store: Arc<dyn ContextStore>) -> Self {
        self.context_store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Missing clock defaults to the system clock
    pub fn build(self) -> GatewayDependencies {
        GatewayDependencies {
            context_store: self.context_store,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            http_client: self.http_client,
        }
    }
}
