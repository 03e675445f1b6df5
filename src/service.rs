//! Request handling: validation, response caching, and lookup.
//!
//! [`VulnerabilityService::handle`] is the entry point a server route or
//! the CLI calls with a raw request body.

use crate::batch::BatchOrchestrator;
use crate::cache::{derive_key, Cache, Lookup};
use crate::checker::{OsvClient, PackageQueryExecutor};
use crate::config::Config;
use crate::error::RequestError;
use crate::model::{PackageQuery, VulnerabilityResponse};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub struct VulnerabilityService {
    orchestrator: Arc<BatchOrchestrator>,
    cache: Option<Arc<Cache>>,
    refreshes: Mutex<JoinSet<()>>,
    /// Keys with a refresh in flight; at most one refresh runs per key.
    refreshing: Arc<Mutex<HashSet<String>>>,
}

impl VulnerabilityService {
    /// Creates an uncached service.
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            cache: None,
            refreshes: Mutex::new(JoinSet::new()),
            refreshing: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_cache(mut self, cache: Cache) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Wires the OSV client, executor, and cache from configuration.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let source = OsvClient::new(&config.api_url, config.request_timeout())?;
        let executor = PackageQueryExecutor::new(Arc::new(source), config.request_timeout());
        let service = Self::new(BatchOrchestrator::new(executor));

        if config.cache_enabled {
            Ok(service.with_cache(Cache::new(
                config.cache_max_age(),
                config.cache_stale_window(),
            )))
        } else {
            Ok(service)
        }
    }

    /// Extracts the package list from a request body.
    ///
    /// Fails only when the body is absent or `packages` is not an array.
    /// Malformed entries are kept as invalid queries and filtered later.
    pub fn parse_request(body: Option<&Value>) -> Result<Vec<PackageQuery>, RequestError> {
        let packages = body
            .and_then(|b| b.get("packages"))
            .and_then(Value::as_array)
            .ok_or(RequestError::MissingPackages)?;

        Ok(packages.iter().map(PackageQuery::from_value).collect())
    }

    /// Handles one request body.
    pub async fn handle(
        &self,
        body: Option<&Value>,
    ) -> Result<VulnerabilityResponse, RequestError> {
        let queries = Self::parse_request(body)?;
        Ok(self.check(queries).await)
    }

    /// Looks up `queries`, going through the response cache when enabled.
    ///
    /// A stale entry is returned immediately and refreshed in the
    /// background; see [`wait_for_refreshes`](Self::wait_for_refreshes).
    pub async fn check(&self, queries: Vec<PackageQuery>) -> VulnerabilityResponse {
        let Some(cache) = &self.cache else {
            return VulnerabilityResponse::new(self.orchestrator.run(&queries).await);
        };

        let key = derive_key(&queries);
        match cache.lookup::<VulnerabilityResponse>(&key) {
            Lookup::Fresh(response) => {
                debug!(key = %key, "cache hit");
                response
            }
            Lookup::Stale(response) => {
                debug!(key = %key, "serving stale response, refreshing");
                self.spawn_refresh(cache.clone(), key, queries);
                response
            }
            Lookup::Miss => {
                debug!(key = %key, "cache miss");
                let response = VulnerabilityResponse::new(self.orchestrator.run(&queries).await);
                if let Err(e) = cache.set(&key, &response) {
                    warn!(key = %key, "failed to cache response: {}", e);
                }
                response
            }
        }
    }

    fn spawn_refresh(&self, cache: Arc<Cache>, key: String, queries: Vec<PackageQuery>) {
        match self.refreshing.lock() {
            Ok(mut refreshing) => {
                if !refreshing.insert(key.clone()) {
                    debug!(key = %key, "refresh already in flight");
                    return;
                }
            }
            Err(_) => {
                warn!("refresh tracker poisoned, skipping background refresh");
                return;
            }
        }

        let orchestrator = self.orchestrator.clone();
        let refreshing = self.refreshing.clone();
        let task = async move {
            let response = VulnerabilityResponse::new(orchestrator.run(&queries).await);
            if let Err(e) = cache.set(&key, &response) {
                warn!(key = %key, "failed to refresh cached response: {}", e);
            }
            if let Ok(mut refreshing) = refreshing.lock() {
                refreshing.remove(&key);
            }
        };

        match self.refreshes.lock() {
            Ok(mut refreshes) => {
                // Reap finished refreshes before adding one.
                while let Some(result) = refreshes.try_join_next() {
                    if let Err(e) = result {
                        warn!("background refresh failed: {}", e);
                    }
                }
                refreshes.spawn(task);
            }
            Err(_) => warn!("refresh tracker poisoned, skipping background refresh"),
        }
    }

    /// Waits for background refreshes started so far.
    ///
    /// Short-lived callers such as the CLI call this before exiting so
    /// refreshed entries reach the cache.
    pub async fn wait_for_refreshes(&self) {
        let mut pending = match self.refreshes.lock() {
            Ok(mut refreshes) => std::mem::take(&mut *refreshes),
            Err(_) => return,
        };

        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!("background refresh failed: {}", e);
            }
        }
    }
}
