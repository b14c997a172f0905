//! 提供商注册表：持有所有已配置的适配器，选择唯一的主提供商，缓存可用性状态。
//!
//! # Provider Registry
//!
//! Owns the [`ProvidersConfig`], one [`ProviderAdapter`] per enabled provider,
//! and a short-lived status snapshot. Every configuration change rebuilds the
//! adapters (which also drops any sticky failover state) and invalidates the
//! snapshot.
//!
//! The registry never falls back to another provider on its own: `chat` goes
//! to the primary or fails with [`Error::PrimaryProviderMissing`].
//!
//! Reads and writes are guarded by a `tokio::sync::RwLock`, so several agent
//! loops may share one registry. Configuration changes are serialized: each
//! one validates, persists and applies before the next begins, so the stored
//! record always matches the applied one.

pub mod status;

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::config::credentials::resolve_api_key;
use crate::config::store::{ConfigStore, CONFIG_KEY};
use crate::config::ProvidersConfig;
use crate::provider::{ChatProvider, ProviderAdapter};
use crate::telemetry::ThrottledLogger;
use crate::types::chat::{ChatRequest, ChatResult};
use crate::{Error, Result};

pub use status::{ProviderStatus, StatusMap, STATUS_TTL};
use status::StatusCache;

#[derive(Debug, Default)]
struct RegistryState {
    config: ProvidersConfig,
    adapters: BTreeMap<String, Arc<ProviderAdapter>>,
    // Bumped on every configuration change.
    generation: u64,
}

/// Holds all configured providers and routes `chat` to the primary one.
pub struct ProviderRegistry {
    store: Option<Arc<dyn ConfigStore>>,
    logger: Arc<ThrottledLogger>,
    state: RwLock<RegistryState>,
    status: Mutex<Option<StatusCache>>,
    status_ttl: Duration,
    // Held across validate, persist and apply.
    update_lock: Mutex<()>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("has_store", &self.store.is_some())
            .field("status_ttl", &self.status_ttl)
            .finish()
    }
}

impl ProviderRegistry {
    /// Create a registry holding the default configuration. Call
    /// [`load`](Self::load) to read the persisted record.
    pub fn new(store: Option<Arc<dyn ConfigStore>>) -> Self {
        Self::with_logger(store, Arc::new(ThrottledLogger::default()))
    }

    pub fn with_logger(store: Option<Arc<dyn ConfigStore>>, logger: Arc<ThrottledLogger>) -> Self {
        let config = ProvidersConfig::default();
        let adapters = build_adapters(&config, &logger);
        Self {
            store,
            logger,
            state: RwLock::new(RegistryState {
                config,
                adapters,
                generation: 0,
            }),
            status: Mutex::new(None),
            status_ttl: STATUS_TTL,
            update_lock: Mutex::new(()),
        }
    }

    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    pub fn logger(&self) -> &Arc<ThrottledLogger> {
        &self.logger
    }

    /// Read the persisted record and apply it.
    ///
    /// A missing store, a missing record, or an unreadable or invalid record
    /// leaves the registry on defaults; this never fails.
    pub async fn load(&self) -> ProvidersConfig {
        let _guard = self.update_lock.lock().await;
        let config = match self.read_store().await {
            Some(config) => config,
            None => ProvidersConfig::default(),
        };
        self.apply(config.clone()).await;
        config
    }

    async fn read_store(&self) -> Option<ProvidersConfig> {
        let Some(store) = &self.store else {
            tracing::debug!("no config store, using defaults");
            return None;
        };
        let record = match store.load(CONFIG_KEY).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "config store unavailable, using defaults");
                return None;
            }
        };

        let mut config: ProvidersConfig = match serde_json::from_value(record) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "stored provider config is unreadable, using defaults");
                return None;
            }
        };
        // Records written before a backend existed gain its default entry.
        for (name, provider) in ProvidersConfig::default().providers {
            config.providers.entry(name).or_insert(provider);
        }
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "stored provider config is invalid, using defaults");
            return None;
        }
        Some(config)
    }

    /// Validate, persist and apply a new configuration.
    ///
    /// Nothing changes if validation or persistence fails.
    pub async fn update_config(&self, config: ProvidersConfig) -> Result<()> {
        let _guard = self.update_lock.lock().await;
        self.commit(config).await
    }

    /// Select the provider every subsequent `chat` goes to.
    pub async fn set_primary(&self, name: &str) -> Result<()> {
        let _guard = self.update_lock.lock().await;
        let mut config = self.config().await;
        config.primary = Some(name.to_string());
        self.commit(config).await
    }

    // Callers hold `update_lock`.
    async fn commit(&self, config: ProvidersConfig) -> Result<()> {
        config.validate()?;
        if let Some(store) = &self.store {
            store
                .save(CONFIG_KEY, serde_json::to_value(&config)?)
                .await?;
        }
        self.apply(config).await;
        Ok(())
    }

    /// Snapshot of the current configuration.
    pub async fn config(&self) -> ProvidersConfig {
        self.state.read().await.config.clone()
    }

    /// Adapter of an enabled provider.
    pub async fn provider(&self, name: &str) -> Option<Arc<ProviderAdapter>> {
        self.state.read().await.adapters.get(name).cloned()
    }

    pub async fn primary(&self) -> Result<Arc<ProviderAdapter>> {
        let state = self.state.read().await;
        state
            .config
            .primary
            .as_ref()
            .and_then(|name| state.adapters.get(name))
            .cloned()
            .ok_or(Error::PrimaryProviderMissing)
    }

    /// Send one request to the primary provider.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResult> {
        // The lock is released before the network call.
        let adapter = self.primary().await?;
        adapter.chat(request).await
    }

    /// Status of every configured provider, served from a snapshot for
    /// [`STATUS_TTL`] unless `force` is set.
    pub async fn get_status(&self, force: bool) -> StatusMap {
        let (generation, primary, entries) = {
            let state = self.state.read().await;
            if !force {
                if let Some(data) = self
                    .status
                    .lock()
                    .await
                    .as_ref()
                    .and_then(|c| c.fresh(state.generation, self.status_ttl))
                {
                    return data.clone();
                }
            }
            let entries: Vec<_> = state
                .config
                .providers
                .iter()
                .map(|(name, p)| (name.clone(), p.model(), state.adapters.get(name).cloned()))
                .collect();
            (state.generation, state.config.primary.clone(), entries)
        };

        let probes = entries.iter().map(|(_, _, adapter)| async move {
            match adapter {
                Some(a) => (a.is_configured(), a.is_available().await),
                None => (false, false),
            }
        });
        let results = join_all(probes).await;

        let data: StatusMap = entries
            .into_iter()
            .zip(results)
            .map(|((name, model, _), (configured, available))| {
                let is_primary = primary.as_deref() == Some(name.as_str());
                (
                    name,
                    ProviderStatus {
                        configured,
                        available,
                        model,
                        is_primary,
                    },
                )
            })
            .collect();

        // A configuration change during the probes makes this round stale.
        if self.state.read().await.generation == generation {
            *self.status.lock().await = Some(StatusCache::new(generation, data.clone()));
        }
        data
    }

    async fn apply(&self, config: ProvidersConfig) {
        let adapters = build_adapters(&config, &self.logger);
        {
            let mut state = self.state.write().await;
            state.config = config;
            state.adapters = adapters;
            state.generation += 1;
        }
        *self.status.lock().await = None;
    }
}

fn build_adapters(
    config: &ProvidersConfig,
    logger: &Arc<ThrottledLogger>,
) -> BTreeMap<String, Arc<ProviderAdapter>> {
    let mut adapters = BTreeMap::new();
    for (name, provider) in config.providers.iter().filter(|(_, p)| p.enabled) {
        let key = resolve_api_key(name, provider, &config.credentials);
        match ProviderAdapter::new(name.clone(), provider.clone(), key, logger.clone()) {
            Ok(adapter) => {
                adapters.insert(name.clone(), Arc::new(adapter));
            }
            Err(e) => tracing::warn!(provider = name.as_str(), error = %e, "failed to build provider"),
        }
    }
    adapters
}
