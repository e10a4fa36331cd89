//! Process-wide registry of live filter instances.

use crate::config::{FilterStageConfig, FilterTaskConfig};
use crate::error::{FilterError, Result};
use crate::operation::OperationCatalog;
use crate::stage::dispatch::DispatchLoop;
use crate::stage::endpoint::EndpointFactory;
use crate::stage::instance::{FilterInstance, LifecycleToken};
use crate::stage::metrics::FilterMetrics;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) struct RegistryInner {
    instances: RwLock<HashMap<String, Arc<FilterInstance>>>,
    catalog: Arc<OperationCatalog>,
    config: FilterStageConfig,
    metrics: Arc<FilterMetrics>,
    generation: AtomicU64,
    /// Parent of every instance's shutdown token.
    root: CancellationToken,
}

impl RegistryInner {
    /// Remove the entry for `token` if it is still that generation.
    pub(crate) fn remove(&self, token: &LifecycleToken) -> Option<Arc<FilterInstance>> {
        let mut instances = self.instances.write();
        let same_generation = instances
            .get(&token.filter_id)
            .is_some_and(|current| current.generation() == token.generation);
        if same_generation {
            instances.remove(&token.filter_id)
        } else {
            None
        }
    }
}

impl Drop for RegistryInner {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Maps filter ids to the instance serving them.
///
/// Cloning is cheap and every clone shares the same map. Dropping the last
/// clone shuts down every instance it created.
///
/// # Examples
///
/// ```rust
/// use logbeat_filter::{Endpoint, FilterRegistry, FilterTaskConfig, RuleCondition, RuleGroup};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> logbeat_filter::Result<()> {
/// let registry = FilterRegistry::new();
/// let (endpoint, mut output) = Endpoint::channel("task-1", 16);
///
/// let config = FilterTaskConfig::new("nginx", "proc-errors")
///     .with_delimiter(" ")
///     .with_group(RuleGroup::new(vec![RuleCondition::new(2, "startswith", "5")]));
/// let factory = move |_: &FilterTaskConfig| -> anyhow::Result<Endpoint> { Ok(endpoint.clone()) };
/// let instance = registry.get_or_create(&config, &factory)?;
///
/// let input = instance.input();
/// input.send(logbeat_filter::Event::from_line("data", "GET 200 /")).await.unwrap();
/// input.send(logbeat_filter::Event::from_line("data", "GET 503 /")).await.unwrap();
///
/// let delivered = output.recv().await.unwrap();
/// assert_eq!(delivered.text("data"), Some("GET 503 /"));
///
/// registry.shutdown_and_wait().await;
/// assert!(registry.is_empty());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FilterRegistry {
    inner: Arc<RegistryInner>,
}

impl FilterRegistry {
    /// Registry with default stage config and the default operators.
    pub fn new() -> Self {
        Self::build(FilterStageConfig::default(), OperationCatalog::new())
    }

    pub fn with_config(config: FilterStageConfig) -> Result<Self> {
        config.validate()?;
        let catalog = OperationCatalog::with_regex_cache_size(config.regex_cache_size);
        Ok(Self::build(config, catalog))
    }

    /// Use a caller-built catalog, e.g. one with extra operators registered.
    ///
    /// The catalog keeps its own regex cache; `config.regex_cache_size` does
    /// not resize it.
    pub fn with_catalog(config: FilterStageConfig, catalog: OperationCatalog) -> Result<Self> {
        config.validate()?;
        let cache_size = catalog.regex_cache().max_size();
        if cache_size != config.regex_cache_size {
            warn!(
                configured = config.regex_cache_size,
                catalog = cache_size,
                "regex_cache_size ignored, using the catalog's regex cache"
            );
        }
        Ok(Self::build(config, catalog))
    }

    fn build(config: FilterStageConfig, catalog: OperationCatalog) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                instances: RwLock::new(HashMap::new()),
                catalog: Arc::new(catalog),
                config,
                metrics: Arc::new(FilterMetrics::new()),
                generation: AtomicU64::new(0),
                root: CancellationToken::new(),
            }),
        }
    }

    pub fn lookup(&self, filter_id: &str) -> Option<Arc<FilterInstance>> {
        self.inner.instances.read().get(filter_id).cloned()
    }

    /// Attach a consumer to the instance for `config.filter_id`, creating and
    /// starting the instance if none is live.
    ///
    /// The endpoint is built before anything is registered, so a factory
    /// failure leaves the registry untouched. An instance already shutting
    /// down is replaced rather than merged into.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_or_create<F>(&self, config: &FilterTaskConfig, factory: &F) -> Result<Arc<FilterInstance>>
    where
        F: EndpointFactory + ?Sized,
    {
        config.validate(&self.inner.catalog)?;
        let endpoint = factory
            .build(config)
            .map_err(|err| FilterError::construction(&config.processor_id, err))?;
        let runtime = Handle::try_current()
            .map_err(|_| FilterError::RuntimeUnavailable(config.filter_id.clone()))?;

        let mut instances = self.inner.instances.write();
        if let Some(existing) = instances.get(&config.filter_id) {
            if !existing.is_shutting_down() && existing.is_running() {
                existing.merge_with_endpoint(config, &self.inner.catalog, endpoint);
                info!(
                    filter_id = %config.filter_id,
                    consumer_id = %config.processor_id,
                    "consumer joined filter"
                );
                return Ok(existing.clone());
            }
            debug!(
                filter_id = %config.filter_id,
                generation = existing.generation(),
                "replacing filter that is shutting down"
            );
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let (instance, inbound) = FilterInstance::new(
            config,
            generation,
            &self.inner.config,
            &self.inner.catalog,
            self.inner.root.child_token(),
        );
        instance.attach_endpoint(&config.processor_id, endpoint);
        instances.insert(config.filter_id.clone(), instance.clone());
        drop(instances);

        self.inner.metrics.instance_started();
        let dispatch = DispatchLoop::new(
            instance.clone(),
            inbound,
            self.inner.metrics.clone(),
            Arc::downgrade(&self.inner),
        );
        runtime.spawn(dispatch.run());

        info!(
            filter_id = %config.filter_id,
            consumer_id = %config.processor_id,
            generation,
            delimiter = %config.delimiter,
            "filter started"
        );
        Ok(instance)
    }

    /// Stop the instance identified by `token`.
    ///
    /// The instance's dispatch loop removes the entry itself on the way out;
    /// await [`FilterInstance::stopped`] to observe that. Returns `false` if
    /// the id is absent or now belongs to a newer generation, which is left
    /// alone.
    pub fn unregister(&self, token: &LifecycleToken) -> bool {
        let current = self
            .inner
            .instances
            .read()
            .get(&token.filter_id)
            .filter(|instance| instance.generation() == token.generation)
            .cloned();
        match current {
            Some(instance) => {
                instance.shutdown();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.instances.read().is_empty()
    }

    /// Registered filter ids, sorted.
    pub fn filter_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.instances.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn metrics(&self) -> &Arc<FilterMetrics> {
        &self.inner.metrics
    }

    pub fn catalog(&self) -> &Arc<OperationCatalog> {
        &self.inner.catalog
    }

    pub fn config(&self) -> &FilterStageConfig {
        &self.inner.config
    }

    /// Signal every instance to stop. Instances created afterwards stop
    /// immediately.
    pub fn shutdown(&self) {
        info!(instances = self.len(), "shutting down filter registry");
        self.inner.root.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.root.is_cancelled()
    }

    /// [`shutdown`](Self::shutdown), then wait until every dispatch loop has
    /// unregistered and the registry is empty.
    pub async fn shutdown_and_wait(&self) {
        self.shutdown();
        loop {
            let instances: Vec<Arc<FilterInstance>> =
                self.inner.instances.read().values().cloned().collect();
            if instances.is_empty() {
                break;
            }
            for instance in instances {
                instance.stopped().await;
            }
        }
    }
}

impl Default for FilterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("filter_ids", &self.filter_ids())
            .field("config", &self.inner.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
