//! Live filter instance shared by every consumer of one filter id.

use crate::config::{FilterStageConfig, FilterTaskConfig};
use crate::event::Event;
use crate::operation::OperationCatalog;
use crate::rule::ConsumerRuleSet;
use crate::stage::endpoint::Endpoint;
use crate::stage::metrics::OwnerStats;
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identity of one incarnation of a filter instance.
///
/// A filter id can be registered again after its previous instance started
/// shutting down; the generation tells the two apart so a dying instance
/// never unregisters its successor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LifecycleToken {
    pub filter_id: String,
    pub generation: u64,
}

/// Everything the dispatch loop needs to route one event.
///
/// Immutable once published; merges build a new table and swap it in.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    /// Highest column referenced by any merged rule set. Never decreases.
    pub max_column_index: usize,
    pub rule_sets: BTreeMap<String, Arc<ConsumerRuleSet>>,
    pub endpoints: BTreeMap<String, Endpoint>,
    /// Every owner that attached under a consumer id, for drop accounting.
    pub owners: BTreeMap<String, Vec<Arc<OwnerStats>>>,
}

impl RouteTable {
    fn merge_rule_set(&mut self, rule_set: Arc<ConsumerRuleSet>) {
        self.max_column_index = self.max_column_index.max(rule_set.max_column_index);
        self.rule_sets
            .insert(rule_set.consumer_id.clone(), rule_set);
    }

    fn attach_endpoint(&mut self, consumer_id: &str, endpoint: Endpoint) {
        self.owners
            .entry(consumer_id.to_string())
            .or_default()
            .push(endpoint.owner().clone());
        self.endpoints.insert(consumer_id.to_string(), endpoint);
    }
}

/// One filter id's live stage: one inbound channel, many consumers.
pub struct FilterInstance {
    token: LifecycleToken,
    delimiter: String,
    raw_field: String,
    routes: ArcSwap<RouteTable>,
    input: mpsc::Sender<Event>,
    /// Cancelled to ask the dispatch loop to stop.
    shutdown: CancellationToken,
    /// Cancelled by the dispatch loop once it has unregistered and exited.
    terminated: CancellationToken,
}

impl FilterInstance {
    /// Build an instance from its first config and return the receiving half
    /// of its inbound channel for the dispatch loop.
    pub(crate) fn new(
        config: &FilterTaskConfig,
        generation: u64,
        stage: &FilterStageConfig,
        catalog: &OperationCatalog,
        shutdown: CancellationToken,
    ) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (input, inbound) = mpsc::channel(stage.channel_capacity.max(1));
        let instance = Self {
            token: LifecycleToken {
                filter_id: config.filter_id.clone(),
                generation,
            },
            delimiter: config.delimiter.clone(),
            raw_field: stage.raw_field.clone(),
            routes: ArcSwap::from_pointee(RouteTable::default()),
            input,
            shutdown,
            terminated: CancellationToken::new(),
        };
        instance.merge_config(config, catalog);
        (Arc::new(instance), inbound)
    }

    pub fn id(&self) -> &str {
        &self.token.filter_id
    }

    pub fn generation(&self) -> u64 {
        self.token.generation
    }

    pub fn lifecycle_token(&self) -> &LifecycleToken {
        &self.token
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn raw_field(&self) -> &str {
        &self.raw_field
    }

    /// Sender for the upstream stage feeding this instance.
    pub fn input(&self) -> mpsc::Sender<Event> {
        self.input.clone()
    }

    /// The routing table as currently published.
    pub fn routes(&self) -> Arc<RouteTable> {
        self.routes.load_full()
    }

    pub fn max_column_index(&self) -> usize {
        self.routes.load().max_column_index
    }

    pub fn consumer_ids(&self) -> Vec<String> {
        self.routes.load().rule_sets.keys().cloned().collect()
    }

    pub fn rule_set(&self, consumer_id: &str) -> Option<Arc<ConsumerRuleSet>> {
        self.routes.load().rule_sets.get(consumer_id).cloned()
    }

    pub fn endpoint_count(&self) -> usize {
        self.routes.load().endpoints.len()
    }

    /// Merge one consumer's rules, replacing any earlier rules for the same
    /// consumer id. The delimiter of later configs is ignored.
    pub fn merge_config(&self, config: &FilterTaskConfig, catalog: &OperationCatalog) {
        let rule_set = Arc::new(self.compile(config, catalog));
        self.routes.rcu(|current| {
            let mut table = RouteTable::clone(current);
            table.merge_rule_set(rule_set.clone());
            table
        });
    }

    /// Attach a downstream endpoint under `consumer_id`.
    ///
    /// A second endpoint for the same consumer id takes over delivery; its
    /// owner is added to that consumer's drop accounting.
    pub fn attach_endpoint(&self, consumer_id: &str, endpoint: Endpoint) {
        self.routes.rcu(|current| {
            let mut table = RouteTable::clone(current);
            table.attach_endpoint(consumer_id, endpoint.clone());
            table
        });
    }

    /// Merge rules and attach the endpoint in one publication, so the
    /// dispatch loop never sees the rules without somewhere to send.
    pub(crate) fn merge_with_endpoint(
        &self,
        config: &FilterTaskConfig,
        catalog: &OperationCatalog,
        endpoint: Endpoint,
    ) {
        let rule_set = Arc::new(self.compile(config, catalog));
        self.routes.rcu(|current| {
            let mut table = RouteTable::clone(current);
            table.merge_rule_set(rule_set.clone());
            table.attach_endpoint(&config.processor_id, endpoint.clone());
            table
        });
        debug!(
            filter_id = %self.token.filter_id,
            consumer_id = %config.processor_id,
            max_column_index = self.max_column_index(),
            "merged filter config"
        );
    }

    fn compile(&self, config: &FilterTaskConfig, catalog: &OperationCatalog) -> ConsumerRuleSet {
        if config.delimiter != self.delimiter {
            warn!(
                filter_id = %self.token.filter_id,
                consumer_id = %config.processor_id,
                delimiter = %config.delimiter,
                instance_delimiter = %self.delimiter,
                "config delimiter differs from the shared filter's, using the filter's"
            );
        }
        ConsumerRuleSet::compile(config, catalog)
    }

    /// Ask the dispatch loop to stop. Pending sends are abandoned.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// `false` once the dispatch loop has unregistered and exited.
    pub fn is_running(&self) -> bool {
        !self.terminated.is_cancelled()
    }

    /// Wait until the dispatch loop has unregistered and exited.
    pub async fn stopped(&self) {
        self.terminated.cancelled().await;
    }

    pub(crate) fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub(crate) fn mark_terminated(&self) {
        self.terminated.cancel();
    }
}

impl std::fmt::Debug for FilterInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let routes = self.routes.load();
        f.debug_struct("FilterInstance")
            .field("filter_id", &self.token.filter_id)
            .field("generation", &self.token.generation)
            .field("delimiter", &self.delimiter)
            .field("max_column_index", &routes.max_column_index)
            .field("consumers", &routes.rule_sets.keys().collect::<Vec<_>>())
            .field("running", &self.is_running())
            .finish()
    }
}
