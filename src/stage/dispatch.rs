//! The per-instance task that routes inbound events to consumers.

use crate::event::Event;
use crate::rule::bounded_split;
use crate::stage::endpoint::Endpoint;
use crate::stage::instance::{FilterInstance, RouteTable};
use crate::stage::metrics::FilterMetrics;
use crate::stage::registry::RegistryInner;
use futures::future::join_all;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

pub(crate) struct DispatchLoop {
    instance: Arc<FilterInstance>,
    inbound: mpsc::Receiver<Event>,
    metrics: Arc<FilterMetrics>,
    registry: Weak<RegistryInner>,
}

impl DispatchLoop {
    pub(crate) fn new(
        instance: Arc<FilterInstance>,
        inbound: mpsc::Receiver<Event>,
        metrics: Arc<FilterMetrics>,
        registry: Weak<RegistryInner>,
    ) -> Self {
        Self {
            instance,
            inbound,
            metrics,
            registry,
        }
    }

    /// Run until shutdown. Unregistering happens when the loop is dropped.
    pub(crate) async fn run(mut self) {
        debug!(
            filter_id = %self.instance.id(),
            generation = self.instance.generation(),
            "dispatch loop started"
        );

        let shutdown = self.instance.shutdown_token().clone();
        loop {
            let next = tokio::select! {
                biased;

                _ = shutdown.cancelled() => None,

                next = self.inbound.recv() => next,
            };

            match next {
                Some(event) => self.process(event).await,
                None => break,
            }
        }
    }

    async fn process(&self, event: Event) {
        let routes = self.instance.routes();
        let delimiter = self.instance.delimiter();

        let line = match event.text(self.instance.raw_field()) {
            Some(line) if !line.is_empty() && !delimiter.is_empty() => line,
            _ => {
                trace!(filter_id = %self.instance.id(), "no raw line, forwarding to all consumers");
                let targets = routes
                    .endpoints
                    .iter()
                    .map(|(consumer_id, endpoint)| (consumer_id.as_str(), endpoint))
                    .collect();
                self.fan_out(targets, &event).await;
                return;
            }
        };

        let columns = bounded_split(line, delimiter, routes.max_column_index + 1);
        let mut targets = Vec::with_capacity(routes.rule_sets.len());
        for (consumer_id, rule_set) in &routes.rule_sets {
            if rule_set.accepts(&columns, line) {
                if let Some(endpoint) = routes.endpoints.get(consumer_id) {
                    targets.push((consumer_id.as_str(), endpoint));
                }
            } else {
                self.record_rejection(&routes, consumer_id);
            }
        }

        self.fan_out(targets, &event).await;
    }

    fn record_rejection(&self, routes: &RouteTable, consumer_id: &str) {
        self.metrics.record_dropped();
        for owner in routes.owners.get(consumer_id).into_iter().flatten() {
            owner.record_dropped();
            self.metrics.record_owner_dropped();
        }
    }

    /// Send `event` to every target concurrently. Each send races shutdown;
    /// returns once all of them have finished or been abandoned.
    async fn fan_out(&self, targets: Vec<(&str, &Endpoint)>, event: &Event) {
        if targets.is_empty() {
            return;
        }

        let shutdown = self.instance.shutdown_token();
        let sends = targets.into_iter().map(|(consumer_id, endpoint)| {
            let event = event.clone();
            async move {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {}

                    result = endpoint.sender().send(event) => match result {
                        Ok(()) => self.metrics.record_handled(),
                        Err(_) => warn!(
                            filter_id = %self.instance.id(),
                            consumer_id = %consumer_id,
                            owner_id = %endpoint.owner().owner_id(),
                            "consumer channel closed, event not delivered"
                        ),
                    },
                }
            }
        });

        join_all(sends).await;
    }
}

/// Unregisters on every exit path, including the runtime dropping the task
/// before or while it runs.
impl Drop for DispatchLoop {
    fn drop(&mut self) {
        let token = self.instance.lifecycle_token();
        let removed = match self.registry.upgrade() {
            Some(registry) => registry.remove(token).is_some(),
            None => false,
        };
        self.metrics.instance_stopped();

        info!(
            filter_id = %token.filter_id,
            generation = token.generation,
            unregistered = removed,
            "filter stopped"
        );
        self.instance.mark_terminated();
    }
}
