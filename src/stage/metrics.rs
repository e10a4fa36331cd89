//! Counters maintained by the filter stage.
//!
//! The stage only counts; exporting is left to whoever owns the registry.
//! [`MetricsSnapshot::iter`] yields stable metric names for that purpose.

use serde::Serialize;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

pub const METRIC_LIVE_INSTANCES: &str = "num_filter_total";
pub const METRIC_DROPPED_TOTAL: &str = "filter_dropped_total";
pub const METRIC_HANDLED_TOTAL: &str = "filter_handled_total";
pub const METRIC_OWNER_DROPPED_TOTAL: &str = "crawler_dropped";

/// Stage-wide counters shared by a registry and all of its dispatch loops.
#[derive(Debug, Default)]
pub struct FilterMetrics {
    /// Dispatch loops currently running.
    live_instances: AtomicI64,
    /// Rejections, counted once per consumer that rejected an event.
    dropped_total: AtomicU64,
    /// Successful sends to downstream endpoints.
    handled_total: AtomicU64,
    /// Rejections as seen by owners; one rejection may hit several owners.
    owner_dropped_total: AtomicU64,
}

impl FilterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn instance_started(&self) {
        self.live_instances.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn instance_stopped(&self) {
        self.live_instances.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handled(&self) {
        self.handled_total.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_owner_dropped(&self) {
        self.owner_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn live_instances(&self) -> i64 {
        self.live_instances.load(Ordering::Relaxed)
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    pub fn handled_total(&self) -> u64 {
        self.handled_total.load(Ordering::Relaxed)
    }

    pub fn owner_dropped_total(&self) -> u64 {
        self.owner_dropped_total.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            live_instances: self.live_instances(),
            dropped_total: self.dropped_total(),
            handled_total: self.handled_total(),
            owner_dropped_total: self.owner_dropped_total(),
        }
    }
}

/// Point-in-time copy of [`FilterMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub live_instances: i64,
    pub dropped_total: u64,
    pub handled_total: u64,
    pub owner_dropped_total: u64,
}

impl MetricsSnapshot {
    /// `(metric name, value)` pairs for exporters.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, i64)> {
        [
            (METRIC_LIVE_INSTANCES, self.live_instances),
            (METRIC_DROPPED_TOTAL, saturating_i64(self.dropped_total)),
            (METRIC_HANDLED_TOTAL, saturating_i64(self.handled_total)),
            (
                METRIC_OWNER_DROPPED_TOTAL,
                saturating_i64(self.owner_dropped_total),
            ),
        ]
        .into_iter()
    }

    /// Format metrics as a human-readable string.
    pub fn format(&self) -> String {
        format!(
            "Filters: {} | Handled: {} | Dropped: {} | Owner dropped: {}",
            self.live_instances, self.handled_total, self.dropped_total, self.owner_dropped_total
        )
    }
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Drop accounting for one downstream owner.
///
/// The wiring code keeps an `Arc` to read its own count; the filter instance
/// keeps another to bump it whenever the owner's rules reject an event.
#[derive(Debug, Default)]
pub struct OwnerStats {
    owner_id: String,
    dropped: AtomicU64,
}

impl OwnerStats {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}
