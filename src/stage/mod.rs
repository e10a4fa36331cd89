//! The shared filter stage.
//!
//! Consumers that configure the same filter id share one [`FilterInstance`]:
//! one inbound channel, one dispatch loop, one line split per event. Each
//! consumer keeps its own rules and endpoint inside that instance.
//!
//! ```text
//!                          ┌──────────────────────────┐
//!   upstream ──input()──▶  │ FilterInstance (filter_id)│ ──accept──▶ consumer A
//!                          │  split once, evaluate per │ ──accept──▶ consumer B
//!                          │  consumer, fan out        │ ──reject──▶ drop counters
//!                          └──────────────────────────┘
//! ```

mod dispatch;
pub mod endpoint;
pub mod instance;
pub mod metrics;
pub mod registry;

pub use endpoint::{Endpoint, EndpointFactory};
pub use instance::{FilterInstance, LifecycleToken, RouteTable};
pub use metrics::{FilterMetrics, MetricsSnapshot, OwnerStats};
pub use registry::FilterRegistry;
