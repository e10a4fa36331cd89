//! # Logbeat Filter
//!
//! The shared filter stage of a log-shipping agent: upstream stages push
//! structured events carrying a raw log line, and every downstream consumer
//! that subscribed to the same filter id receives only the events its rules
//! accept.
//!
//! Consumers attaching to the same filter id share one instance, so each
//! line is split once no matter how many consumers look at it.
//!
//! ## Quick Start
//!
//! ```rust
//! use logbeat_filter::{Endpoint, Event, FilterRegistry, FilterTaskConfig, RuleCondition, RuleGroup};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> logbeat_filter::Result<()> {
//! let registry = FilterRegistry::new();
//!
//! // Consumer "errors" wants lines whose third column is ERROR.
//! let (errors_out, mut errors_rx) = Endpoint::channel("task-errors", 64);
//! let errors = FilterTaskConfig::new("app-log", "errors")
//!     .with_delimiter("|")
//!     .with_group(RuleGroup::new(vec![RuleCondition::new(3, "eq", "ERROR")]));
//! let factory = move |_: &FilterTaskConfig| -> anyhow::Result<Endpoint> { Ok(errors_out.clone()) };
//! let instance = registry.get_or_create(&errors, &factory)?;
//!
//! // Consumer "archive" takes everything.
//! let (archive_out, mut archive_rx) = Endpoint::channel("task-archive", 64);
//! let archive = FilterTaskConfig::new("app-log", "archive").with_delimiter("|");
//! let factory = move |_: &FilterTaskConfig| -> anyhow::Result<Endpoint> { Ok(archive_out.clone()) };
//! registry.get_or_create(&archive, &factory)?;
//!
//! let input = instance.input();
//! input.send(Event::from_line("data", "2024-05-01|api|ERROR|timeout")).await.unwrap();
//!
//! assert!(errors_rx.recv().await.is_some());
//! assert!(archive_rx.recv().await.is_some());
//!
//! registry.shutdown_and_wait().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Rules
//!
//! A consumer's rules are an OR of groups; a group is an AND of conditions.
//! A condition with index `>= 1` applies a named operator to that column of
//! the split line; index `<= 0` checks whether the whole line contains the
//! key. See [`rule`] for evaluation details and [`operation`] for operators.

pub mod config;
pub mod error;
pub mod event;
pub mod operation;
pub mod rule;
pub mod stage;

pub use config::{load_task_configs, FilterStageConfig, FilterTaskConfig, RuleCondition, RuleGroup};
pub use error::{FilterError, Result};
pub use event::Event;
pub use operation::{OperationCatalog, OperationFn, RegexCache};
pub use rule::ConsumerRuleSet;
pub use stage::{
    Endpoint, EndpointFactory, FilterInstance, FilterMetrics, FilterRegistry, LifecycleToken,
    MetricsSnapshot, OwnerStats,
};
