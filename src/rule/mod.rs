//! Rule evaluation against delimiter-split lines.
//!
//! A consumer's rules are an OR of groups, each group an AND of conditions.
//! Column conditions look at one 1-based column of the split line; conditions
//! with index `<= 0` test whether the whole line contains the key.
//!
//! ```rust
//! use logbeat_filter::{ConsumerRuleSet, FilterTaskConfig, OperationCatalog, RuleCondition, RuleGroup};
//!
//! let config = FilterTaskConfig::new("nginx", "proc-5xx")
//!     .with_delimiter(" ")
//!     .with_group(RuleGroup::new(vec![RuleCondition::new(2, "startswith", "5")]));
//! let rules = ConsumerRuleSet::compile(&config, &OperationCatalog::new());
//!
//! assert!(rules.accepts_line("GET 502 /api", " "));
//! assert!(!rules.accepts_line("GET 200 /api", " "));
//! ```

pub mod compiled;
pub mod evaluator;

pub use compiled::{CompiledCondition, CompiledGroup, ConsumerRuleSet};
pub use evaluator::bounded_split;
