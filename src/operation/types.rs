//! Core type definitions for the operation catalog.

use std::sync::Arc;

/// Binary predicate applied to one split column.
///
/// Takes the column value extracted from the raw line and the rule's key, and
/// returns whether the condition holds. Predicates never fail: anything that
/// cannot be evaluated (for example an invalid regex key) is a non-match.
///
/// # Arguments
/// * `field_value` - The column at the condition's index
/// * `rule_value` - The key configured on the condition
///
/// # Example
/// ```rust
/// use logbeat_filter::OperationFn;
/// use std::sync::Arc;
///
/// let eq: OperationFn = Arc::new(|field_value, rule_value| field_value == rule_value);
/// assert!(eq("GET", "GET"));
/// assert!(!eq("GET", "POST"));
/// ```
pub type OperationFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;
