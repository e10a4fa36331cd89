//! Default operator implementations.
//!
//! All comparisons are case-sensitive; column values are compared exactly as
//! they were split out of the raw line.

use crate::operation::cache::RegexCache;
use crate::operation::catalog::OperationCatalog;
use crate::operation::types::OperationFn;
use std::sync::Arc;

/// Column equals the key.
///
/// # Example
/// ```rust
/// use logbeat_filter::operation::create_eq_operation;
///
/// let eq = create_eq_operation();
/// assert!(eq("200", "200"));
/// assert!(!eq("200", "20"));
/// ```
pub fn create_eq_operation() -> OperationFn {
    Arc::new(|field_value, rule_value| field_value == rule_value)
}

/// Column differs from the key.
pub fn create_neq_operation() -> OperationFn {
    Arc::new(|field_value, rule_value| field_value != rule_value)
}

/// Column contains the key as a substring.
pub fn create_include_operation() -> OperationFn {
    Arc::new(|field_value, rule_value| field_value.contains(rule_value))
}

/// Column does not contain the key.
pub fn create_exclude_operation() -> OperationFn {
    Arc::new(|field_value, rule_value| !field_value.contains(rule_value))
}

pub fn create_startswith_operation() -> OperationFn {
    Arc::new(|field_value, rule_value| field_value.starts_with(rule_value))
}

pub fn create_endswith_operation() -> OperationFn {
    Arc::new(|field_value, rule_value| field_value.ends_with(rule_value))
}

/// Column matches the key interpreted as a regex.
///
/// Compiled patterns are shared through `cache`; an invalid pattern never matches.
pub fn create_regex_operation(cache: Arc<RegexCache>) -> OperationFn {
    Arc::new(move |field_value, rule_value| cache.is_match(rule_value, field_value))
}

/// Column does not match the key interpreted as a regex.
///
/// An invalid pattern evaluates to false here too rather than to "not matched";
/// a broken rule should not let everything through.
pub fn create_nregex_operation(cache: Arc<RegexCache>) -> OperationFn {
    Arc::new(move |field_value, rule_value| match cache.get_regex(rule_value) {
        Ok(regex) => !regex.is_match(field_value),
        Err(_) => false,
    })
}

/// Register the default operators into a catalog.
pub fn register_defaults(catalog: &mut OperationCatalog) {
    let eq = create_eq_operation();
    let neq = create_neq_operation();
    let include = create_include_operation();
    let exclude = create_exclude_operation();

    for name in ["eq", "=", "equal"] {
        catalog.insert(name, eq.clone());
    }
    for name in ["neq", "!=", "not_equal"] {
        catalog.insert(name, neq.clone());
    }
    for name in ["include", "contains"] {
        catalog.insert(name, include.clone());
    }
    for name in ["exclude", "not_contains"] {
        catalog.insert(name, exclude.clone());
    }
    catalog.insert("startswith", create_startswith_operation());
    catalog.insert("endswith", create_endswith_operation());

    let cache = catalog.regex_cache();
    catalog.insert_pattern("regex", create_regex_operation(cache.clone()));
    catalog.insert_pattern("nregex", create_nregex_operation(cache));
}
