//! Operator registry used to resolve rule conditions.

use crate::error::Result;
use crate::operation::cache::RegexCache;
use crate::operation::defaults::register_defaults;
use crate::operation::types::OperationFn;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Registry of comparison operators by name.
///
/// Conditions name their operator as a string; the catalog resolves that name
/// to a predicate once, when a rule set is merged into a filter instance.
/// Names that are not registered resolve to nothing, and such conditions are
/// treated as satisfied during evaluation.
///
/// # Example
/// ```rust
/// use logbeat_filter::OperationCatalog;
///
/// let mut catalog = OperationCatalog::new();
/// catalog.register("len_gt", |field_value, rule_value| {
///     rule_value
///         .parse::<usize>()
///         .map(|min| field_value.len() > min)
///         .unwrap_or(false)
/// });
///
/// let len_gt = catalog.get("len_gt").unwrap();
/// assert!(len_gt("abcdef", "3"));
/// assert!(catalog.contains("eq"));
/// ```
#[derive(Clone)]
pub struct OperationCatalog {
    operations: HashMap<String, OperationFn>,
    /// Operators whose key is a regex and can be validated up front.
    pattern_operations: HashSet<String>,
    regex_cache: Arc<RegexCache>,
}

impl OperationCatalog {
    /// Create a catalog with the default operators registered.
    pub fn new() -> Self {
        let mut catalog = Self::empty();
        register_defaults(&mut catalog);
        catalog
    }

    /// Create a catalog with the default operators and a regex cache bounded to `max_patterns`.
    pub fn with_regex_cache_size(max_patterns: usize) -> Self {
        let mut catalog = Self {
            operations: HashMap::new(),
            pattern_operations: HashSet::new(),
            regex_cache: Arc::new(RegexCache::with_max_size(max_patterns)),
        };
        register_defaults(&mut catalog);
        catalog
    }

    /// Create a catalog with no operators at all.
    pub fn empty() -> Self {
        Self {
            operations: HashMap::new(),
            pattern_operations: HashSet::new(),
            regex_cache: Arc::new(RegexCache::new()),
        }
    }

    /// Register an operator, replacing any previous one with the same name.
    pub fn register<F>(&mut self, name: &str, func: F) -> &mut Self
    where
        F: Fn(&str, &str) -> bool + Send + Sync + 'static,
    {
        self.insert(name, Arc::new(func));
        self
    }

    pub(crate) fn insert(&mut self, name: &str, func: OperationFn) {
        self.pattern_operations.remove(name);
        self.operations.insert(name.to_string(), func);
    }

    pub(crate) fn insert_pattern(&mut self, name: &str, func: OperationFn) {
        self.operations.insert(name.to_string(), func);
        self.pattern_operations.insert(name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<OperationFn> {
        self.operations.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.operations.contains_key(name)
    }

    pub fn is_pattern_operation(&self, name: &str) -> bool {
        self.pattern_operations.contains(name)
    }

    /// Check that a key is usable with the given operator.
    ///
    /// Only pattern operators have keys that can be wrong; the pattern is
    /// compiled into the shared cache as a side effect.
    pub fn validate_key(&self, name: &str, key: &str) -> Result<()> {
        if self.is_pattern_operation(name) {
            self.regex_cache.get_regex(key)?;
        }
        Ok(())
    }

    pub fn regex_cache(&self) -> Arc<RegexCache> {
        self.regex_cache.clone()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Registered operator names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.operations.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for OperationCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationCatalog")
            .field("operations", &self.names())
            .field("regex_cache", &self.regex_cache.len())
            .finish()
    }
}
