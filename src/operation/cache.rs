//! Regex compilation cache for pattern operators.
//!
//! Pattern keys come from rule configs, so the same handful of expressions is
//! evaluated against every event. Compiling them once and sharing the result
//! across dispatch loops keeps the hot path to a map lookup.

use crate::error::{FilterError, Result};
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of distinct patterns kept before eviction kicks in.
pub const DEFAULT_MAX_PATTERNS: usize = 1000;

/// Shared cache of compiled regex patterns.
///
/// # Thread Safety
/// Lookups take the read lock only; recency is tracked with atomics inside
/// each entry. Compilation and eviction take the write lock.
///
/// Patterns that fail to compile are cached as well, so a bad key in a rule
/// costs one compilation attempt instead of one per event.
#[derive(Debug)]
pub struct RegexCache {
    patterns: RwLock<HashMap<String, CachedRegex>>,
    max_size: usize,
    clock: AtomicU64,
    hits: AtomicUsize,
    misses: AtomicUsize,
    compilations: AtomicUsize,
    evictions: AtomicUsize,
    invalid: AtomicUsize,
}

#[derive(Debug)]
struct CachedRegex {
    /// `None` when the pattern failed to compile.
    regex: Option<Arc<Regex>>,
    last_used: AtomicU64,
}

/// Cache performance statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub compilations: usize,
    pub evictions: usize,
    /// Patterns that failed to compile.
    pub invalid: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

impl RegexCache {
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_PATTERNS)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            patterns: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
            clock: AtomicU64::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            compilations: AtomicUsize::new(0),
            evictions: AtomicUsize::new(0),
            invalid: AtomicUsize::new(0),
        }
    }

    /// Get or compile a regex pattern.
    pub fn get_regex(&self, pattern: &str) -> Result<Arc<Regex>> {
        if let Some(cached) = self.lookup(pattern) {
            return cached.ok_or_else(|| FilterError::InvalidRegex(pattern.to_string()));
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.compile_and_cache(pattern)
    }

    /// Match `text` against `pattern`; a pattern that does not compile never matches.
    pub fn is_match(&self, pattern: &str, text: &str) -> bool {
        match self.get_regex(pattern) {
            Ok(regex) => regex.is_match(text),
            Err(_) => false,
        }
    }

    fn lookup(&self, pattern: &str) -> Option<Option<Arc<Regex>>> {
        let patterns = self.patterns.read();
        let cached = patterns.get(pattern)?;
        cached.last_used.store(self.tick(), Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(cached.regex.clone())
    }

    fn compile_and_cache(&self, pattern: &str) -> Result<Arc<Regex>> {
        let compiled = Regex::new(pattern).map(Arc::new);
        self.compilations.fetch_add(1, Ordering::Relaxed);

        let mut patterns = self.patterns.write();
        // Another caller may have compiled it while we waited for the lock.
        if let Some(existing) = patterns.get(pattern) {
            return existing
                .regex
                .clone()
                .ok_or_else(|| FilterError::InvalidRegex(pattern.to_string()));
        }

        if patterns.len() >= self.max_size {
            self.evict_lru(&mut patterns);
        }

        let (regex, result) = match compiled {
            Ok(regex) => (Some(regex.clone()), Ok(regex)),
            Err(err) => {
                self.invalid.fetch_add(1, Ordering::Relaxed);
                (
                    None,
                    Err(FilterError::InvalidRegex(format!("Pattern '{pattern}': {err}"))),
                )
            }
        };
        patterns.insert(
            pattern.to_string(),
            CachedRegex {
                regex,
                last_used: AtomicU64::new(self.tick()),
            },
        );
        result
    }

    fn evict_lru(&self, patterns: &mut HashMap<String, CachedRegex>) {
        let oldest = patterns
            .iter()
            .min_by_key(|(_, cached)| cached.last_used.load(Ordering::Relaxed))
            .map(|(pattern, _)| pattern.clone());

        if let Some(pattern) = oldest {
            patterns.remove(&pattern);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compilations: self.compilations.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            invalid: self.invalid.load(Ordering::Relaxed),
        }
    }

    /// Number of patterns kept before the least recently used is evicted.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.patterns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.patterns.write().clear();
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}
