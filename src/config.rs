//! Configuration for the filter stage.
//!
//! Two kinds of configuration live here:
//!
//! - [`FilterTaskConfig`]: one downstream consumer's view of a filter. Several
//!   task configs with the same `filter_id` share a single live filter
//!   instance; each contributes its own rule set under its `processor_id`.
//! - [`FilterStageConfig`]: stage-wide knobs such as the event field holding
//!   the raw line and the capacity of the inbound channel.
//!
//! Task configs are usually read from YAML:
//!
//! ```yaml
//! filter_id: nginx-access
//! processor_id: proc-errors
//! delimiter: " "
//! filters:
//!   - conditions:
//!       - { index: 9, op: eq, key: "500" }
//!   - conditions:
//!       - { index: 0, op: include, key: "upstream timed out" }
//! ```

use crate::error::{FilterError, Result};
use crate::operation::OperationCatalog;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Event field that carries the raw log line.
pub const DEFAULT_RAW_FIELD: &str = "data";

/// Default capacity of each instance's inbound channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// One condition of a rule group.
///
/// `index` is 1-based into the delimiter-split line. Any index `<= 0` turns
/// the condition into a case-sensitive "whole line contains `key`" check and
/// `op` is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCondition {
    pub index: i64,
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub key: String,
}

impl RuleCondition {
    pub fn new(index: i64, op: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            index,
            op: op.into(),
            key: key.into(),
        }
    }

    /// Whole-line substring condition.
    pub fn line_contains(key: impl Into<String>) -> Self {
        Self::new(0, "", key)
    }

    /// The column this condition needs, if it looks at a column at all.
    pub fn column(&self) -> Option<usize> {
        usize::try_from(self.index).ok().filter(|&index| index > 0)
    }
}

/// AND-ed list of conditions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

impl RuleGroup {
    pub fn new(conditions: Vec<RuleCondition>) -> Self {
        Self { conditions }
    }

    /// Highest column referenced by this group, 0 if none.
    ///
    /// Conditions are normally listed in ascending index order, in which case
    /// this is the last condition's index.
    pub fn max_column(&self) -> usize {
        self.conditions
            .iter()
            .filter_map(RuleCondition::column)
            .max()
            .unwrap_or(0)
    }
}

/// Rule configuration contributed by one downstream consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterTaskConfig {
    /// Identity of the shared filter instance.
    pub filter_id: String,

    /// Identity of the downstream consumer owning these rules.
    #[serde(alias = "consumer_id")]
    pub processor_id: String,

    /// Column delimiter. Empty disables filtering for the whole instance.
    #[serde(default)]
    pub delimiter: String,

    /// `false` accepts every event. Defaults to "has at least one rule group".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_filter: Option<bool>,

    /// OR-ed rule groups, evaluated in order.
    #[serde(default)]
    pub filters: Vec<RuleGroup>,
}

impl FilterTaskConfig {
    pub fn new(filter_id: impl Into<String>, processor_id: impl Into<String>) -> Self {
        Self {
            filter_id: filter_id.into(),
            processor_id: processor_id.into(),
            delimiter: String::new(),
            has_filter: None,
            filters: Vec::new(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_group(mut self, group: RuleGroup) -> Self {
        self.filters.push(group);
        self
    }

    pub fn with_has_filter(mut self, has_filter: bool) -> Self {
        self.has_filter = Some(has_filter);
        self
    }

    pub fn has_filter(&self) -> bool {
        self.has_filter.unwrap_or(!self.filters.is_empty())
    }

    /// Highest column any group of this config references.
    ///
    /// Unfiltered configs never look at columns and report 0.
    pub fn max_column_index(&self) -> usize {
        if !self.has_filter() {
            return 0;
        }
        self.filters
            .iter()
            .map(RuleGroup::max_column)
            .max()
            .unwrap_or(0)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check identities and pattern keys against the catalog.
    ///
    /// Unknown operators are accepted: they evaluate as satisfied.
    pub fn validate(&self, catalog: &OperationCatalog) -> Result<()> {
        if self.filter_id.is_empty() {
            return Err(FilterError::InvalidConfig("filter_id is empty".to_string()));
        }
        if self.processor_id.is_empty() {
            return Err(FilterError::InvalidConfig(format!(
                "processor_id is empty for filter '{}'",
                self.filter_id
            )));
        }
        for condition in self.filters.iter().flat_map(|group| &group.conditions) {
            if condition.column().is_some() {
                catalog.validate_key(&condition.op, &condition.key)?;
            }
        }
        Ok(())
    }
}

/// Load a list of task configs from a YAML or JSON file.
///
/// Files ending in `.json` are parsed as JSON, anything else as YAML.
pub fn load_task_configs(path: impl AsRef<Path>) -> Result<Vec<FilterTaskConfig>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_yaml::from_str(&content)?)
    }
}

/// Stage-wide settings shared by every filter instance of a registry.
///
/// # Examples
///
/// ```rust
/// use logbeat_filter::FilterStageConfig;
///
/// let config = FilterStageConfig::default()
///     .with_raw_field("message")
///     .with_channel_capacity(256);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterStageConfig {
    /// Event field holding the raw line.
    pub raw_field: String,

    /// Capacity of each instance's inbound channel.
    ///
    /// **Default**: 1024
    pub channel_capacity: usize,

    /// Maximum number of compiled regex keys kept by the catalog.
    ///
    /// **Default**: 1000
    pub regex_cache_size: usize,
}

impl Default for FilterStageConfig {
    fn default() -> Self {
        Self {
            raw_field: DEFAULT_RAW_FIELD.to_string(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            regex_cache_size: crate::operation::cache::DEFAULT_MAX_PATTERNS,
        }
    }
}

impl FilterStageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Larger buffers for agents tailing many busy files.
    pub fn high_throughput() -> Self {
        Self {
            channel_capacity: 8192,
            regex_cache_size: 5000,
            ..Default::default()
        }
    }

    /// Small buffers so a stalled consumer pushes back on upstream quickly.
    pub fn low_latency() -> Self {
        Self {
            channel_capacity: 64,
            ..Default::default()
        }
    }

    pub fn with_raw_field(mut self, raw_field: impl Into<String>) -> Self {
        self.raw_field = raw_field.into();
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_regex_cache_size(mut self, size: usize) -> Self {
        self.regex_cache_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.raw_field.is_empty() {
            return Err(FilterError::InvalidConfig("raw_field is empty".to_string()));
        }
        if self.channel_capacity == 0 {
            return Err(FilterError::InvalidConfig(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
