//! Rule sets resolved against an operation catalog.

use crate::config::{FilterTaskConfig, RuleCondition, RuleGroup};
use crate::operation::{OperationCatalog, OperationFn};
use std::fmt;
use tracing::warn;

/// A condition with its operator already looked up.
#[derive(Clone)]
pub enum CompiledCondition {
    /// `index <= 0`: the raw line must contain `key`.
    LineContains { key: String },

    /// Column `index` (1-based) checked with `operation`.
    ///
    /// `operation` is `None` when the operator name is not in the catalog;
    /// such a condition always holds.
    Column {
        index: usize,
        op: String,
        key: String,
        operation: Option<OperationFn>,
    },
}

impl CompiledCondition {
    pub fn compile(condition: &RuleCondition, catalog: &OperationCatalog) -> Self {
        match condition.column() {
            None => CompiledCondition::LineContains {
                key: condition.key.clone(),
            },
            Some(index) => CompiledCondition::Column {
                index,
                op: condition.op.clone(),
                key: condition.key.clone(),
                operation: catalog.get(&condition.op),
            },
        }
    }

    pub fn is_unknown_operator(&self) -> bool {
        matches!(
            self,
            CompiledCondition::Column {
                operation: None,
                ..
            }
        )
    }
}

impl fmt::Debug for CompiledCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompiledCondition::LineContains { key } => {
                f.debug_struct("LineContains").field("key", key).finish()
            }
            CompiledCondition::Column {
                index,
                op,
                key,
                operation,
            } => f
                .debug_struct("Column")
                .field("index", index)
                .field("op", op)
                .field("key", key)
                .field("resolved", &operation.is_some())
                .finish(),
        }
    }
}

/// AND-ed conditions.
#[derive(Debug, Clone, Default)]
pub struct CompiledGroup {
    pub conditions: Vec<CompiledCondition>,
}

impl CompiledGroup {
    pub fn compile(group: &RuleGroup, catalog: &OperationCatalog) -> Self {
        Self {
            conditions: group
                .conditions
                .iter()
                .map(|condition| CompiledCondition::compile(condition, catalog))
                .collect(),
        }
    }
}

/// One consumer's rules as merged into a filter instance.
#[derive(Debug, Clone)]
pub struct ConsumerRuleSet {
    pub consumer_id: String,
    /// `false` accepts every event without looking at the groups.
    pub has_filter: bool,
    /// OR-ed groups, first match wins.
    pub groups: Vec<CompiledGroup>,
    /// Highest column referenced by `groups`.
    pub max_column_index: usize,
}

impl ConsumerRuleSet {
    /// Resolve a task config's rules against `catalog`.
    ///
    /// Unknown operators are kept (and treated as satisfied at evaluation);
    /// they are reported here once rather than per event.
    pub fn compile(config: &FilterTaskConfig, catalog: &OperationCatalog) -> Self {
        let has_filter = config.has_filter();
        let groups: Vec<CompiledGroup> = if has_filter {
            config
                .filters
                .iter()
                .map(|group| CompiledGroup::compile(group, catalog))
                .collect()
        } else {
            Vec::new()
        };

        for condition in groups.iter().flat_map(|group| &group.conditions) {
            if let CompiledCondition::Column {
                op,
                index,
                operation: None,
                ..
            } = condition
            {
                warn!(
                    filter_id = %config.filter_id,
                    consumer_id = %config.processor_id,
                    op = %op,
                    index,
                    "unknown filter operator, condition will always pass"
                );
            }
        }

        Self {
            consumer_id: config.processor_id.clone(),
            has_filter,
            groups,
            max_column_index: config.max_column_index(),
        }
    }

    /// A rule set that accepts everything.
    pub fn unconditional(consumer_id: impl Into<String>) -> Self {
        Self {
            consumer_id: consumer_id.into(),
            has_filter: false,
            groups: Vec::new(),
            max_column_index: 0,
        }
    }

    pub fn unknown_operator_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|group| &group.conditions)
            .filter(|condition| condition.is_unknown_operator())
            .count()
    }
}
