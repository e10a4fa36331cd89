//! Column splitting and rule evaluation.

use crate::rule::compiled::{CompiledCondition, CompiledGroup, ConsumerRuleSet};

/// Split `line` by `delimiter` into at most `max_parts` columns.
///
/// The last column keeps any unsplit remainder, so `max_parts` must be one
/// more than the highest index a rule looks at. An empty delimiter yields the
/// whole line as a single column.
///
/// # Examples
///
/// ```rust
/// use logbeat_filter::rule::bounded_split;
///
/// assert_eq!(bounded_split("a,b,c,d", ",", 3), vec!["a", "b", "c,d"]);
/// assert_eq!(bounded_split("a,b", ",", 5), vec!["a", "b"]);
/// ```
pub fn bounded_split<'a>(line: &'a str, delimiter: &str, max_parts: usize) -> Vec<&'a str> {
    if delimiter.is_empty() {
        return vec![line];
    }
    line.splitn(max_parts.max(1), delimiter).collect()
}

impl CompiledCondition {
    /// Whether this condition holds for one line.
    pub fn holds(&self, columns: &[&str], line: &str) -> bool {
        match self {
            CompiledCondition::LineContains { key } => line.contains(key.as_str()),
            CompiledCondition::Column {
                index,
                key,
                operation,
                ..
            } => {
                let Some(operation) = operation else {
                    return true;
                };
                match columns.get(index - 1) {
                    Some(&column) => operation(column, key.as_str()),
                    None => false,
                }
            }
        }
    }
}

impl CompiledGroup {
    /// All conditions hold; stops at the first that does not.
    pub fn matches(&self, columns: &[&str], line: &str) -> bool {
        self.conditions
            .iter()
            .all(|condition| condition.holds(columns, line))
    }
}

impl ConsumerRuleSet {
    /// Accept or reject one line.
    ///
    /// `columns` must come from [`bounded_split`] with at least
    /// `max_column_index + 1` parts allowed.
    pub fn accepts(&self, columns: &[&str], line: &str) -> bool {
        if !self.has_filter {
            return true;
        }
        self.groups.iter().any(|group| group.matches(columns, line))
    }

    /// Split `line` for this rule set alone and evaluate it.
    pub fn accepts_line(&self, line: &str, delimiter: &str) -> bool {
        let columns = bounded_split(line, delimiter, self.max_column_index + 1);
        self.accepts(&columns, line)
    }
}
