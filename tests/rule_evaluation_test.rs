//! Integration tests for rule evaluation through the public API.
//!
//! These cover the accept/reject semantics a consumer relies on when writing
//! its filter config.

use logbeat_filter::rule::bounded_split;
use logbeat_filter::{ConsumerRuleSet, FilterTaskConfig, OperationCatalog, RuleCondition, RuleGroup};

fn compile(config: &FilterTaskConfig) -> ConsumerRuleSet {
    ConsumerRuleSet::compile(config, &OperationCatalog::new())
}

fn single_group(delimiter: &str, conditions: Vec<RuleCondition>) -> ConsumerRuleSet {
    compile(
        &FilterTaskConfig::new("f", "p")
            .with_delimiter(delimiter)
            .with_group(RuleGroup::new(conditions)),
    )
}

#[test]
fn test_column_bounds() {
    let third = single_group(",", vec![RuleCondition::new(3, "contains", "c")]);
    assert!(third.accepts_line("a,b,c", ","));

    let fourth = single_group(",", vec![RuleCondition::new(4, "contains", "c")]);
    assert!(!fourth.accepts_line("a,b,c", ","));
}

#[test]
fn test_two_column_group() {
    let rules = single_group(
        ",",
        vec![
            RuleCondition::new(1, "eq", "A"),
            RuleCondition::new(2, "eq", "B"),
        ],
    );

    for (line, expected) in [
        ("A,B", true),
        ("A,B,C,D", true),
        ("A,b", false),
        ("a,B", false),
        ("A", false),
        ("", false),
    ] {
        assert_eq!(rules.accepts_line(line, ","), expected, "line {:?}", line);
    }
}

#[test]
fn test_whole_line_contains() {
    let rules = single_group(" ", vec![RuleCondition::new(-1, "ignored", "ERROR")]);

    assert!(rules.accepts_line("12:00:01 ERROR connection reset", " "));
    assert!(rules.accepts_line("ERROR", " "));
    assert!(!rules.accepts_line("12:00:01 WARN connection reset", " "));
    assert!(!rules.accepts_line("12:00:01 error connection reset", " "));
}

#[test]
fn test_groups_are_ored() {
    let config = FilterTaskConfig::new("f", "p")
        .with_delimiter(" ")
        .with_group(RuleGroup::new(vec![RuleCondition::new(1, "eq", "POST")]))
        .with_group(RuleGroup::new(vec![
            RuleCondition::new(1, "eq", "GET"),
            RuleCondition::new(3, "startswith", "5"),
        ]));
    let rules = compile(&config);

    assert!(rules.accepts_line("POST /login 200", " "));
    assert!(rules.accepts_line("GET /api 503", " "));
    assert!(!rules.accepts_line("GET /api 200", " "));
    assert!(!rules.accepts_line("DELETE /api 500", " "));
}

#[test]
fn test_unfiltered_config_accepts_everything() {
    let config = FilterTaskConfig::new("f", "p")
        .with_delimiter(",")
        .with_group(RuleGroup::new(vec![RuleCondition::new(1, "eq", "never")]))
        .with_has_filter(false);
    let rules = compile(&config);

    assert!(!rules.has_filter);
    assert_eq!(rules.max_column_index, 0);
    for line in ["", "x", "never", "a,b,c,d,e"] {
        assert!(rules.accepts_line(line, ","));
    }
}

#[test]
fn test_operator_aliases() {
    let cases = [
        ("eq", "GET", "GET", true),
        ("=", "GET", "GET", true),
        ("equal", "GET", "POST", false),
        ("neq", "GET", "POST", true),
        ("!=", "GET", "GET", false),
        ("not_equal", "GET", "POST", true),
        ("include", "/api/v1", "api", true),
        ("contains", "/api/v1", "web", false),
        ("exclude", "/api/v1", "web", true),
        ("not_contains", "/api/v1", "api", false),
        ("startswith", "503", "5", true),
        ("endswith", "index.html", ".html", true),
        ("regex", "user-42", r"^user-\d+$", true),
        ("nregex", "user-42", r"^admin", true),
    ];

    for (op, column, key, expected) in cases {
        let rules = single_group("|", vec![RuleCondition::new(2, op, key)]);
        let line = format!("x|{}", column);
        assert_eq!(
            rules.accepts_line(&line, "|"),
            expected,
            "{} {:?} {:?}",
            op,
            column,
            key
        );
    }
}

#[test]
fn test_unknown_operator_is_permissive() {
    let rules = single_group(",", vec![RuleCondition::new(1, "fuzzy", "zzz")]);
    assert_eq!(rules.unknown_operator_count(), 1);
    assert!(rules.accepts_line("anything", ","));
}

#[test]
fn test_remainder_stays_in_last_column() {
    assert_eq!(
        bounded_split("2024-01-01 GET /a b c", " ", 3),
        vec!["2024-01-01", "GET", "/a b c"]
    );

    let rules = single_group(" ", vec![RuleCondition::new(2, "eq", "GET")]);
    assert_eq!(rules.max_column_index, 2);
    assert!(rules.accepts_line("2024-01-01 GET /a b c", " "));
}

#[test]
fn test_multi_character_delimiter() {
    let rules = single_group("||", vec![RuleCondition::new(2, "eq", "b|c")]);
    assert!(rules.accepts_line("a||b|c||d", "||"));
}

#[test]
fn test_custom_operator() {
    let mut catalog = OperationCatalog::new();
    catalog.register("len_gt", |column, key| {
        key.parse::<usize>()
            .map(|limit| column.len() > limit)
            .unwrap_or(false)
    });

    let config = FilterTaskConfig::new("f", "p")
        .with_delimiter(",")
        .with_group(RuleGroup::new(vec![RuleCondition::new(2, "len_gt", "3")]));
    let rules = ConsumerRuleSet::compile(&config, &catalog);

    assert!(rules.accepts_line("a,long", ","));
    assert!(!rules.accepts_line("a,abc", ","));
}
