//! Comparison operators applied to split columns.
//!
//! A rule condition names its operator as a string (`"eq"`, `"include"`,
//! `"regex"`, ...). The [`OperationCatalog`] maps those names to predicates
//! over `(column_value, rule_key)`. Resolution happens once per merge, so the
//! dispatch loop only ever calls pre-resolved functions.
//!
//! ## Example Usage
//!
//! ```rust
//! use logbeat_filter::OperationCatalog;
//!
//! let catalog = OperationCatalog::new();
//! let include = catalog.get("include").unwrap();
//! assert!(include("GET /index.html", "index"));
//! ```

pub mod cache;
pub mod catalog;
pub mod defaults;
pub mod types;

pub use cache::{CacheStats, RegexCache};
pub use catalog::OperationCatalog;
pub use defaults::{
    create_endswith_operation, create_eq_operation, create_exclude_operation,
    create_include_operation, create_neq_operation, create_nregex_operation,
    create_regex_operation, create_startswith_operation, register_defaults,
};
pub use types::OperationFn;
