//! Cypher generation and checking.
//!
//! Deterministic counterparts of the generation stages (import
//! statements, constraints) plus the validators applied to LLM output.

pub mod constraint;
pub mod expr;
pub mod import;
pub mod keys;
pub mod lint;
pub mod pattern;
pub mod read_query;
pub mod text;

pub use constraint::{derive_constraints, parse_constraint, render_constraint, split_constraints};
pub use import::{render_import, row_batches, ROWS_PARAMETER};
pub use keys::merge_keys;
pub use lint::lint_import_statement;
pub use read_query::validate_read_query;
pub use text::strip_markdown;
