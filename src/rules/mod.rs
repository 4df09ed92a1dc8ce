//! Deterministic versions of the modeling rules the prompts ask for.
//!
//! Each rule is a plain function over the data model so it can be
//! applied (or checked) after every generation step.

pub mod merge;
pub mod naming;
pub mod preparation;

pub use merge::{merge_models, verify_additive, ConflictPolicy, MergeOutcome};
pub use naming::{check_model_naming, normalize_model, Rename};
pub use preparation::{ensure_preparation, lint_preparation};
