//! Result type alias for pipeline operations.

use crate::types::PipelineError;

/// Result type for all pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
