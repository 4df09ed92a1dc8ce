//! Pipeline stage instrumentation.
//!
//! Stages are not client calls, so their spans use the INTERNAL kind.

use crate::types::Stage;
use tracing::{field, span, Level, Span};

/// Create stage span.
///
/// # Arguments
///
/// * `stage` - Pipeline stage
/// * `target` - What the stage works on (column key, entity, question)
///
/// # Returns
///
/// Tracing span with job attributes
///
/// # Example
///
/// ```rust,ignore
/// let span = stage_span(Stage::ModelBuilder, "person_id");
/// let _guard = span.entered();
/// ```
pub fn stage_span(stage: Stage, target: &str) -> Span {
    span!(
        Level::INFO,
        "pipeline.stage",
        otel.name = %format!("{} {}", stage.as_str(), target),
        otel.kind = "internal",
        job.type = stage.as_str(),
        job.target = target,
        job.items = field::Empty,
        job.status = field::Empty,
    )
}

/// Record stage outcome on a span.
///
/// # Arguments
///
/// * `span` - Span created by [`stage_span`]
/// * `items` - Number of things produced (statements, constraints, added elements)
/// * `status` - `"success"` or `"failed"`
pub fn record_stage_metrics(span: &Span, items: Option<usize>, status: &str) {
    if let Some(items) = items {
        span.record("job.items", items);
    }
    span.record("job.status", status);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_span_creation() {
        let span = stage_span(Stage::Constraint, "(:Movie)");
        if let Some(metadata) = span.metadata() {
            assert_eq!(metadata.name(), "pipeline.stage");
        }
        record_stage_metrics(&span, Some(1), "success");
    }
}
