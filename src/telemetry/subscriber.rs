//! Subscriber installation for applications embedding the pipeline.

use crate::types::{PipelineError, Result};
use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber.
///
/// Filtering comes from `RUST_LOG`, defaulting to `info`.
///
/// # Arguments
///
/// * `json` - Emit one JSON object per event instead of human-readable lines
///
/// # Errors
///
/// Returns `PipelineError::ConfigError` if `RUST_LOG` is invalid or a
/// global subscriber is already installed
pub fn init_tracing(json: bool) -> Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::try_new(directives)
            .map_err(|e| PipelineError::ConfigError(format!("Invalid RUST_LOG: {}", e)))?,
        Err(_) => EnvFilter::new("info"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if json {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| PipelineError::ConfigError(format!("Tracing already initialised: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // Whichever call wins, the other must report the existing subscriber
        let first = init_tracing(false);
        let second = init_tracing(true);
        assert!(first.is_err() || second.is_err());
    }
}
