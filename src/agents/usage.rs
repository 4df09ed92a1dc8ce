//! Token usage aggregation across a pipeline run.

use crate::agents::client::TokenUsage;
use crate::types::Stage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregated token usage across requests
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatedTokenUsage {
    /// Total input tokens across all requests
    pub total_input_tokens: u32,

    /// Total output tokens across all requests
    pub total_output_tokens: u32,

    /// Total estimated cost in USD
    pub total_cost_usd: f64,

    /// Number of requests made
    pub requests: usize,

    /// Requests per stage (`model_builder`, `import_statement`, ...)
    pub requests_by_stage: BTreeMap<String, usize>,

    /// Per-request usage breakdown (for debugging/analysis)
    pub per_request_usage: Vec<TokenUsage>,
}

impl AggregatedTokenUsage {
    /// Add one request's usage.
    pub fn record(&mut self, stage: Stage, usage: &TokenUsage) {
        self.total_input_tokens = self.total_input_tokens.saturating_add(usage.input_tokens);
        self.total_output_tokens = self.total_output_tokens.saturating_add(usage.output_tokens);
        self.total_cost_usd += usage.estimated_cost_usd;
        self.requests += 1;
        *self
            .requests_by_stage
            .entry(stage.as_str().to_string())
            .or_insert(0) += 1;
        self.per_request_usage.push(usage.clone());
    }

    /// Fold another aggregate into this one.
    pub fn absorb(&mut self, other: &AggregatedTokenUsage) {
        self.total_input_tokens = self.total_input_tokens.saturating_add(other.total_input_tokens);
        self.total_output_tokens = self.total_output_tokens.saturating_add(other.total_output_tokens);
        self.total_cost_usd += other.total_cost_usd;
        self.requests += other.requests;
        for (stage, count) in &other.requests_by_stage {
            *self.requests_by_stage.entry(stage.clone()).or_insert(0) += count;
        }
        self.per_request_usage
            .extend(other.per_request_usage.iter().cloned());
    }

    /// Input plus output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.total_input_tokens as u64 + self.total_output_tokens as u64
    }

    /// Requests issued by one stage.
    pub fn stage_requests(&self, stage: Stage) -> usize {
        self.requests_by_stage
            .get(stage.as_str())
            .copied()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(input: u32, output: u32, cost: f64) -> TokenUsage {
        TokenUsage {
            input_tokens: input,
            output_tokens: output,
            estimated_cost_usd: cost,
            model: "gpt-4.1".to_string(),
        }
    }

    #[test]
    fn test_record_and_absorb() {
        let mut first = AggregatedTokenUsage::default();
        first.record(Stage::ModelBuilder, &usage(100, 20, 0.001));
        first.record(Stage::ModelBuilder, &usage(150, 30, 0.002));

        let mut second = AggregatedTokenUsage::default();
        second.record(Stage::ImportStatement, &usage(50, 10, 0.0005));

        first.absorb(&second);
        assert_eq!(first.requests, 3);
        assert_eq!(first.total_tokens(), 360);
        assert_eq!(first.stage_requests(Stage::ModelBuilder), 2);
        assert_eq!(first.stage_requests(Stage::ImportStatement), 1);
        assert_eq!(first.stage_requests(Stage::Query), 0);
        assert!((first.total_cost_usd - 0.0035).abs() < 1e-9);
    }
}
