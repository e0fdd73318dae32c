//! Cost calculator for LLM calls
//!
//! Derives the cost of LLM spans from token usage and model pricing.

use std::collections::HashMap;

use tracing::debug;

use crate::models::Span;

/// Pricing information for a model (per million tokens)
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    /// Cost per million input tokens
    pub input_per_million: f64,
    /// Cost per million output tokens
    pub output_per_million: f64,
}

impl ModelPricing {
    const fn new(input: f64, output: f64) -> Self {
        Self {
            input_per_million: input,
            output_per_million: output,
        }
    }

    /// Cost of the given usage; reasoning tokens bill as output
    pub fn cost(&self, tokens_in: u64, tokens_out: u64, tokens_reasoning: u64) -> f64 {
        let input_cost = (tokens_in as f64 / 1_000_000.0) * self.input_per_million;
        let output_cost =
            ((tokens_out as f64 + tokens_reasoning as f64) / 1_000_000.0) * self.output_per_million;
        input_cost + output_cost
    }
}

/// List prices as of early 2025
const DEFAULT_PRICING: &[(&str, ModelPricing)] = &[
    // Anthropic
    ("claude-3-opus", ModelPricing::new(15.0, 75.0)),
    ("claude-3-5-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-3-5-haiku", ModelPricing::new(0.80, 4.0)),
    ("claude-3-7-sonnet", ModelPricing::new(3.0, 15.0)),
    ("claude-sonnet-4", ModelPricing::new(3.0, 15.0)),
    ("claude-opus-4", ModelPricing::new(15.0, 75.0)),
    // OpenAI
    ("gpt-4", ModelPricing::new(30.0, 60.0)),
    ("gpt-4-turbo", ModelPricing::new(10.0, 30.0)),
    ("gpt-4o", ModelPricing::new(2.50, 10.0)),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    ("gpt-3.5-turbo", ModelPricing::new(0.50, 1.50)),
    ("o1", ModelPricing::new(15.0, 60.0)),
    ("o1-mini", ModelPricing::new(3.0, 12.0)),
    ("o1-pro", ModelPricing::new(150.0, 600.0)),
    // Google
    ("gemini-1.5-pro", ModelPricing::new(1.25, 5.0)),
    ("gemini-1.5-flash", ModelPricing::new(0.075, 0.30)),
    ("gemini-2.0-flash", ModelPricing::new(0.10, 0.40)),
    // Mistral
    ("mistral-large", ModelPricing::new(2.0, 6.0)),
    ("mistral-small", ModelPricing::new(0.2, 0.6)),
];

/// Cost calculator with model pricing database
#[derive(Debug, Clone)]
pub struct CostCalculator {
    pricing: HashMap<String, ModelPricing>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl CostCalculator {
    /// Create a new cost calculator with default pricing
    pub fn new() -> Self {
        let pricing = DEFAULT_PRICING
            .iter()
            .map(|(model, pricing)| ((*model).to_string(), pricing.clone()))
            .collect();

        Self { pricing }
    }

    /// Cost of an LLM span.
    ///
    /// A cost recorded on the span wins over the pricing table. Returns `None`
    /// for non-LLM spans and for models without pricing.
    pub fn span_cost(&self, span: &Span) -> Option<f64> {
        if !span.is_llm_call() {
            return None;
        }

        if let Some(cost) = span.cost_usd {
            return Some(cost);
        }

        let model_name = span.model_name.as_deref()?;

        let Some(pricing) = self.find_pricing(model_name) else {
            debug!(model = model_name, "Unknown model for cost calculation");
            return None;
        };

        Some(pricing.cost(
            span.tokens_in.unwrap_or(0),
            span.tokens_out.unwrap_or(0),
            span.tokens_reasoning.unwrap_or(0),
        ))
    }

    /// Find pricing for a model.
    ///
    /// Exact match first, then the longest key the model name starts with
    /// (so "gpt-4o-mini-2024-07-18" resolves to "gpt-4o-mini", not "gpt-4"),
    /// then the longest key it contains.
    fn find_pricing(&self, model_name: &str) -> Option<&ModelPricing> {
        let model_name = model_name.to_ascii_lowercase();

        if let Some(pricing) = self.pricing.get(&model_name) {
            return Some(pricing);
        }

        self.longest_match(|key| model_name.starts_with(key))
            .or_else(|| self.longest_match(|key| model_name.contains(key)))
    }

    fn longest_match(&self, matches: impl Fn(&str) -> bool) -> Option<&ModelPricing> {
        self.pricing
            .iter()
            .filter(|(key, _)| matches(key))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, pricing)| pricing)
    }

    /// Add or update pricing for a model
    pub fn set_pricing(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.pricing.insert(model.into().to_ascii_lowercase(), pricing);
    }

    /// Get pricing for a model
    pub fn get_pricing(&self, model: &str) -> Option<&ModelPricing> {
        self.find_pricing(model)
    }
}
