//! Cross-run aggregation

use crate::models::{AggregateMetrics, RunSummary};

/// Reduce successfully computed runs into one summary.
///
/// Callers pass only successful runs; [`RunSummary`] exists only for those.
/// Empty input yields zero totals and no averages.
pub fn compute_aggregate_metrics<'a, I>(runs: I) -> AggregateMetrics
where
    I: IntoIterator<Item = &'a RunSummary>,
{
    let mut aggregate = AggregateMetrics::default();
    let mut priced_runs = 0u64;

    for run in runs {
        aggregate.run_count += 1;
        aggregate.total_tokens = aggregate.total_tokens.saturating_add(run.total_tokens);
        aggregate.total_input_tokens = aggregate.total_input_tokens.saturating_add(run.input_tokens);
        aggregate.total_output_tokens = aggregate.total_output_tokens.saturating_add(run.output_tokens);
        aggregate.total_llm_calls = aggregate.total_llm_calls.saturating_add(run.llm_calls);
        aggregate.total_tool_calls = aggregate.total_tool_calls.saturating_add(run.tool_calls);
        aggregate.total_duration_ms += run.duration_ms;

        match run.cost_usd {
            Some(cost) => {
                aggregate.total_cost_usd += cost;
                priced_runs += 1;
            }
            None => aggregate.unpriced_runs += 1,
        }

        aggregate.min_duration_ms = Some(aggregate.min_duration_ms.map_or(run.duration_ms, |m| m.min(run.duration_ms)));
        aggregate.max_duration_ms = Some(aggregate.max_duration_ms.map_or(run.duration_ms, |m| m.max(run.duration_ms)));
    }

    if aggregate.run_count > 0 {
        let runs = aggregate.run_count as f64;
        aggregate.avg_duration_ms = Some(aggregate.total_duration_ms / runs);
        aggregate.avg_tokens_per_run = Some(aggregate.total_tokens as f64 / runs);
    }

    if priced_runs > 0 {
        aggregate.avg_cost_usd = Some(aggregate.total_cost_usd / priced_runs as f64);
    }

    aggregate
}
