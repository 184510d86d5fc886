//! One optimization pass: filter, generate, evaluate, rank.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::time::Instant;
use tracing::{info, warn};

use spotmix_core::config::OptimizerConfig;
use spotmix_core::{
    CandidateFilter, Combination, Evaluation, RankedReport, RunStats, StopReason,
};

use crate::aggregate::Aggregator;
use crate::catalog::load_candidates;
use crate::combinations::Combinations;
use crate::error::OptimizerError;
use crate::rank::rank;
use crate::signal::{PlacementSignal, PriceSignal, ResourceCatalog, SignalGate};

/// Completed evaluations between progress log lines.
const PROGRESS_EVERY: usize = 100;

/// Runs the combination optimizer against a set of external sources.
///
/// The sources are shared read-only by every evaluation worker; the
/// optimizer itself carries no state between runs.
pub struct Optimizer {
    catalog: Arc<dyn ResourceCatalog>,
    placement: Arc<dyn PlacementSignal>,
    price: Arc<dyn PriceSignal>,
    config: OptimizerConfig,
}

impl Optimizer {
    pub fn new(
        catalog: Arc<dyn ResourceCatalog>,
        placement: Arc<dyn PlacementSignal>,
        price: Arc<dyn PriceSignal>,
        config: OptimizerConfig,
    ) -> Self {
        Self {
            catalog,
            placement,
            price,
            config,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Run to completion (or until a configured budget is exhausted).
    pub async fn run(&self, filter: &CandidateFilter) -> Result<RankedReport, OptimizerError> {
        self.run_until(filter, std::future::pending::<()>()).await
    }

    /// Run until done, a budget is exhausted, or `stop` resolves.
    ///
    /// Stopping early drops in-flight evaluations; everything that already
    /// finished is still ranked.
    pub async fn run_until<F>(
        &self,
        filter: &CandidateFilter,
        stop: F,
    ) -> Result<RankedReport, OptimizerError>
    where
        F: Future<Output = ()>,
    {
        let started = Instant::now();
        self.config.validate()?;
        filter.constraint.validate()?;

        let candidates = load_candidates(self.catalog.as_ref(), filter).await?;
        if candidates.is_empty() {
            info!(constraint = ?filter.constraint, "No eligible resource types, nothing to optimize");
            return Ok(RankedReport::empty(StopReason::NoCandidates));
        }

        let combinations = Combinations::new(candidates.names(), self.config.min_group_size);
        info!(
            candidates = candidates.len(),
            min_group_size = combinations.min_size(),
            combinations = combinations.total(),
            budget = ?self.config.max_combinations,
            "Starting combination evaluation"
        );

        let (evaluations, stop_reason) = self.evaluate(combinations, started, stop).await;

        let skipped = evaluations.iter().filter(|e| e.is_skipped()).count();
        let attempted = evaluations.len();
        let entries = rank(evaluations, self.config.top_k);
        let stats = RunStats {
            candidates: candidates.len(),
            attempted,
            scored: attempted - skipped,
            skipped,
            ranked: entries.len(),
            stop: stop_reason,
        };

        info!(
            attempted = stats.attempted,
            scored = stats.scored,
            skipped = stats.skipped,
            ranked = stats.ranked,
            stop = %stats.stop,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Optimization finished"
        );

        Ok(RankedReport::new(entries, stats))
    }

    /// Evaluate combinations on a bounded worker pool, collecting results in
    /// completion order.
    async fn evaluate<I, F>(
        &self,
        mut combinations: I,
        started: Instant,
        stop: F,
    ) -> (Vec<Evaluation>, StopReason)
    where
        I: Iterator<Item = Combination>,
        F: Future<Output = ()>,
    {
        let aggregator = Aggregator::new(
            Arc::clone(&self.placement),
            Arc::clone(&self.price),
            SignalGate::new(self.config.max_in_flight),
            self.config.placement.clone(),
        );
        let limit = self.config.max_combinations.unwrap_or(usize::MAX);
        let time_budget = self.config.time_budget;

        let mut evaluations = Vec::new();
        let interrupted = {
            let mut results = stream::iter(combinations.by_ref().take(limit))
                .map(|c| aggregator.evaluate(c))
                .buffer_unordered(self.config.concurrency);

            let deadline = async {
                match time_budget {
                    Some(budget) => tokio::time::sleep_until(started + budget).await,
                    None => std::future::pending::<()>().await,
                }
            };
            tokio::pin!(deadline);
            tokio::pin!(stop);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop => break Some(StopReason::Cancelled),
                    _ = &mut deadline => break Some(StopReason::TimeBudget),
                    next = results.next() => match next {
                        Some(evaluation) => {
                            evaluations.push(evaluation);
                            if evaluations.len() % PROGRESS_EVERY == 0 {
                                info!(completed = evaluations.len(), "Evaluation progress");
                            }
                        }
                        None => break None,
                    },
                }
            }
        };

        let stop_reason = match interrupted {
            Some(reason) => {
                warn!(
                    reason = %reason,
                    completed = evaluations.len(),
                    "Evaluation stopped early, ranking partial results"
                );
                reason
            }
            None if combinations.next().is_some() => {
                info!(limit, "Combination budget reached");
                StopReason::CombinationBudget
            }
            None => StopReason::Completed,
        };

        (evaluations, stop_reason)
    }
}
