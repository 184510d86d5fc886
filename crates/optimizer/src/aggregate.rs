//! Per-combination signal aggregation.
//!
//! For one combination the [`Aggregator`] issues a single placement query
//! and one price query per member, then folds the answers into an
//! [`Evaluation`]. Placement data is mandatory: a failed or empty placement
//! answer skips the combination. Price data is best effort: failed lookups
//! are left out of the mean.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use spotmix_core::config::PlacementConfig;
use spotmix_core::{
    mean_of, Combination, EvaluatedCombination, Evaluation, SignalError, SignalSample,
    SignalSource, SkipReason,
};

use crate::signal::{PlacementQuery, PlacementScores, PlacementSignal, PriceSignal, SignalGate};

/// Evaluates combinations against shared signal sources.
///
/// Holds no per-combination state, so one instance serves every worker of a
/// run and repeated evaluations of the same combination against the same
/// answers produce the same result.
#[derive(Clone)]
pub struct Aggregator {
    placement: Arc<dyn PlacementSignal>,
    price: Arc<dyn PriceSignal>,
    gate: SignalGate,
    settings: PlacementConfig,
}

impl Aggregator {
    pub fn new(
        placement: Arc<dyn PlacementSignal>,
        price: Arc<dyn PriceSignal>,
        gate: SignalGate,
        settings: PlacementConfig,
    ) -> Self {
        Self {
            placement,
            price,
            gate,
            settings,
        }
    }

    pub fn gate(&self) -> &SignalGate {
        &self.gate
    }

    pub async fn evaluate(&self, combination: Combination) -> Evaluation {
        let floor = self.settings.min_types;
        if combination.len() < floor {
            debug!(
                combination = %combination,
                size = combination.len(),
                floor,
                "Combination below placement provider minimum"
            );
            return Evaluation::Skipped {
                reason: SkipReason::UnderProviderMinimum {
                    size: combination.len(),
                    floor,
                },
                members: combination,
            };
        }

        let scores = match self.query_placement(&combination).await {
            Ok(samples) => samples,
            Err(e) => {
                if e.is_throttled() {
                    warn!(
                        combination = %combination,
                        signal = %e.signal(),
                        error = %e,
                        "Placement query throttled, skipping combination"
                    );
                } else {
                    warn!(
                        combination = %combination,
                        signal = %e.signal(),
                        error = %e,
                        "Placement query failed, skipping combination"
                    );
                }
                return Evaluation::Skipped {
                    members: combination,
                    reason: SkipReason::PlacementFailed {
                        error: e.to_string(),
                    },
                };
            }
        };

        let prices = self.query_prices(&combination).await;
        combine(combination, &scores, &prices)
    }

    async fn query_placement(
        &self,
        combination: &Combination,
    ) -> Result<Vec<SignalSample>, SignalError> {
        let query = PlacementQuery {
            instance_types: combination.members().to_vec(),
            target_capacity: self.settings.target_capacity,
            capacity_unit: self.settings.capacity_unit,
            single_az: self.settings.single_az,
            regions: self.settings.regions.clone(),
        };

        let raw = {
            let _permit = self.gate.acquire().await;
            self.placement.placement_scores(&query).await?
        };
        placement_samples(raw)
    }

    async fn query_prices(&self, combination: &Combination) -> Vec<SignalSample> {
        let lookups = combination.members().iter().map(|name| async move {
            let result = {
                let _permit = self.gate.acquire().await;
                self.price.spot_price(name).await
            };
            match result {
                Ok(Some(price)) if price.is_finite() && price >= 0.0 => {
                    SignalSample::ok(name.as_str(), SignalSource::Price, price)
                }
                Ok(Some(price)) => {
                    warn!(instance_type = %name, price, "Discarding invalid spot price");
                    SignalSample::failed(name.as_str(), SignalSource::Price)
                }
                Ok(None) => {
                    debug!(instance_type = %name, "No spot price found");
                    SignalSample::failed(name.as_str(), SignalSource::Price)
                }
                Err(e) => {
                    warn!(instance_type = %name, error = %e, "Price lookup failed");
                    SignalSample::failed(name.as_str(), SignalSource::Price)
                }
            }
        });
        join_all(lookups).await
    }
}

/// Validate a placement answer. Any score outside `[0, 100]` makes the whole
/// answer malformed.
pub fn placement_samples(raw: PlacementScores) -> Result<Vec<SignalSample>, SignalError> {
    if let Some((key, score)) = raw
        .iter()
        .find(|(_, s)| !s.is_finite() || **s < 0.0 || **s > 100.0)
    {
        return Err(SignalError::Malformed {
            signal: SignalSource::Placement,
            message: format!("score {score} for '{key}' is outside 0..=100"),
        });
    }
    Ok(raw
        .into_iter()
        .map(|(key, score)| SignalSample::ok(key, SignalSource::Placement, score))
        .collect())
}

/// Fold placement and price samples into an [`Evaluation`].
///
/// No successful placement sample means no data, which skips the
/// combination. A score of zero is kept: it means "no confidence", not
/// "no answer".
pub fn combine(
    members: Combination,
    scores: &[SignalSample],
    prices: &[SignalSample],
) -> Evaluation {
    let Some(aggregate_score) = mean_of(scores) else {
        debug!(combination = %members, "No placement scores returned, skipping");
        return Evaluation::Skipped {
            members,
            reason: SkipReason::NoScores,
        };
    };

    let evaluated = EvaluatedCombination {
        aggregate_score,
        aggregate_price: mean_of(prices),
        sample_count: scores.iter().filter(|s| s.is_success()).count(),
        price_sample_count: prices.iter().filter(|s| s.is_success()).count(),
        members,
    };
    debug!(
        combination = %evaluated.members,
        score = evaluated.aggregate_score,
        price = ?evaluated.aggregate_price,
        "Combination evaluated"
    );
    Evaluation::Scored(evaluated)
}
