use std::fmt;

use serde::{Deserialize, Serialize};

use crate::combination::Combination;

/// External source a signal value (or failure) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Catalog,
    Placement,
    Price,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSource::Catalog => write!(f, "catalog"),
            SignalSource::Placement => write!(f, "placement"),
            SignalSource::Price => write!(f, "price"),
        }
    }
}

/// One per-type (or per-scope) signal observation. `value` is `None` when
/// the lookup failed or found nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSample {
    pub key: String,
    pub source: SignalSource,
    pub value: Option<f64>,
}

impl SignalSample {
    pub fn ok(key: impl Into<String>, source: SignalSource, value: f64) -> Self {
        Self {
            key: key.into(),
            source,
            value: Some(value),
        }
    }

    pub fn failed(key: impl Into<String>, source: SignalSource) -> Self {
        Self {
            key: key.into(),
            source,
            value: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// Arithmetic mean of the successful samples, `None` if there are none.
pub fn mean_of(samples: &[SignalSample]) -> Option<f64> {
    let values: Vec<f64> = samples.iter().filter_map(|s| s.value).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// A combination with placement data, eligible for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedCombination {
    pub members: Combination,
    /// Mean placement score in `[0, 100]`.
    pub aggregate_score: f64,
    /// Mean spot price over types with a price; `None` when no price was found.
    pub aggregate_price: Option<f64>,
    /// Placement scores the mean was computed from.
    pub sample_count: usize,
    pub price_sample_count: usize,
}

/// Why a combination was left out of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Fewer members than the placement provider accepts.
    UnderProviderMinimum { size: usize, floor: usize },
    /// The placement query failed (transport, throttling, malformed data).
    PlacementFailed { error: String },
    /// The placement query succeeded but returned no scores.
    NoScores,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnderProviderMinimum { size, floor } => {
                write!(f, "{size} types is below the provider minimum of {floor}")
            }
            SkipReason::PlacementFailed { error } => write!(f, "placement query failed: {error}"),
            SkipReason::NoScores => write!(f, "placement query returned no scores"),
        }
    }
}

/// Outcome of evaluating one combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Evaluation {
    Scored(EvaluatedCombination),
    Skipped {
        members: Combination,
        reason: SkipReason,
    },
}

impl Evaluation {
    pub fn members(&self) -> &Combination {
        match self {
            Evaluation::Scored(e) => &e.members,
            Evaluation::Skipped { members, .. } => members,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Evaluation::Skipped { .. })
    }

    pub fn scored(self) -> Option<EvaluatedCombination> {
        match self {
            Evaluation::Scored(e) => Some(e),
            Evaluation::Skipped { .. } => None,
        }
    }
}
