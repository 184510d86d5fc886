use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::evaluation::EvaluatedCombination;

/// Why an optimization run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Every generated combination was evaluated.
    Completed,
    /// The catalog filter produced no candidates.
    NoCandidates,
    /// `max_combinations` was reached before the generator ran out.
    CombinationBudget,
    /// The wall-clock budget elapsed.
    TimeBudget,
    /// The caller's stop signal fired.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::Completed => "completed",
            StopReason::NoCandidates => "no candidates",
            StopReason::CombinationBudget => "combination budget reached",
            StopReason::TimeBudget => "time budget elapsed",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Eligible resource types after filtering.
    pub candidates: usize,
    /// Combinations whose evaluation finished (scored or skipped).
    pub attempted: usize,
    pub scored: usize,
    pub skipped: usize,
    /// Entries kept in the report after top-K truncation.
    pub ranked: usize,
    pub stop: StopReason,
}

impl RunStats {
    pub fn empty(stop: StopReason) -> Self {
        Self {
            candidates: 0,
            attempted: 0,
            scored: 0,
            skipped: 0,
            ranked: 0,
            stop,
        }
    }

    /// True when the run ended before the generator was exhausted.
    pub fn is_partial(&self) -> bool {
        matches!(
            self.stop,
            StopReason::CombinationBudget | StopReason::TimeBudget | StopReason::Cancelled
        )
    }
}

/// Terminal artifact of one optimization run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub entries: Vec<EvaluatedCombination>,
    pub stats: RunStats,
}

impl RankedReport {
    pub fn new(entries: Vec<EvaluatedCombination>, stats: RunStats) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            entries,
            stats,
        }
    }

    pub fn empty(stop: StopReason) -> Self {
        Self::new(Vec::new(), RunStats::empty(stop))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn best(&self) -> Option<&EvaluatedCombination> {
        self.entries.first()
    }
}
