//! Deterministic ranking of evaluated combinations.

use std::cmp::Ordering;

use spotmix_core::{EvaluatedCombination, Evaluation};

/// Total order used for ranking:
///
/// 1. aggregate score, descending
/// 2. aggregate price, ascending (a missing price sorts after any price)
/// 3. sorted member list, lexicographic
pub fn compare(a: &EvaluatedCombination, b: &EvaluatedCombination) -> Ordering {
    b.aggregate_score
        .total_cmp(&a.aggregate_score)
        .then_with(|| compare_price(a.aggregate_price, b.aggregate_price))
        .then_with(|| a.members.cmp(&b.members))
}

fn compare_price(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Drop skipped evaluations, sort the rest with [`compare`] and keep the
/// first `top_k` (`None` keeps everything).
pub fn rank<I>(evaluations: I, top_k: Option<usize>) -> Vec<EvaluatedCombination>
where
    I: IntoIterator<Item = Evaluation>,
{
    let mut scored: Vec<EvaluatedCombination> = evaluations
        .into_iter()
        .filter_map(Evaluation::scored)
        .collect();
    scored.sort_by(compare);
    if let Some(k) = top_k {
        scored.truncate(k);
    }
    scored
}
