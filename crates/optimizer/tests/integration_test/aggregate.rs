use std::sync::Arc;
use std::time::Duration;

use spotmix_core::config::{CapacityUnit, PlacementConfig};
use spotmix_core::{Combination, Evaluation, SkipReason};
use spotmix_optimizer::{Aggregator, SignalGate};

use crate::mock::{InFlight, MockPlacement, MockPrice};

fn aggregator(placement: MockPlacement, price: MockPrice, max_in_flight: usize) -> Aggregator {
    Aggregator::new(
        Arc::new(placement),
        Arc::new(price),
        SignalGate::new(max_in_flight),
        PlacementConfig::default(),
    )
}

#[tokio::test]
async fn test_scenario_xyz() {
    let agg = aggregator(
        MockPlacement::with_scores(&[("x", 80.0), ("y", 60.0), ("z", 0.0)]),
        MockPrice::with_prices(&[("x", 0.10), ("y", 0.12)]),
        4,
    );

    let eval = agg
        .evaluate(Combination::new(["x", "y", "z"]))
        .await
        .scored()
        .expect("combination should be scored");

    assert!((eval.aggregate_score - 46.67).abs() < 0.01);
    assert!((eval.aggregate_price.unwrap() - 0.11).abs() < 1e-9);
    assert_eq!(eval.sample_count, 3);
    assert_eq!(eval.price_sample_count, 2);
}

#[tokio::test]
async fn test_evaluation_is_idempotent() {
    let agg = aggregator(
        MockPlacement::with_scores(&[("a", 9.0), ("b", 3.0), ("c", 6.0)]),
        MockPrice::with_prices(&[("a", 0.2), ("b", 0.3), ("c", 0.4)]),
        2,
    );
    let combo = Combination::new(["a", "b", "c"]);

    let first = agg.evaluate(combo.clone()).await;
    let second = agg.evaluate(combo).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_placement_failure_skips() {
    let combo = Combination::new(["a", "b", "c"]);
    let agg = aggregator(
        MockPlacement::with_scores(&[("a", 9.0), ("b", 9.0), ("c", 9.0)])
            .failing_for(combo.clone()),
        MockPrice::with_prices(&[("a", 0.2)]),
        4,
    );

    match agg.evaluate(combo.clone()).await {
        Evaluation::Skipped { members, reason } => {
            assert_eq!(members, combo);
            match reason {
                SkipReason::PlacementFailed { error } => {
                    assert!(error.contains("throttled"), "unexpected error: {error}")
                }
                other => panic!("unexpected skip reason: {other:?}"),
            }
        }
        Evaluation::Scored(e) => panic!("expected skip, got {e:?}"),
    }
}

#[tokio::test]
async fn test_empty_placement_answer_skips() {
    let agg = aggregator(MockPlacement::default(), MockPrice::default(), 4);

    let eval = agg.evaluate(Combination::new(["a", "b", "c"])).await;

    assert!(matches!(
        eval,
        Evaluation::Skipped {
            reason: SkipReason::NoScores,
            ..
        }
    ));
}

#[tokio::test]
async fn test_price_failures_do_not_skip() {
    let mut price = MockPrice::with_prices(&[("a", 0.2), ("b", 0.4)]);
    price.fail_for.insert("b".into());
    let agg = aggregator(
        MockPlacement::with_scores(&[("a", 5.0), ("b", 5.0), ("c", 5.0)]),
        price,
        4,
    );

    let eval = agg
        .evaluate(Combination::new(["a", "b", "c"]))
        .await
        .scored()
        .unwrap();

    assert_eq!(eval.aggregate_price, Some(0.2));
    assert_eq!(eval.price_sample_count, 1);
}

#[tokio::test]
async fn test_no_prices_leaves_price_absent() {
    let agg = aggregator(
        MockPlacement::with_scores(&[("a", 5.0)]),
        MockPrice::default(),
        4,
    );

    let eval = agg
        .evaluate(Combination::new(["a", "b", "c"]))
        .await
        .scored()
        .unwrap();

    assert_eq!(eval.aggregate_score, 5.0);
    assert_eq!(eval.aggregate_price, None);
}

#[tokio::test]
async fn test_below_provider_floor_is_not_queried() {
    let placement = Arc::new(MockPlacement::with_scores(&[("a", 5.0), ("b", 5.0)]));
    let price = Arc::new(MockPrice::default());
    let agg = Aggregator::new(
        placement.clone(),
        price.clone(),
        SignalGate::new(4),
        PlacementConfig::default(),
    );

    let eval = agg.evaluate(Combination::new(["a", "b"])).await;

    assert_eq!(
        eval,
        Evaluation::Skipped {
            members: Combination::new(["a", "b"]),
            reason: SkipReason::UnderProviderMinimum { size: 2, floor: 3 },
        }
    );
    assert_eq!(placement.calls(), 0);
    assert_eq!(price.calls(), 0);
}

#[tokio::test]
async fn test_configurable_floor() {
    let placement = Arc::new(MockPlacement::with_scores(&[("a", 5.0)]));
    let agg = Aggregator::new(
        placement.clone(),
        Arc::new(MockPrice::default()),
        SignalGate::new(4),
        PlacementConfig {
            min_types: 1,
            ..PlacementConfig::default()
        },
    );

    let eval = agg.evaluate(Combination::new(["a"])).await;

    assert!(!eval.is_skipped());
    assert_eq!(placement.calls(), 1);
}

#[tokio::test]
async fn test_query_carries_placement_settings() {
    let placement = Arc::new(MockPlacement::with_scores(&[("a", 1.0)]));
    let agg = Aggregator::new(
        placement.clone(),
        Arc::new(MockPrice::default()),
        SignalGate::new(4),
        PlacementConfig {
            min_types: 3,
            target_capacity: 12,
            capacity_unit: CapacityUnit::Vcpu,
            single_az: true,
            regions: vec!["eu-west-1".into(), "us-east-2".into()],
        },
    );

    agg.evaluate(Combination::new(["c", "a", "b"])).await;

    let queries = placement.queries.lock().unwrap();
    assert_eq!(queries.len(), 1);
    let q = &queries[0];
    assert_eq!(q.instance_types, vec!["a", "b", "c"]);
    assert_eq!(q.target_capacity, 12);
    assert_eq!(q.capacity_unit, CapacityUnit::Vcpu);
    assert!(q.single_az);
    assert_eq!(q.regions, vec!["eu-west-1", "us-east-2"]);
}

#[tokio::test(start_paused = true)]
async fn test_gate_caps_in_flight_queries() {
    let in_flight = Arc::new(InFlight::default());
    let mut placement = MockPlacement::with_scores(&[("a", 1.0), ("b", 1.0), ("c", 1.0)]);
    placement.delay = Some(Duration::from_millis(50));
    placement.in_flight = in_flight.clone();
    let mut price = MockPrice::with_prices(&[("a", 0.1), ("b", 0.1), ("c", 0.1), ("d", 0.1)]);
    price.delay = Some(Duration::from_millis(50));
    price.in_flight = in_flight.clone();

    let agg = aggregator(placement, price, 2);
    let combos = [
        Combination::new(["a", "b", "c"]),
        Combination::new(["a", "b", "d"]),
        Combination::new(["b", "c", "d"]),
    ];

    let results =
        futures::future::join_all(combos.iter().cloned().map(|c| agg.evaluate(c))).await;

    assert_eq!(results.len(), 3);
    assert!(in_flight.peak() <= 2, "peak in flight was {}", in_flight.peak());
    assert_eq!(agg.gate().available(), 2);
}
