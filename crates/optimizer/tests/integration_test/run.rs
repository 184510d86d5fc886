use std::sync::Arc;
use std::time::Duration;

use spotmix_core::config::OptimizerConfig;
use spotmix_core::{CandidateFilter, Combination, ResourceConstraint, StopReason};
use spotmix_optimizer::{Optimizer, OptimizerError};

use crate::mock::{rt, MockCatalog, MockPlacement, MockPrice};

fn exact_2x8() -> CandidateFilter {
    CandidateFilter::new(ResourceConstraint::Exact {
        vcpus: 2,
        memory_gib: 8.0,
    })
}

fn optimizer(
    catalog: MockCatalog,
    placement: MockPlacement,
    price: MockPrice,
    config: OptimizerConfig,
) -> Optimizer {
    Optimizer::new(
        Arc::new(catalog),
        Arc::new(placement),
        Arc::new(price),
        config,
    )
}

fn abcd_scores() -> MockPlacement {
    MockPlacement::with_scores(&[("a", 9.0), ("b", 7.0), ("c", 5.0), ("d", 3.0)])
}

fn abcd_prices() -> MockPrice {
    MockPrice::with_prices(&[("a", 0.04), ("b", 0.03), ("c", 0.02), ("d", 0.01)])
}

#[tokio::test]
async fn test_full_run_ranks_every_combination() {
    let opt = optimizer(
        MockCatalog::of(&["d", "c", "b", "a"]),
        abcd_scores(),
        abcd_prices(),
        OptimizerConfig::default(),
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.stats.candidates, 4);
    assert_eq!(report.stats.attempted, 5);
    assert_eq!(report.stats.skipped, 0);
    assert_eq!(report.stats.ranked, 5);
    assert_eq!(report.stats.stop, StopReason::Completed);

    let order: Vec<String> = report.entries.iter().map(|e| e.members.to_string()).collect();
    assert_eq!(
        order,
        vec!["a, b, c", "a, b, d", "a, b, c, d", "a, c, d", "b, c, d"]
    );
    assert_eq!(report.best().unwrap().aggregate_score, 7.0);
}

#[tokio::test]
async fn test_top_k_truncates_report() {
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        abcd_scores(),
        abcd_prices(),
        OptimizerConfig {
            top_k: Some(2),
            ..OptimizerConfig::default()
        },
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.entries.len(), 2);
    assert_eq!(report.stats.ranked, 2);
    assert_eq!(report.stats.scored, 5);
}

#[tokio::test]
async fn test_one_failure_among_many_is_isolated() {
    let failing = Combination::new(["a", "c", "d"]);
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        abcd_scores().failing_for(failing.clone()),
        abcd_prices(),
        OptimizerConfig {
            concurrency: 3,
            ..OptimizerConfig::default()
        },
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.stats.attempted, 5);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.entries.len(), 4);
    assert!(report.entries.iter().all(|e| e.members != failing));
}

#[tokio::test]
async fn test_scenario_c1_fails_c2_succeeds() {
    // The first two generated combinations are {a,b,c} and {a,b,d}.
    let c1 = Combination::new(["a", "b", "c"]);
    let c2 = Combination::new(["a", "b", "d"]);
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        abcd_scores().failing_for(c1),
        abcd_prices(),
        OptimizerConfig {
            max_combinations: Some(2),
            ..OptimizerConfig::default()
        },
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].members, c2);
    assert_eq!(report.stats.skipped, 1);
    assert_eq!(report.stats.ranked, 1);
    assert_eq!(report.stats.stop, StopReason::CombinationBudget);
}

#[tokio::test]
async fn test_budget_equal_to_total_completes() {
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        abcd_scores(),
        abcd_prices(),
        OptimizerConfig {
            max_combinations: Some(5),
            ..OptimizerConfig::default()
        },
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.stats.attempted, 5);
    assert_eq!(report.stats.stop, StopReason::Completed);
}

#[tokio::test]
async fn test_empty_candidate_set_is_not_an_error() {
    let opt = optimizer(
        MockCatalog::single_page(vec![rt("m5a.large", 2, 8.0), rt("c6a.large", 2, 4.0)]),
        abcd_scores(),
        abcd_prices(),
        OptimizerConfig::default(),
    );
    let unsatisfiable = CandidateFilter::new(ResourceConstraint::Exact {
        vcpus: 3,
        memory_gib: 5.0,
    });

    let report = opt.run(&unsatisfiable).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(report.stats.stop, StopReason::NoCandidates);
    assert_eq!(report.stats.attempted, 0);
}

#[tokio::test]
async fn test_all_skipped_yields_empty_report() {
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        MockPlacement::default(),
        abcd_prices(),
        OptimizerConfig::default(),
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(report.stats.attempted, 5);
    assert_eq!(report.stats.skipped, 5);
    assert_eq!(report.stats.stop, StopReason::Completed);
}

#[tokio::test]
async fn test_catalog_failure_is_fatal() {
    let opt = optimizer(
        MockCatalog {
            pages: vec![],
            fail: true,
        },
        abcd_scores(),
        abcd_prices(),
        OptimizerConfig::default(),
    );

    let err = opt.run(&exact_2x8()).await.unwrap_err();
    assert!(matches!(err, OptimizerError::CatalogUnavailable(_)));
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c"]),
        abcd_scores(),
        abcd_prices(),
        OptimizerConfig {
            concurrency: 0,
            ..OptimizerConfig::default()
        },
    );

    let err = opt.run(&exact_2x8()).await.unwrap_err();
    assert!(matches!(err, OptimizerError::Config(_)));
}

#[tokio::test]
async fn test_small_groups_skip_under_provider_floor() {
    let placement = Arc::new(MockPlacement::with_scores(&[
        ("a", 4.0),
        ("b", 4.0),
        ("c", 4.0),
    ]));
    let opt = Optimizer::new(
        Arc::new(MockCatalog::of(&["a", "b", "c"])),
        placement.clone(),
        Arc::new(MockPrice::default()),
        OptimizerConfig {
            min_group_size: 2,
            ..OptimizerConfig::default()
        },
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.stats.attempted, 4);
    assert_eq!(report.stats.skipped, 3);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.entries[0].members, Combination::new(["a", "b", "c"]));
    assert_eq!(placement.calls(), 1);
}

#[tokio::test]
async fn test_runs_are_deterministic() {
    let run = || async {
        optimizer(
            MockCatalog::of(&["a", "b", "c", "d", "e"]),
            MockPlacement::with_scores(&[
                ("a", 5.0),
                ("b", 5.0),
                ("c", 5.0),
                ("d", 5.0),
                ("e", 5.0),
            ]),
            MockPrice::with_prices(&[
                ("a", 0.25),
                ("b", 0.25),
                ("c", 0.25),
                ("d", 0.25),
                ("e", 0.25),
            ]),
            OptimizerConfig {
                concurrency: 8,
                ..OptimizerConfig::default()
            },
        )
        .run(&exact_2x8())
        .await
        .unwrap()
    };

    let first = run().await;
    let second = run().await;

    assert_eq!(first.entries, second.entries);
    // Every score and price ties, so member order decides.
    assert_eq!(first.entries[0].members, Combination::new(["a", "b", "c"]));
    assert_eq!(first.entries.len(), 16);
}

#[tokio::test(start_paused = true)]
async fn test_time_budget_keeps_partial_results() {
    let mut placement = abcd_scores();
    placement.delay = Some(Duration::from_secs(1));
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        placement,
        abcd_prices(),
        OptimizerConfig {
            concurrency: 1,
            time_budget: Some(Duration::from_millis(2500)),
            ..OptimizerConfig::default()
        },
    );

    let report = opt.run(&exact_2x8()).await.unwrap();

    assert_eq!(report.stats.stop, StopReason::TimeBudget);
    assert_eq!(report.stats.attempted, 2);
    assert_eq!(report.entries.len(), 2);
    assert!(report.stats.is_partial());
}

#[tokio::test(start_paused = true)]
async fn test_stop_signal_keeps_partial_results() {
    let mut placement = abcd_scores();
    placement.delay = Some(Duration::from_secs(1));
    let opt = optimizer(
        MockCatalog::of(&["a", "b", "c", "d"]),
        placement,
        abcd_prices(),
        OptimizerConfig {
            concurrency: 1,
            ..OptimizerConfig::default()
        },
    );

    let report = opt
        .run_until(&exact_2x8(), tokio::time::sleep(Duration::from_millis(1500)))
        .await
        .unwrap();

    assert_eq!(report.stats.stop, StopReason::Cancelled);
    assert_eq!(report.stats.attempted, 1);
    assert_eq!(report.entries[0].members, Combination::new(["a", "b", "c"]));
}
