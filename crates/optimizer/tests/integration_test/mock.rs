//! In-process signal sources with scripted answers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use spotmix_core::{gib_to_mib, Combination, ResourceType, SignalError, SignalSource};
use spotmix_optimizer::{
    CatalogHints, CatalogPage, PlacementQuery, PlacementScores, PlacementSignal, PriceSignal,
    ResourceCatalog,
};

pub fn rt(name: &str, vcpus: u32, gib: f64) -> ResourceType {
    ResourceType::new(name, vcpus, gib_to_mib(gib)).unwrap()
}

/// Tracks concurrent calls across every mock sharing it.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// ── Catalog ──────────────────────────────────────────────────────────

pub struct MockCatalog {
    pub pages: Vec<Vec<ResourceType>>,
    pub fail: bool,
}

impl MockCatalog {
    pub fn single_page(items: Vec<ResourceType>) -> Self {
        Self {
            pages: vec![items],
            fail: false,
        }
    }

    /// One record per name, all 2 vCPU / 8 GiB, two per page.
    pub fn of(names: &[&str]) -> Self {
        let items: Vec<ResourceType> = names.iter().map(|n| rt(n, 2, 8.0)).collect();
        Self {
            pages: items.chunks(2).map(|c| c.to_vec()).collect(),
            fail: false,
        }
    }
}

#[async_trait]
impl ResourceCatalog for MockCatalog {
    async fn list_page(
        &self,
        _hints: &CatalogHints,
        next_token: Option<String>,
    ) -> Result<CatalogPage, SignalError> {
        if self.fail {
            return Err(SignalError::Transport {
                signal: SignalSource::Catalog,
                message: "endpoint unreachable".into(),
            });
        }
        let idx: usize = next_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let next = idx + 1;
        Ok(CatalogPage {
            items: self.pages.get(idx).cloned().unwrap_or_default(),
            next_token: (next < self.pages.len()).then(|| next.to_string()),
        })
    }
}

// ── Placement ────────────────────────────────────────────────────────

/// Answers with the per-type score of every member it knows.
#[derive(Default)]
pub struct MockPlacement {
    pub scores: HashMap<String, f64>,
    pub fail_for: HashSet<Combination>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<PlacementQuery>>,
    pub in_flight: Arc<InFlight>,
}

impl MockPlacement {
    pub fn with_scores(scores: &[(&str, f64)]) -> Self {
        Self {
            scores: scores.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Self::default()
        }
    }

    pub fn failing_for(mut self, combination: Combination) -> Self {
        self.fail_for.insert(combination);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlacementSignal for MockPlacement {
    async fn placement_scores(
        &self,
        query: &PlacementQuery,
    ) -> Result<PlacementScores, SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(query.clone());
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.exit();

        let combination = Combination::new(query.instance_types.iter().cloned());
        if self.fail_for.contains(&combination) {
            return Err(SignalError::Throttled {
                signal: SignalSource::Placement,
                message: "RequestLimitExceeded".into(),
            });
        }

        let scores: BTreeMap<String, f64> = query
            .instance_types
            .iter()
            .filter_map(|t| self.scores.get(t).map(|s| (t.clone(), *s)))
            .collect();
        Ok(scores)
    }
}

// ── Price ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockPrice {
    pub prices: HashMap<String, f64>,
    pub fail_for: HashSet<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub in_flight: Arc<InFlight>,
}

impl MockPrice {
    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSignal for MockPrice {
    async fn spot_price(&self, instance_type: &str) -> Result<Option<f64>, SignalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.in_flight.enter();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.exit();

        if self.fail_for.contains(instance_type) {
            return Err(SignalError::Transport {
                signal: SignalSource::Price,
                message: "timeout".into(),
            });
        }
        Ok(self.prices.get(instance_type).copied())
    }
}
