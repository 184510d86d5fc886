//! External signal and catalog interfaces consumed by the optimizer.
//!
//! Implementations live outside this crate (`spotmix-ec2` for AWS, in-process
//! mocks for tests). The optimizer only depends on these traits and shares
//! one instance of each across all workers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};

use spotmix_core::config::CapacityUnit;
use spotmix_core::{gib_to_mib, ResourceConstraint, ResourceType, SignalError};

// ── Catalog ──────────────────────────────────────────────────────────

/// Server-side filtering the catalog may apply. Purely an optimization:
/// every returned record is re-checked against the full predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogHints {
    pub exact_vcpus: Option<u32>,
    pub exact_memory_mib: Option<u64>,
    /// Only types purchasable as spot capacity.
    pub spot_only: bool,
}

impl CatalogHints {
    pub fn for_constraint(constraint: &ResourceConstraint) -> Self {
        match *constraint {
            ResourceConstraint::Exact { vcpus, memory_gib } => Self {
                exact_vcpus: Some(vcpus),
                exact_memory_mib: Some(gib_to_mib(memory_gib)),
                spot_only: true,
            },
            ResourceConstraint::Threshold { .. } => Self {
                spot_only: true,
                ..Self::default()
            },
        }
    }
}

/// One page of the resource universe.
#[derive(Debug, Clone, Default)]
pub struct CatalogPage {
    pub items: Vec<ResourceType>,
    /// Token for the next page; `None` on the last page.
    pub next_token: Option<String>,
}

#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Fetch one page of resource types. `next_token` is `None` for the first page.
    async fn list_page(
        &self,
        hints: &CatalogHints,
        next_token: Option<String>,
    ) -> Result<CatalogPage, SignalError>;
}

// ── Placement ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementQuery {
    pub instance_types: Vec<String>,
    pub target_capacity: u32,
    pub capacity_unit: CapacityUnit,
    pub single_az: bool,
    pub regions: Vec<String>,
}

/// Scores keyed by whatever scope the provider scored (instance type,
/// region, or availability zone). Values are expected in `[0, 100]`.
pub type PlacementScores = BTreeMap<String, f64>;

#[async_trait]
pub trait PlacementSignal: Send + Sync {
    async fn placement_scores(&self, query: &PlacementQuery)
        -> Result<PlacementScores, SignalError>;
}

// ── Price ────────────────────────────────────────────────────────────

#[async_trait]
pub trait PriceSignal: Send + Sync {
    /// Latest spot price for one instance type; `Ok(None)` when the provider
    /// has no price for it.
    async fn spot_price(&self, instance_type: &str) -> Result<Option<f64>, SignalError>;
}

// ── Rate control ─────────────────────────────────────────────────────

/// Caps signal queries in flight across every worker of a run.
#[derive(Debug, Clone)]
pub struct SignalGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl SignalGate {
    pub fn new(max_in_flight: usize) -> Self {
        let capacity = max_in_flight.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        // The semaphore is never closed, so acquire cannot fail.
        match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("signal gate semaphore closed"),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
