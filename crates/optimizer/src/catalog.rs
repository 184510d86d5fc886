//! Resource catalog filtering.
//!
//! Drains the paginated resource universe and keeps the types matching the
//! active [`CandidateFilter`]. The resulting [`CandidateSet`] is ordered by
//! identifier, which is the fixed indexing the combination generator uses.

use std::collections::BTreeMap;

use tracing::{debug, info};

use spotmix_core::{CandidateFilter, ResourceType};

use crate::error::OptimizerError;
use crate::signal::{CatalogHints, ResourceCatalog};

/// Eligible resource types, unique by identifier, sorted by identifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    types: BTreeMap<String, ResourceType>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ResourceType> {
        self.types.get(name)
    }

    /// Identifiers in generator order.
    pub fn names(&self) -> Vec<String> {
        self.types.keys().cloned().collect()
    }
}

impl FromIterator<ResourceType> for CandidateSet {
    fn from_iter<I: IntoIterator<Item = ResourceType>>(iter: I) -> Self {
        let mut types = BTreeMap::new();
        for rt in iter {
            types.entry(rt.name.clone()).or_insert(rt);
        }
        Self { types }
    }
}

/// Keep the records that satisfy `filter`. Accepts any batching of the
/// universe; duplicates across batches collapse to the first record seen.
pub fn filter_universe<I>(filter: &CandidateFilter, batches: I) -> CandidateSet
where
    I: IntoIterator<Item = Vec<ResourceType>>,
{
    batches
        .into_iter()
        .flatten()
        .filter(|rt| filter.accepts(rt))
        .collect()
}

/// Page through `catalog` and filter every record.
///
/// Any page failure aborts with [`OptimizerError::CatalogUnavailable`]: a
/// partially listed universe cannot be told apart from a complete one.
pub async fn load_candidates(
    catalog: &dyn ResourceCatalog,
    filter: &CandidateFilter,
) -> Result<CandidateSet, OptimizerError> {
    let hints = CatalogHints::for_constraint(&filter.constraint);
    let mut candidates = CandidateSet::default();
    let mut next_token: Option<String> = None;
    let mut pages = 0usize;
    let mut seen = 0usize;

    loop {
        let page = catalog
            .list_page(&hints, next_token.take())
            .await
            .map_err(OptimizerError::CatalogUnavailable)?;
        pages += 1;
        seen += page.items.len();

        for rt in page.items {
            if filter.accepts(&rt) {
                candidates.types.entry(rt.name.clone()).or_insert(rt);
            }
        }

        debug!(page = pages, eligible = candidates.len(), "Catalog page filtered");

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    info!(
        pages,
        seen,
        eligible = candidates.len(),
        "Resource catalog filtered"
    );
    Ok(candidates)
}
