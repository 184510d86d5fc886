pub mod aggregate;
pub mod catalog;
pub mod combinations;
pub mod error;
pub mod rank;
pub mod run;
pub mod signal;

pub use aggregate::Aggregator;
pub use catalog::{filter_universe, load_candidates, CandidateSet};
pub use combinations::Combinations;
pub use error::OptimizerError;
pub use rank::{compare, rank};
pub use run::Optimizer;
pub use signal::{
    CatalogHints, CatalogPage, PlacementQuery, PlacementScores, PlacementSignal, PriceSignal,
    ResourceCatalog, SignalGate,
};
