//! Optimizer error types.
//!
//! Only run-fatal failures appear here. Per-combination signal failures
//! are absorbed by the aggregator and surface as skipped evaluations.

use thiserror::Error;

use spotmix_core::{CoreError, SignalError};

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("resource catalog unavailable: {0}")]
    CatalogUnavailable(#[source] SignalError),

    #[error(transparent)]
    Config(#[from] CoreError),
}
