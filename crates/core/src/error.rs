use thiserror::Error;

use crate::evaluation::SignalSource;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid resource type {name}: {reason}")]
    InvalidResource { name: String, reason: String },
}

/// Failure of a single external signal or catalog call.
///
/// These never abort a run on their own: the optimizer decides whether a
/// failure is fatal (catalog listing) or absorbed (per-combination signals).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    #[error("{signal} request throttled: {message}")]
    Throttled {
        signal: SignalSource,
        message: String,
    },

    #[error("{signal} transport error: {message}")]
    Transport {
        signal: SignalSource,
        message: String,
    },

    #[error("{signal} returned a malformed response: {message}")]
    Malformed {
        signal: SignalSource,
        message: String,
    },
}

impl SignalError {
    pub fn signal(&self) -> SignalSource {
        match self {
            SignalError::Throttled { signal, .. }
            | SignalError::Transport { signal, .. }
            | SignalError::Malformed { signal, .. } => *signal,
        }
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, SignalError::Throttled { .. })
    }
}
