//! EC2 error types and SDK error classification.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

use spotmix_core::{CoreError, SignalError, SignalSource};

/// Error codes EC2 uses when a caller exceeds its request rate.
const THROTTLING_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
];

#[derive(Debug, Error)]
pub enum Ec2Error {
    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Config(#[from] CoreError),
}

/// Map an SDK failure onto the optimizer's signal error taxonomy.
pub fn classify<E>(signal: SignalSource, err: &E) -> SignalError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let message = DisplayErrorContext(err).to_string();
    match err.code() {
        Some(code) if is_throttling_code(code) => SignalError::Throttled { signal, message },
        _ => SignalError::Transport { signal, message },
    }
}

pub fn is_throttling_code(code: &str) -> bool {
    THROTTLING_CODES.contains(&code)
}
