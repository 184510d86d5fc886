//! Integration tests for spotmix-optimizer.
//!
//! Every external source is an in-process mock; no AWS credentials needed.

mod aggregate;
mod mock;
mod run;
