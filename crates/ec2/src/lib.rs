//! AWS EC2 implementations of the optimizer's external signals.
//!
//! - [`Ec2Signals`]: resource catalog (`DescribeInstanceTypes`), placement
//!   scores (`GetSpotPlacementScores`) and spot prices
//!   (`DescribeSpotPriceHistory`) behind one SDK client.
//! - [`discovery`]: opted-in regions and per-zone spot offerings.

pub mod client;
pub mod convert;
pub mod discovery;
pub mod error;

pub use client::Ec2Signals;
pub use discovery::{discover_offerings, offering_rows, OfferingRow, ZoneOfferings};
pub use error::Ec2Error;
