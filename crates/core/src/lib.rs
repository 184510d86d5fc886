pub mod combination;
pub mod config;
pub mod error;
pub mod evaluation;
pub mod report;
pub mod resource;

pub use combination::Combination;
pub use config::Config;
pub use error::*;
pub use evaluation::*;
pub use report::*;
pub use resource::*;
