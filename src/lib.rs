//! Filter Optimizer
//!
//! Exhaustive combinatorial backtesting of trade filter combinations: every
//! combination of the selected criteria is applied to a historical trade set,
//! scored per strategy, and the best combinations are ranked.

pub mod attributes;
pub mod catalog;
pub mod combination;
pub mod config;
pub mod criterion;
pub mod error;
pub mod filter;
pub mod generator;
pub mod metrics;
pub mod optimizer;
pub mod pipeline;
pub mod progress;
pub mod ranking;
pub mod store;
pub mod time_of_day;
pub mod types;

pub use catalog::Catalog;
pub use combination::{Combination, Constraint};
pub use config::{Configuration, RunPlan, Settings};
pub use error::{ConfigError, EvalError, StoreError};
pub use optimizer::{Optimizer, RunRequest, RunSummary};
pub use pipeline::{Pipeline, PipelineConfig, Priority};
pub use store::{DataStore, SqliteStore};
pub use types::*;
