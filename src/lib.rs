//! Meter inspection reporting: consolidation of inspection exports, forecast
//! analysis of a consolidated report, and period-over-period comparison.
pub mod charts;
pub mod compare;
pub mod config;
pub mod consolidate;
pub mod document;
pub mod error;
pub mod forecast;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod reports;
pub mod types;
pub mod util;

pub use error::{ReportError, Result};
