//! Call-center performance analytics: aggregation, goal projection,
//! heuristic insights and achievement badges over call-activity records.

pub mod achievements;
pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod duration;
pub mod error;
pub mod filter;
pub mod goals;
pub mod ingest;
pub mod insights;
pub mod models;
pub mod ranking;
pub mod report;
pub mod root_cause;

pub use dashboard::{DashboardState, DashboardView, RecomputeContext};
pub use error::IngestError;
