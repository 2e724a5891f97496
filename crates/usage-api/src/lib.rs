//! dpusage API Library
//!
//! Library components for the usage dashboard server: cached warehouse
//! access, chart reshaping, the change metric, name filters, selection
//! sessions and the HTTP routes.

pub mod charts;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod name_filter;
pub mod routes;
pub mod session;
pub mod usage_analytics;
pub mod usage_change;

pub use config::ApiConfig;
pub use routes::{router, AppState};
