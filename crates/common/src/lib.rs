//! CaseDesk Common Library
//!
//! Shared code for the CaseDesk API server and maintenance worker:
//! - Case status state machine and TAT rules
//! - Database models and repository patterns
//! - Row normalisation and field validation
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Candidate notifications and CSV reports
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod links;
pub mod metrics;
pub mod notify;
pub mod reports;
pub mod telemetry;
pub mod validation;
pub mod workflow;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use notify::Notifier;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
