//! `PostgreSQL` data layer for the AtmoInsight monitoring backend.
//!
//! The store owns the derivation logic: triggers on `reading` produce
//! alerts and disaster events and `NOTIFY` about them. This crate only
//! reads and writes rows, and listens for those notifications.
//!
//! # Resources
//!
//! ```text
//! PostgresPool (shared)  --> request handlers, relay lookups, ingestion
//! StoreListener (owned)  --> LISTEN new_alert_channel, new_disaster_channel
//! ```
//!
//! # Modules
//!
//! - [`postgres`] -- Connection pool and configuration
//! - [`listener`] -- Dedicated `LISTEN` connection
//! - [`reading_store`] -- Sensor readings
//! - [`alert_store`] -- Threshold alerts
//! - [`disaster_store`] -- Disaster events
//! - [`report_store`] -- Citizen reports
//! - [`user_store`] -- Accounts
//! - [`analytics_store`] -- Daily averages and sensor map
//! - [`error`] -- Shared error types

pub mod alert_store;
pub mod analytics_store;
pub mod disaster_store;
pub mod error;
pub mod listener;
pub mod postgres;
pub mod reading_store;
pub mod report_store;
mod rows;
pub mod user_store;

// Re-export primary types for convenience.
pub use alert_store::AlertStore;
pub use analytics_store::AnalyticsStore;
pub use disaster_store::DisasterStore;
pub use error::DbError;
pub use listener::StoreListener;
pub use postgres::{PostgresConfig, PostgresPool};
pub use reading_store::ReadingStore;
pub use report_store::ReportStore;
pub use user_store::UserStore;
