//! HTTP API server for the AtmoInsight monitoring backend.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws`) streaming `new_reading`,
//!   `new_alert`, and `new_disaster` events from the shared
//!   [`Fanout`](atmo_core::Fanout)
//! - **REST endpoints** for readings, alerts, disasters, analytics,
//!   citizen reports, and the sensor map
//! - **Account endpoints** issuing bearer tokens
//! - **Minimal HTML status page** (`GET /`) with the live client count
//!
//! # Architecture
//!
//! Handlers are stateless: each performs one store operation through the
//! shared pool in [`AppState`]. Creating a reading or an alert also
//! pushes the stored row to every connected client.

pub mod accounts;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod reports;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use auth::JwtService;
pub use error::ApiError;
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use state::AppState;
