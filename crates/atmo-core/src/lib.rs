//! Runtime core of the AtmoInsight backend.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `atmo-config.yaml` with
//!   environment overrides.
//! - [`fanout`] -- Registry of live real-time connections and
//!   broadcast-to-all.
//! - [`relay`] -- Turns store `NOTIFY` signals into full rows and
//!   broadcasts them.
//! - [`ingest`] -- Periodic synthetic sensor readings.
//! - [`source`] -- [`NotificationSource`], [`RecordLookup`],
//!   [`ReadingSink`], and [`AlertSink`] seams over the store.
//!
//! [`NotificationSource`]: source::NotificationSource
//! [`RecordLookup`]: source::RecordLookup
//! [`ReadingSink`]: source::ReadingSink
//! [`AlertSink`]: source::AlertSink

pub mod config;
pub mod fanout;
pub mod ingest;
pub mod relay;
pub mod source;

pub use config::{AppConfig, ConfigError};
pub use fanout::{Fanout, Subscription};
pub use ingest::{IngestError, IngestionTimer};
pub use relay::{Relay, RelayError, RelayOutcome, RelayStats};
pub use source::{AlertSink, ReadingSink};
