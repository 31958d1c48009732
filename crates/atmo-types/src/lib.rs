//! Shared type definitions for the AtmoInsight monitoring backend.
//!
//! This crate is the single source of truth for the rows, channel names,
//! and event names used across the workspace. Types flow downstream to
//! `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Identifier for live real-time connections
//! - [`channels`] -- Store `LISTEN` channels, notifications, real-time events
//! - [`records`] -- Store rows and insert payloads
//! - [`roles`] -- Account roles

pub mod channels;
pub mod ids;
pub mod records;
pub mod roles;

// Re-export all public types at crate root for convenience.
pub use channels::{FanoutMessage, Notification, RealtimeEvent, StoreChannel};
pub use ids::ConnectionId;
pub use records::{
    Alert, DailyAverage, DisasterEvent, ExtraColumns, NewAlert, NewReading, NewReport, Reading,
    ReportStatus, SensorLocation, StoredRow, User, UserCredentials, UserReport,
};
pub use roles::Role;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::channels::RealtimeEvent::export_all();
        let _ = crate::channels::FanoutMessage::export_all();

        let _ = crate::records::StoredRow::export_all();
        let _ = crate::records::NewReading::export_all();
        let _ = crate::records::NewAlert::export_all();
        let _ = crate::records::ReportStatus::export_all();
        let _ = crate::records::UserReport::export_all();
        let _ = crate::records::NewReport::export_all();
        let _ = crate::records::SensorLocation::export_all();
        let _ = crate::records::DailyAverage::export_all();
        let _ = crate::records::User::export_all();

        let _ = crate::roles::Role::export_all();
    }
}
