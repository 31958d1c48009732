//! Row types for the monitoring store.
//!
//! Every row is read from `PostgreSQL` as `to_jsonb(...)`, so the column
//! names and JSON types are whatever the store emits. Readings, alerts,
//! and disaster events are pushed to real-time clients exactly as stored,
//! so they stay a [`StoredRow`]: an untyped column map with accessors for
//! the few columns the backend reads. Rows the backend reasons about
//! (users, reports, map entries) are decoded into typed members, and any
//! further column is kept verbatim in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// Columns not modelled explicitly, preserved in their stored form.
pub type ExtraColumns = Map<String, Value>;

// ---------------------------------------------------------------------------
// Stored rows
// ---------------------------------------------------------------------------

/// A row exactly as `to_jsonb` rendered it.
///
/// Serializes back to the same object: no column is added, dropped, or
/// retyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct StoredRow(#[ts(type = "Record<string, unknown>")] Map<String, Value>);

impl StoredRow {
    /// The raw value of `column`, if the row has it.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    /// `column` as an integer, if present and integral.
    pub fn int(&self, column: &str) -> Option<i64> {
        self.0.get(column).and_then(Value::as_i64)
    }

    /// `column` as a float, if present and numeric.
    pub fn float(&self, column: &str) -> Option<f64> {
        self.0.get(column).and_then(Value::as_f64)
    }

    /// `column` as text, if present and a string.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(Value::as_str)
    }

    /// The columns of the row.
    pub const fn columns(&self) -> &Map<String, Value> {
        &self.0
    }

    /// The row as a JSON object.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for StoredRow {
    fn from(columns: Map<String, Value>) -> Self {
        Self(columns)
    }
}

/// A sensor reading (`reading` table), as stored.
pub type Reading = StoredRow;

/// A threshold alert (`alert` table), as stored.
///
/// Normally produced by the store's trigger when a reading crosses a
/// threshold. Immutable once created.
pub type Alert = StoredRow;

/// A disaster event (`disasterevent`) joined with its `type_name` and
/// `subgroup_name`, as stored.
pub type DisasterEvent = StoredRow;

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// Input for inserting a reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewReading {
    /// Data source id.
    pub source_id: i32,
    /// Sensor id.
    pub sensor_id: i32,
    /// Explicit timestamp; the store uses `NOW()` when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Measured value.
    pub value: f64,
    /// Measurement type id.
    pub measurement_type_id: i32,
    /// Unit id.
    pub unit_id: i32,
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// Input for inserting an alert by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewAlert {
    /// The reading the alert refers to.
    pub reading_id: i32,
    /// Alert category.
    pub alert_type_id: i32,
    /// Explicit timestamp; the store uses `NOW()` when absent.
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Human-readable message.
    pub message: String,
    /// Severity label.
    pub severity: String,
}

// ---------------------------------------------------------------------------
// Citizen reports
// ---------------------------------------------------------------------------

/// Review state of a citizen report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ReportStatus {
    /// Newly submitted.
    Pending,
    /// Being looked at by an admin.
    InReview,
    /// Closed.
    Resolved,
}

impl ReportStatus {
    /// The `status_id` stored for this status.
    pub const fn id(self) -> i32 {
        match self {
            Self::Pending => 1,
            Self::InReview => 2,
            Self::Resolved => 3,
        }
    }

    /// Look up a status by its stored id.
    pub const fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::InReview),
            3 => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// A citizen report (`userreport`), joined with the author's username in
/// listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct UserReport {
    /// Primary key.
    pub report_id: i32,
    /// Author.
    pub user_id: Option<i32>,
    /// Reported location.
    pub location_id: Option<i32>,
    /// Submission time, as the store renders it.
    pub timestamp: Option<String>,
    /// What the citizen observed.
    pub description: Option<String>,
    /// See [`ReportStatus`].
    pub status_id: Option<i32>,
    /// Joined from `users.username` (listings only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Any further columns.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: ExtraColumns,
}

/// Input for submitting a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NewReport {
    /// Location; defaults to `1` when absent.
    #[serde(default)]
    pub location_id: Option<i32>,
    /// What the citizen observed.
    pub description: String,
}

// ---------------------------------------------------------------------------
// Map and analytics
// ---------------------------------------------------------------------------

/// A sensor with coordinates and its most recent value, for the map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SensorLocation {
    /// Sensor id.
    pub sensor_id: i32,
    /// Sensor display name.
    pub sensor_name: Option<String>,
    /// Location display name.
    pub location_name: Option<String>,
    /// Latitude in degrees.
    pub lat: Option<f64>,
    /// Longitude in degrees.
    pub lng: Option<f64>,
    /// Most recent reading value, if the sensor has reported.
    pub latest_value: Option<f64>,
}

/// One row of the `daily_sensor_averages` materialized view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DailyAverage {
    /// Sensor id.
    pub sensor_id: Option<i32>,
    /// Calendar day the average covers.
    pub reading_date: Option<String>,
    /// Aggregates computed by the view.
    #[serde(flatten)]
    #[ts(skip)]
    pub extra: ExtraColumns,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Public view of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct User {
    /// Primary key.
    pub user_id: i32,
    /// Display name.
    pub username: String,
    /// Login email.
    pub email: String,
    /// See [`crate::Role`].
    pub role_id: i32,
}

/// A user together with the stored password hash. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserCredentials {
    /// The account.
    #[serde(flatten)]
    pub user: User,
    /// Argon2 PHC string, or a bcrypt hash for older accounts.
    pub password_hash: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn stored_row_round_trips_verbatim() {
        let stored = serde_json::json!({
            "alert_id": 3,
            "reading_id": 17,
            "severity": 4,
            "acknowledged": false
        });
        let row: Alert = serde_json::from_value(stored.clone()).unwrap();
        assert_eq!(row.int("alert_id"), Some(3));
        assert_eq!(row.int("severity"), Some(4));
        assert!(row.get("message").is_none());

        assert_eq!(serde_json::to_value(&row).unwrap(), stored);
        assert_eq!(row.into_value(), stored);
    }

    #[test]
    fn stored_row_accessors_check_types() {
        let row: DisasterEvent = serde_json::from_value(serde_json::json!({
            "event_id": 9,
            "severity": "HIGH",
            "magnitude": 6.5,
            "type_name": null
        }))
        .unwrap();
        assert_eq!(row.text("severity"), Some("HIGH"));
        assert_eq!(row.float("magnitude"), Some(6.5));
        assert_eq!(row.int("severity"), None);
        assert_eq!(row.text("type_name"), None);
        assert_eq!(row.columns().len(), 4);
    }

    #[test]
    fn stored_row_must_be_an_object() {
        assert!(serde_json::from_value::<StoredRow>(serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn new_reading_timestamp_is_optional() {
        let body = serde_json::json!({
            "source_id": 1,
            "sensor_id": 4,
            "value": 92.0,
            "measurement_type_id": 1,
            "unit_id": 1
        });
        let reading: NewReading = serde_json::from_value(body).unwrap();
        assert!(reading.timestamp.is_none());
        assert_eq!(reading.sensor_id, 4);
    }

    #[test]
    fn report_status_ids() {
        for status in [
            ReportStatus::Pending,
            ReportStatus::InReview,
            ReportStatus::Resolved,
        ] {
            assert_eq!(ReportStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(ReportStatus::from_id(0), None);
    }

    #[test]
    fn credentials_split_hash_from_user() {
        let row = serde_json::json!({
            "user_id": 5,
            "username": "ana",
            "email": "ana@example.org",
            "role_id": 2,
            "password_hash": "$argon2id$v=19$..."
        });
        let creds: UserCredentials = serde_json::from_value(row).unwrap();
        assert_eq!(creds.user.username, "ana");
        let public = serde_json::to_value(&creds.user).unwrap();
        assert!(public.get("password_hash").is_none());
    }
}
