//! REST endpoint handlers for monitoring data.
//!
//! Every handler performs exactly one store operation through the shared
//! pool. Creating a reading or an alert also broadcasts the stored row to
//! every real-time client.
//!
//! # Endpoints
//!
//! | Method | Path | Guard | Description |
//! |--------|------|-------|-------------|
//! | `GET` | `/` | -- | HTML status page |
//! | `GET` | `/health` | -- | Liveness probe |
//! | `GET` | `/api/demo` | -- | Static sample readings |
//! | `GET` | `/api/readings` | token | Latest readings |
//! | `POST` | `/api/readings` | admin | Insert a reading |
//! | `GET` | `/api/alerts` | token | Latest alerts |
//! | `POST` | `/api/alerts` | admin | Insert an alert |
//! | `GET` | `/api/disasters` | token | Latest disaster events |
//! | `GET` | `/api/analytics/daily` | token | Daily sensor averages |
//! | `GET` | `/api/map/sensors` | -- | Sensor coordinates |

use std::sync::Arc;

use atmo_core::{AlertSink, Fanout, ReadingSink};
use atmo_db::{AlertStore, AnalyticsStore, DisasterStore, ReadingStore};
use atmo_types::{Alert, NewAlert, NewReading, Reading, RealtimeEvent};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use chrono::{TimeDelta, Utc};
use tracing::info;

use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

/// Default `limit` for `GET /api/readings`.
pub const READINGS_LIMIT: i64 = 100;
/// Default `limit` for `GET /api/alerts`.
pub const ALERTS_LIMIT: i64 = 50;
/// Default `limit` for `GET /api/disasters`.
pub const DISASTERS_LIMIT: i64 = 20;
/// Default `limit` for `GET /api/analytics/daily`.
pub const DAILY_AVERAGES_LIMIT: i64 = 30;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// `?limit=` on list endpoints.
///
/// Kept as raw text: anything that is not a positive integer falls back to
/// the endpoint's default instead of rejecting the request.
#[derive(Debug, Default, serde::Deserialize)]
pub struct LimitQuery {
    /// Maximum number of rows.
    pub limit: Option<String>,
}

/// Query parameters for `GET /api/analytics/daily`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct DailyQuery {
    /// Restrict to one sensor.
    pub sensor_id: Option<String>,
    /// Maximum number of rows.
    pub limit: Option<String>,
}

// ---------------------------------------------------------------------------
// GET / -- status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let clients = state.fanout.len();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>AtmoInsight API</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        .status {{ color: #3fb950; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>AtmoInsight API</h1>
    <p class="subtitle">Environmental monitoring backend</p>

    <p>Status: <span class="status">RUNNING</span></p>

    <div>
        <div class="metric">
            <div class="label">Live clients</div>
            <div class="value" id="clients">{clients}</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/demo">/api/demo</a> -- Sample sensor data, no auth or database needed</li>
        <li><a href="/api/map/sensors">/api/map/sensors</a> -- Sensor locations with latest value</li>
        <li>/api/readings (GET) -- Latest readings</li>
        <li>/api/alerts (GET) -- Latest alerts</li>
        <li>/api/disasters (GET) -- Latest disaster events</li>
        <li>/api/analytics/daily (GET) -- Daily sensor averages</li>
        <li>/api/reports (GET, POST) -- Citizen reports</li>
        <li>/api/auth/login (POST) -- Get an auth token</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li><code>ws://host:port/ws</code> -- new_reading, new_alert, new_disaster</li>
    </ul>
</body>
</html>"#
    ))
}

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Static sample readings for trying the API without a token or a store.
pub async fn demo() -> impl IntoResponse {
    let now = Utc::now();
    let at = |secs_ago: i64| {
        now.checked_sub_signed(TimeDelta::seconds(secs_ago))
            .unwrap_or(now)
            .to_rfc3339()
    };

    Json(serde_json::json!({
        "message": "Here is some dummy sensor data (No Auth or DB connection needed to view this)",
        "source": "AtmoInsight Demo Endpoint",
        "data": [
            { "id": 1, "sensor_id": 1, "value": 45.2, "recorded_at": at(10) },
            { "id": 2, "sensor_id": 1, "value": 48.7, "recorded_at": at(5) },
            { "id": 3, "sensor_id": 2, "value": 72.1, "recorded_at": at(0) },
        ],
    }))
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// `GET /api/readings?limit=` -- newest first.
pub async fn list_readings(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = limit_or(params.limit.as_deref(), READINGS_LIMIT);
    let rows = ReadingStore::new(state.db.pool()).list_recent(limit).await?;
    Ok(Json(rows))
}

/// `POST /api/readings` -- insert and broadcast `new_reading`.
pub async fn create_reading(
    AdminUser(claims): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewReading>,
) -> Result<impl IntoResponse, ApiError> {
    let (reading, receivers) = store_and_push_reading(&state.db, &state.fanout, &body).await?;
    info!(
        reading_id = ?reading.int("reading_id"),
        by = %claims.sub,
        receivers,
        "Reading created"
    );
    Ok((StatusCode::CREATED, Json(reading)))
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

/// `GET /api/alerts?limit=` -- newest first.
pub async fn list_alerts(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = limit_or(params.limit.as_deref(), ALERTS_LIMIT);
    let rows = AlertStore::new(state.db.pool()).list_recent(limit).await?;
    Ok(Json(rows))
}

/// `POST /api/alerts` -- insert and broadcast `new_alert`.
pub async fn create_alert(
    AdminUser(claims): AdminUser,
    State(state): State<Arc<AppState>>,
    Json(body): Json<NewAlert>,
) -> Result<impl IntoResponse, ApiError> {
    let (alert, receivers) = store_and_push_alert(&state.db, &state.fanout, &body).await?;
    info!(
        alert_id = ?alert.int("alert_id"),
        by = %claims.sub,
        receivers,
        "Alert created"
    );
    Ok((StatusCode::CREATED, Json(alert)))
}

// ---------------------------------------------------------------------------
// Disasters, analytics, map
// ---------------------------------------------------------------------------

/// `GET /api/disasters?limit=` -- newest first, with type and subgroup
/// names.
pub async fn list_disasters(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LimitQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = limit_or(params.limit.as_deref(), DISASTERS_LIMIT);
    let rows = DisasterStore::new(state.db.pool())
        .list_recent(limit)
        .await?;
    Ok(Json(rows))
}

/// `GET /api/analytics/daily?sensor_id=&limit=` -- refreshes the view
/// first, then lists oldest day first.
pub async fn daily_averages(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<DailyQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sensor_id = params
        .sensor_id
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i32>().ok())
        .filter(|id| *id != 0);
    let limit = limit_or(params.limit.as_deref(), DAILY_AVERAGES_LIMIT);

    let rows = AnalyticsStore::new(state.db.pool())
        .daily_averages(sensor_id, limit)
        .await?;
    Ok(Json(rows))
}

/// `GET /api/map/sensors` -- every sensor with coordinates.
pub async fn sensor_locations(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = AnalyticsStore::new(state.db.pool())
        .sensor_locations()
        .await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Insert a reading, then push the stored row to every live client as
/// `new_reading`. Returns the row and the number of clients reached.
///
/// Nothing is pushed if the insert fails.
pub async fn store_and_push_reading<S: ReadingSink>(
    sink: &S,
    fanout: &Fanout,
    body: &NewReading,
) -> Result<(Reading, usize), ApiError> {
    let reading = sink.insert_reading(body).await?;
    let receivers = fanout.broadcast_record(RealtimeEvent::NewReading, &reading);
    Ok((reading, receivers))
}

/// Insert an alert, then push the stored row to every live client as
/// `new_alert`.
pub async fn store_and_push_alert<S: AlertSink>(
    sink: &S,
    fanout: &Fanout,
    body: &NewAlert,
) -> Result<(Alert, usize), ApiError> {
    let alert = sink.insert_alert(body).await?;
    let receivers = fanout.broadcast_record(RealtimeEvent::NewAlert, &alert);
    Ok((alert, receivers))
}

/// Parse a `limit` parameter, falling back to `default` unless it is a
/// positive integer.
pub fn limit_or(raw: Option<&str>, default: i64) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use atmo_db::DbError;
    use atmo_types::StoredRow;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<serde_json::Value>>,
        offline: AtomicBool,
    }

    impl MemoryStore {
        fn store(&self, mut row: serde_json::Value, key: &str) -> Result<StoredRow, DbError> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(DbError::Config("store offline".to_owned()));
            }
            let mut rows = self.rows.lock().unwrap();
            row[key] = json!(rows.len() + 1);
            row["timestamp"] = json!("2026-03-01T10:00:00");
            rows.push(row.clone());
            Ok(serde_json::from_value(row).unwrap())
        }
    }

    impl ReadingSink for MemoryStore {
        async fn insert_reading(&self, reading: &NewReading) -> Result<Reading, DbError> {
            self.store(serde_json::to_value(reading).unwrap(), "reading_id")
        }
    }

    impl AlertSink for MemoryStore {
        async fn insert_alert(&self, alert: &NewAlert) -> Result<Alert, DbError> {
            self.store(serde_json::to_value(alert).unwrap(), "alert_id")
        }
    }

    fn critical_reading() -> NewReading {
        NewReading {
            source_id: 1,
            sensor_id: 1,
            timestamp: None,
            value: 92.0,
            measurement_type_id: 1,
            unit_id: 1,
        }
    }

    #[tokio::test]
    async fn created_reading_is_pushed_to_every_client() {
        let store = MemoryStore::default();
        let fanout = Fanout::new(8);
        let mut a = fanout.connect();
        let mut b = fanout.connect();

        let (reading, receivers) = store_and_push_reading(&store, &fanout, &critical_reading())
            .await
            .unwrap();
        assert_eq!(receivers, 2);
        assert_eq!(reading.int("reading_id"), Some(1));

        let stored = store.rows.lock().unwrap()[0].clone();
        for sub in [&mut a, &mut b] {
            let msg = sub.rx.try_recv().unwrap();
            assert_eq!(msg.event, RealtimeEvent::NewReading);
            assert_eq!(msg.data, stored);
            assert!(sub.rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn created_alert_is_pushed_as_new_alert() {
        let store = MemoryStore::default();
        let fanout = Fanout::new(8);
        let mut sub = fanout.connect();

        let body = NewAlert {
            reading_id: 17,
            alert_type_id: 1,
            timestamp: None,
            message: "PM2.5 above threshold".to_owned(),
            severity: "CRITICAL".to_owned(),
        };
        let (alert, receivers) = store_and_push_alert(&store, &fanout, &body).await.unwrap();
        assert_eq!(receivers, 1);

        let msg = sub.rx.try_recv().unwrap();
        assert_eq!(msg.event, RealtimeEvent::NewAlert);
        assert_eq!(msg.data, alert.into_value());
        assert_eq!(msg.data["severity"], "CRITICAL");
        assert_eq!(msg.data["reading_id"], 17);
    }

    #[tokio::test]
    async fn failed_insert_pushes_nothing() {
        let store = MemoryStore::default();
        store.offline.store(true, Ordering::SeqCst);
        let fanout = Fanout::new(8);
        let mut sub = fanout.connect();

        let result = store_and_push_reading(&store, &fanout, &critical_reading()).await;
        assert!(matches!(result, Err(ApiError::Database(_))));
        assert!(sub.rx.try_recv().is_err());
    }

    #[test]
    fn limit_defaults() {
        assert_eq!(limit_or(None, 100), 100);
        assert_eq!(limit_or(Some(""), 100), 100);
        assert_eq!(limit_or(Some("abc"), 50), 50);
        assert_eq!(limit_or(Some("0"), 20), 20);
        assert_eq!(limit_or(Some("-5"), 20), 20);
    }

    #[test]
    fn limit_parses_positive() {
        assert_eq!(limit_or(Some("5"), 100), 5);
        assert_eq!(limit_or(Some(" 12 "), 100), 12);
    }
}
