//! Store notification channels and real-time event names.
//!
//! Both sets of names are part of the external contract: the channel names
//! must match what the database triggers `NOTIFY` on, and the event names
//! must match what dashboard clients listen for. Neither may change without
//! coordinating the other side.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Store channels
// ---------------------------------------------------------------------------

/// A `PostgreSQL` `LISTEN` channel the relay subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreChannel {
    /// Fired by the alert trigger. Payload is the triggering `reading_id`.
    NewAlert,
    /// Fired by the disaster trigger. Payload is the new `event_id`.
    NewDisaster,
}

impl StoreChannel {
    /// Every channel the relay listens on.
    pub const ALL: [Self; 2] = [Self::NewAlert, Self::NewDisaster];

    /// The exact channel name used in `LISTEN` / `NOTIFY`.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewAlert => "new_alert_channel",
            Self::NewDisaster => "new_disaster_channel",
        }
    }

    /// Map a raw channel name back to a known channel.
    ///
    /// Returns `None` for any channel this backend does not handle.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "new_alert_channel" => Some(Self::NewAlert),
            "new_disaster_channel" => Some(Self::NewDisaster),
            _ => None,
        }
    }

    /// The real-time event a resolved notification on this channel
    /// is forwarded as.
    pub const fn event(self) -> RealtimeEvent {
        match self {
            Self::NewAlert => RealtimeEvent::NewAlert,
            Self::NewDisaster => RealtimeEvent::NewDisaster,
        }
    }
}

impl core::fmt::Display for StoreChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change signal delivered by the store.
///
/// Carries only the channel and an opaque row identifier; the relay must
/// look the row up to obtain its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Channel the notification arrived on.
    pub channel: String,
    /// Textual row id (a `reading_id` or `event_id` depending on channel).
    pub payload: String,
}

impl Notification {
    /// Build a notification from a channel and payload.
    pub fn new(channel: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Parse the payload as an integer row id.
    ///
    /// Triggers send the id as text, possibly with surrounding whitespace.
    pub fn row_id(&self) -> Option<i32> {
        self.payload.trim().parse().ok()
    }
}

// ---------------------------------------------------------------------------
// Real-time events
// ---------------------------------------------------------------------------

/// Named event pushed to every connected dashboard client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RealtimeEvent {
    /// A reading was created through the REST API.
    NewReading,
    /// An alert was derived by the store or created through the REST API.
    NewAlert,
    /// A disaster event was derived by the store.
    NewDisaster,
}

impl RealtimeEvent {
    /// Wire name of the event.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NewReading => "new_reading",
            Self::NewAlert => "new_alert",
            Self::NewDisaster => "new_disaster",
        }
    }
}

impl core::fmt::Display for RealtimeEvent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One frame sent to a real-time client: `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FanoutMessage {
    /// Which event this is.
    pub event: RealtimeEvent,
    /// The full row, exactly as the store returned it.
    #[ts(type = "unknown")]
    pub data: serde_json::Value,
}

impl FanoutMessage {
    /// Build a message from an event name and a body.
    pub const fn new(event: RealtimeEvent, data: serde_json::Value) -> Self {
        Self { event, data }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_are_bit_exact() {
        assert_eq!(StoreChannel::NewAlert.as_str(), "new_alert_channel");
        assert_eq!(StoreChannel::NewDisaster.as_str(), "new_disaster_channel");
    }

    #[test]
    fn channel_name_round_trips() {
        for channel in StoreChannel::ALL {
            assert_eq!(StoreChannel::from_name(channel.as_str()), Some(channel));
        }
        assert_eq!(StoreChannel::from_name("new_reading_channel"), None);
    }

    #[test]
    fn channels_map_to_events() {
        assert_eq!(StoreChannel::NewAlert.event(), RealtimeEvent::NewAlert);
        assert_eq!(StoreChannel::NewDisaster.event(), RealtimeEvent::NewDisaster);
    }

    #[test]
    fn row_id_tolerates_whitespace() {
        assert_eq!(Notification::new("c", " 42 ").row_id(), Some(42));
        assert_eq!(Notification::new("c", "abc").row_id(), None);
        assert_eq!(Notification::new("c", "").row_id(), None);
    }

    #[test]
    fn event_serializes_as_wire_name() {
        let json = serde_json::to_string(&RealtimeEvent::NewDisaster).unwrap();
        assert_eq!(json, "\"new_disaster\"");
    }

    #[test]
    fn fanout_message_shape() {
        let msg = FanoutMessage::new(
            RealtimeEvent::NewAlert,
            serde_json::json!({ "alert_id": 7, "severity": "CRITICAL" }),
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], "new_alert");
        assert_eq!(value["data"]["alert_id"], 7);
    }
}
