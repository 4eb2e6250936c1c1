use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;

use crate::state::game::TeamPair;

/// Envelope of every frame a client sends over the socket.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ClientFrame {
    /// Event name, e.g. `join-session`.
    pub event: String,
    /// Event payload; `null` when omitted.
    #[serde(default)]
    pub data: Value,
    /// Correlation id echoed back by ack-style events.
    #[serde(default)]
    pub ack: Option<u64>,
}

/// Envelope of every frame the server pushes to a client.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ServerEvent {
    /// Event name.
    pub event: String,
    /// Event payload (`null` for bare notifications).
    pub data: Value,
    /// Correlation id of the request this frame answers.
    pub ack: Option<u64>,
}

impl ServerEvent {
    /// Build a frame by serialising `payload` into the data field.
    pub fn json<T>(event: impl Into<String>, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize + ?Sized,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_value(payload)?,
            ack: None,
        })
    }

    /// Build a frame without payload.
    pub fn bare(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: Value::Null,
            ack: None,
        }
    }

    /// Attach the correlation id of the originating request.
    pub fn with_ack(mut self, ack: Option<u64>) -> Self {
        self.ack = ack;
        self
    }
}

/// Scoped error delivered to the originating connection only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorPayload {
    pub message: String,
}

/// Reply to `join-session`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinedSession {
    pub session_id: String,
}

/// Reply to `validate-session`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionExistence {
    pub exists: bool,
}

/// Broadcast after a player wins the buzz-in race.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Buzzed {
    pub name: String,
}

/// Team member lists as broadcast by `team-members-updated`.
pub type TeamMembers = TeamPair<Vec<String>>;

/// Team names as broadcast by `team-names-updated`.
pub type TeamNames = TeamPair<String>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn ack_is_omitted_when_absent() {
        let frame = ServerEvent::bare("play-strike-sound");
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, json!({ "event": "play-strike-sound", "data": null }));

        let frame = ServerEvent::json("validate-session", &SessionExistence { exists: true })
            .unwrap()
            .with_ack(Some(7));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            json!({ "event": "validate-session", "data": { "exists": true }, "ack": 7 })
        );
    }

    #[test]
    fn client_frame_data_defaults_to_null() {
        let frame: ClientFrame = serde_json::from_str(r#"{"event":"reset-round"}"#).unwrap();
        assert_eq!(frame.event, "reset-round");
        assert!(frame.data.is_null());
        assert_eq!(frame.ack, None);
    }
}
