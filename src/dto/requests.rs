//! Inbound socket events and their strict payload validation.
//!
//! Checks run in a fixed order so the message a client gets is deterministic:
//! the session id first, then the event's other required fields in their declared
//! order, then the exact field set and the shape of every value.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use validator::Validate;

use crate::{
    dto::validation::{unknown_fields, validate_session_id},
    error::RequestError,
    state::game::{GameState, SessionId, Team},
};

/// Every event a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    JoinSession,
    JoinTeam,
    RemoveTeamMember,
    Buzz,
    PlayStrikeSound,
    GetCurrentState,
    UpdateGame,
    UpdateTeamName,
    ValidateSession,
    GetTeamMembers,
    SetStartingTeam,
    ResetRound,
}

/// A required field besides `sessionId`, with the wording used when it is missing.
struct RequiredField {
    key: &'static str,
    label: &'static str,
}

const NAME: RequiredField = RequiredField {
    key: "name",
    label: "Name",
};
const TEAM: RequiredField = RequiredField {
    key: "team",
    label: "Team",
};
const GAME_STATE: RequiredField = RequiredField {
    key: "gameState",
    label: "Game state",
};
const STARTING_TEAM: RequiredField = RequiredField {
    key: "startingTeam",
    label: "Starting team",
};

impl EventKind {
    /// Look up an event by its wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "join-session" => Self::JoinSession,
            "join-team" => Self::JoinTeam,
            "remove-team-member" => Self::RemoveTeamMember,
            "buzz" => Self::Buzz,
            "play-strike-sound" => Self::PlayStrikeSound,
            "get-current-state" => Self::GetCurrentState,
            "update-game" => Self::UpdateGame,
            "update-team-name" => Self::UpdateTeamName,
            "validate-session" => Self::ValidateSession,
            "get-team-members" => Self::GetTeamMembers,
            "set-starting-team" => Self::SetStartingTeam,
            "reset-round" => Self::ResetRound,
            _ => return None,
        };
        Some(kind)
    }

    /// Wire name of the event.
    pub fn name(self) -> &'static str {
        match self {
            Self::JoinSession => "join-session",
            Self::JoinTeam => "join-team",
            Self::RemoveTeamMember => "remove-team-member",
            Self::Buzz => "buzz",
            Self::PlayStrikeSound => "play-strike-sound",
            Self::GetCurrentState => "get-current-state",
            Self::UpdateGame => "update-game",
            Self::UpdateTeamName => "update-team-name",
            Self::ValidateSession => "validate-session",
            Self::GetTeamMembers => "get-team-members",
            Self::SetStartingTeam => "set-starting-team",
            Self::ResetRound => "reset-round",
        }
    }

    /// Verb phrase used in "is required to ..." messages.
    fn action(self) -> &'static str {
        match self {
            Self::JoinTeam => "join team",
            Self::RemoveTeamMember => "remove team member",
            Self::Buzz => "buzz",
            Self::UpdateGame => "update game",
            Self::UpdateTeamName => "update team name",
            Self::SetStartingTeam => "set starting team",
            _ => "",
        }
    }

    fn required(self) -> &'static [RequiredField] {
        match self {
            Self::JoinTeam | Self::RemoveTeamMember => &[NAME, TEAM],
            Self::Buzz => &[NAME],
            Self::UpdateGame => &[GAME_STATE],
            Self::UpdateTeamName => &[TEAM, NAME],
            Self::SetStartingTeam => &[STARTING_TEAM],
            Self::JoinSession
            | Self::PlayStrikeSound
            | Self::GetCurrentState
            | Self::ValidateSession
            | Self::GetTeamMembers
            | Self::ResetRound => &[],
        }
    }
}

/// A validated inbound request, ready for the session service.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundRequest {
    JoinSession {
        session_id: SessionId,
    },
    JoinTeam {
        session_id: SessionId,
        name: String,
        team: Team,
    },
    RemoveTeamMember {
        session_id: SessionId,
        name: String,
        team: Team,
    },
    Buzz {
        session_id: SessionId,
        name: String,
    },
    PlayStrikeSound {
        session_id: SessionId,
    },
    GetCurrentState {
        session_id: SessionId,
    },
    UpdateGame {
        session_id: SessionId,
        game_state: Box<GameState>,
    },
    UpdateTeamName {
        session_id: SessionId,
        team: Team,
        name: String,
    },
    ValidateSession {
        session_id: SessionId,
    },
    GetTeamMembers {
        session_id: SessionId,
    },
    SetStartingTeam {
        session_id: SessionId,
        starting_team: Team,
    },
    ResetRound {
        session_id: SessionId,
    },
}

impl InboundRequest {
    /// Session the request targets.
    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::JoinSession { session_id }
            | Self::JoinTeam { session_id, .. }
            | Self::RemoveTeamMember { session_id, .. }
            | Self::Buzz { session_id, .. }
            | Self::PlayStrikeSound { session_id }
            | Self::GetCurrentState { session_id }
            | Self::UpdateGame { session_id, .. }
            | Self::UpdateTeamName { session_id, .. }
            | Self::ValidateSession { session_id }
            | Self::GetTeamMembers { session_id }
            | Self::SetStartingTeam { session_id, .. }
            | Self::ResetRound { session_id } => session_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SessionOnly {
    #[validate(custom(function = "validate_session_id"))]
    session_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PlayerPayload {
    #[validate(custom(function = "validate_session_id"))]
    session_id: String,
    name: String,
    team: Team,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BuzzPayload {
    #[validate(custom(function = "validate_session_id"))]
    session_id: String,
    name: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct GameUpdatePayload {
    #[validate(custom(function = "validate_session_id"))]
    session_id: String,
    game_state: Map<String, Value>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct StartingTeamPayload {
    #[validate(custom(function = "validate_session_id"))]
    session_id: String,
    starting_team: Team,
}

/// Validate the payload of `event` and build the matching request.
pub fn parse_request(event: &str, data: &Value) -> Result<InboundRequest, RequestError> {
    let kind = EventKind::from_name(event).ok_or_else(|| RequestError::invalid(event))?;
    let empty = Map::new();
    let fields = data.as_object().unwrap_or(&empty);

    if is_missing(fields.get("sessionId")) {
        return Err(RequestError::missing_session_id());
    }
    if let Some(field) = kind
        .required()
        .iter()
        .find(|field| is_missing(fields.get(field.key)))
    {
        return Err(RequestError::missing_field(field.label, kind.action()));
    }

    let request = match kind {
        EventKind::JoinSession => InboundRequest::JoinSession {
            session_id: session_of::<SessionOnly>(kind, data, |p| &p.session_id)?.0,
        },
        EventKind::PlayStrikeSound => InboundRequest::PlayStrikeSound {
            session_id: session_of::<SessionOnly>(kind, data, |p| &p.session_id)?.0,
        },
        EventKind::GetCurrentState => InboundRequest::GetCurrentState {
            session_id: session_of::<SessionOnly>(kind, data, |p| &p.session_id)?.0,
        },
        EventKind::ValidateSession => InboundRequest::ValidateSession {
            session_id: session_of::<SessionOnly>(kind, data, |p| &p.session_id)?.0,
        },
        EventKind::GetTeamMembers => InboundRequest::GetTeamMembers {
            session_id: session_of::<SessionOnly>(kind, data, |p| &p.session_id)?.0,
        },
        EventKind::ResetRound => InboundRequest::ResetRound {
            session_id: session_of::<SessionOnly>(kind, data, |p| &p.session_id)?.0,
        },
        EventKind::JoinTeam => {
            let (session_id, p) = session_of::<PlayerPayload>(kind, data, |p| &p.session_id)?;
            InboundRequest::JoinTeam {
                session_id,
                name: p.name,
                team: p.team,
            }
        }
        EventKind::RemoveTeamMember => {
            let (session_id, p) = session_of::<PlayerPayload>(kind, data, |p| &p.session_id)?;
            InboundRequest::RemoveTeamMember {
                session_id,
                name: p.name,
                team: p.team,
            }
        }
        EventKind::UpdateTeamName => {
            let (session_id, p) = session_of::<PlayerPayload>(kind, data, |p| &p.session_id)?;
            InboundRequest::UpdateTeamName {
                session_id,
                team: p.team,
                name: p.name,
            }
        }
        EventKind::Buzz => {
            let (session_id, p) = session_of::<BuzzPayload>(kind, data, |p| &p.session_id)?;
            InboundRequest::Buzz {
                session_id,
                name: p.name,
            }
        }
        EventKind::SetStartingTeam => {
            let (session_id, p) =
                session_of::<StartingTeamPayload>(kind, data, |p| &p.session_id)?;
            InboundRequest::SetStartingTeam {
                session_id,
                starting_team: p.starting_team,
            }
        }
        EventKind::UpdateGame => {
            let (session_id, p) =
                session_of::<GameUpdatePayload>(kind, data, |p| &p.session_id)?;
            InboundRequest::UpdateGame {
                session_id,
                game_state: Box::new(parse_game_state(kind, p.game_state)?),
            }
        }
    };

    Ok(request)
}

fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

fn decode<T>(kind: EventKind, data: &Value) -> Result<T, RequestError>
where
    T: DeserializeOwned + Validate,
{
    let payload: T =
        serde_json::from_value(data.clone()).map_err(|_| RequestError::invalid(kind.name()))?;
    payload
        .validate()
        .map_err(|_| RequestError::invalid(kind.name()))?;
    Ok(payload)
}

fn session_of<T>(
    kind: EventKind,
    data: &Value,
    session: impl Fn(&T) -> &String,
) -> Result<(SessionId, T), RequestError>
where
    T: DeserializeOwned + Validate,
{
    let payload = decode::<T>(kind, data)?;
    let id = SessionId::parse(session(&payload)).map_err(|_| RequestError::invalid(kind.name()))?;
    Ok((id, payload))
}

fn parse_game_state(kind: EventKind, raw: Map<String, Value>) -> Result<GameState, RequestError> {
    let state: GameState = serde_json::from_value(Value::Object(raw.clone()))
        .map_err(|_| RequestError::invalid(kind.name()))?;
    if !unknown_fields(&raw, &state).is_empty() {
        return Err(RequestError::invalid(kind.name()));
    }
    state
        .validate()
        .map_err(|_| RequestError::invalid(kind.name()))?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(event: &str, data: Value) -> String {
        parse_request(event, &data).unwrap_err().message
    }

    #[test]
    fn empty_payload_always_reports_session_id_first() {
        for event in [
            "join-session",
            "join-team",
            "remove-team-member",
            "buzz",
            "play-strike-sound",
            "get-current-state",
            "update-game",
            "update-team-name",
            "validate-session",
            "get-team-members",
            "set-starting-team",
            "reset-round",
        ] {
            assert_eq!(message(event, json!({})), "Session ID is required", "{event}");
            assert_eq!(message(event, Value::Null), "Session ID is required", "{event}");
        }
    }

    #[test]
    fn empty_session_id_counts_as_missing() {
        assert_eq!(
            message("buzz", json!({ "sessionId": "", "name": "X" })),
            "Session ID is required"
        );
    }

    #[test]
    fn required_fields_follow_declared_order() {
        assert_eq!(
            message("join-team", json!({ "sessionId": "AB12" })),
            "Name is required to join team"
        );
        assert_eq!(
            message("join-team", json!({ "sessionId": "AB12", "name": "Alice" })),
            "Team is required to join team"
        );
        assert_eq!(
            message("remove-team-member", json!({ "sessionId": "AB12", "team": "A" })),
            "Name is required to remove team member"
        );
        assert_eq!(
            message("update-team-name", json!({ "sessionId": "AB12" })),
            "Team is required to update team name"
        );
        assert_eq!(
            message("update-team-name", json!({ "sessionId": "AB12", "team": "A" })),
            "Name is required to update team name"
        );
        assert_eq!(
            message("buzz", json!({ "sessionId": "AB12", "name": null })),
            "Name is required to buzz"
        );
        assert_eq!(
            message("update-game", json!({ "sessionId": "AB12" })),
            "Game state is required to update game"
        );
        assert_eq!(
            message("set-starting-team", json!({ "sessionId": "AB12" })),
            "Starting team is required to set starting team"
        );
    }

    #[test]
    fn extra_fields_are_rejected() {
        assert_eq!(
            message(
                "join-team",
                json!({ "sessionId": "AB12", "name": "Alice", "team": "A", "role": "captain" })
            ),
            "Invalid request - join-team"
        );
        assert_eq!(
            message("join-session", json!({ "sessionId": "AB12", "extra": 1 })),
            "Invalid request - join-session"
        );
        assert_eq!(
            message(
                "update-game",
                json!({ "sessionId": "AB12", "gameState": { "roundCounter": 1, "bogus": true } })
            ),
            "Invalid request - update-game"
        );
    }

    #[test]
    fn shape_errors_are_invalid_requests() {
        assert_eq!(
            message("join-session", json!({ "sessionId": "INVALID_SESSION" })),
            "Invalid request - join-session"
        );
        assert_eq!(
            message("join-team", json!({ "sessionId": "AB12", "name": "Alice", "team": "C" })),
            "Invalid request - join-team"
        );
        assert_eq!(
            message("buzz", json!({ "sessionId": "AB12", "name": 42 })),
            "Invalid request - buzz"
        );
        assert_eq!(
            message(
                "update-game",
                json!({ "sessionId": "AB12", "gameState": { "currentTeam": "ABCD" } })
            ),
            "Invalid request - update-game"
        );
        assert_eq!(
            message(
                "update-game",
                json!({ "sessionId": "AB12", "gameState": { "scoreMultiplier": 9 } })
            ),
            "Invalid request - update-game"
        );
        assert_eq!(
            message("update-game", json!({ "sessionId": "AB12", "gameState": "full" })),
            "Invalid request - update-game"
        );
    }

    #[test]
    fn unknown_event_names_the_event() {
        assert_eq!(message("launch-confetti", json!({})), "Invalid request - launch-confetti");
    }

    #[test]
    fn valid_payloads_become_requests() {
        let request = parse_request(
            "join-team",
            &json!({ "sessionId": "AB12", "name": "Alice", "team": "B" }),
        )
        .unwrap();
        assert_eq!(
            request,
            InboundRequest::JoinTeam {
                session_id: SessionId::parse("AB12").unwrap(),
                name: "Alice".into(),
                team: Team::B,
            }
        );

        let request = parse_request(
            "update-game",
            &json!({ "sessionId": "AB12", "gameState": { "roundCounter": 1, "pointPool": 100 } }),
        )
        .unwrap();
        let InboundRequest::UpdateGame { game_state, .. } = request else {
            panic!("expected an update-game request");
        };
        assert_eq!(game_state.round_counter, 1);
        assert_eq!(game_state.point_pool, 100);
    }
}
