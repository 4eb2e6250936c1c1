use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dto::ws::{Buzzed, ErrorPayload, ServerEvent, TeamMembers, TeamNames},
    state::{
        SharedState,
        game::{GameState, SessionId},
        rooms::ConnectionId,
        state_machine::TransitionEvent,
    },
};

/// Primary "state updated" event carrying the full game state.
pub const EVENT_UPDATE_GAME: &str = "update-game";
pub const EVENT_CURRENT_STATE: &str = "current-state";
pub const EVENT_JOINED_SESSION: &str = "joined-session";
pub const EVENT_TEAM_MEMBERS_UPDATED: &str = "team-members-updated";
pub const EVENT_TEAM_NAMES_UPDATED: &str = "team-names-updated";
pub const EVENT_PLAY_STRIKE_SOUND: &str = "play-strike-sound";
pub const EVENT_BUZZED: &str = "buzzed";
pub const EVENT_ROUND_OVER: &str = "round-over";
pub const EVENT_NEXT_ROUND: &str = "next-round";
pub const EVENT_RESET_ROUND: &str = "reset-round";
pub const EVENT_RESET_BUZZERS: &str = "reset-buzzers";
pub const EVENT_VALIDATE_SESSION: &str = "validate-session";
pub const EVENT_ERROR: &str = "error";

impl TransitionEvent {
    /// Wire name of the scheduled event.
    pub fn event_name(self) -> &'static str {
        match self {
            TransitionEvent::RoundOver => EVENT_ROUND_OVER,
            TransitionEvent::NextRound => EVENT_NEXT_ROUND,
            TransitionEvent::ResetRound => EVENT_RESET_ROUND,
            TransitionEvent::ResetBuzzers => EVENT_RESET_BUZZERS,
        }
    }
}

/// Broadcast the full game state to the session room.
pub fn broadcast_game_state(state: &SharedState, session: &SessionId, game: &GameState) {
    send_room_event(state, session, EVENT_UPDATE_GAME, game);
}

/// Broadcast the transition events scheduled by a state update, in order.
pub fn broadcast_transitions(state: &SharedState, session: &SessionId, events: &[TransitionEvent]) {
    for event in events {
        send_room_frame(state, session, ServerEvent::bare(event.event_name()));
    }
}

/// Broadcast the team member lists to the session room.
pub fn broadcast_team_members(state: &SharedState, session: &SessionId, members: &TeamMembers) {
    send_room_event(state, session, EVENT_TEAM_MEMBERS_UPDATED, members);
}

/// Broadcast the team names to the session room.
pub fn broadcast_team_names(state: &SharedState, session: &SessionId, names: &TeamNames) {
    send_room_event(state, session, EVENT_TEAM_NAMES_UPDATED, names);
}

/// Announce the winner of the buzz-in race.
pub fn broadcast_buzzed(state: &SharedState, session: &SessionId, name: &str) {
    let payload = Buzzed {
        name: name.to_owned(),
    };
    send_room_event(state, session, EVENT_BUZZED, &payload);
}

pub fn broadcast_strike_sound(state: &SharedState, session: &SessionId) {
    send_room_frame(state, session, ServerEvent::bare(EVENT_PLAY_STRIKE_SOUND));
}

/// Tell every client to reset its round view and re-arm its buzzer.
pub fn broadcast_round_reset(state: &SharedState, session: &SessionId) {
    broadcast_transitions(
        state,
        session,
        &[TransitionEvent::ResetRound, TransitionEvent::ResetBuzzers],
    );
}

/// Send a payload to a single connection.
pub fn send_to_connection(
    state: &SharedState,
    connection: ConnectionId,
    event: &str,
    payload: &impl Serialize,
    ack: Option<u64>,
) {
    match ServerEvent::json(event, payload) {
        Ok(frame) => {
            if !state.hub().send_to(connection, frame.with_ack(ack)) {
                debug!(%connection, event, "connection gone; dropping frame");
            }
        }
        Err(err) => warn!(event, error = %err, "failed to serialize socket payload"),
    }
}

/// Send a scoped error to the originating connection only.
pub fn send_error(state: &SharedState, connection: ConnectionId, message: impl Into<String>) {
    let payload = ErrorPayload {
        message: message.into(),
    };
    send_to_connection(state, connection, EVENT_ERROR, &payload, None);
}

fn send_room_event(state: &SharedState, session: &SessionId, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(event, payload) {
        Ok(frame) => send_room_frame(state, session, frame),
        Err(err) => warn!(event, session_id = %session, error = %err, "failed to serialize room payload"),
    }
}

fn send_room_frame(state: &SharedState, session: &SessionId, frame: ServerEvent) {
    let members = state.rooms().members(session);
    let delivered = state.hub().send_to_all(&members, &frame);
    debug!(
        session_id = %session,
        event = %frame.event,
        listeners = members.len(),
        delivered,
        "room broadcast"
    );
}
