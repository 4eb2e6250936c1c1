//! Session operations: every read and mutation of a game session goes through here.
//!
//! Mutations hold the per-session gate (when enabled) across their read-modify-write,
//! persist first and broadcast only after the store accepted the write.

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    dao::models::{BuzzClaim, SessionPatch},
    dto::ws::TeamMembers,
    error::ServiceError,
    services::session_events,
    state::{
        SharedState,
        game::{GameState, SessionId, Team},
        rooms::{ConnectionId, PlayerSeat},
        state_machine::{add_member, remove_member},
    },
};

/// Create the session record unless it already exists.
pub async fn create_session(state: &SharedState, id: &SessionId) -> Result<(), ServiceError> {
    let store = state.require_session_store().await?;
    let now = OffsetDateTime::now_utc();
    let initial = GameState::for_new_session(id, now, state.state_machine().expiry_from(now));
    let created = store.create_session(id.clone(), initial).await?;
    if created {
        info!(session_id = %id, "session created");
    } else {
        debug!(session_id = %id, "session already exists");
    }
    Ok(())
}

pub async fn session_exists(state: &SharedState, id: &SessionId) -> Result<bool, ServiceError> {
    let store = state.require_session_store().await?;
    Ok(store.session_exists(id.clone()).await?)
}

/// Subscribe the connection to the session room.
pub async fn join_session(
    state: &SharedState,
    connection: ConnectionId,
    id: &SessionId,
) -> Result<(), ServiceError> {
    ensure_exists(state, id).await?;
    state.rooms().subscribe(connection, id);
    info!(session_id = %id, %connection, "connection joined session");
    Ok(())
}

/// Latest snapshot, or `None` when the session has no record.
pub async fn current_state(
    state: &SharedState,
    id: &SessionId,
) -> Result<Option<GameState>, ServiceError> {
    let store = state.require_session_store().await?;
    Ok(store.find_session(id.clone()).await?)
}

/// Team member lists of an existing session.
pub async fn team_members(
    state: &SharedState,
    id: &SessionId,
) -> Result<TeamMembers, ServiceError> {
    Ok(load(state, id).await?.team_members)
}

/// Append the player to the team and remember who the connection plays as.
///
/// A connection moving to another session gives up the seat it held there.
pub async fn join_team(
    state: &SharedState,
    connection: ConnectionId,
    id: &SessionId,
    name: &str,
    team: Team,
) -> Result<TeamMembers, ServiceError> {
    let members = {
        let _gate = state.lock_session(id).await;
        let game = load(state, id).await?;
        let mut members = game.team_members.clone();
        add_member(&mut members, team, name);
        save_members(state, id, &game, members).await?
    };

    let replaced = state.rooms().record_player(
        connection,
        PlayerSeat {
            session_id: id.clone(),
            name: name.to_owned(),
            team,
        },
    );
    info!(session_id = %id, %connection, player = name, %team, "player joined team");
    session_events::broadcast_team_members(state, id, &members);

    if let Some(seat) = replaced.filter(|seat| seat.session_id != *id) {
        let previous = seat.session_id.clone();
        if let Err(err) = release_seat(state, seat).await {
            warn!(session_id = %previous, %connection, error = %err, "failed to release previous seat");
        }
    }
    Ok(members)
}

/// Remove the first member of `team` called `name`.
pub async fn remove_team_member(
    state: &SharedState,
    id: &SessionId,
    name: &str,
    team: Team,
) -> Result<TeamMembers, ServiceError> {
    let _gate = state.lock_session(id).await;
    let game = load(state, id).await?;
    let mut members = game.team_members.clone();
    if !remove_member(&mut members, team, name) {
        debug!(session_id = %id, player = name, %team, "member to remove not found");
    }
    let members = save_members(state, id, &game, members).await?;

    session_events::broadcast_team_members(state, id, &members);
    Ok(members)
}

/// Rename a team; only the names are broadcast.
pub async fn update_team_name(
    state: &SharedState,
    id: &SessionId,
    team: Team,
    name: &str,
) -> Result<(), ServiceError> {
    let _gate = state.lock_session(id).await;
    let game = load(state, id).await?;
    let mut names = game.team_names.clone();
    *names.get_mut(team) = name.to_owned();

    let merged = merge(state, id, &game, SessionPatch::team_names(names)).await?;

    session_events::broadcast_team_names(state, id, &merged.team_names);
    Ok(())
}

/// First buzz wins. Returns whether this buzz claimed the buzzer.
pub async fn buzz(state: &SharedState, id: &SessionId, name: &str) -> Result<bool, ServiceError> {
    let _gate = state.lock_session(id).await;
    let store = state.require_session_store().await?;
    match store.claim_buzzer(id.clone(), name.to_owned()).await? {
        BuzzClaim::Claimed(game) => {
            let game = if game.expiry_time.is_none() {
                merge(state, id, &game, SessionPatch::default()).await?
            } else {
                game
            };
            info!(session_id = %id, player = name, "buzzer claimed");
            session_events::broadcast_game_state(state, id, &game);
            session_events::broadcast_buzzed(state, id, name);
            Ok(true)
        }
        BuzzClaim::AlreadyClaimed => {
            debug!(session_id = %id, player = name, "buzz ignored; buzzer already claimed");
            Ok(false)
        }
        BuzzClaim::SessionMissing => Err(ServiceError::SessionNotFound(id.clone())),
    }
}

pub async fn play_strike_sound(state: &SharedState, id: &SessionId) -> Result<(), ServiceError> {
    ensure_exists(state, id).await?;
    session_events::broadcast_strike_sound(state, id);
    Ok(())
}

/// Ask every client of the room to reset its round view; the stored state is untouched.
pub async fn reset_round(state: &SharedState, id: &SessionId) -> Result<(), ServiceError> {
    ensure_exists(state, id).await?;
    session_events::broadcast_round_reset(state, id);
    Ok(())
}

/// Record the team picked to start the round and broadcast the full state.
pub async fn set_starting_team(
    state: &SharedState,
    id: &SessionId,
    team: Team,
) -> Result<GameState, ServiceError> {
    let _gate = state.lock_session(id).await;
    let current = load(state, id).await?;
    let game = merge(state, id, &current, SessionPatch::starting_team(team)).await?;

    session_events::broadcast_game_state(state, id, &game);
    Ok(game)
}

/// Apply a host-submitted state through the state machine, persist it, then broadcast
/// the new state followed by the scheduled transition events.
pub async fn update_game(
    state: &SharedState,
    id: &SessionId,
    incoming: GameState,
) -> Result<GameState, ServiceError> {
    let _gate = state.lock_session(id).await;
    let store = state.require_session_store().await?;
    let previous = store
        .find_session(id.clone())
        .await?
        .ok_or_else(|| ServiceError::SessionNotFound(id.clone()))?;

    let plan = state
        .state_machine()
        .plan(id, &previous, incoming, OffsetDateTime::now_utc());
    store.save_session(id.clone(), plan.next.clone()).await?;

    if !plan.events.is_empty() {
        info!(session_id = %id, events = ?plan.events, "state transition");
    }
    session_events::broadcast_game_state(state, id, &plan.next);
    session_events::broadcast_transitions(state, id, &plan.events);
    Ok(plan.next)
}

/// Forget the connection and drop its player from the team it joined, if any.
pub async fn disconnect(state: &SharedState, connection: ConnectionId) -> Result<(), ServiceError> {
    let Some(seat) = state.rooms().forget(connection) else {
        debug!(%connection, "disconnected connection held no seat");
        return Ok(());
    };
    info!(session_id = %seat.session_id, %connection, player = %seat.name, team = %seat.team, "player left on disconnect");
    release_seat(state, seat).await
}

/// Remove the seat's player from its team and tell the room.
async fn release_seat(state: &SharedState, seat: PlayerSeat) -> Result<(), ServiceError> {
    let PlayerSeat {
        session_id,
        name,
        team,
    } = seat;
    let _gate = state.lock_session(&session_id).await;
    let store = state.require_session_store().await?;
    let Some(game) = store.find_session(session_id.clone()).await? else {
        warn!(session_id = %session_id, player = %name, "session vanished before seat release");
        return Ok(());
    };

    let mut members = game.team_members.clone();
    remove_member(&mut members, team, &name);
    let members = save_members(state, &session_id, &game, members).await?;
    session_events::broadcast_team_members(state, &session_id, &members);
    Ok(())
}

async fn ensure_exists(state: &SharedState, id: &SessionId) -> Result<(), ServiceError> {
    if session_exists(state, id).await? {
        Ok(())
    } else {
        Err(ServiceError::SessionNotFound(id.clone()))
    }
}

async fn load(state: &SharedState, id: &SessionId) -> Result<GameState, ServiceError> {
    let store = state.require_session_store().await?;
    store
        .find_session(id.clone())
        .await?
        .ok_or_else(|| ServiceError::SessionNotFound(id.clone()))
}

async fn save_members(
    state: &SharedState,
    id: &SessionId,
    current: &GameState,
    members: TeamMembers,
) -> Result<TeamMembers, ServiceError> {
    let merged = merge(state, id, current, SessionPatch::team_members(members)).await?;
    Ok(merged.team_members)
}

/// Merge `patch`, stamping `expiryTime` when `current` has none.
///
/// Callers hold the session gate, so `current` is the latest stored state.
async fn merge(
    state: &SharedState,
    id: &SessionId,
    current: &GameState,
    patch: SessionPatch,
) -> Result<GameState, ServiceError> {
    let patch = if current.expiry_time.is_none() {
        patch.with_expiry(state.state_machine().expiry_from(OffsetDateTime::now_utc()))
    } else {
        patch
    };
    let store = state.require_session_store().await?;
    store
        .merge_session(id.clone(), patch)
        .await?
        .ok_or_else(|| ServiceError::SessionNotFound(id.clone()))
}
