use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        requests::{InboundRequest, parse_request},
        ws::{ClientFrame, JoinedSession, SessionExistence},
    },
    error::{RequestError, ServiceError},
    services::{session_events, session_service},
    state::{SharedState, rooms::ConnectionId},
};

/// Handle the full lifecycle of one client socket.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let outbound = state.hub().register(connection);

    // Dedicated writer task keeps outbound frames flowing while inbound frames are processed.
    let writer_task = tokio::spawn(async move {
        let mut outbound = UnboundedReceiverStream::new(outbound);
        while let Some(event) = outbound.next().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(event = %event.event, error = %err, "failed to serialize outbound frame");
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    info!(%connection, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => handle_text(&state, connection, text.as_str()).await,
            Ok(Message::Binary(_)) => {
                session_events::send_error(
                    &state,
                    connection,
                    RequestError::malformed_frame().message,
                );
            }
            Ok(Message::Close(_)) => {
                info!(%connection, "client closed");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%connection, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Err(err) = session_service::disconnect(&state, connection).await {
        warn!(%connection, error = %err, "disconnect cleanup failed");
    }
    state.hub().unregister(connection);
    info!(%connection, "client disconnected");

    finalize(writer_task).await;
}

async fn handle_text(state: &SharedState, connection: ConnectionId, text: &str) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => dispatch(state, connection, frame).await,
        Err(err) => {
            warn!(%connection, error = %err, "failed to parse socket frame");
            session_events::send_error(state, connection, RequestError::malformed_frame().message);
        }
    }
}

/// Validate and execute one inbound frame on behalf of `connection`.
///
/// Failures are reported to that connection only, as an `error` event.
pub async fn dispatch(state: &SharedState, connection: ConnectionId, frame: ClientFrame) {
    let ClientFrame { event, data, ack } = frame;
    debug!(%connection, event = %event, "received socket event");

    let request = match parse_request(&event, &data) {
        Ok(request) => request,
        Err(err) => {
            warn!(%connection, event = %event, message = %err, "rejected socket request");
            session_events::send_error(state, connection, err.message);
            return;
        }
    };

    let session_id = request.session_id().clone();
    if let Err(err) = execute(state, connection, request, ack).await {
        if err.is_store_failure() {
            warn!(%connection, event = %event, session_id = %session_id, error = %err, "session store failure");
        } else {
            info!(%connection, event = %event, session_id = %session_id, error = %err, "socket request failed");
        }
        session_events::send_error(state, connection, err.client_message());
    }
}

async fn execute(
    state: &SharedState,
    connection: ConnectionId,
    request: InboundRequest,
    ack: Option<u64>,
) -> Result<(), ServiceError> {
    match request {
        InboundRequest::JoinSession { session_id } => {
            session_service::join_session(state, connection, &session_id).await?;
            let reply = JoinedSession {
                session_id: session_id.to_string(),
            };
            session_events::send_to_connection(
                state,
                connection,
                session_events::EVENT_JOINED_SESSION,
                &reply,
                ack,
            );
        }
        InboundRequest::JoinTeam {
            session_id,
            name,
            team,
        } => {
            session_service::join_team(state, connection, &session_id, &name, team).await?;
        }
        InboundRequest::RemoveTeamMember {
            session_id,
            name,
            team,
        } => {
            session_service::remove_team_member(state, &session_id, &name, team).await?;
        }
        InboundRequest::Buzz { session_id, name } => {
            session_service::buzz(state, &session_id, &name).await?;
        }
        InboundRequest::PlayStrikeSound { session_id } => {
            session_service::play_strike_sound(state, &session_id).await?;
        }
        InboundRequest::GetCurrentState { session_id } => {
            let current = session_service::current_state(state, &session_id).await?;
            session_events::send_to_connection(
                state,
                connection,
                session_events::EVENT_CURRENT_STATE,
                &current,
                ack,
            );
        }
        InboundRequest::UpdateGame {
            session_id,
            game_state,
        } => {
            session_service::update_game(state, &session_id, *game_state).await?;
        }
        InboundRequest::UpdateTeamName {
            session_id,
            team,
            name,
        } => {
            session_service::update_team_name(state, &session_id, team, &name).await?;
        }
        InboundRequest::ValidateSession { session_id } => {
            let exists = session_service::session_exists(state, &session_id).await?;
            session_events::send_to_connection(
                state,
                connection,
                session_events::EVENT_VALIDATE_SESSION,
                &SessionExistence { exists },
                ack,
            );
        }
        InboundRequest::GetTeamMembers { session_id } => {
            let members = session_service::team_members(state, &session_id).await?;
            session_events::send_to_connection(
                state,
                connection,
                session_events::EVENT_TEAM_MEMBERS_UPDATED,
                &members,
                ack,
            );
        }
        InboundRequest::SetStartingTeam {
            session_id,
            starting_team,
        } => {
            session_service::set_starting_team(state, &session_id, starting_team).await?;
        }
        InboundRequest::ResetRound { session_id } => {
            session_service::reset_round(state, &session_id).await?;
        }
    }
    Ok(())
}

async fn finalize(writer_task: JoinHandle<()>) {
    let _ = writer_task.await;
}
