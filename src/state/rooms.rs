use std::collections::HashSet;

use dashmap::DashMap;
use uuid::Uuid;

use crate::state::game::{SessionId, Team};

/// Identifier assigned to every live socket.
pub type ConnectionId = Uuid;

/// Player identity a connection took when joining a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSeat {
    pub session_id: SessionId,
    pub name: String,
    pub team: Team,
}

/// Tracks which connections listen to which session and who they play as.
///
/// Entries only go away through [`RoomRegistry::forget`]; nothing expires by time.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: DashMap<SessionId, HashSet<ConnectionId>>,
    subscriptions: DashMap<ConnectionId, HashSet<SessionId>>,
    seats: DashMap<ConnectionId, PlayerSeat>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the connection to the session room. Subscribing twice is harmless.
    pub fn subscribe(&self, connection: ConnectionId, session: &SessionId) {
        self.rooms
            .entry(session.clone())
            .or_default()
            .insert(connection);
        self.subscriptions
            .entry(connection)
            .or_default()
            .insert(session.clone());
    }

    /// Remember the player behind the connection and make sure it hears its room.
    ///
    /// A connection holds one seat; the seat it replaces is returned.
    pub fn record_player(&self, connection: ConnectionId, seat: PlayerSeat) -> Option<PlayerSeat> {
        self.subscribe(connection, &seat.session_id);
        self.seats.insert(connection, seat)
    }

    /// Remove every trace of the connection, returning the seat it held.
    pub fn forget(&self, connection: ConnectionId) -> Option<PlayerSeat> {
        if let Some((_, sessions)) = self.subscriptions.remove(&connection) {
            for session in sessions {
                if let Some(mut members) = self.rooms.get_mut(&session) {
                    members.remove(&connection);
                }
                self.rooms.remove_if(&session, |_, members| members.is_empty());
            }
        }
        self.seats.remove(&connection).map(|(_, seat)| seat)
    }

    /// Connections currently subscribed to the session room.
    pub fn members(&self, session: &SessionId) -> Vec<ConnectionId> {
        self.rooms
            .get(session)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of rooms with at least one listener.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[test]
    fn subscribe_is_idempotent() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        registry.subscribe(conn, &session("AB12"));
        registry.subscribe(conn, &session("AB12"));
        assert_eq!(registry.members(&session("AB12")), vec![conn]);
    }

    #[test]
    fn record_player_joins_room_and_returns_replaced_seat() {
        let registry = RoomRegistry::new();
        let conn = Uuid::new_v4();
        let first = PlayerSeat {
            session_id: session("AB12"),
            name: "Alice".into(),
            team: Team::A,
        };
        assert_eq!(registry.record_player(conn, first.clone()), None);
        assert_eq!(registry.members(&session("AB12")), vec![conn]);

        let replaced = registry.record_player(
            conn,
            PlayerSeat {
                session_id: session("CD34"),
                name: "Alice".into(),
                team: Team::B,
            },
        );
        assert_eq!(replaced, Some(first));
        assert_eq!(registry.members(&session("CD34")), vec![conn]);
        assert_eq!(registry.forget(conn).unwrap().team, Team::B);
    }

    #[test]
    fn forget_drops_rooms_and_seat() {
        let registry = RoomRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        registry.record_player(
            alice,
            PlayerSeat {
                session_id: session("AB12"),
                name: "Alice".into(),
                team: Team::A,
            },
        );
        registry.subscribe(bob, &session("AB12"));
        registry.subscribe(alice, &session("CD34"));

        let seat = registry.forget(alice).unwrap();
        assert_eq!(seat.name, "Alice");
        assert_eq!(registry.forget(alice), None);
        assert_eq!(registry.members(&session("AB12")), vec![bob]);
        assert!(registry.members(&session("CD34")).is_empty());
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn forgetting_unknown_connection_is_a_no_op() {
        let registry = RoomRegistry::new();
        assert_eq!(registry.forget(Uuid::new_v4()), None);
    }
}
