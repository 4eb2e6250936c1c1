use std::collections::HashSet;

use time::{Duration, OffsetDateTime};

use crate::state::game::{
    GameState, GuessedAnswer, SessionId, Team, TeamPair, format_timestamp, game_reset_defaults,
    round_reset_defaults,
};

/// Default advisory lifetime of a session snapshot.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(24);

/// Room-wide events scheduled by a state update, emitted after the new state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    /// `roundOver` went from false to true.
    RoundOver,
    /// `roundOver` went from true to false without an explicit reset.
    NextRound,
    /// The round (or the whole game) was reset.
    ResetRound,
    /// Buzzers must be re-armed on every client.
    ResetBuzzers,
}

/// Result of planning a host-submitted state update.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// State to persist and broadcast.
    pub next: GameState,
    /// Events to broadcast after the state, in order.
    pub events: Vec<TransitionEvent>,
}

/// Turns the previous snapshot and an incoming host state into the next snapshot.
///
/// The machine is pure: it performs no I/O and takes the clock as input, so every
/// rule can be exercised without a store.
#[derive(Debug, Clone, Copy)]
pub struct SessionStateMachine {
    ttl: Duration,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStateMachine {
    /// Create a machine stamping `expiryTime` at `now + ttl` when the host omits it.
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Advisory expiry of a snapshot written at `now`.
    ///
    /// Falls back to [`DEFAULT_SESSION_TTL`] when `now + ttl` leaves the supported date range.
    pub fn expiry_from(&self, now: OffsetDateTime) -> String {
        let expiry = now
            .checked_add(self.ttl)
            .unwrap_or_else(|| now + DEFAULT_SESSION_TTL);
        format_timestamp(expiry)
    }

    /// Plan the next snapshot for `id` from `previous` and the host's `incoming` state.
    pub fn plan(
        &self,
        id: &SessionId,
        previous: &GameState,
        mut incoming: GameState,
        now: OffsetDateTime,
    ) -> UpdatePlan {
        let mut events = Vec::new();
        let prev_round_over = previous.round_over;
        let new_round_over = incoming.round_over;

        incoming.session_id = Some(id.to_string());
        if incoming.created_at.is_none() {
            incoming.created_at = previous.created_at.clone();
        }
        if incoming.expiry_time.is_none() {
            incoming.expiry_time = Some(self.expiry_from(now));
        }

        let next_round_edge = prev_round_over && !new_round_over && !incoming.round_reset;
        let round_reset = incoming.round_reset;
        let game_reset = incoming.game_reset;

        if !(next_round_edge || round_reset || game_reset) && incoming.answers == previous.answers
        {
            incoming.guessed_answers =
                merge_guessed(&previous.guessed_answers, incoming.guessed_answers);
        }

        if !prev_round_over && new_round_over {
            events.push(TransitionEvent::RoundOver);
        }

        if next_round_edge {
            round_reset_defaults().merge_into(&mut incoming);
            events.extend([TransitionEvent::NextRound, TransitionEvent::ResetBuzzers]);
        }

        if round_reset {
            round_reset_defaults().merge_into(&mut incoming);
            events.extend([TransitionEvent::ResetRound, TransitionEvent::ResetBuzzers]);
        }

        if game_reset {
            game_reset_defaults().merge_into(&mut incoming);
            events.extend([TransitionEvent::ResetRound, TransitionEvent::ResetBuzzers]);
        }

        incoming.round_reset = false;
        incoming.game_reset = false;
        incoming.next_round = false;

        UpdatePlan {
            next: incoming,
            events,
        }
    }
}

/// Keep every previously guessed id, then append newly guessed ones.
fn merge_guessed(previous: &[GuessedAnswer], incoming: Vec<GuessedAnswer>) -> Vec<GuessedAnswer> {
    let mut seen: HashSet<String> = previous.iter().map(|guess| guess.id.clone()).collect();
    let mut merged = previous.to_vec();
    for guess in incoming {
        if seen.insert(guess.id.clone()) {
            merged.push(guess);
        }
    }
    merged
}

/// Append `name` to the member list of `team`; duplicates are kept.
pub fn add_member(members: &mut TeamPair<Vec<String>>, team: Team, name: &str) {
    members.get_mut(team).push(name.to_owned());
}

/// Remove the first occurrence of `name` from `team`. Returns whether a member was removed.
pub fn remove_member(members: &mut TeamPair<Vec<String>>, team: Team, name: &str) -> bool {
    let list = members.get_mut(team);
    match list.iter().position(|member| member == name) {
        Some(index) => {
            list.remove(index);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::state::game::{Answer, INITIAL_STEP};

    fn session() -> SessionId {
        SessionId::parse("AB12").unwrap()
    }

    fn now() -> OffsetDateTime {
        datetime!(2025-03-01 12:00 UTC)
    }

    fn board() -> Vec<Answer> {
        ["a1", "a2", "a3"]
            .into_iter()
            .enumerate()
            .map(|(i, id)| Answer {
                id: id.into(),
                text: format!("answer {i}"),
                points: 10 * (i as u32 + 1),
            })
            .collect()
    }

    fn guessed(ids: &[&str]) -> Vec<GuessedAnswer> {
        ids.iter()
            .map(|id| GuessedAnswer { id: (*id).into() })
            .collect()
    }

    fn mid_round() -> GameState {
        GameState {
            round_over: true,
            buzzed_player: Some("Alice".into()),
            starting_team_set: true,
            current_team: Team::B,
            strikes: 2,
            point_pool: 60,
            first_team: Some(Team::A),
            second_team_guess_used: true,
            score_multiplier: Some(2),
            timer: 30,
            timer_running: true,
            question: "Name a pizza topping".into(),
            points_awarded: 60,
            winning_team: Some(Team::A),
            answers: board(),
            guessed_answers: guessed(&["a1"]),
            team_strikes: TeamPair::new(1, 3),
            team_scores: TeamPair::new(120, 40),
            round_counter: 2,
            current_step: 6,
            multiplier_set: true,
            answers_saved: true,
            starting_team: Some(Team::A),
            question_saved: true,
            buzzer_only_pressed: true,
            correct_after_buzzer: true,
            ..GameState::default()
        }
    }

    fn assert_round_reset(state: &GameState) {
        assert!(!state.round_reset);
        assert!(!state.game_reset);
        assert!(!state.round_over);
        assert_eq!(state.buzzed_player, None);
        assert!(!state.starting_team_set);
        assert_eq!(state.current_team, Team::A);
        assert_eq!(state.strikes, 0);
        assert_eq!(state.point_pool, 0);
        assert_eq!(state.first_team, None);
        assert!(!state.second_team_guess_used);
        assert_eq!(state.score_multiplier, None);
        assert_eq!(state.timer, 0);
        assert!(!state.timer_running);
        assert!(state.question.is_empty());
        assert_eq!(state.points_awarded, 0);
        assert_eq!(state.winning_team, None);
        assert!(state.answers.is_empty());
        assert!(state.guessed_answers.is_empty());
        assert_eq!(state.team_strikes, TeamPair::new(0, 0));
        assert_eq!(state.current_step, INITIAL_STEP);
        assert!(!state.multiplier_set);
        assert!(!state.answers_saved);
        assert_eq!(state.starting_team, None);
        assert!(!state.question_saved);
        assert!(!state.buzzer_only_pressed);
        assert!(!state.correct_after_buzzer);
    }

    #[test]
    fn plain_update_passes_through_and_stamps_metadata() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            created_at: Some("2025-03-01T10:00:00Z".into()),
            ..GameState::default()
        };
        let incoming = GameState {
            round_counter: 1,
            point_pool: 100,
            ..GameState::default()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert!(plan.events.is_empty());
        assert_eq!(plan.next.round_counter, 1);
        assert_eq!(plan.next.point_pool, 100);
        assert_eq!(plan.next.session_id.as_deref(), Some("AB12"));
        assert_eq!(
            plan.next.created_at.as_deref(),
            Some("2025-03-01T10:00:00Z")
        );
        assert_eq!(
            plan.next.expiry_time.as_deref(),
            Some("2025-03-02T12:00:00Z")
        );
    }

    #[test]
    fn out_of_range_ttl_falls_back_to_default() {
        let machine = SessionStateMachine::new(Duration::MAX);
        assert_eq!(machine.expiry_from(now()), "2025-03-02T12:00:00Z");

        let plan = machine.plan(&session(), &GameState::default(), GameState::default(), now());
        assert_eq!(
            plan.next.expiry_time.as_deref(),
            Some("2025-03-02T12:00:00Z")
        );
    }

    #[test]
    fn host_supplied_expiry_is_kept() {
        let machine = SessionStateMachine::default();
        let incoming = GameState {
            expiry_time: Some("2030-01-01T00:00:00Z".into()),
            ..GameState::default()
        };
        let plan = machine.plan(&session(), &GameState::default(), incoming, now());
        assert_eq!(
            plan.next.expiry_time.as_deref(),
            Some("2030-01-01T00:00:00Z")
        );
    }

    #[test]
    fn round_over_edge_schedules_event_without_reset() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            round_over: false,
            point_pool: 60,
            ..GameState::default()
        };
        let incoming = GameState {
            round_over: true,
            point_pool: 60,
            winning_team: Some(Team::B),
            ..GameState::default()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert_eq!(plan.events, vec![TransitionEvent::RoundOver]);
        assert!(plan.next.round_over);
        assert_eq!(plan.next.point_pool, 60);
        assert_eq!(plan.next.winning_team, Some(Team::B));
    }

    #[test]
    fn staying_round_over_schedules_nothing() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            round_over: true,
            ..GameState::default()
        };
        let incoming = previous.clone();
        let plan = machine.plan(&session(), &previous, incoming, now());
        assert!(plan.events.is_empty());
    }

    #[test]
    fn next_round_edge_applies_round_reset() {
        let machine = SessionStateMachine::default();
        let previous = mid_round();
        let incoming = GameState {
            round_over: false,
            round_counter: 3,
            ..mid_round()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert_eq!(
            plan.events,
            vec![TransitionEvent::NextRound, TransitionEvent::ResetBuzzers]
        );
        assert_round_reset(&plan.next);
        assert_eq!(plan.next.team_scores, TeamPair::new(120, 40));
        assert_eq!(plan.next.round_counter, 3);
    }

    #[test]
    fn explicit_round_reset_wins_over_next_round_edge() {
        let machine = SessionStateMachine::default();
        let previous = mid_round();
        let incoming = GameState {
            round_over: false,
            round_reset: true,
            ..mid_round()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert_eq!(
            plan.events,
            vec![TransitionEvent::ResetRound, TransitionEvent::ResetBuzzers]
        );
        assert_round_reset(&plan.next);
        assert_eq!(plan.next.round_counter, 2);
    }

    #[test]
    fn round_reset_from_mid_round_is_exhaustive() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            round_over: false,
            ..mid_round()
        };
        let incoming = GameState {
            round_over: false,
            round_reset: true,
            ..mid_round()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());
        assert_round_reset(&plan.next);
        assert_eq!(plan.next.team_scores, TeamPair::new(120, 40));
    }

    #[test]
    fn game_reset_also_zeroes_scores_and_counter() {
        let machine = SessionStateMachine::default();
        let previous = GameState::default();
        let incoming = GameState {
            team_scores: TeamPair::new(100, 100),
            point_pool: 100,
            round_counter: 5,
            game_reset: true,
            ..GameState::default()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert_eq!(
            plan.events,
            vec![TransitionEvent::ResetRound, TransitionEvent::ResetBuzzers]
        );
        assert_round_reset(&plan.next);
        assert_eq!(plan.next.team_scores, TeamPair::new(0, 0));
        assert_eq!(plan.next.point_pool, 0);
        assert_eq!(plan.next.round_counter, 0);
    }

    #[test]
    fn transient_flags_never_persist() {
        let machine = SessionStateMachine::default();
        let incoming = GameState {
            next_round: true,
            ..GameState::default()
        };
        let plan = machine.plan(&session(), &GameState::default(), incoming, now());
        assert!(!plan.next.next_round);
        assert!(!plan.next.round_reset);
        assert!(!plan.next.game_reset);
    }

    #[test]
    fn stale_guess_list_cannot_unguess() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            answers: board(),
            guessed_answers: guessed(&["a1", "a2"]),
            ..GameState::default()
        };
        let incoming = GameState {
            answers: board(),
            guessed_answers: guessed(&["a3"]),
            ..GameState::default()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert_eq!(plan.next.guessed_answers, guessed(&["a1", "a2", "a3"]));
    }

    #[test]
    fn guess_merge_deduplicates() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            answers: board(),
            guessed_answers: guessed(&["a1"]),
            ..GameState::default()
        };
        let incoming = GameState {
            answers: board(),
            guessed_answers: guessed(&["a1", "a2"]),
            ..GameState::default()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert_eq!(plan.next.guessed_answers, guessed(&["a1", "a2"]));
    }

    #[test]
    fn new_board_replaces_guesses() {
        let machine = SessionStateMachine::default();
        let previous = GameState {
            answers: board(),
            guessed_answers: guessed(&["a1", "a2"]),
            ..GameState::default()
        };
        let incoming = GameState {
            answers: board().into_iter().take(1).collect(),
            guessed_answers: Vec::new(),
            ..GameState::default()
        };

        let plan = machine.plan(&session(), &previous, incoming, now());

        assert!(plan.next.guessed_answers.is_empty());
        assert_eq!(plan.next.answers.len(), 1);
    }

    #[test]
    fn member_helpers_handle_duplicates() {
        let mut members = TeamPair::<Vec<String>>::default();
        add_member(&mut members, Team::A, "Alice");
        add_member(&mut members, Team::A, "Alice");
        add_member(&mut members, Team::B, "Bob");
        assert_eq!(members.a, vec!["Alice", "Alice"]);

        assert!(remove_member(&mut members, Team::A, "Alice"));
        assert_eq!(members.a, vec!["Alice"]);
        assert!(!remove_member(&mut members, Team::B, "Alice"));
        assert_eq!(members.b, vec!["Bob"]);
    }
}
