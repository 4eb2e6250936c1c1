use std::{collections::HashSet, fmt};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Value of `currentStep` at the start of a round (the "manage" phase of the host UI).
pub const INITIAL_STEP: u32 = 1;

/// Identifier of a game session: exactly four characters from `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

/// Error returned when a string is not a well-formed session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a valid session id")]
pub struct InvalidSessionId(pub String);

impl SessionId {
    /// Number of characters in a session identifier.
    pub const LEN: usize = 4;

    /// Parse and validate a raw session identifier.
    pub fn parse(raw: &str) -> Result<Self, InvalidSessionId> {
        if Self::is_valid(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidSessionId(raw.to_owned()))
        }
    }

    /// Whether `raw` matches `^[A-Z0-9]{4}$`.
    pub fn is_valid(raw: &str) -> bool {
        raw.len() == Self::LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the two competing teams.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Team {
    /// Team "A", also the default active team.
    #[default]
    A,
    /// Team "B".
    B,
}

impl Team {
    /// Wire representation of the team.
    pub fn as_str(self) -> &'static str {
        match self {
            Team::A => "A",
            Team::B => "B",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-team pair of values, serialized as `{"A": .., "B": ..}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeamPair<T> {
    /// Value for team A.
    #[serde(rename = "A")]
    pub a: T,
    /// Value for team B.
    #[serde(rename = "B")]
    pub b: T,
}

impl<T> TeamPair<T> {
    /// Build a pair from both values.
    pub fn new(a: T, b: T) -> Self {
        Self { a, b }
    }

    /// Borrow the value belonging to `team`.
    pub fn get(&self, team: Team) -> &T {
        match team {
            Team::A => &self.a,
            Team::B => &self.b,
        }
    }

    /// Mutably borrow the value belonging to `team`.
    pub fn get_mut(&mut self, team: Team) -> &mut T {
        match team {
            Team::A => &mut self.a,
            Team::B => &mut self.b,
        }
    }
}

/// Team display names used until the host renames them.
pub fn default_team_names() -> TeamPair<String> {
    TeamPair::new(Team::A.as_str().to_owned(), Team::B.as_str().to_owned())
}

/// A survey answer on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Answer {
    /// Identifier unique within the current board.
    pub id: String,
    /// Text revealed when the answer is guessed.
    pub text: String,
    /// Points the answer is worth before the multiplier.
    pub points: u32,
}

/// Reference to an answer that has been guessed this round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct GuessedAnswer {
    /// Identifier of the guessed [`Answer`].
    pub id: String,
}

/// Full shared state of one game session, as persisted and broadcast.
///
/// Every field has a default so hosts may send partial states. The transient
/// command flags (`roundReset`, `gameReset`, `nextRound`) are consumed by the
/// session state machine and are always `false` in persisted snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase", default)]
#[validate(schema(function = "validate_board"))]
pub struct GameState {
    /// Session this state belongs to.
    #[serde(deserialize_with = "empty_as_none")]
    pub session_id: Option<String>,
    /// RFC 3339 creation timestamp of the session.
    #[serde(deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_timestamp"))]
    pub created_at: Option<String>,
    /// Advisory RFC 3339 expiry timestamp.
    #[serde(deserialize_with = "empty_as_none")]
    #[validate(custom(function = "validate_timestamp"))]
    pub expiry_time: Option<String>,
    #[schema(value_type = Object)]
    pub team_names: TeamPair<String>,
    #[schema(value_type = Object)]
    pub team_scores: TeamPair<u32>,
    /// Persistent strike tally per team.
    #[schema(value_type = Object)]
    pub team_strikes: TeamPair<u32>,
    #[schema(value_type = Object)]
    pub team_members: TeamPair<Vec<String>>,
    /// Strikes of the currently active team in this round.
    #[validate(range(max = 3))]
    pub strikes: u8,
    pub question: String,
    #[validate(length(max = 8))]
    pub answers: Vec<Answer>,
    pub guessed_answers: Vec<GuessedAnswer>,
    pub guessed_answers_count: u32,
    pub current_team: Team,
    pub first_team: Option<Team>,
    pub starting_team: Option<Team>,
    pub starting_team_set: bool,
    pub second_team_guess_used: bool,
    #[validate(range(min = 1, max = 3))]
    pub score_multiplier: Option<u8>,
    pub point_pool: u32,
    pub round_counter: u32,
    pub round_over: bool,
    pub winning_team: Option<Team>,
    pub points_awarded: u32,
    /// Winner of the buzz-in race, cleared when a round restarts.
    #[serde(deserialize_with = "empty_as_none")]
    pub buzzed_player: Option<String>,
    /// Timer value in seconds.
    pub timer: u32,
    pub timer_running: bool,
    pub round_reset: bool,
    pub game_reset: bool,
    pub next_round: bool,
    /// Coarse UI phase; passed through untouched except on resets.
    pub current_step: u32,
    pub multiplier_set: bool,
    pub answers_saved: bool,
    pub question_saved: bool,
    pub buzzer_only_pressed: bool,
    pub correct_after_buzzer: bool,
    pub correct_before_buzzer: bool,
    pub entered_from_home: bool,
    pub is_loading: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            session_id: None,
            created_at: None,
            expiry_time: None,
            team_names: default_team_names(),
            team_scores: TeamPair::default(),
            team_strikes: TeamPair::default(),
            team_members: TeamPair::default(),
            strikes: 0,
            question: String::new(),
            answers: Vec::new(),
            guessed_answers: Vec::new(),
            guessed_answers_count: 0,
            current_team: Team::A,
            first_team: None,
            starting_team: None,
            starting_team_set: false,
            second_team_guess_used: false,
            score_multiplier: None,
            point_pool: 0,
            round_counter: 0,
            round_over: false,
            winning_team: None,
            points_awarded: 0,
            buzzed_player: None,
            timer: 0,
            timer_running: false,
            round_reset: false,
            game_reset: false,
            next_round: false,
            current_step: INITIAL_STEP,
            multiplier_set: false,
            answers_saved: false,
            question_saved: false,
            buzzer_only_pressed: false,
            correct_after_buzzer: false,
            correct_before_buzzer: false,
            entered_from_home: false,
            is_loading: false,
        }
    }
}

impl GameState {
    /// Initial record written when a session is created.
    pub fn for_new_session(id: &SessionId, created_at: OffsetDateTime, expiry_time: String) -> Self {
        Self {
            session_id: Some(id.to_string()),
            created_at: Some(format_timestamp(created_at)),
            expiry_time: Some(expiry_time),
            ..Self::default()
        }
    }

    /// Identifiers of the answers currently on the board.
    pub fn answer_ids(&self) -> HashSet<&str> {
        self.answers.iter().map(|answer| answer.id.as_str()).collect()
    }

    /// Whether a player already won the buzz-in race.
    pub fn has_buzzed_player(&self) -> bool {
        self.buzzed_player
            .as_deref()
            .is_some_and(|name| !name.is_empty())
    }
}

/// Canonical start-of-round values, applied as one block on every round reset.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResetFields {
    pub round_reset: bool,
    pub next_round: bool,
    pub round_over: bool,
    pub buzzed_player: Option<String>,
    pub starting_team_set: bool,
    pub current_team: Team,
    pub strikes: u8,
    pub point_pool: u32,
    pub first_team: Option<Team>,
    pub second_team_guess_used: bool,
    pub score_multiplier: Option<u8>,
    pub timer: u32,
    pub timer_running: bool,
    pub question: String,
    pub points_awarded: u32,
    pub winning_team: Option<Team>,
    pub answers: Vec<Answer>,
    pub guessed_answers: Vec<GuessedAnswer>,
    pub team_strikes: TeamPair<u32>,
    pub current_step: u32,
    pub multiplier_set: bool,
    pub answers_saved: bool,
    pub starting_team: Option<Team>,
    pub question_saved: bool,
    pub buzzer_only_pressed: bool,
    pub correct_after_buzzer: bool,
}

impl RoundResetFields {
    /// Overwrite the round-scoped fields of `state` with these values.
    pub fn merge_into(self, state: &mut GameState) {
        let Self {
            round_reset,
            next_round,
            round_over,
            buzzed_player,
            starting_team_set,
            current_team,
            strikes,
            point_pool,
            first_team,
            second_team_guess_used,
            score_multiplier,
            timer,
            timer_running,
            question,
            points_awarded,
            winning_team,
            answers,
            guessed_answers,
            team_strikes,
            current_step,
            multiplier_set,
            answers_saved,
            starting_team,
            question_saved,
            buzzer_only_pressed,
            correct_after_buzzer,
        } = self;

        state.round_reset = round_reset;
        state.next_round = next_round;
        state.round_over = round_over;
        state.buzzed_player = buzzed_player;
        state.starting_team_set = starting_team_set;
        state.current_team = current_team;
        state.strikes = strikes;
        state.point_pool = point_pool;
        state.first_team = first_team;
        state.second_team_guess_used = second_team_guess_used;
        state.score_multiplier = score_multiplier;
        state.timer = timer;
        state.timer_running = timer_running;
        state.question = question;
        state.points_awarded = points_awarded;
        state.winning_team = winning_team;
        state.answers = answers;
        state.guessed_answers = guessed_answers;
        state.team_strikes = team_strikes;
        state.current_step = current_step;
        state.multiplier_set = multiplier_set;
        state.answers_saved = answers_saved;
        state.starting_team = starting_team;
        state.question_saved = question_saved;
        state.buzzer_only_pressed = buzzer_only_pressed;
        state.correct_after_buzzer = correct_after_buzzer;
    }
}

/// Round reset plus the game-wide counters zeroed by a full game reset.
#[derive(Debug, Clone, PartialEq)]
pub struct GameResetFields {
    pub round: RoundResetFields,
    pub game_reset: bool,
    pub round_counter: u32,
    pub team_scores: TeamPair<u32>,
}

impl GameResetFields {
    /// Overwrite the round- and game-scoped fields of `state`.
    pub fn merge_into(self, state: &mut GameState) {
        self.round.merge_into(state);
        state.game_reset = self.game_reset;
        state.round_counter = self.round_counter;
        state.team_scores = self.team_scores;
    }
}

/// The canonical start-of-round state.
pub fn round_reset_defaults() -> RoundResetFields {
    RoundResetFields {
        round_reset: false,
        next_round: false,
        round_over: false,
        buzzed_player: None,
        starting_team_set: false,
        current_team: Team::A,
        strikes: 0,
        point_pool: 0,
        first_team: None,
        second_team_guess_used: false,
        score_multiplier: None,
        timer: 0,
        timer_running: false,
        question: String::new(),
        points_awarded: 0,
        winning_team: None,
        answers: Vec::new(),
        guessed_answers: Vec::new(),
        team_strikes: TeamPair::default(),
        current_step: INITIAL_STEP,
        multiplier_set: false,
        answers_saved: false,
        starting_team: None,
        question_saved: false,
        buzzer_only_pressed: false,
        correct_after_buzzer: false,
    }
}

/// The canonical start-of-game state: a round reset with scores and the round counter zeroed.
pub fn game_reset_defaults() -> GameResetFields {
    GameResetFields {
        round: round_reset_defaults(),
        game_reset: false,
        round_counter: 0,
        team_scores: TeamPair::default(),
    }
}

/// Format a timestamp the way it is stored in session documents.
pub fn format_timestamp(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

fn validate_timestamp(value: &str) -> Result<(), ValidationError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("timestamp_format");
            err.message = Some("timestamp must be RFC 3339".into());
            err
        })
}

/// Answer ids must be unique and every guessed id must refer to a board answer.
fn validate_board(state: &GameState) -> Result<(), ValidationError> {
    let ids = state.answer_ids();
    if ids.len() != state.answers.len() {
        let mut err = ValidationError::new("duplicate_answer_id");
        err.message = Some("answer ids must be unique".into());
        return Err(err);
    }

    if let Some(stray) = state
        .guessed_answers
        .iter()
        .find(|guess| !ids.contains(guess.id.as_str()))
    {
        let mut err = ValidationError::new("unknown_guessed_answer");
        err.message = Some(format!("guessed answer `{}` is not on the board", stray.id).into());
        return Err(err);
    }

    Ok(())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}
