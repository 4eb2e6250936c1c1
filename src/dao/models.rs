use crate::state::game::{GameState, Team, TeamPair};

/// Field-level merge applied to a stored session without replacing the whole snapshot.
///
/// Only the populated fields are written; everything else in the stored state is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionPatch {
    /// Replacement for the team display names.
    pub team_names: Option<TeamPair<String>>,
    /// Replacement for the team member lists.
    pub team_members: Option<TeamPair<Vec<String>>>,
    /// Team picked to start the round.
    pub starting_team: Option<Team>,
    /// Whether the starting team has been picked.
    pub starting_team_set: Option<bool>,
    /// Advisory expiry, written when the stored record has none.
    pub expiry_time: Option<String>,
}

impl SessionPatch {
    /// Patch replacing the team member lists.
    pub fn team_members(members: TeamPair<Vec<String>>) -> Self {
        Self {
            team_members: Some(members),
            ..Self::default()
        }
    }

    /// Patch replacing the team display names.
    pub fn team_names(names: TeamPair<String>) -> Self {
        Self {
            team_names: Some(names),
            ..Self::default()
        }
    }

    /// Patch recording the starting team pick.
    pub fn starting_team(team: Team) -> Self {
        Self {
            starting_team: Some(team),
            starting_team_set: Some(true),
            ..Self::default()
        }
    }

    /// Also stamp `expiryTime` with the given RFC 3339 timestamp.
    pub fn with_expiry(mut self, expiry_time: String) -> Self {
        self.expiry_time = Some(expiry_time);
        self
    }

    /// Whether the patch would leave the stored state untouched.
    pub fn is_empty(&self) -> bool {
        self.team_names.is_none()
            && self.team_members.is_none()
            && self.starting_team.is_none()
            && self.starting_team_set.is_none()
            && self.expiry_time.is_none()
    }

    /// Apply the populated fields to an in-memory state.
    pub fn apply_to(self, state: &mut GameState) {
        if let Some(names) = self.team_names {
            state.team_names = names;
        }
        if let Some(members) = self.team_members {
            state.team_members = members;
        }
        if let Some(team) = self.starting_team {
            state.starting_team = Some(team);
        }
        if let Some(set) = self.starting_team_set {
            state.starting_team_set = set;
        }
        if let Some(expiry) = self.expiry_time {
            state.expiry_time = Some(expiry);
        }
    }
}

/// Outcome of an atomic buzz-in attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum BuzzClaim {
    /// The caller won the race; carries the state after the write.
    Claimed(GameState),
    /// Someone already holds the buzzer; nothing was written.
    AlreadyClaimed,
    /// No record exists for the session.
    SessionMissing,
}
