use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::SessionPatch;
use crate::state::game::{GameState, SessionId};

/// One document per session, keyed by the session id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSessionDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(flatten)]
    pub state: GameState,
}

impl MongoSessionDocument {
    pub fn new(id: &SessionId, state: GameState) -> Self {
        Self {
            id: id.to_string(),
            state,
        }
    }
}

pub fn doc_id(id: &SessionId) -> Document {
    doc! { "_id": id.as_str() }
}

/// Filter matching the session only while nobody holds the buzzer.
pub fn unclaimed_buzzer(id: &SessionId) -> Document {
    doc! {
        "_id": id.as_str(),
        "$or": [
            { "buzzedPlayer": null },
            { "buzzedPlayer": "" },
        ],
    }
}

/// Translate a patch into a `$set` update document.
pub fn patch_update(patch: SessionPatch) -> Document {
    let mut set = Document::new();
    if let Some(names) = patch.team_names {
        set.insert("teamNames", doc! { "A": names.a, "B": names.b });
    }
    if let Some(members) = patch.team_members {
        set.insert("teamMembers", doc! { "A": members.a, "B": members.b });
    }
    if let Some(team) = patch.starting_team {
        set.insert("startingTeam", team.as_str());
    }
    if let Some(flag) = patch.starting_team_set {
        set.insert("startingTeamSet", flag);
    }
    if let Some(expiry) = patch.expiry_time {
        set.insert("expiryTime", expiry);
    }
    doc! { "$set": set }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{Team, TeamPair};

    #[test]
    fn patch_only_sets_populated_fields() {
        let update = patch_update(SessionPatch::team_members(TeamPair::new(
            vec!["Alice".into()],
            vec![],
        )));
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.len(), 1);
        let members = set.get_document("teamMembers").unwrap();
        assert_eq!(members.get_array("A").unwrap().len(), 1);

        let update = patch_update(SessionPatch::starting_team(Team::B));
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("startingTeam").unwrap(), "B");
        assert!(set.get_bool("startingTeamSet").unwrap());
        assert!(!set.contains_key("expiryTime"));

        let update = patch_update(
            SessionPatch::starting_team(Team::A).with_expiry("2025-03-02T12:00:00Z".into()),
        );
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("expiryTime").unwrap(), "2025-03-02T12:00:00Z");
    }
}
