//! Game results as recorded in `game.completed` events.

use crate::ids::TeamId;
use serde::{Deserialize, Serialize};

/// Outcome of one simulated game. `winner_team_id` of `None` is a tie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_score: u32,
    pub away_score: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub winner_team_id: Option<TeamId>,
}

impl GameResult {
    /// Result whose winner is whichever side scored more; equal scores tie.
    pub fn from_scores(
        home_team_id: TeamId,
        away_team_id: TeamId,
        home_score: u32,
        away_score: u32,
    ) -> Self {
        let winner_team_id = match home_score.cmp(&away_score) {
            std::cmp::Ordering::Greater => Some(home_team_id.clone()),
            std::cmp::Ordering::Less => Some(away_team_id.clone()),
            std::cmp::Ordering::Equal => None,
        };
        Self {
            home_team_id,
            away_team_id,
            home_score,
            away_score,
            winner_team_id,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.winner_team_id.is_none()
    }
}

// Upstream writers encode a tie as an empty string as often as null.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<TeamId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()).map(TeamId::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_winner_string_is_a_tie() {
        let json = r#"{"home_team_id":"a","away_team_id":"b","home_score":40,"away_score":40,"winner_team_id":""}"#;
        let result: GameResult = serde_json::from_str(json).unwrap();
        assert!(result.is_tie());

        let json = r#"{"home_team_id":"a","away_team_id":"b","home_score":40,"away_score":40,"winner_team_id":null}"#;
        let result: GameResult = serde_json::from_str(json).unwrap();
        assert!(result.is_tie());
    }

    #[test]
    fn from_scores_picks_higher_score() {
        let result = GameResult::from_scores("a".into(), "b".into(), 33, 41);
        assert_eq!(result.winner_team_id, Some(TeamId::from("b")));
        assert!(GameResult::from_scores("a".into(), "b".into(), 30, 30).is_tie());
    }
}
