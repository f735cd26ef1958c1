//! League, season and roster snapshot types.

use crate::error::{LeagueError, LeagueResult};
use crate::ids::{GovernorId, HooperId, LeagueId, SeasonId, TeamId};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Season status. Transitions only move forward:
/// `pending -> active -> completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonStatus {
    Pending,
    Active,
    Completed,
}

impl SeasonStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active) | (Self::Active, Self::Completed)
        )
    }
}

impl fmt::Display for SeasonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeasonStatus {
    type Err = LeagueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(LeagueError::validation(format!(
                "unknown season status {other:?}"
            ))),
        }
    }
}

/// Game and governance parameters for a season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ruleset {
    pub quarter_minutes: u32,
    pub shot_clock_seconds: u32,
    pub two_point_value: u32,
    pub three_point_value: u32,
    pub free_throw_value: u32,
    pub personal_foul_limit: u32,
    pub elam_ending_enabled: bool,
    pub elam_margin: u32,
    pub round_robins_per_season: u32,
    pub vote_threshold: f64,
    /// Parameters enacted by governance that have no typed field.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub custom: IndexMap<String, serde_json::Value>,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            quarter_minutes: 10,
            shot_clock_seconds: 15,
            two_point_value: 2,
            three_point_value: 3,
            free_throw_value: 1,
            personal_foul_limit: 5,
            elam_ending_enabled: true,
            elam_margin: 13,
            round_robins_per_season: 3,
            vote_threshold: 0.5,
            custom: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Season {
    pub id: SeasonId,
    pub league_id: LeagueId,
    pub name: String,
    pub status: SeasonStatus,
    /// Snapshot taken at creation; never rewritten.
    pub starting_ruleset: Ruleset,
    pub current_ruleset: Ruleset,
    pub created_at: DateTime<Utc>,
}

impl Season {
    /// A pending season with identical starting and current rulesets.
    pub fn new(league_id: LeagueId, name: impl Into<String>, ruleset: Ruleset) -> Self {
        Self {
            id: SeasonId::new_uuid(),
            league_id,
            name: name.into(),
            status: SeasonStatus::Pending,
            starting_ruleset: ruleset.clone(),
            current_ruleset: ruleset,
            created_at: Utc::now(),
        }
    }

    /// Move the status forward, rejecting anything the state machine forbids.
    pub fn advance_to(&mut self, next: SeasonStatus) -> LeagueResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(LeagueError::InvalidTransition {
                entity: format!("season {}", self.id),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub season_id: SeasonId,
    pub name: String,
    pub color: String,
    pub motto: String,
}

impl Team {
    pub fn new(season_id: SeasonId, name: impl Into<String>) -> Self {
        Self {
            id: TeamId::new_uuid(),
            season_id,
            name: name.into(),
            color: "#000000".to_owned(),
            motto: String::new(),
        }
    }

    /// Copy into another season under a fresh identity.
    pub fn carry_into(&self, season_id: &SeasonId) -> Self {
        Self {
            id: TeamId::new_uuid(),
            season_id: season_id.clone(),
            ..self.clone()
        }
    }
}

/// A simulated athlete. Belongs to exactly one team per season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hooper {
    pub id: HooperId,
    pub team_id: TeamId,
    pub season_id: SeasonId,
    pub name: String,
    pub archetype: String,
    /// Attribute name to rating.
    pub attributes: IndexMap<String, u32>,
}

impl Hooper {
    pub fn carry_into(&self, season_id: &SeasonId, team_id: &TeamId) -> Self {
        Self {
            id: HooperId::new_uuid(),
            team_id: team_id.clone(),
            season_id: season_id.clone(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governor {
    pub id: GovernorId,
    pub username: String,
}

/// A governor's membership on a team for one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub season_id: SeasonId,
    pub governor_id: GovernorId,
    pub team_id: TeamId,
}

/// Payload of `season.started`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonStartedPayload {
    pub league_id: LeagueId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carried_from: Option<SeasonId>,
    pub team_count: usize,
    pub governor_count: usize,
    pub ruleset: Ruleset,
}
