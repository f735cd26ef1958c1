//! Repository-style boundary for the surrounding system.
//!
//! HTTP handlers, bots and schedulers talk to the ledger only through
//! [`LeagueRepository`]. Multi-entity writes go through [`WriteBatch`], which
//! a repository commits as one unit: every roster write and every event, or
//! nothing.

use crate::error::LeagueResult;
use crate::event::NewEvent;
use crate::game::GameResult;
use crate::ids::{EventId, GovernorId, LeagueId, MirrorId, SeasonId, TeamId};
use crate::league::{Enrollment, Governor, Hooper, League, Ruleset, Season, SeasonStatus, Team};
use crate::mirror::Mirror;
use async_trait::async_trait;

/// One snapshot-table write inside a [`WriteBatch`].
#[derive(Debug, Clone)]
pub enum RosterWrite {
    InsertSeason(Season),
    SetSeasonStatus {
        season_id: SeasonId,
        status: SeasonStatus,
    },
    SetCurrentRuleset {
        season_id: SeasonId,
        ruleset: Ruleset,
    },
    InsertTeam(Team),
    InsertHooper(Hooper),
    /// Insert the governor if unknown; existing usernames are kept.
    UpsertGovernor(Governor),
    InsertEnrollment(Enrollment),
    InsertMirror(Mirror),
}

/// Roster writes plus events, committed atomically. Roster writes apply
/// first, then events in the order given.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub roster: Vec<RosterWrite>,
    pub events: Vec<NewEvent>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, write: RosterWrite) -> &mut Self {
        self.roster.push(write);
        self
    }

    pub fn event(&mut self, event: NewEvent) -> &mut Self {
        self.events.push(event);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty() && self.events.is_empty()
    }
}

#[async_trait]
pub trait LeagueRepository: Send + Sync {
    /// Append a single event. Equivalent to a batch holding only that event.
    async fn append_event(&self, event: NewEvent) -> LeagueResult<EventId>;

    /// Commit roster writes and events in one transaction.
    async fn commit(&self, batch: WriteBatch) -> LeagueResult<Vec<EventId>>;

    /// Results of every `game.completed` event tagged with `round_number`,
    /// in log order. Empty when the round has no games (yet).
    async fn get_games_for_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<Vec<GameResult>>;

    async fn create_league(&self, name: &str) -> LeagueResult<League>;
    async fn get_league(&self, league_id: &LeagueId) -> LeagueResult<Option<League>>;

    /// Create a pending season with the default ruleset.
    async fn create_season(&self, league_id: &LeagueId, name: &str) -> LeagueResult<Season>;
    async fn get_season(&self, season_id: &SeasonId) -> LeagueResult<Option<Season>>;

    async fn get_teams_for_season(&self, season_id: &SeasonId) -> LeagueResult<Vec<Team>>;
    async fn get_team(&self, team_id: &TeamId) -> LeagueResult<Option<Team>>;
    async fn get_hoopers_for_team(&self, team_id: &TeamId) -> LeagueResult<Vec<Hooper>>;

    async fn get_enrollments(&self, season_id: &SeasonId) -> LeagueResult<Vec<Enrollment>>;
    async fn get_enrollment(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
    ) -> LeagueResult<Option<Enrollment>>;

    async fn get_mirror(&self, mirror_id: &MirrorId) -> LeagueResult<Option<Mirror>>;
}
