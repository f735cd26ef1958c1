use std::cmp::Ordering;
use std::collections::BTreeMap;

use pinwheel_protocol::{EventRecord, GameResult, LeagueError, LeagueResult, TeamId, event_types};
use serde::{Deserialize, Serialize};

/// One team's line in the standings table.
///
/// A tie gives each side half a win: it is counted in `ties`, and
/// [`TeamStanding::win_credit`] adds `0.5` per tie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStanding {
    pub team_id: TeamId,
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: u64,
    pub points_against: u64,
}

impl TeamStanding {
    fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            wins: 0,
            losses: 0,
            ties: 0,
            points_for: 0,
            points_against: 0,
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    pub fn win_credit(&self) -> f64 {
        f64::from(self.wins) + 0.5 * f64::from(self.ties)
    }

    pub fn point_differential(&self) -> i64 {
        self.points_for as i64 - self.points_against as i64
    }

    /// Win credit doubled, so ranking never compares floats.
    fn half_wins(&self) -> u64 {
        2 * u64::from(self.wins) + u64::from(self.ties)
    }

    fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .half_wins()
            .cmp(&self.half_wins())
            .then_with(|| other.point_differential().cmp(&self.point_differential()))
            .then_with(|| self.team_id.cmp(&other.team_id))
    }
}

fn check_result(result: &GameResult) -> LeagueResult<()> {
    if result.home_team_id.is_blank() || result.away_team_id.is_blank() {
        return Err(LeagueError::validation("game result is missing a team id"));
    }
    if result.home_team_id == result.away_team_id {
        return Err(LeagueError::validation(format!(
            "team {} cannot play itself",
            result.home_team_id
        )));
    }
    if let Some(winner) = &result.winner_team_id
        && winner != &result.home_team_id
        && winner != &result.away_team_id
    {
        return Err(LeagueError::validation(format!(
            "winner {winner} did not play in {} vs {}",
            result.home_team_id, result.away_team_id
        )));
    }
    Ok(())
}

/// Fold game results into standings ordered by win credit, then point
/// differential (both descending), then team id ascending.
///
/// The output depends only on the multiset of results, never on their order.
pub fn compute_standings<'a, I>(results: I) -> LeagueResult<Vec<TeamStanding>>
where
    I: IntoIterator<Item = &'a GameResult>,
{
    let mut table: BTreeMap<TeamId, TeamStanding> = BTreeMap::new();

    for result in results {
        check_result(result)?;
        let home_points = u64::from(result.home_score);
        let away_points = u64::from(result.away_score);

        let home = table
            .entry(result.home_team_id.clone())
            .or_insert_with(|| TeamStanding::new(result.home_team_id.clone()));
        home.points_for += home_points;
        home.points_against += away_points;
        match &result.winner_team_id {
            None => home.ties += 1,
            Some(winner) if winner == &result.home_team_id => home.wins += 1,
            Some(_) => home.losses += 1,
        }

        let away = table
            .entry(result.away_team_id.clone())
            .or_insert_with(|| TeamStanding::new(result.away_team_id.clone()));
        away.points_for += away_points;
        away.points_against += home_points;
        match &result.winner_team_id {
            None => away.ties += 1,
            Some(winner) if winner == &result.away_team_id => away.wins += 1,
            Some(_) => away.losses += 1,
        }
    }

    let mut standings: Vec<TeamStanding> = table.into_values().collect();
    standings.sort_by(TeamStanding::rank_cmp);
    Ok(standings)
}

/// Standings over every `game.completed` event in `events`, however many
/// rounds the season has run.
pub fn standings_from_events(events: &[EventRecord]) -> LeagueResult<Vec<TeamStanding>> {
    let results = events
        .iter()
        .filter(|event| event.is_type(event_types::GAME_COMPLETED))
        .map(EventRecord::payload_as::<GameResult>)
        .collect::<LeagueResult<Vec<_>>>()?;
    compute_standings(&results)
}
