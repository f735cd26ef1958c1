use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use pinwheel_economy::grant_event;
use pinwheel_protocol::{
    AggregateType, Enrollment, Governor, GovernorId, Hooper, HooperId, LeagueError, LeagueId,
    LeagueRepository, LeagueResult, NewEvent, RosterWrite, Ruleset, Season, SeasonId,
    SeasonStartedPayload, SeasonStatus, Team, TeamId, TokenAllotment, WriteBatch, event_types,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::Settings;

/// Round stamped on events written while a season is being set up.
const SETUP_ROUND: u32 = 1;

/// Payload of `ruleset.amended`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetAmendedPayload {
    pub previous: Ruleset,
    pub current: Ruleset,
}

/// Season creation, roster carry-forward and status transitions.
///
/// Every operation commits its roster writes and events as one
/// [`WriteBatch`], so a season is never visible with half its roster or
/// without its `season.started` event.
#[derive(Clone)]
pub struct SeasonLifecycle {
    repo: Arc<dyn LeagueRepository>,
    allotment: TokenAllotment,
}

impl SeasonLifecycle {
    pub fn new(repo: Arc<dyn LeagueRepository>, settings: &Settings) -> Self {
        Self {
            repo,
            allotment: settings.default_allotment,
        }
    }

    /// Create a season and make it active.
    ///
    /// With `carry_forward_rules` and a previous season, the previous
    /// season's current ruleset becomes the new starting ruleset, every team
    /// and hooper is copied under fresh ids, every enrollment is copied onto
    /// the copied team and every enrolled governor is granted a fresh
    /// default allotment. Old balances never carry over. Otherwise the
    /// season starts empty with the default ruleset.
    ///
    /// This is a creation, not an upsert: two calls make two seasons.
    #[instrument(
        skip(self, name),
        fields(league_id = %league_id, previous = ?previous_season_id.map(SeasonId::as_str))
    )]
    pub async fn start_new_season(
        &self,
        league_id: &LeagueId,
        name: &str,
        carry_forward_rules: bool,
        previous_season_id: Option<&SeasonId>,
    ) -> LeagueResult<Season> {
        if name.trim().is_empty() {
            return Err(LeagueError::validation("season name is empty"));
        }
        if self.repo.get_league(league_id).await?.is_none() {
            return Err(LeagueError::invalid_argument(format!(
                "league {league_id} does not exist"
            )));
        }

        let previous = match (carry_forward_rules, previous_season_id) {
            (true, Some(previous_id)) => {
                Some(self.previous_season(league_id, previous_id).await?)
            }
            _ => None,
        };
        let ruleset = previous
            .as_ref()
            .map(|season| season.current_ruleset.clone())
            .unwrap_or_default();

        let mut season = Season::new(league_id.clone(), name, ruleset);
        season.advance_to(SeasonStatus::Active)?;

        let mut batch = WriteBatch::new();
        batch.write(RosterWrite::InsertSeason(season.clone()));
        let (team_count, governor_count) = match &previous {
            Some(previous) => self.carry_roster(previous, &season.id, &mut batch).await?,
            None => (0, 0),
        };

        let started = NewEvent::new(
            event_types::SEASON_STARTED,
            AggregateType::Season,
            season.id.as_str(),
            season.id.clone(),
            SETUP_ROUND,
        )
        .with_payload(&SeasonStartedPayload {
            league_id: league_id.clone(),
            name: season.name.clone(),
            carried_from: previous.as_ref().map(|p| p.id.clone()),
            team_count,
            governor_count,
            ruleset: season.starting_ruleset.clone(),
        })?;
        batch.events.insert(0, started);

        self.repo.commit(batch).await?;
        info!(
            season_id = %season.id,
            team_count,
            governor_count,
            "season started"
        );
        Ok(season)
    }

    async fn previous_season(
        &self,
        league_id: &LeagueId,
        previous_id: &SeasonId,
    ) -> LeagueResult<Season> {
        let previous = self.repo.get_season(previous_id).await?.ok_or_else(|| {
            LeagueError::invalid_argument(format!("previous season {previous_id} does not exist"))
        })?;
        if &previous.league_id != league_id {
            return Err(LeagueError::invalid_argument(format!(
                "previous season {previous_id} belongs to league {}, not {league_id}",
                previous.league_id
            )));
        }
        Ok(previous)
    }

    /// Stage copies of the previous season's teams, hoopers and enrollments
    /// plus enrollment and grant events. Returns `(teams, governors)`.
    async fn carry_roster(
        &self,
        previous: &Season,
        season_id: &SeasonId,
        batch: &mut WriteBatch,
    ) -> LeagueResult<(usize, usize)> {
        let teams = self.repo.get_teams_for_season(&previous.id).await?;
        let mut team_ids: HashMap<TeamId, TeamId> = HashMap::with_capacity(teams.len());
        let mut hoopers = Vec::new();
        for team in &teams {
            let copy = team.carry_into(season_id);
            for hooper in self.repo.get_hoopers_for_team(&team.id).await? {
                hoopers.push(RosterWrite::InsertHooper(
                    hooper.carry_into(season_id, &copy.id),
                ));
            }
            team_ids.insert(team.id.clone(), copy.id.clone());
            batch.write(RosterWrite::InsertTeam(copy));
        }
        // Hoopers reference their team, so they go in after every team.
        batch.roster.extend(hoopers);

        let enrollments = self.repo.get_enrollments(&previous.id).await?;
        for enrollment in &enrollments {
            let team_id = team_ids.get(&enrollment.team_id).ok_or_else(|| {
                LeagueError::NotFound(format!(
                    "team {} of governor {} in season {}",
                    enrollment.team_id, enrollment.governor_id, previous.id
                ))
            })?;
            let carried = Enrollment {
                season_id: season_id.clone(),
                governor_id: enrollment.governor_id.clone(),
                team_id: team_id.clone(),
            };
            self.stage_enrollment(carried, SETUP_ROUND, batch)?;
        }
        debug!(
            teams = teams.len(),
            governors = enrollments.len(),
            "roster carried forward"
        );
        Ok((teams.len(), enrollments.len()))
    }

    fn stage_enrollment(
        &self,
        enrollment: Enrollment,
        round_number: u32,
        batch: &mut WriteBatch,
    ) -> LeagueResult<()> {
        let enrolled = NewEvent::new(
            event_types::GOVERNOR_ENROLLED,
            AggregateType::Governor,
            enrollment.governor_id.as_str(),
            enrollment.season_id.clone(),
            round_number,
        )
        .governor(enrollment.governor_id.clone())
        .with_payload(&enrollment)?;
        let grant = grant_event(
            &enrollment.season_id,
            &enrollment.governor_id,
            round_number,
            self.allotment.deltas(),
            "season allotment",
        )?;
        batch
            .write(RosterWrite::InsertEnrollment(enrollment))
            .event(enrolled)
            .event(grant);
        Ok(())
    }

    async fn require_season(&self, season_id: &SeasonId) -> LeagueResult<Season> {
        self.repo
            .get_season(season_id)
            .await?
            .ok_or_else(|| LeagueError::NotFound(format!("season {season_id}")))
    }

    async fn transition(
        &self,
        season_id: &SeasonId,
        next: SeasonStatus,
        event_type: &str,
        round_number: u32,
    ) -> LeagueResult<Season> {
        let mut season = self.require_season(season_id).await?;
        season.advance_to(next)?;
        let mut batch = WriteBatch::new();
        batch
            .write(RosterWrite::SetSeasonStatus {
                season_id: season.id.clone(),
                status: next,
            })
            .event(NewEvent::new(
                event_type,
                AggregateType::Season,
                season.id.as_str(),
                season.id.clone(),
                round_number,
            ));
        self.repo.commit(batch).await?;
        info!(season_id = %season.id, status = %next, "season status changed");
        Ok(season)
    }

    /// Move a season created through the repository from pending to active.
    #[instrument(skip(self), fields(season_id = %season_id))]
    pub async fn activate_season(&self, season_id: &SeasonId) -> LeagueResult<Season> {
        self.transition(
            season_id,
            SeasonStatus::Active,
            event_types::SEASON_ACTIVATED,
            SETUP_ROUND,
        )
        .await
    }

    #[instrument(skip(self), fields(season_id = %season_id))]
    pub async fn complete_season(
        &self,
        season_id: &SeasonId,
        final_round: u32,
    ) -> LeagueResult<Season> {
        self.transition(
            season_id,
            SeasonStatus::Completed,
            event_types::SEASON_COMPLETED,
            final_round,
        )
        .await
    }

    /// Replace the current ruleset of an active season. The starting
    /// ruleset is never touched.
    #[instrument(skip(self, ruleset), fields(season_id = %season_id))]
    pub async fn amend_ruleset(
        &self,
        season_id: &SeasonId,
        ruleset: Ruleset,
        round_number: u32,
        governor_id: Option<GovernorId>,
    ) -> LeagueResult<Season> {
        let mut season = self.require_season(season_id).await?;
        if season.status != SeasonStatus::Active {
            return Err(LeagueError::invalid_argument(format!(
                "season {season_id} is {}, rules can only change while active",
                season.status
            )));
        }
        let mut event = NewEvent::new(
            event_types::RULESET_AMENDED,
            AggregateType::Season,
            season.id.as_str(),
            season.id.clone(),
            round_number,
        )
        .with_payload(&RulesetAmendedPayload {
            previous: season.current_ruleset.clone(),
            current: ruleset.clone(),
        })?;
        event.governor_id = governor_id;

        let mut batch = WriteBatch::new();
        batch
            .write(RosterWrite::SetCurrentRuleset {
                season_id: season.id.clone(),
                ruleset: ruleset.clone(),
            })
            .event(event);
        self.repo.commit(batch).await?;
        season.current_ruleset = ruleset;
        info!(season_id = %season.id, round = round_number, "ruleset amended");
        Ok(season)
    }

    /// Enroll a governor on a team for one season and grant the default
    /// allotment. A governor enrolls at most once per season.
    #[instrument(
        skip(self, governor),
        fields(season_id = %season_id, governor_id = %governor.id)
    )]
    pub async fn enroll_governor(
        &self,
        season_id: &SeasonId,
        governor: Governor,
        team_id: &TeamId,
        round_number: u32,
    ) -> LeagueResult<Enrollment> {
        let season = self.require_season(season_id).await?;
        if season.status == SeasonStatus::Completed {
            return Err(LeagueError::invalid_argument(format!(
                "season {season_id} is completed"
            )));
        }
        let team = self.repo.get_team(team_id).await?;
        if team.is_none_or(|team| &team.season_id != season_id) {
            return Err(LeagueError::invalid_argument(format!(
                "team {team_id} is not part of season {season_id}"
            )));
        }
        if governor.id.is_blank() {
            return Err(LeagueError::validation("governor id is empty"));
        }

        let enrollment = Enrollment {
            season_id: season_id.clone(),
            governor_id: governor.id.clone(),
            team_id: team_id.clone(),
        };
        let mut batch = WriteBatch::new();
        batch.write(RosterWrite::UpsertGovernor(governor));
        self.stage_enrollment(enrollment.clone(), round_number, &mut batch)?;
        self.repo.commit(batch).await?;
        info!(team_id = %team_id, "governor enrolled");
        Ok(enrollment)
    }

    #[instrument(skip(self, name), fields(season_id = %season_id))]
    pub async fn create_team(
        &self,
        season_id: &SeasonId,
        name: &str,
        color: &str,
        motto: &str,
    ) -> LeagueResult<Team> {
        self.require_season(season_id).await?;
        if name.trim().is_empty() {
            return Err(LeagueError::validation("team name is empty"));
        }
        let team = Team {
            color: color.to_owned(),
            motto: motto.to_owned(),
            ..Team::new(season_id.clone(), name)
        };
        let mut batch = WriteBatch::new();
        batch.write(RosterWrite::InsertTeam(team.clone()));
        self.repo.commit(batch).await?;
        debug!(team_id = %team.id, "team created");
        Ok(team)
    }

    #[instrument(skip(self, name, attributes), fields(team_id = %team_id))]
    pub async fn add_hooper(
        &self,
        team_id: &TeamId,
        name: &str,
        archetype: &str,
        attributes: IndexMap<String, u32>,
    ) -> LeagueResult<Hooper> {
        let team = self.repo.get_team(team_id).await?.ok_or_else(|| {
            LeagueError::invalid_argument(format!("team {team_id} does not exist"))
        })?;
        let hooper = Hooper {
            id: HooperId::new_uuid(),
            team_id: team.id,
            season_id: team.season_id,
            name: name.to_owned(),
            archetype: archetype.to_owned(),
            attributes,
        };
        let mut batch = WriteBatch::new();
        batch.write(RosterWrite::InsertHooper(hooper.clone()));
        self.repo.commit(batch).await?;
        debug!(hooper_id = %hooper.id, "hooper added");
        Ok(hooper)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pinwheel_economy::{TokenEconomy, TokenSpend};
    use pinwheel_events::{EventStore, SeasonLocks, SqliteLedger};
    use pinwheel_protocol::{EventFilter, League, TokenKind};

    use super::*;

    struct Fixture {
        ledger: Arc<SqliteLedger>,
        lifecycle: SeasonLifecycle,
        league: League,
    }

    async fn fixture() -> Result<Fixture> {
        let ledger = Arc::new(SqliteLedger::in_memory()?);
        let lifecycle = SeasonLifecycle::new(ledger.clone(), &Settings::default());
        let league = ledger.create_league("Pinwheel Fates").await?;
        Ok(Fixture {
            ledger,
            lifecycle,
            league,
        })
    }

    fn governor(id: &str) -> Governor {
        Governor {
            id: GovernorId::from(id),
            username: format!("{id}#0001"),
        }
    }

    /// A first season with two teams, one hooper each, and alice and bob
    /// enrolled on the first team.
    async fn seeded_first_season(fixture: &Fixture) -> Result<(Season, Vec<Team>)> {
        let lifecycle = &fixture.lifecycle;
        let season = lifecycle
            .start_new_season(&fixture.league.id, "Season One", false, None)
            .await?;
        let mut teams = Vec::new();
        for (name, color) in [("Rose City Thorns", "#c8102e"), ("Burnside Breakers", "#1d428a")] {
            let team = lifecycle
                .create_team(&season.id, name, color, "Keep it weird")
                .await?;
            let attributes =
                IndexMap::from([("scoring".to_owned(), 70), ("defense".to_owned(), 55)]);
            lifecycle
                .add_hooper(&team.id, &format!("{name} Guard"), "sharpshooter", attributes)
                .await?;
            teams.push(team);
        }
        for id in ["alice", "bob"] {
            lifecycle
                .enroll_governor(&season.id, governor(id), &teams[0].id, 1)
                .await?;
        }
        Ok((season, teams))
    }

    #[tokio::test]
    async fn fresh_season_starts_active_with_default_rules() -> Result<()> {
        let fixture = fixture().await?;
        let season = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season One", false, None)
            .await?;
        assert_eq!(season.status, SeasonStatus::Active);
        assert_eq!(season.starting_ruleset, Ruleset::default());

        let events = fixture.ledger.read(&season.id, EventFilter::all()).await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, event_types::SEASON_STARTED);
        let started: SeasonStartedPayload = events[0].payload_as()?;
        assert_eq!(started.carried_from, None);
        assert_eq!(started.team_count, 0);
        Ok(())
    }

    #[tokio::test]
    async fn carry_forward_from_missing_season_is_rejected() -> Result<()> {
        let fixture = fixture().await?;
        let err = fixture
            .lifecycle
            .start_new_season(
                &fixture.league.id,
                "Season Two",
                true,
                Some(&SeasonId::from("no-such-season")),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));
        Ok(())
    }

    #[tokio::test]
    async fn carry_forward_across_leagues_is_rejected() -> Result<()> {
        let fixture = fixture().await?;
        let (first, _) = seeded_first_season(&fixture).await?;
        let other = fixture.ledger.create_league("Other League").await?;
        let err = fixture
            .lifecycle
            .start_new_season(&other.id, "Season Two", true, Some(&first.id))
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));
        Ok(())
    }

    #[tokio::test]
    async fn carry_forward_copies_roster_and_resets_balances() -> Result<()> {
        let fixture = fixture().await?;
        let (first, old_teams) = seeded_first_season(&fixture).await?;
        let economy = TokenEconomy::new(fixture.ledger.clone(), SeasonLocks::new(), 3);
        let alice = GovernorId::from("alice");
        economy
            .spend(
                &first.id,
                2,
                TokenSpend::one(alice.clone(), TokenKind::Boost, "boost"),
                Vec::new(),
            )
            .await?;
        assert_eq!(economy.balance(&first.id, &alice).await?.boost, 2);

        let amended = Ruleset {
            elam_margin: 9,
            ..Ruleset::default()
        };
        fixture
            .lifecycle
            .amend_ruleset(&first.id, amended.clone(), 3, Some(alice.clone()))
            .await?;

        let second = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season Two", true, Some(&first.id))
            .await?;
        assert_eq!(second.starting_ruleset, amended);

        let teams = fixture.ledger.get_teams_for_season(&second.id).await?;
        assert_eq!(teams.len(), 2);
        for team in &teams {
            assert!(old_teams.iter().all(|old| old.id != team.id));
            let hoopers = fixture.ledger.get_hoopers_for_team(&team.id).await?;
            assert_eq!(hoopers.len(), 1);
            assert_eq!(hoopers[0].season_id, second.id);
        }

        let enrollments = fixture.ledger.get_enrollments(&second.id).await?;
        assert_eq!(enrollments.len(), 2);
        let thorns = teams
            .iter()
            .find(|team| team.name == "Rose City Thorns")
            .map(|team| team.id.clone());
        assert!(enrollments.iter().all(|e| Some(&e.team_id) == thorns.as_ref()));

        let allotment = TokenAllotment::default();
        for id in ["alice", "bob"] {
            let balance = economy.balance(&second.id, &GovernorId::from(id)).await?;
            assert!(balance.matches_allotment(&allotment));
        }
        Ok(())
    }

    #[tokio::test]
    async fn without_carry_forward_previous_season_is_ignored() -> Result<()> {
        let fixture = fixture().await?;
        let (first, _) = seeded_first_season(&fixture).await?;
        let second = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season Two", false, Some(&first.id))
            .await?;
        assert!(fixture.ledger.get_teams_for_season(&second.id).await?.is_empty());
        assert!(fixture.ledger.get_enrollments(&second.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn starting_twice_creates_two_seasons() -> Result<()> {
        let fixture = fixture().await?;
        let (first, _) = seeded_first_season(&fixture).await?;
        let a = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season Two", true, Some(&first.id))
            .await?;
        let b = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season Two", true, Some(&first.id))
            .await?;
        assert_ne!(a.id, b.id);
        assert_eq!(fixture.ledger.get_enrollments(&a.id).await?.len(), 2);
        assert_eq!(fixture.ledger.get_enrollments(&b.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn pending_season_activates_then_completes() -> Result<()> {
        let fixture = fixture().await?;
        let season = fixture
            .ledger
            .create_season(&fixture.league.id, "Preseason")
            .await?;
        assert_eq!(season.status, SeasonStatus::Pending);

        let active = fixture.lifecycle.activate_season(&season.id).await?;
        assert_eq!(active.status, SeasonStatus::Active);
        let done = fixture.lifecycle.complete_season(&season.id, 9).await?;
        assert_eq!(done.status, SeasonStatus::Completed);

        let err = fixture.lifecycle.activate_season(&season.id).await.unwrap_err();
        assert!(matches!(err, LeagueError::InvalidTransition { .. }));

        let stored = fixture.ledger.get_season(&season.id).await?;
        assert_eq!(stored.map(|s| s.status), Some(SeasonStatus::Completed));
        Ok(())
    }

    #[tokio::test]
    async fn amending_rules_keeps_the_starting_snapshot() -> Result<()> {
        let fixture = fixture().await?;
        let season = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season One", false, None)
            .await?;
        let amended = Ruleset {
            three_point_value: 4,
            ..Ruleset::default()
        };
        fixture
            .lifecycle
            .amend_ruleset(&season.id, amended.clone(), 2, None)
            .await?;

        let stored = fixture
            .ledger
            .get_season(&season.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("season missing"))?;
        assert_eq!(stored.starting_ruleset, Ruleset::default());
        assert_eq!(stored.current_ruleset, amended);

        let events = fixture
            .ledger
            .read(&season.id, EventFilter::all().event_type(event_types::RULESET_AMENDED))
            .await?;
        let payload: RulesetAmendedPayload = events[0].payload_as()?;
        assert_eq!(payload.previous.three_point_value, 3);
        assert_eq!(payload.current.three_point_value, 4);
        Ok(())
    }

    #[tokio::test]
    async fn governor_enrolls_once_per_season() -> Result<()> {
        let fixture = fixture().await?;
        let (season, teams) = seeded_first_season(&fixture).await?;
        let err = fixture
            .lifecycle
            .enroll_governor(&season.id, governor("alice"), &teams[1].id, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));

        // The failed enrollment granted nothing.
        let grants = fixture
            .ledger
            .read(
                &season.id,
                EventFilter::all()
                    .event_type(event_types::TOKEN_GRANTED)
                    .governor(GovernorId::from("alice")),
            )
            .await?;
        assert_eq!(grants.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn enrollment_requires_a_team_in_the_season() -> Result<()> {
        let fixture = fixture().await?;
        let (first, teams) = seeded_first_season(&fixture).await?;
        let second = fixture
            .lifecycle
            .start_new_season(&fixture.league.id, "Season Two", false, Some(&first.id))
            .await?;
        let err = fixture
            .lifecycle
            .enroll_governor(&second.id, governor("carol"), &teams[0].id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));
        Ok(())
    }
}
