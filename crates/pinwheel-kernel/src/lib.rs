//! # pinwheel-kernel: one handle on a whole league ledger
//!
//! [`LeagueBuilder`] turns a [`Settings`] into a [`PinwheelLeague`]: it opens
//! the SQLite ledger (file or memory), shares one set of season writer locks
//! between every writer, and wires the lifecycle, token economy, governance,
//! mirror desk and analytics on top of it. Boundary layers (HTTP handlers,
//! bots, schedulers) hold a `PinwheelLeague` and nothing else.

use std::collections::BTreeMap;
use std::sync::Arc;

use indexmap::IndexMap;
use pinwheel_analytics::{BehavioralAnalyzer, ContentScanner};
use pinwheel_economy::TokenEconomy;
use pinwheel_events::{EventStore, SeasonLocks, SqliteLedger};
use pinwheel_projections::compute_standings;
use pinwheel_protocol::{
    AggregateType, Enrollment, EventFilter, EventId, EventRecord, EventRecordStream, GameResult,
    Governor, GovernorId, Hooper, League, LeagueError, LeagueId, LeagueRepository, LeagueResult,
    Mirror, MirrorId, MirrorType, NewEvent, PrescriptiveScan, ReportContent, Season, SeasonId,
    Team, TeamId, TokenBalance, event_types, is_economy_event,
};
use pinwheel_runtime::{Governance, MirrorDesk, SeasonLifecycle};
use tracing::{debug, info, instrument, warn};

pub use pinwheel_analytics::{ShiftResult, ShiftThreshold};
pub use pinwheel_projections::{SeasonProjection, TeamStanding};
pub use pinwheel_runtime::Settings;

#[derive(Debug, Clone)]
pub struct LeagueBuilder {
    settings: Settings,
}

impl LeagueBuilder {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    /// Builder over default settings and an in-memory ledger.
    pub fn in_memory() -> Self {
        Self::new(Settings::default())
    }

    pub fn build(self) -> LeagueResult<PinwheelLeague> {
        let settings = self.settings;
        let ledger = match &settings.database_path {
            Some(path) => SqliteLedger::open(path)?,
            None => SqliteLedger::in_memory()?,
        };
        let ledger = Arc::new(ledger.with_page_size(settings.query_page_size));
        let store: Arc<dyn EventStore> = ledger.clone();
        let repo: Arc<dyn LeagueRepository> = ledger;

        let locks = SeasonLocks::new();
        let economy = TokenEconomy::new(store.clone(), locks, settings.trade_window_rounds);
        let lifecycle = SeasonLifecycle::new(repo.clone(), &settings);
        let governance = Governance::new(store.clone(), repo.clone(), economy.clone());
        let scanner = ContentScanner::new()?;
        let mirrors = MirrorDesk::new(repo.clone(), scanner.clone());
        let analyzer = BehavioralAnalyzer::new(store.clone(), settings.shift_threshold);

        info!(
            database = ?settings.database_path,
            trade_window_rounds = settings.trade_window_rounds,
            "league ledger ready"
        );
        Ok(PinwheelLeague {
            settings,
            store,
            repo,
            lifecycle,
            economy,
            governance,
            mirrors,
            scanner,
            analyzer,
        })
    }
}

#[derive(Clone)]
pub struct PinwheelLeague {
    settings: Settings,
    store: Arc<dyn EventStore>,
    repo: Arc<dyn LeagueRepository>,
    lifecycle: SeasonLifecycle,
    economy: TokenEconomy,
    governance: Governance,
    mirrors: MirrorDesk,
    scanner: ContentScanner,
    analyzer: BehavioralAnalyzer,
}

impl PinwheelLeague {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn repository(&self) -> &Arc<dyn LeagueRepository> {
        &self.repo
    }

    pub fn lifecycle(&self) -> &SeasonLifecycle {
        &self.lifecycle
    }

    /// Token grants, spends and trades.
    pub fn economy(&self) -> &TokenEconomy {
        &self.economy
    }

    /// Proposals and votes.
    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    pub fn analyzer(&self) -> &BehavioralAnalyzer {
        &self.analyzer
    }

    // ─── Leagues, seasons and rosters ──────────────────────────────

    pub async fn create_league(&self, name: &str) -> LeagueResult<League> {
        self.repo.create_league(name).await
    }

    pub async fn create_season(&self, league_id: &LeagueId, name: &str) -> LeagueResult<Season> {
        self.repo.create_season(league_id, name).await
    }

    pub async fn start_new_season(
        &self,
        league_id: &LeagueId,
        name: &str,
        carry_forward_rules: bool,
        previous_season_id: Option<&SeasonId>,
    ) -> LeagueResult<Season> {
        self.lifecycle
            .start_new_season(league_id, name, carry_forward_rules, previous_season_id)
            .await
    }

    pub async fn complete_season(
        &self,
        season_id: &SeasonId,
        final_round: u32,
    ) -> LeagueResult<Season> {
        self.lifecycle.complete_season(season_id, final_round).await
    }

    pub async fn create_team(
        &self,
        season_id: &SeasonId,
        name: &str,
        color: &str,
        motto: &str,
    ) -> LeagueResult<Team> {
        self.lifecycle
            .create_team(season_id, name, color, motto)
            .await
    }

    pub async fn add_hooper(
        &self,
        team_id: &TeamId,
        name: &str,
        archetype: &str,
        attributes: IndexMap<String, u32>,
    ) -> LeagueResult<Hooper> {
        self.lifecycle
            .add_hooper(team_id, name, archetype, attributes)
            .await
    }

    pub async fn enroll_governor(
        &self,
        season_id: &SeasonId,
        governor: Governor,
        team_id: &TeamId,
        round_number: u32,
    ) -> LeagueResult<Enrollment> {
        self.lifecycle
            .enroll_governor(season_id, governor, team_id, round_number)
            .await
    }

    pub async fn get_teams_for_season(&self, season_id: &SeasonId) -> LeagueResult<Vec<Team>> {
        self.repo.get_teams_for_season(season_id).await
    }

    // ─── Games and standings ───────────────────────────────────────

    /// Append a `game.completed` event. Both teams must belong to the
    /// season.
    #[instrument(skip(self, result), fields(season_id = %season_id, round = round_number))]
    pub async fn record_game(
        &self,
        season_id: &SeasonId,
        round_number: u32,
        result: GameResult,
    ) -> LeagueResult<EventId> {
        // Shape checks (self-play, stray winner) live with the standings fold.
        compute_standings(std::slice::from_ref(&result))?;
        for team_id in [&result.home_team_id, &result.away_team_id] {
            let team = self.repo.get_team(team_id).await?;
            if team.is_none_or(|team| &team.season_id != season_id) {
                return Err(LeagueError::invalid_argument(format!(
                    "team {team_id} is not part of season {season_id}"
                )));
            }
        }

        let event = NewEvent::new(
            event_types::GAME_COMPLETED,
            AggregateType::Game,
            uuid::Uuid::new_v4().to_string(),
            season_id.clone(),
            round_number,
        )
        .with_payload(&result)?;
        let event_id = self.store.append(event).await?;
        debug!(event_id = %event_id, "game recorded");
        Ok(event_id)
    }

    pub async fn get_games_for_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<Vec<GameResult>> {
        self.repo.get_games_for_round(season_id, round_number).await
    }

    /// Standings over every game of the season so far.
    pub async fn season_standings(&self, season_id: &SeasonId) -> LeagueResult<Vec<TeamStanding>> {
        let events = self
            .store
            .read(
                season_id,
                EventFilter::all().event_type(event_types::GAME_COMPLETED),
            )
            .await?;
        pinwheel_projections::standings_from_events(&events)
    }

    /// Standings over the games of a single round.
    pub async fn round_standings(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<Vec<TeamStanding>> {
        let games = self.get_games_for_round(season_id, round_number).await?;
        compute_standings(&games)
    }

    // ─── Projections and the raw log ───────────────────────────────

    /// Rebuild every read model of the season from its log.
    #[instrument(skip(self), fields(season_id = %season_id))]
    pub async fn project_season(&self, season_id: &SeasonId) -> LeagueResult<SeasonProjection> {
        let events = self.store.read(season_id, EventFilter::all()).await?;
        SeasonProjection::replay(&events)
    }

    pub async fn balances(
        &self,
        season_id: &SeasonId,
    ) -> LeagueResult<BTreeMap<GovernorId, TokenBalance>> {
        self.economy.balances(season_id).await
    }

    pub fn query(&self, season_id: &SeasonId, filter: EventFilter) -> EventRecordStream {
        self.store.query(season_id, filter)
    }

    pub async fn read_events(
        &self,
        season_id: &SeasonId,
        filter: EventFilter,
    ) -> LeagueResult<Vec<EventRecord>> {
        self.store.read(season_id, filter).await
    }

    /// Append a free-form event. `token.*` and `trade.*` events are refused
    /// here: they change balances and must go through [`TokenEconomy`].
    pub async fn append_event(&self, event: NewEvent) -> LeagueResult<EventId> {
        if is_economy_event(&event.event_type) {
            let error = LeagueError::invalid_argument(format!(
                "{} events are written by the token economy",
                event.event_type
            ));
            warn!(%error, "raw append rejected");
            return Err(error);
        }
        self.repo.append_event(event).await
    }

    // ─── Analytics and mirrors ─────────────────────────────────────

    pub async fn detect_behavioral_shift(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
        round_number: u32,
    ) -> LeagueResult<ShiftResult> {
        self.analyzer
            .detect_behavioral_shift(season_id, governor_id, round_number)
            .await
    }

    pub async fn detect_shifts_for_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<BTreeMap<GovernorId, ShiftResult>> {
        self.analyzer
            .detect_shifts_for_round(season_id, round_number)
            .await
    }

    pub async fn compute_report_impact_rate(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<f64> {
        self.analyzer
            .compute_report_impact_rate(season_id, round_number)
            .await
    }

    pub fn scan_prescriptive(
        &self,
        content: &ReportContent,
        report_id: &MirrorId,
        report_type: MirrorType,
    ) -> PrescriptiveScan {
        self.scanner
            .scan_prescriptive(content, report_id, report_type)
    }

    pub async fn deliver_mirror(&self, mirror: Mirror) -> LeagueResult<PrescriptiveScan> {
        self.mirrors.deliver_mirror(mirror).await
    }

    pub async fn read_mirror(
        &self,
        mirror_id: &MirrorId,
        reader: &GovernorId,
    ) -> LeagueResult<Mirror> {
        self.mirrors.read_mirror(mirror_id, reader).await
    }
}
