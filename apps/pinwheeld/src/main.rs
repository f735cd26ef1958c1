use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use indexmap::IndexMap;
use pinwheel_kernel::{LeagueBuilder, PinwheelLeague, Settings, ShiftThreshold};
use pinwheel_protocol::{
    GameResult, Governor, GovernorId, Mirror, MirrorId, MirrorType, ReportContent, Season,
    TeamId, TokenKind, TradeOffer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "pinwheeld")]
#[command(about = "Pinwheel league ledger demo daemon")]
struct Cli {
    /// Ledger database file. Omit to run against an in-memory ledger.
    #[arg(long, env = "PINWHEEL_DATABASE_PATH")]
    database_path: Option<PathBuf>,
    #[arg(long, env = "PINWHEEL_TRADE_WINDOW_ROUNDS", default_value_t = 3)]
    trade_window_rounds: u32,
    /// Relative change over the baseline that counts as a behavioral shift.
    #[arg(long, env = "PINWHEEL_SHIFT_THRESHOLD", default_value_t = 0.5)]
    shift_threshold: f64,
    #[arg(long, default_value = "Pinwheel Fates")]
    league_name: String,
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..))]
    rounds: u32,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings::new(self.database_path.clone())
            .trade_window_rounds(self.trade_window_rounds)
            .shift_threshold(ShiftThreshold {
                relative: self.shift_threshold,
                ..ShiftThreshold::default()
            })
    }
}

const TEAMS: [(&str, &str, &str); 4] = [
    ("Rose City Thorns", "#c8102e", "Bloom where you are planted"),
    ("Burnside Breakers", "#1d428a", "Break the press"),
    ("St. Johns Herons", "#2e8540", "Patience, then strike"),
    ("Hawthorne Hammers", "#ff8200", "Swing first"),
];

const GOVERNORS: [(&str, usize); 4] = [("alice", 0), ("bob", 1), ("carol", 2), ("dave", 3)];

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .compact()
        .init();

    let cli = Cli::parse();
    let league = LeagueBuilder::new(cli.settings()).build()?;

    let home = league.create_league(&cli.league_name).await?;
    info!(league_id = %home.id, name = %home.name, "league created");

    let first = league
        .start_new_season(&home.id, "Season One", false, None)
        .await?;
    let teams = seed_roster(&league, &first).await?;

    for round in 1..=cli.rounds {
        play_round(&league, &first, &teams, round).await?;
    }
    report(&league, &first, cli.rounds).await?;
    league.complete_season(&first.id, cli.rounds).await?;

    let second = league
        .start_new_season(&home.id, "Season Two", true, Some(&first.id))
        .await?;
    for (governor_id, balance) in league.balances(&second.id).await? {
        info!(
            governor_id = %governor_id,
            propose = balance.propose,
            amend = balance.amend,
            boost = balance.boost,
            "carried governor starts fresh"
        );
    }

    Ok(())
}

async fn seed_roster(league: &PinwheelLeague, season: &Season) -> Result<Vec<TeamId>> {
    let mut teams = Vec::with_capacity(TEAMS.len());
    for (name, color, motto) in TEAMS {
        let team = league.create_team(&season.id, name, color, motto).await?;
        for (slot, archetype) in ["sharpshooter", "enforcer", "floor general"].iter().enumerate() {
            let rating = 60 + 5 * u32::try_from(slot)?;
            let attributes = IndexMap::from([
                ("scoring".to_owned(), rating),
                ("defense".to_owned(), 130 - rating),
            ]);
            league
                .add_hooper(&team.id, &format!("{name} #{}", slot + 1), archetype, attributes)
                .await?;
        }
        teams.push(team.id);
    }
    for (id, team) in GOVERNORS {
        let governor = Governor {
            id: GovernorId::from(id),
            username: id.to_owned(),
        };
        league
            .enroll_governor(&season.id, governor, &teams[team], 1)
            .await?;
    }
    Ok(teams)
}

/// One round of games plus a little governance. The script is fixed so that
/// the resulting standings and shifts are reproducible.
async fn play_round(
    league: &PinwheelLeague,
    season: &Season,
    teams: &[TeamId],
    round: u32,
) -> Result<()> {
    let pairings = match round % 3 {
        1 => [(0, 1), (2, 3)],
        2 => [(0, 2), (1, 3)],
        _ => [(0, 3), (1, 2)],
    };
    for (game, (home, away)) in pairings.into_iter().enumerate() {
        let offset = u32::try_from(game)?;
        let home_score = 50 + (round * 7 + offset * 3) % 20;
        let away_score = 50 + (round * 5 + offset * 11) % 20;
        let result = GameResult::from_scores(
            teams[home].clone(),
            teams[away].clone(),
            home_score,
            away_score,
        );
        league.record_game(&season.id, round, result).await?;
    }

    let alice = GovernorId::from("alice");
    let bob = GovernorId::from("bob");
    let carol = GovernorId::from("carol");
    match round {
        2 => {
            let proposal = league
                .governance()
                .submit_proposal(&season.id, &alice, "Three-pointers are worth four", round)
                .await?;
            league
                .governance()
                .cast_vote(&season.id, &bob, &proposal, true, true, round)
                .await?;
            league
                .governance()
                .cast_vote(&season.id, &carol, &proposal, false, false, round)
                .await?;
        }
        3 => {
            let trade = league
                .economy()
                .offer_trade(
                    &season.id,
                    TradeOffer {
                        from_governor: bob.clone(),
                        to_governor: alice.clone(),
                        offered_type: TokenKind::Boost,
                        offered_amount: 1,
                        requested_type: TokenKind::Amend,
                        requested_amount: 1,
                    },
                    round,
                )
                .await?;
            league
                .economy()
                .accept_trade(&season.id, &trade.id, &alice, round)
                .await?;

            let mirror = Mirror {
                id: MirrorId::new_uuid(),
                season_id: season.id.clone(),
                mirror_type: MirrorType::Private,
                round_number: round,
                team_id: None,
                governor_id: Some(carol.clone()),
                content: ReportContent::new(
                    "You voted against the four-point line. Your team has not traded yet.",
                ),
                created_at: Utc::now(),
            };
            let scan = league.deliver_mirror(mirror).await?;
            info!(
                mirror_id = %scan.report_id,
                prescriptive_count = scan.prescriptive_count,
                "private mirror delivered"
            );
        }
        _ => {}
    }

    let expired = league
        .economy()
        .expire_stale_trades(&season.id, round)
        .await?;
    if !expired.is_empty() {
        warn!(count = expired.len(), round, "trades expired unanswered");
    }
    Ok(())
}

async fn report(league: &PinwheelLeague, season: &Season, last_round: u32) -> Result<()> {
    let projection = league.project_season(&season.id).await?;
    for (place, standing) in projection.standings.iter().enumerate() {
        info!(
            place = place + 1,
            team_id = %standing.team_id,
            wins = standing.wins,
            losses = standing.losses,
            ties = standing.ties,
            differential = standing.point_differential(),
            "standing"
        );
    }
    info!(
        standings = %serde_json::to_string(&projection.standings)?,
        events = projection.event_count,
        last_sequence = projection.last_sequence,
        "season projection"
    );

    for (governor_id, shift) in league.detect_shifts_for_round(&season.id, last_round).await? {
        info!(
            governor_id = %governor_id,
            shifted = shift.shifted,
            actions = shift.actions_this_round,
            baseline = shift.baseline_avg,
            "behavioral shift"
        );
    }
    let impact = league
        .compute_report_impact_rate(&season.id, last_round)
        .await?;
    info!(impact, "report impact rate");
    Ok(())
}
