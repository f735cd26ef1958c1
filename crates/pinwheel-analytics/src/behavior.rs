use std::collections::BTreeMap;
use std::sync::Arc;

use pinwheel_events::EventStore;
use pinwheel_protocol::{
    EventFilter, EventRecord, GovernorId, LeagueError, LeagueResult, MirrorDeliveredPayload,
    MirrorType, SeasonId, event_types,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// How far a round's action count must move from the baseline to count as a
/// shift. Both bounds must be exceeded: the difference has to be at least
/// `absolute` actions and more than `relative` times the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftThreshold {
    pub relative: f64,
    pub absolute: f64,
}

impl Default for ShiftThreshold {
    fn default() -> Self {
        Self {
            relative: 0.5,
            absolute: 1.0,
        }
    }
}

impl ShiftThreshold {
    pub fn is_shift(&self, actions_this_round: u32, baseline_avg: f64) -> bool {
        let actions = f64::from(actions_this_round);
        // Going from silent to active is always a signal.
        if baseline_avg == 0.0 {
            return actions_this_round > 0;
        }
        let diff = (actions - baseline_avg).abs();
        diff >= self.absolute && diff > self.relative * baseline_avg
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftResult {
    pub shifted: bool,
    pub actions_this_round: u32,
    pub baseline_avg: f64,
}

/// Per-governor action counts keyed by round.
type RoundCounts = BTreeMap<u32, u32>;

fn action_filter() -> EventFilter {
    EventFilter::all()
        .event_type(event_types::VOTE_CAST)
        .event_type("proposal.*")
        .event_type("trade.*")
}

fn count_actions(events: &[EventRecord]) -> BTreeMap<GovernorId, RoundCounts> {
    let mut counts: BTreeMap<GovernorId, RoundCounts> = BTreeMap::new();
    for event in events {
        let Some(governor_id) = &event.governor_id else {
            continue;
        };
        *counts
            .entry(governor_id.clone())
            .or_default()
            .entry(event.round_number)
            .or_default() += 1;
    }
    counts
}

fn shift_from_counts(
    counts: &RoundCounts,
    round_number: u32,
    threshold: ShiftThreshold,
) -> ShiftResult {
    let actions_this_round = counts.get(&round_number).copied().unwrap_or(0);
    let prior_rounds = round_number - 1;
    let baseline_avg = if prior_rounds == 0 {
        0.0
    } else {
        let prior: u32 = counts.range(..round_number).map(|(_, count)| *count).sum();
        f64::from(prior) / f64::from(prior_rounds)
    };
    ShiftResult {
        shifted: threshold.is_shift(actions_this_round, baseline_avg),
        actions_this_round,
        baseline_avg,
    }
}

fn require_round(round_number: u32) -> LeagueResult<()> {
    if round_number < 1 {
        return Err(LeagueError::validation(format!(
            "round_number must be >= 1, got {round_number}"
        )));
    }
    Ok(())
}

/// Round-windowed behavior signals computed from governance-action events:
/// `vote.cast`, `proposal.*` and `trade.*` attributed to a governor.
#[derive(Clone)]
pub struct BehavioralAnalyzer {
    store: Arc<dyn EventStore>,
    threshold: ShiftThreshold,
}

impl BehavioralAnalyzer {
    pub fn new(store: Arc<dyn EventStore>, threshold: ShiftThreshold) -> Self {
        Self { store, threshold }
    }

    pub fn threshold(&self) -> ShiftThreshold {
        self.threshold
    }

    /// Compare a governor's action count in `round_number` against their
    /// mean over every earlier round of the season. Rounds with no actions
    /// count as zero in the mean.
    #[instrument(skip(self), fields(season_id = %season_id, governor_id = %governor_id))]
    pub async fn detect_behavioral_shift(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
        round_number: u32,
    ) -> LeagueResult<ShiftResult> {
        require_round(round_number)?;
        let filter = action_filter()
            .up_to_round(round_number)
            .governor(governor_id.clone());
        let events = self.store.read(season_id, filter).await?;
        let counts = count_actions(&events).remove(governor_id).unwrap_or_default();
        let result = shift_from_counts(&counts, round_number, self.threshold);
        debug!(
            round = round_number,
            actions = result.actions_this_round,
            baseline = result.baseline_avg,
            shifted = result.shifted,
            "behavioral shift evaluated"
        );
        Ok(result)
    }

    /// Shift detection for every governor with at least one qualifying
    /// action in the season up to `round_number`.
    #[instrument(skip(self), fields(season_id = %season_id))]
    pub async fn detect_shifts_for_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<BTreeMap<GovernorId, ShiftResult>> {
        require_round(round_number)?;
        let events = self
            .store
            .read(season_id, action_filter().up_to_round(round_number))
            .await?;
        let results: BTreeMap<_, _> = count_actions(&events)
            .into_iter()
            .map(|(governor_id, counts)| {
                (governor_id, shift_from_counts(&counts, round_number, self.threshold))
            })
            .collect();
        debug!(
            governors = results.len(),
            shifted = results.values().filter(|r| r.shifted).count(),
            "round shifts evaluated"
        );
        Ok(results)
    }

    /// Fraction of private mirrors delivered in or before `round_number`
    /// whose recipient's action count in the following round differs from
    /// the count in the delivery round. `0.0` when nothing was delivered.
    ///
    /// Only the `mirror.delivered` envelope is read; the mirror itself is
    /// never loaded.
    #[instrument(skip(self), fields(season_id = %season_id))]
    pub async fn compute_report_impact_rate(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<f64> {
        require_round(round_number)?;
        let deliveries = self
            .store
            .read(
                season_id,
                EventFilter::all()
                    .event_type(event_types::MIRROR_DELIVERED)
                    .up_to_round(round_number),
            )
            .await?;

        let mut private = Vec::new();
        for event in &deliveries {
            let payload: MirrorDeliveredPayload = event.payload_as()?;
            if payload.mirror_type != MirrorType::Private {
                continue;
            }
            let recipient = event.governor_id.clone().ok_or_else(|| {
                LeagueError::validation(format!(
                    "private mirror {} delivered without a recipient",
                    payload.mirror_id
                ))
            })?;
            private.push((recipient, event.round_number));
        }
        if private.is_empty() {
            return Ok(0.0);
        }

        let actions = self
            .store
            .read(
                season_id,
                action_filter().up_to_round(round_number.saturating_add(1)),
            )
            .await?;
        let counts = count_actions(&actions);
        let count_for = |governor_id: &GovernorId, round: u32| {
            counts
                .get(governor_id)
                .and_then(|rounds| rounds.get(&round))
                .copied()
                .unwrap_or(0)
        };

        let changed = private
            .iter()
            .filter(|(recipient, delivered_in)| {
                count_for(recipient, delivered_in + 1) != count_for(recipient, *delivered_in)
            })
            .count();
        let rate = changed as f64 / private.len() as f64;
        debug!(delivered = private.len(), changed, rate, "report impact computed");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pinwheel_events::SqliteLedger;
    use pinwheel_protocol::{AggregateType, MirrorId, NewEvent};

    use super::*;

    struct Fixture {
        ledger: Arc<SqliteLedger>,
        analyzer: BehavioralAnalyzer,
        season: SeasonId,
    }

    fn fixture() -> Result<Fixture> {
        let ledger = Arc::new(SqliteLedger::in_memory()?);
        let analyzer = BehavioralAnalyzer::new(ledger.clone(), ShiftThreshold::default());
        Ok(Fixture {
            ledger,
            analyzer,
            season: SeasonId::from("S1"),
        })
    }

    impl Fixture {
        async fn act(&self, governor: &str, round_number: u32, times: usize) -> Result<()> {
            for _ in 0..times {
                self.ledger
                    .append(
                        NewEvent::new(
                            event_types::VOTE_CAST,
                            AggregateType::Proposal,
                            "p1",
                            self.season.clone(),
                            round_number,
                        )
                        .governor(governor.into()),
                    )
                    .await?;
            }
            Ok(())
        }

        async fn deliver(
            &self,
            mirror_type: MirrorType,
            governor: Option<&str>,
            round: u32,
        ) -> Result<()> {
            let mut event = NewEvent::new(
                event_types::MIRROR_DELIVERED,
                AggregateType::Mirror,
                format!("m-{round}"),
                self.season.clone(),
                round,
            )
            .with_payload(&MirrorDeliveredPayload {
                mirror_id: MirrorId::from(format!("m-{round}")),
                mirror_type,
                prescriptive_count: 0,
                flagged: false,
            })?;
            event.governor_id = governor.map(GovernorId::from);
            self.ledger.append(event).await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn silent_governor_is_not_shifted() -> Result<()> {
        let f = fixture()?;
        let result = f
            .analyzer
            .detect_behavioral_shift(&f.season, &"g1".into(), 1)
            .await?;
        assert_eq!(
            result,
            ShiftResult {
                shifted: false,
                actions_this_round: 0,
                baseline_avg: 0.0,
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn silent_to_active_is_a_shift() -> Result<()> {
        let f = fixture()?;
        f.act("g1", 3, 1).await?;
        let result = f
            .analyzer
            .detect_behavioral_shift(&f.season, &"g1".into(), 3)
            .await?;
        assert!(result.shifted);
        assert_eq!(result.actions_this_round, 1);
        assert_eq!(result.baseline_avg, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn baseline_averages_every_prior_round() -> Result<()> {
        let f = fixture()?;
        f.act("g1", 1, 2).await?;
        f.act("g1", 3, 4).await?;
        f.act("g1", 4, 2).await?;
        f.act("g2", 4, 9).await?;

        let result = f
            .analyzer
            .detect_behavioral_shift(&f.season, &"g1".into(), 4)
            .await?;
        assert_eq!(result.actions_this_round, 2);
        assert_eq!(result.baseline_avg, 2.0);
        assert!(!result.shifted);
        Ok(())
    }

    #[tokio::test]
    async fn thresholds_gate_small_moves() -> Result<()> {
        let f = fixture()?;
        f.act("g1", 1, 4).await?;
        f.act("g1", 2, 4).await?;
        f.act("g1", 3, 5).await?;
        f.act("g1", 4, 10).await?;

        let small = f
            .analyzer
            .detect_behavioral_shift(&f.season, &"g1".into(), 3)
            .await?;
        assert!(!small.shifted, "one extra action over a baseline of 4");

        let large = f
            .analyzer
            .detect_behavioral_shift(&f.season, &"g1".into(), 4)
            .await?;
        assert!(large.shifted);
        Ok(())
    }

    #[tokio::test]
    async fn round_zero_is_rejected() -> Result<()> {
        let f = fixture()?;
        let err = f
            .analyzer
            .detect_behavioral_shift(&f.season, &"g1".into(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::Validation(_)));
        Ok(())
    }

    #[tokio::test]
    async fn shifts_for_round_covers_every_active_governor() -> Result<()> {
        let f = fixture()?;
        f.act("g1", 1, 1).await?;
        f.act("g2", 2, 3).await?;
        let results = f.analyzer.detect_shifts_for_round(&f.season, 2).await?;
        assert_eq!(results.len(), 2);
        assert!(results[&GovernorId::from("g1")].shifted);
        assert!(results[&GovernorId::from("g2")].shifted);
        Ok(())
    }

    #[tokio::test]
    async fn no_reports_means_zero_impact() -> Result<()> {
        let f = fixture()?;
        f.act("g1", 1, 2).await?;
        let rate = f.analyzer.compute_report_impact_rate(&f.season, 3).await?;
        assert_eq!(rate, 0.0);
        Ok(())
    }

    #[tokio::test]
    async fn impact_counts_recipients_who_changed() -> Result<()> {
        let f = fixture()?;
        f.deliver(MirrorType::Private, Some("g1"), 1).await?;
        f.deliver(MirrorType::Private, Some("g2"), 1).await?;
        f.deliver(MirrorType::Governance, None, 1).await?;
        f.act("g1", 1, 1).await?;
        f.act("g1", 2, 3).await?;
        f.act("g2", 1, 2).await?;
        f.act("g2", 2, 2).await?;

        let rate = f.analyzer.compute_report_impact_rate(&f.season, 1).await?;
        assert_eq!(rate, 0.5);
        Ok(())
    }

    #[tokio::test]
    async fn impact_ignores_reports_after_the_round() -> Result<()> {
        let f = fixture()?;
        f.deliver(MirrorType::Private, Some("g1"), 3).await?;
        f.act("g1", 4, 1).await?;
        let rate = f.analyzer.compute_report_impact_rate(&f.season, 2).await?;
        assert_eq!(rate, 0.0);
        Ok(())
    }

    #[test]
    fn threshold_rule() {
        let threshold = ShiftThreshold::default();
        assert!(threshold.is_shift(1, 0.0));
        assert!(!threshold.is_shift(0, 0.0));
        assert!(!threshold.is_shift(3, 2.5));
        assert!(threshold.is_shift(0, 2.0));
        assert!(threshold.is_shift(4, 2.0));
    }
}
