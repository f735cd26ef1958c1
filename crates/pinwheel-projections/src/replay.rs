use std::collections::BTreeMap;

use pinwheel_protocol::{
    EventRecord, GameResult, GovernorId, LeagueResult, TokenBalance, Trade, TradeId, event_types,
};
use tracing::debug;

use crate::balances::BalanceFold;
use crate::standings::{TeamStanding, compute_standings};
use crate::trades::TradeFold;

/// Every read model of one season, rebuilt from its log in a single pass.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonProjection {
    pub standings: Vec<TeamStanding>,
    pub balances: BTreeMap<GovernorId, TokenBalance>,
    pub trades: BTreeMap<TradeId, Trade>,
    /// Highest insertion sequence folded; 0 for an empty log. Use it as the
    /// cache key when holding on to a projection.
    pub last_sequence: u64,
    pub event_count: usize,
}

impl SeasonProjection {
    /// Fold `events`, which must be in log order.
    pub fn replay(events: &[EventRecord]) -> LeagueResult<Self> {
        let mut balances = BalanceFold::new();
        let mut trades = TradeFold::new();
        let mut games = Vec::new();
        let mut last_sequence = 0;

        for event in events {
            balances.apply(event)?;
            trades.apply(event)?;
            if event.is_type(event_types::GAME_COMPLETED) {
                games.push(event.payload_as::<GameResult>()?);
            }
            last_sequence = last_sequence.max(event.sequence);
        }

        let standings = compute_standings(&games)?;
        debug!(
            events = events.len(),
            games = games.len(),
            last_sequence,
            "season replayed"
        );
        Ok(Self {
            standings,
            balances: balances.into_balances(),
            trades: trades.into_trades(),
            last_sequence,
            event_count: events.len(),
        })
    }

    pub fn balance(&self, governor_id: &GovernorId) -> TokenBalance {
        self.balances
            .get(governor_id)
            .cloned()
            .unwrap_or_else(|| TokenBalance::empty(governor_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pinwheel_protocol::{
        EventId, SeasonId, TokenAllotment, TokenChange, TokenDelta, TokenKind, TradeOffer,
        TradeResolvedPayload, TradeStatus,
    };
    use serde::Serialize;

    use super::*;

    struct Log {
        events: Vec<EventRecord>,
    }

    impl Log {
        fn new() -> Self {
            Self { events: Vec::new() }
        }

        fn push<T: Serialize>(
            &mut self,
            round_number: u32,
            event_type: &str,
            governor: Option<&str>,
            payload: &T,
        ) -> &mut Self {
            let seq = self.events.len() as u64 + 1;
            self.events.push(EventRecord {
                event_id: EventId::from(format!("e{seq}")),
                sequence: seq,
                event_type: event_type.to_owned(),
                aggregate_id: format!("agg-{seq}"),
                aggregate_type: "test".to_owned(),
                season_id: SeasonId::from("S1"),
                round_number,
                governor_id: governor.map(GovernorId::from),
                payload: serde_json::to_value(payload).unwrap(),
                created_at: Utc::now(),
            });
            self
        }
    }

    fn grant() -> TokenChange {
        TokenChange {
            deltas: TokenAllotment::default().deltas(),
            reason: "season allotment".into(),
            trade_id: None,
        }
    }

    fn adjust(deltas: Vec<TokenDelta>) -> TokenChange {
        TokenChange {
            deltas,
            reason: "trade".into(),
            trade_id: Some(TradeId::from("t1")),
        }
    }

    fn season_log() -> Vec<EventRecord> {
        let trade = Trade::from_offer(
            TradeId::from("t1"),
            TradeOffer {
                from_governor: "alice".into(),
                to_governor: "bob".into(),
                offered_type: TokenKind::Boost,
                offered_amount: 2,
                requested_type: TokenKind::Propose,
                requested_amount: 1,
            },
            1,
        );
        let mut log = Log::new();
        log.push(1, event_types::TOKEN_GRANTED, Some("alice"), &grant())
            .push(1, event_types::TOKEN_GRANTED, Some("bob"), &grant())
            .push(
                1,
                event_types::GAME_COMPLETED,
                None,
                &GameResult::from_scores("rose".into(), "iron".into(), 52, 48),
            )
            .push(1, event_types::TRADE_OFFERED, Some("alice"), &trade)
            .push(
                2,
                event_types::TRADE_ACCEPTED,
                Some("bob"),
                &TradeResolvedPayload {
                    trade_id: trade.id.clone(),
                    status: TradeStatus::Accepted,
                },
            )
            .push(
                2,
                event_types::TOKEN_ADJUSTED,
                Some("alice"),
                &adjust(trade.offerer_deltas()),
            )
            .push(
                2,
                event_types::TOKEN_ADJUSTED,
                Some("bob"),
                &adjust(trade.counterparty_deltas()),
            )
            .push(
                2,
                event_types::GAME_COMPLETED,
                None,
                &GameResult::from_scores("iron".into(), "rose".into(), 40, 40),
            );
        log.events
    }

    #[test]
    fn replaying_twice_is_identical() {
        let log = season_log();
        let first = SeasonProjection::replay(&log).unwrap();
        let second = SeasonProjection::replay(&log).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.last_sequence, 8);
    }

    #[test]
    fn replay_covers_standings_balances_and_trades() {
        let projection = SeasonProjection::replay(&season_log()).unwrap();

        let leader = &projection.standings[0];
        assert_eq!(leader.team_id.as_str(), "rose");
        assert_eq!((leader.wins, leader.ties), (1, 1));

        let alice = projection.balance(&"alice".into());
        assert_eq!((alice.propose, alice.amend, alice.boost), (2, 2, 1));
        let bob = projection.balance(&"bob".into());
        assert_eq!((bob.propose, bob.amend, bob.boost), (0, 2, 5));

        let trade = &projection.trades[&TradeId::from("t1")];
        assert_eq!(trade.status, TradeStatus::Accepted);
    }

    #[test]
    fn empty_log_projects_to_nothing() {
        let projection = SeasonProjection::replay(&[]).unwrap();
        assert!(projection.standings.is_empty());
        assert!(projection.balances.is_empty());
        assert_eq!(projection.last_sequence, 0);
    }
}
