use std::collections::BTreeMap;

use pinwheel_protocol::{
    EventRecord, LeagueError, LeagueResult, Trade, TradeId, TradeResolvedPayload, TradeStatus,
    event_types,
};

/// Incremental fold of `trade.*` events into trade records.
///
/// `trade.offered` carries the full trade; the resolving events carry only
/// the id and target status and are checked against the trade state
/// machine, so a log that resolves a trade twice is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeFold {
    trades: BTreeMap<TradeId, Trade>,
}

impl TradeFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &EventRecord) -> LeagueResult<()> {
        let expected = match event.event_type.as_str() {
            event_types::TRADE_OFFERED => {
                let trade: Trade = event.payload_as()?;
                if trade.status != TradeStatus::Offered {
                    return Err(LeagueError::validation(format!(
                        "trade {} was offered with status {}",
                        trade.id, trade.status
                    )));
                }
                if self.trades.contains_key(&trade.id) {
                    return Err(LeagueError::validation(format!(
                        "trade {} offered twice",
                        trade.id
                    )));
                }
                self.trades.insert(trade.id.clone(), trade);
                return Ok(());
            }
            event_types::TRADE_ACCEPTED => TradeStatus::Accepted,
            event_types::TRADE_REJECTED => TradeStatus::Rejected,
            event_types::TRADE_EXPIRED => TradeStatus::Expired,
            _ => return Ok(()),
        };

        let resolved: TradeResolvedPayload = event.payload_as()?;
        if resolved.status != expected {
            return Err(LeagueError::validation(format!(
                "{} event {} carries status {}",
                event.event_type, event.event_id, resolved.status
            )));
        }
        let trade = self
            .trades
            .get_mut(&resolved.trade_id)
            .ok_or_else(|| LeagueError::NotFound(format!("trade {}", resolved.trade_id)))?;
        trade.transition(expected, event.round_number)
    }

    pub fn get(&self, trade_id: &TradeId) -> Option<&Trade> {
        self.trades.get(trade_id)
    }

    /// Trades still in `offered`.
    pub fn open(&self) -> impl Iterator<Item = &Trade> {
        self.trades
            .values()
            .filter(|trade| trade.status == TradeStatus::Offered)
    }

    pub fn into_trades(self) -> BTreeMap<TradeId, Trade> {
        self.trades
    }
}

/// Fold a season's events into the current state of every trade.
pub fn fold_trades(events: &[EventRecord]) -> LeagueResult<BTreeMap<TradeId, Trade>> {
    let mut fold = TradeFold::new();
    for event in events {
        fold.apply(event)?;
    }
    Ok(fold.into_trades())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pinwheel_protocol::{EventId, SeasonId, TokenKind, TradeOffer};

    use super::*;

    fn record(
        seq: u64,
        round_number: u32,
        event_type: &str,
        payload: serde_json::Value,
    ) -> EventRecord {
        EventRecord {
            event_id: EventId::from(format!("e{seq}")),
            sequence: seq,
            event_type: event_type.to_owned(),
            aggregate_id: "t1".to_owned(),
            aggregate_type: "trade".to_owned(),
            season_id: SeasonId::from("S1"),
            round_number,
            governor_id: None,
            payload,
            created_at: Utc::now(),
        }
    }

    fn offered() -> EventRecord {
        let trade = Trade::from_offer(
            TradeId::from("t1"),
            TradeOffer {
                from_governor: "alice".into(),
                to_governor: "bob".into(),
                offered_type: TokenKind::Boost,
                offered_amount: 1,
                requested_type: TokenKind::Amend,
                requested_amount: 1,
            },
            1,
        );
        let payload = serde_json::to_value(trade).unwrap();
        record(1, 1, event_types::TRADE_OFFERED, payload)
    }

    fn resolved(seq: u64, event_type: &str, status: TradeStatus) -> EventRecord {
        let payload = TradeResolvedPayload {
            trade_id: TradeId::from("t1"),
            status,
        };
        record(seq, 2, event_type, serde_json::to_value(payload).unwrap())
    }

    #[test]
    fn offer_then_accept() {
        let trades = fold_trades(&[
            offered(),
            resolved(2, event_types::TRADE_ACCEPTED, TradeStatus::Accepted),
        ])
        .unwrap();
        let trade = &trades[&TradeId::from("t1")];
        assert_eq!(trade.status, TradeStatus::Accepted);
        assert_eq!(trade.resolved_round, Some(2));
    }

    #[test]
    fn resolving_twice_is_rejected() {
        let err = fold_trades(&[
            offered(),
            resolved(2, event_types::TRADE_ACCEPTED, TradeStatus::Accepted),
            resolved(3, event_types::TRADE_EXPIRED, TradeStatus::Expired),
        ])
        .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidTransition { .. }));
    }

    #[test]
    fn resolution_of_unknown_trade_fails() {
        let err = fold_trades(&[resolved(
            2,
            event_types::TRADE_REJECTED,
            TradeStatus::Rejected,
        )])
        .unwrap_err();
        assert!(matches!(err, LeagueError::NotFound(_)));
    }

    #[test]
    fn open_lists_only_offered_trades() {
        let mut fold = TradeFold::new();
        fold.apply(&offered()).unwrap();
        assert_eq!(fold.open().count(), 1);
        fold.apply(&resolved(2, event_types::TRADE_REJECTED, TradeStatus::Rejected))
            .unwrap();
        assert_eq!(fold.open().count(), 0);
    }
}
