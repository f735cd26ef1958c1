//! Token economy: the only writer of `token.*` and `trade.*` events.
//!
//! The event store does no business validation, so every balance-changing
//! event goes through [`TokenEconomy`], which folds the season's current
//! balances and trades, checks the transition, and appends under the
//! season's writer lock. Multi-event effects (a spend plus the action it
//! pays for, a trade acceptance plus both balance adjustments) are appended
//! as one batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use pinwheel_events::{EventStore, SeasonLocks};
use pinwheel_projections::{BalanceFold, TradeFold, fold_balances, fold_trades};
use pinwheel_protocol::{
    AggregateType, EventFilter, EventId, GovernorId, LeagueError, LeagueResult, NewEvent,
    SeasonId, TokenBalance, TokenChange, TokenDelta, TokenKind, Trade, TradeId, TradeOffer,
    TradeResolvedPayload, TradeStatus, event_types,
};
use tracing::{debug, info, instrument, warn};

/// Build a `token.granted` event crediting `deltas` to `governor_id`.
///
/// Grants only ever add tokens; a negative delta is a validation error.
pub fn grant_event(
    season_id: &SeasonId,
    governor_id: &GovernorId,
    round_number: u32,
    deltas: Vec<TokenDelta>,
    reason: impl Into<String>,
) -> LeagueResult<NewEvent> {
    if deltas.iter().any(|delta| delta.delta < 0) {
        return Err(LeagueError::validation("token grants cannot be negative"));
    }
    token_event(
        event_types::TOKEN_GRANTED,
        season_id,
        governor_id,
        round_number,
        TokenChange {
            deltas,
            reason: reason.into(),
            trade_id: None,
        },
    )
}

fn token_event(
    event_type: &str,
    season_id: &SeasonId,
    governor_id: &GovernorId,
    round_number: u32,
    change: TokenChange,
) -> LeagueResult<NewEvent> {
    NewEvent::new(
        event_type,
        AggregateType::Governor,
        governor_id.as_str(),
        season_id.clone(),
        round_number,
    )
    .governor(governor_id.clone())
    .with_payload(&change)
}

fn resolution_event(
    event_type: &str,
    season_id: &SeasonId,
    trade: &Trade,
    actor: &GovernorId,
    round_number: u32,
) -> LeagueResult<NewEvent> {
    NewEvent::new(
        event_type,
        AggregateType::Trade,
        trade.id.as_str(),
        season_id.clone(),
        round_number,
    )
    .governor(actor.clone())
    .with_payload(&TradeResolvedPayload {
        trade_id: trade.id.clone(),
        status: trade.status,
    })
}

/// A debit against one governor's balance, paying for a governance action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSpend {
    pub governor_id: GovernorId,
    pub kind: TokenKind,
    pub amount: u32,
    pub reason: String,
}

impl TokenSpend {
    pub fn one(governor_id: GovernorId, kind: TokenKind, reason: impl Into<String>) -> Self {
        Self {
            governor_id,
            kind,
            amount: 1,
            reason: reason.into(),
        }
    }
}

#[derive(Clone)]
pub struct TokenEconomy {
    store: Arc<dyn EventStore>,
    locks: SeasonLocks,
    trade_window_rounds: u32,
}

impl TokenEconomy {
    pub fn new(store: Arc<dyn EventStore>, locks: SeasonLocks, trade_window_rounds: u32) -> Self {
        Self {
            store,
            locks,
            trade_window_rounds,
        }
    }

    pub fn trade_window_rounds(&self) -> u32 {
        self.trade_window_rounds
    }

    pub fn locks(&self) -> &SeasonLocks {
        &self.locks
    }

    // ─── Reads ─────────────────────────────────────────────────────

    /// Current balance of every governor who has ever held a token this season.
    pub async fn balances(
        &self,
        season_id: &SeasonId,
    ) -> LeagueResult<BTreeMap<GovernorId, TokenBalance>> {
        let events = self
            .store
            .read(season_id, EventFilter::all().event_type("token.*"))
            .await?;
        fold_balances(&events)
    }

    pub async fn balance(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
    ) -> LeagueResult<TokenBalance> {
        let filter = EventFilter::all()
            .event_type("token.*")
            .governor(governor_id.clone());
        let mut fold = BalanceFold::new();
        for event in self.store.read(season_id, filter).await? {
            fold.apply(&event)?;
        }
        Ok(fold.balance(governor_id))
    }

    pub async fn trades(&self, season_id: &SeasonId) -> LeagueResult<BTreeMap<TradeId, Trade>> {
        let events = self
            .store
            .read(season_id, EventFilter::all().event_type("trade.*"))
            .await?;
        fold_trades(&events)
    }

    pub async fn trade(&self, season_id: &SeasonId, trade_id: &TradeId) -> LeagueResult<Trade> {
        let filter = EventFilter::all()
            .event_type("trade.*")
            .aggregate(trade_id.as_str());
        let mut fold = TradeFold::new();
        for event in self.store.read(season_id, filter).await? {
            fold.apply(&event)?;
        }
        fold.get(trade_id)
            .cloned()
            .ok_or_else(|| LeagueError::NotFound(format!("trade {trade_id}")))
    }

    // ─── Grants and spends ─────────────────────────────────────────

    #[instrument(
        skip(self, deltas, reason),
        fields(season_id = %season_id, governor_id = %governor_id)
    )]
    pub async fn grant(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
        round_number: u32,
        deltas: Vec<TokenDelta>,
        reason: &str,
    ) -> LeagueResult<EventId> {
        let event = grant_event(season_id, governor_id, round_number, deltas, reason)?;
        let _guard = self.locks.acquire(season_id).await;
        self.require_current_round(season_id, round_number).await?;
        let event_id = self.store.append(event).await?;
        debug!(event_id = %event_id, "tokens granted");
        Ok(event_id)
    }

    /// Apply `spend` and append `paid_for` in the same batch, after the
    /// `token.spent` event. When the governor cannot cover the spend nothing
    /// is appended.
    pub async fn spend(
        &self,
        season_id: &SeasonId,
        round_number: u32,
        spend: TokenSpend,
        paid_for: Vec<NewEvent>,
    ) -> LeagueResult<Vec<EventId>> {
        let _guard = self.locks.acquire(season_id).await;
        self.spend_under_lock(season_id, round_number, spend, paid_for)
            .await
    }

    /// [`TokenEconomy::spend`] for callers that already hold the season's
    /// writer lock from [`SeasonLocks::acquire`] and need their own checks
    /// to run in the same critical section.
    #[instrument(
        skip(self, spend, paid_for),
        fields(season_id = %season_id, governor_id = %spend.governor_id, token = %spend.kind)
    )]
    pub async fn spend_under_lock(
        &self,
        season_id: &SeasonId,
        round_number: u32,
        spend: TokenSpend,
        paid_for: Vec<NewEvent>,
    ) -> LeagueResult<Vec<EventId>> {
        if spend.amount == 0 {
            return Err(LeagueError::validation("spend amount must be positive"));
        }
        self.require_current_round(season_id, round_number).await?;

        let debit = TokenDelta::debit(spend.kind, spend.amount);
        let mut balance = self.balance(season_id, &spend.governor_id).await?;
        if let Err(error) = balance.apply(debit) {
            warn!(%error, "spend rejected");
            return Err(error);
        }

        let mut batch = Vec::with_capacity(paid_for.len() + 1);
        batch.push(token_event(
            event_types::TOKEN_SPENT,
            season_id,
            &spend.governor_id,
            round_number,
            TokenChange {
                deltas: vec![debit],
                reason: spend.reason,
                trade_id: None,
            },
        )?);
        batch.extend(paid_for);
        let ids = self.store.append_batch(batch).await?;
        debug!(remaining = balance.get(spend.kind), "tokens spent");
        Ok(ids)
    }

    // ─── Trades ────────────────────────────────────────────────────

    /// Open a trade. The offering governor must hold at least the offered
    /// amount now; nothing is escrowed.
    #[instrument(
        skip(self, offer),
        fields(season_id = %season_id, from = %offer.from_governor, to = %offer.to_governor)
    )]
    pub async fn offer_trade(
        &self,
        season_id: &SeasonId,
        offer: TradeOffer,
        round_number: u32,
    ) -> LeagueResult<Trade> {
        offer.validate()?;
        let _guard = self.locks.acquire(season_id).await;
        self.require_current_round(season_id, round_number).await?;

        let balance = self.balance(season_id, &offer.from_governor).await?;
        let available = balance.get(offer.offered_type);
        if available < offer.offered_amount {
            let error = LeagueError::InsufficientBalance {
                governor: offer.from_governor.to_string(),
                token: offer.offered_type.to_string(),
                available,
                requested: offer.offered_amount,
            };
            warn!(%error, "trade offer rejected");
            return Err(error);
        }

        let trade = Trade::from_offer(TradeId::new_uuid(), offer, round_number);
        let event = NewEvent::new(
            event_types::TRADE_OFFERED,
            AggregateType::Trade,
            trade.id.as_str(),
            season_id.clone(),
            round_number,
        )
        .governor(trade.from_governor.clone())
        .with_payload(&trade)?;
        self.store.append(event).await?;
        info!(trade_id = %trade.id, "trade offered");
        Ok(trade)
    }

    /// Accept an open trade on behalf of its counterparty. The acceptance and
    /// both balance adjustments are appended as one batch; if either side
    /// cannot cover its half nothing is appended.
    #[instrument(skip(self), fields(season_id = %season_id, trade_id = %trade_id))]
    pub async fn accept_trade(
        &self,
        season_id: &SeasonId,
        trade_id: &TradeId,
        acting_governor: &GovernorId,
        round_number: u32,
    ) -> LeagueResult<Trade> {
        let _guard = self.locks.acquire(season_id).await;
        self.require_current_round(season_id, round_number).await?;
        let mut trade = self.trade(season_id, trade_id).await?;
        Self::require_counterparty(&trade, acting_governor)?;
        if let Err(error) = trade.transition(TradeStatus::Accepted, round_number) {
            warn!(%error, "trade acceptance rejected");
            return Err(error);
        }

        let offerer_deltas = trade.offerer_deltas();
        let counterparty_deltas = trade.counterparty_deltas();
        let mut offerer = self.balance(season_id, &trade.from_governor).await?;
        let mut counterparty = self.balance(season_id, &trade.to_governor).await?;
        if let Err(error) = counterparty
            .apply_all(&counterparty_deltas)
            .and_then(|()| offerer.apply_all(&offerer_deltas))
        {
            warn!(%error, "trade acceptance rejected");
            return Err(error);
        }

        let adjustment = |governor_id: &GovernorId, deltas: Vec<TokenDelta>| {
            token_event(
                event_types::TOKEN_ADJUSTED,
                season_id,
                governor_id,
                round_number,
                TokenChange {
                    deltas,
                    reason: "trade accepted".to_owned(),
                    trade_id: Some(trade.id.clone()),
                },
            )
        };
        let batch = vec![
            resolution_event(
                event_types::TRADE_ACCEPTED,
                season_id,
                &trade,
                acting_governor,
                round_number,
            )?,
            adjustment(&trade.from_governor, offerer_deltas)?,
            adjustment(&trade.to_governor, counterparty_deltas)?,
        ];
        self.store.append_batch(batch).await?;
        info!(trade_id = %trade.id, "trade accepted");
        Ok(trade)
    }

    #[instrument(skip(self), fields(season_id = %season_id, trade_id = %trade_id))]
    pub async fn reject_trade(
        &self,
        season_id: &SeasonId,
        trade_id: &TradeId,
        acting_governor: &GovernorId,
        round_number: u32,
    ) -> LeagueResult<Trade> {
        let _guard = self.locks.acquire(season_id).await;
        self.require_current_round(season_id, round_number).await?;
        let mut trade = self.trade(season_id, trade_id).await?;
        Self::require_counterparty(&trade, acting_governor)?;
        if let Err(error) = trade.transition(TradeStatus::Rejected, round_number) {
            warn!(%error, "trade rejection refused");
            return Err(error);
        }
        let event = resolution_event(
            event_types::TRADE_REJECTED,
            season_id,
            &trade,
            acting_governor,
            round_number,
        )?;
        self.store.append(event).await?;
        info!(trade_id = %trade.id, "trade rejected");
        Ok(trade)
    }

    /// Expire one trade that has sat open past the trade window.
    #[instrument(skip(self), fields(season_id = %season_id, trade_id = %trade_id))]
    pub async fn expire_trade(
        &self,
        season_id: &SeasonId,
        trade_id: &TradeId,
        current_round: u32,
    ) -> LeagueResult<Trade> {
        let _guard = self.locks.acquire(season_id).await;
        self.require_current_round(season_id, current_round).await?;
        let mut trade = self.trade(season_id, trade_id).await?;
        let last_open_round = trade.offered_round.saturating_add(self.trade_window_rounds);
        trade.transition(TradeStatus::Expired, current_round)?;
        if current_round <= last_open_round {
            return Err(LeagueError::invalid_argument(format!(
                "trade {trade_id} is open through round {last_open_round}"
            )));
        }
        let event = self.expiry_event(season_id, &trade, current_round)?;
        self.store.append(event).await?;
        info!(trade_id = %trade.id, "trade expired");
        Ok(trade)
    }

    /// Expire every open trade past the trade window in one batch.
    #[instrument(skip(self), fields(season_id = %season_id))]
    pub async fn expire_stale_trades(
        &self,
        season_id: &SeasonId,
        current_round: u32,
    ) -> LeagueResult<Vec<TradeId>> {
        let _guard = self.locks.acquire(season_id).await;
        self.require_current_round(season_id, current_round).await?;
        let events = self
            .store
            .read(season_id, EventFilter::all().event_type("trade.*"))
            .await?;
        let mut fold = TradeFold::new();
        for event in &events {
            fold.apply(event)?;
        }

        let mut expired = Vec::new();
        let mut batch = Vec::new();
        let stale: Vec<Trade> = fold
            .open()
            .filter(|trade| trade.is_stale(current_round, self.trade_window_rounds))
            .cloned()
            .collect();
        for mut trade in stale {
            trade.transition(TradeStatus::Expired, current_round)?;
            batch.push(self.expiry_event(season_id, &trade, current_round)?);
            expired.push(trade.id);
        }
        if batch.is_empty() {
            return Ok(expired);
        }
        self.store.append_batch(batch).await?;
        info!(count = expired.len(), round = current_round, "stale trades expired");
        Ok(expired)
    }

    fn expiry_event(
        &self,
        season_id: &SeasonId,
        trade: &Trade,
        current_round: u32,
    ) -> LeagueResult<NewEvent> {
        let mut event = NewEvent::new(
            event_types::TRADE_EXPIRED,
            AggregateType::Trade,
            trade.id.as_str(),
            season_id.clone(),
            current_round,
        )
        .with_payload(&TradeResolvedPayload {
            trade_id: trade.id.clone(),
            status: trade.status,
        })?;
        // Expiry is a system action; pin the id so a repeated sweep is a no-op.
        event.event_id = Some(EventId::from(format!("trade-expired-{}", trade.id)));
        Ok(event)
    }

    /// Folds replay in round order, so every write is checked against the
    /// season's latest round while the writer lock is held.
    async fn require_current_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<()> {
        self.store
            .require_current_round(season_id, round_number)
            .await
            .inspect_err(|error| warn!(%error, "write behind the season head rejected"))
    }

    fn require_counterparty(trade: &Trade, acting_governor: &GovernorId) -> LeagueResult<()> {
        if &trade.to_governor != acting_governor {
            return Err(LeagueError::invalid_argument(format!(
                "only {} may resolve trade {}",
                trade.to_governor, trade.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use pinwheel_events::SqliteLedger;
    use pinwheel_protocol::TokenAllotment;

    use super::*;

    struct Fixture {
        ledger: Arc<SqliteLedger>,
        economy: TokenEconomy,
        season: SeasonId,
    }

    async fn fixture() -> Result<Fixture> {
        let ledger = Arc::new(SqliteLedger::in_memory()?);
        let economy = TokenEconomy::new(ledger.clone(), SeasonLocks::new(), 2);
        let season = SeasonId::from("S1");
        for governor in ["alice", "bob"] {
            economy
                .grant(
                    &season,
                    &governor.into(),
                    1,
                    TokenAllotment::default().deltas(),
                    "season allotment",
                )
                .await?;
        }
        Ok(Fixture {
            ledger,
            economy,
            season,
        })
    }

    fn offer(offered_amount: u32, requested_amount: u32) -> TradeOffer {
        TradeOffer {
            from_governor: "alice".into(),
            to_governor: "bob".into(),
            offered_type: TokenKind::Boost,
            offered_amount,
            requested_type: TokenKind::Amend,
            requested_amount,
        }
    }

    #[tokio::test]
    async fn accepted_trade_moves_tokens_both_ways() -> Result<()> {
        let f = fixture().await?;
        let trade = f.economy.offer_trade(&f.season, offer(2, 1), 1).await?;
        let accepted = f
            .economy
            .accept_trade(&f.season, &trade.id, &"bob".into(), 2)
            .await?;
        assert_eq!(accepted.status, TradeStatus::Accepted);

        let alice = f.economy.balance(&f.season, &"alice".into()).await?;
        let bob = f.economy.balance(&f.season, &"bob".into()).await?;
        assert_eq!((alice.amend, alice.boost), (3, 1));
        assert_eq!((bob.amend, bob.boost), (1, 5));

        let adjustments = f
            .ledger
            .read(
                &f.season,
                EventFilter::all().event_type(event_types::TOKEN_ADJUSTED),
            )
            .await?;
        assert_eq!(adjustments.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn trade_can_be_accepted_only_once() -> Result<()> {
        let f = fixture().await?;
        let trade = f.economy.offer_trade(&f.season, offer(1, 1), 1).await?;
        f.economy
            .accept_trade(&f.season, &trade.id, &"bob".into(), 2)
            .await?;
        let head = f.ledger.head(&f.season).await?;

        let err = f
            .economy
            .accept_trade(&f.season, &trade.id, &"bob".into(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidTransition { .. }));
        assert_eq!(f.ledger.head(&f.season).await?, head);
        Ok(())
    }

    #[tokio::test]
    async fn accept_without_funds_appends_nothing() -> Result<()> {
        let f = fixture().await?;
        // Bob holds 2 AMEND; asking for 3 cannot be covered.
        let trade = f.economy.offer_trade(&f.season, offer(1, 3), 1).await?;
        let head = f.ledger.head(&f.season).await?;

        let err = f
            .economy
            .accept_trade(&f.season, &trade.id, &"bob".into(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InsufficientBalance { .. }));
        assert_eq!(f.ledger.head(&f.season).await?, head);
        assert_eq!(
            f.economy.trade(&f.season, &trade.id).await?.status,
            TradeStatus::Offered
        );
        Ok(())
    }

    #[tokio::test]
    async fn offer_requires_offered_tokens() -> Result<()> {
        let f = fixture().await?;
        let err = f
            .economy
            .offer_trade(&f.season, offer(4, 1), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InsufficientBalance { .. }));
        assert!(f.economy.trades(&f.season).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn only_the_counterparty_resolves() -> Result<()> {
        let f = fixture().await?;
        let trade = f.economy.offer_trade(&f.season, offer(1, 1), 1).await?;
        let err = f
            .economy
            .accept_trade(&f.season, &trade.id, &"alice".into(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));

        let rejected = f
            .economy
            .reject_trade(&f.season, &trade.id, &"bob".into(), 1)
            .await?;
        assert_eq!(rejected.status, TradeStatus::Rejected);

        let err = f
            .economy
            .accept_trade(&f.season, &trade.id, &"bob".into(), 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidTransition { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn sweep_expires_trades_past_the_window() -> Result<()> {
        let f = fixture().await?;
        let old = f.economy.offer_trade(&f.season, offer(1, 1), 1).await?;
        let fresh = f.economy.offer_trade(&f.season, offer(1, 1), 2).await?;

        let err = f
            .economy
            .expire_trade(&f.season, &old.id, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));

        // Round 3 is the last round of the old trade's window.
        assert!(f.economy.expire_stale_trades(&f.season, 3).await?.is_empty());
        let err = f
            .economy
            .expire_trade(&f.season, &old.id, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));

        let expired = f.economy.expire_stale_trades(&f.season, 4).await?;
        assert_eq!(expired, vec![old.id.clone()]);
        assert!(f.economy.expire_stale_trades(&f.season, 4).await?.is_empty());

        let trades = f.economy.trades(&f.season).await?;
        assert_eq!(trades[&old.id].status, TradeStatus::Expired);
        assert_eq!(trades[&fresh.id].status, TradeStatus::Offered);

        let err = f
            .economy
            .accept_trade(&f.season, &old.id, &"bob".into(), 4)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidTransition { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn spend_behind_the_latest_round_is_refused() -> Result<()> {
        let f = fixture().await?;
        let carol = GovernorId::from("carol");
        f.economy
            .grant(
                &f.season,
                &carol,
                3,
                TokenAllotment::default().deltas(),
                "late enrollment",
            )
            .await?;
        let head = f.ledger.head(&f.season).await?;

        let spend = || TokenSpend::one(carol.clone(), TokenKind::Propose, "proposal");
        let err = f
            .economy
            .spend(&f.season, 1, spend(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));
        assert_eq!(f.ledger.head(&f.season).await?, head);

        // Replay still folds and the grant is intact.
        assert_eq!(f.economy.balance(&f.season, &carol).await?.propose, 1);
        assert_eq!(f.economy.balances(&f.season).await?.len(), 3);

        f.economy.spend(&f.season, 3, spend(), Vec::new()).await?;
        assert_eq!(f.economy.balance(&f.season, &carol).await?.propose, 0);
        Ok(())
    }

    #[tokio::test]
    async fn trade_resolution_cannot_predate_the_offer() -> Result<()> {
        let f = fixture().await?;
        let trade = f.economy.offer_trade(&f.season, offer(1, 1), 5).await?;
        let head = f.ledger.head(&f.season).await?;

        for round in [2, 4] {
            let err = f
                .economy
                .accept_trade(&f.season, &trade.id, &"bob".into(), round)
                .await
                .unwrap_err();
            assert!(matches!(err, LeagueError::InvalidArgument(_)));
            let err = f
                .economy
                .reject_trade(&f.season, &trade.id, &"bob".into(), round)
                .await
                .unwrap_err();
            assert!(matches!(err, LeagueError::InvalidArgument(_)));
        }
        assert_eq!(f.ledger.head(&f.season).await?, head);

        let trades = f.economy.trades(&f.season).await?;
        assert_eq!(trades[&trade.id].status, TradeStatus::Offered);

        let accepted = f
            .economy
            .accept_trade(&f.season, &trade.id, &"bob".into(), 5)
            .await?;
        assert_eq!(accepted.resolved_round, Some(5));
        assert_eq!(
            f.economy.trades(&f.season).await?[&trade.id].status,
            TradeStatus::Accepted
        );
        Ok(())
    }

    #[tokio::test]
    async fn offers_and_sweeps_follow_the_latest_round() -> Result<()> {
        let f = fixture().await?;
        f.economy.offer_trade(&f.season, offer(1, 1), 4).await?;

        let err = f
            .economy
            .offer_trade(&f.season, offer(1, 1), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));
        let err = f
            .economy
            .expire_stale_trades(&f.season, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InvalidArgument(_)));
        assert_eq!(f.economy.trades(&f.season).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn spend_commits_with_its_action_or_not_at_all() -> Result<()> {
        let f = fixture().await?;
        let proposal = |n: u32| {
            NewEvent::new(
                event_types::PROPOSAL_SUBMITTED,
                AggregateType::Proposal,
                format!("p{n}"),
                f.season.clone(),
                1,
            )
            .governor("alice".into())
        };

        let spend = || TokenSpend::one("alice".into(), TokenKind::Propose, "proposal");
        let ids = f
            .economy
            .spend(&f.season, 1, spend(), vec![proposal(1)])
            .await?;
        assert_eq!(ids.len(), 2);

        let err = f
            .economy
            .spend(&f.season, 1, spend(), vec![proposal(2)])
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::InsufficientBalance { .. }));

        let proposals = f
            .ledger
            .read(&f.season, EventFilter::all().event_type("proposal.*"))
            .await?;
        assert_eq!(proposals.len(), 1);
        assert_eq!(
            f.economy.balance(&f.season, &"alice".into()).await?.propose,
            0
        );
        Ok(())
    }

    #[tokio::test]
    async fn grants_refuse_negative_deltas() -> Result<()> {
        let f = fixture().await?;
        let err = f
            .economy
            .grant(
                &f.season,
                &"alice".into(),
                1,
                vec![TokenDelta::debit(TokenKind::Boost, 1)],
                "clawback",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LeagueError::Validation(_)));
        Ok(())
    }
}
