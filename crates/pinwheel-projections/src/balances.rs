use std::collections::BTreeMap;

use pinwheel_protocol::{
    EventRecord, GovernorId, LeagueError, LeagueResult, TokenBalance, TokenChange, event_types,
};

/// Incremental balance fold over `token.*` events.
///
/// Every token event names the governor whose balance it changes in its
/// `governor_id`. A log that would drive a count below zero is reported as
/// an error rather than clamped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceFold {
    balances: BTreeMap<GovernorId, TokenBalance>,
}

impl BalanceFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_token_event(event_type: &str) -> bool {
        matches!(
            event_type,
            event_types::TOKEN_GRANTED | event_types::TOKEN_SPENT | event_types::TOKEN_ADJUSTED
        )
    }

    /// Apply one event; events that are not token events are ignored.
    pub fn apply(&mut self, event: &EventRecord) -> LeagueResult<()> {
        if !Self::is_token_event(&event.event_type) {
            return Ok(());
        }
        let governor_id = event.governor_id.clone().ok_or_else(|| {
            LeagueError::validation(format!(
                "{} event {} has no governor_id",
                event.event_type, event.event_id
            ))
        })?;
        let change: TokenChange = event.payload_as()?;
        self.balances
            .entry(governor_id.clone())
            .or_insert_with(|| TokenBalance::empty(governor_id))
            .apply_all(&change.deltas)
    }

    /// Balance of one governor; all zeros when they hold nothing.
    pub fn balance(&self, governor_id: &GovernorId) -> TokenBalance {
        self.balances
            .get(governor_id)
            .cloned()
            .unwrap_or_else(|| TokenBalance::empty(governor_id.clone()))
    }

    pub fn into_balances(self) -> BTreeMap<GovernorId, TokenBalance> {
        self.balances
    }
}

/// Fold a season's events into per-governor token balances.
pub fn fold_balances(events: &[EventRecord]) -> LeagueResult<BTreeMap<GovernorId, TokenBalance>> {
    let mut fold = BalanceFold::new();
    for event in events {
        fold.apply(event)?;
    }
    Ok(fold.into_balances())
}
