//! Governance tokens, balances, and token trades.

use crate::error::{LeagueError, LeagueResult};
use crate::ids::{GovernorId, TradeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A spendable governance-action credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenKind {
    Propose,
    Amend,
    Boost,
}

impl TokenKind {
    pub const ALL: [TokenKind; 3] = [Self::Propose, Self::Amend, Self::Boost];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Propose => "PROPOSE",
            Self::Amend => "AMEND",
            Self::Boost => "BOOST",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed change to one token count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDelta {
    pub token_type: TokenKind,
    pub delta: i64,
}

impl TokenDelta {
    pub fn credit(token_type: TokenKind, amount: u32) -> Self {
        Self {
            token_type,
            delta: i64::from(amount),
        }
    }

    pub fn debit(token_type: TokenKind, amount: u32) -> Self {
        Self {
            token_type,
            delta: -i64::from(amount),
        }
    }
}

/// Payload shared by `token.granted`, `token.spent` and `token.adjusted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenChange {
    pub deltas: Vec<TokenDelta>,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<TradeId>,
}

/// Per-season starting allotment handed to every enrolled governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllotment {
    pub propose: u32,
    pub amend: u32,
    pub boost: u32,
}

impl Default for TokenAllotment {
    fn default() -> Self {
        Self {
            propose: 1,
            amend: 2,
            boost: 3,
        }
    }
}

impl TokenAllotment {
    pub fn deltas(&self) -> Vec<TokenDelta> {
        vec![
            TokenDelta::credit(TokenKind::Propose, self.propose),
            TokenDelta::credit(TokenKind::Amend, self.amend),
            TokenDelta::credit(TokenKind::Boost, self.boost),
        ]
    }
}

/// Derived token holdings of one governor in one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub governor_id: GovernorId,
    pub propose: u32,
    pub amend: u32,
    pub boost: u32,
}

impl TokenBalance {
    pub fn empty(governor_id: GovernorId) -> Self {
        Self {
            governor_id,
            propose: 0,
            amend: 0,
            boost: 0,
        }
    }

    pub fn get(&self, kind: TokenKind) -> u32 {
        match kind {
            TokenKind::Propose => self.propose,
            TokenKind::Amend => self.amend,
            TokenKind::Boost => self.boost,
        }
    }

    fn slot(&mut self, kind: TokenKind) -> &mut u32 {
        match kind {
            TokenKind::Propose => &mut self.propose,
            TokenKind::Amend => &mut self.amend,
            TokenKind::Boost => &mut self.boost,
        }
    }

    /// Apply a signed delta. A delta that would drop the count below zero
    /// (or overflow it) is refused and leaves the balance untouched.
    pub fn apply(&mut self, delta: TokenDelta) -> LeagueResult<()> {
        let available = self.get(delta.token_type);
        let next = i64::from(available) + delta.delta;
        let next = u32::try_from(next).map_err(|_| {
            if next < 0 {
                LeagueError::InsufficientBalance {
                    governor: self.governor_id.to_string(),
                    token: delta.token_type.to_string(),
                    available,
                    requested: u32::try_from(delta.delta.unsigned_abs()).unwrap_or(u32::MAX),
                }
            } else {
                LeagueError::validation(format!(
                    "{} balance overflow for governor {}",
                    delta.token_type, self.governor_id
                ))
            }
        })?;
        *self.slot(delta.token_type) = next;
        Ok(())
    }

    /// Apply every delta or none of them.
    pub fn apply_all(&mut self, deltas: &[TokenDelta]) -> LeagueResult<()> {
        let mut staged = self.clone();
        for delta in deltas {
            staged.apply(*delta)?;
        }
        *self = staged;
        Ok(())
    }

    pub fn matches_allotment(&self, allotment: &TokenAllotment) -> bool {
        self.propose == allotment.propose
            && self.amend == allotment.amend
            && self.boost == allotment.boost
    }
}

/// Trade lifecycle. `offered` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Offered,
    Accepted,
    Rejected,
    Expired,
}

impl TradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Offered => "offered",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Offered)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Offered, Self::Accepted)
                | (Self::Offered, Self::Rejected)
                | (Self::Offered, Self::Expired)
        )
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a governor puts on the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeOffer {
    pub from_governor: GovernorId,
    pub to_governor: GovernorId,
    pub offered_type: TokenKind,
    pub offered_amount: u32,
    pub requested_type: TokenKind,
    pub requested_amount: u32,
}

impl TradeOffer {
    pub fn validate(&self) -> LeagueResult<()> {
        if self.from_governor.is_blank() || self.to_governor.is_blank() {
            return Err(LeagueError::validation("trade is missing a governor"));
        }
        if self.from_governor == self.to_governor {
            return Err(LeagueError::validation(
                "a governor cannot trade with themselves",
            ));
        }
        if self.offered_amount == 0 || self.requested_amount == 0 {
            return Err(LeagueError::validation("trade amounts must be positive"));
        }
        Ok(())
    }
}

/// Derived trade state. `trade.offered` carries the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub from_governor: GovernorId,
    pub to_governor: GovernorId,
    pub offered_type: TokenKind,
    pub offered_amount: u32,
    pub requested_type: TokenKind,
    pub requested_amount: u32,
    pub status: TradeStatus,
    pub offered_round: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_round: Option<u32>,
}

impl Trade {
    pub fn from_offer(id: TradeId, offer: TradeOffer, offered_round: u32) -> Self {
        Self {
            id,
            from_governor: offer.from_governor,
            to_governor: offer.to_governor,
            offered_type: offer.offered_type,
            offered_amount: offer.offered_amount,
            requested_type: offer.requested_type,
            requested_amount: offer.requested_amount,
            status: TradeStatus::Offered,
            offered_round,
            resolved_round: None,
        }
    }

    /// Move to `next`, refusing anything out of a terminal state or filed
    /// before the round the trade was offered in.
    pub fn transition(&mut self, next: TradeStatus, round_number: u32) -> LeagueResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(LeagueError::InvalidTransition {
                entity: format!("trade {}", self.id),
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        if round_number < self.offered_round {
            return Err(LeagueError::invalid_argument(format!(
                "trade {} was offered in round {}, cannot resolve it in round {round_number}",
                self.id, self.offered_round
            )));
        }
        self.status = next;
        self.resolved_round = Some(round_number);
        Ok(())
    }

    /// Balance changes applied to the offering governor on acceptance.
    pub fn offerer_deltas(&self) -> Vec<TokenDelta> {
        vec![
            TokenDelta::debit(self.offered_type, self.offered_amount),
            TokenDelta::credit(self.requested_type, self.requested_amount),
        ]
    }

    /// Balance changes applied to the counterparty on acceptance.
    pub fn counterparty_deltas(&self) -> Vec<TokenDelta> {
        vec![
            TokenDelta::credit(self.offered_type, self.offered_amount),
            TokenDelta::debit(self.requested_type, self.requested_amount),
        ]
    }

    /// Whether the trade has sat open for more than `window_rounds`. A trade
    /// offered in round 3 with a window of 2 is still open in round 5.
    pub fn is_stale(&self, current_round: u32, window_rounds: u32) -> bool {
        self.status == TradeStatus::Offered
            && current_round > self.offered_round.saturating_add(window_rounds)
    }
}

/// Payload of `trade.accepted`, `trade.rejected` and `trade.expired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeResolvedPayload {
    pub trade_id: TradeId,
    pub status: TradeStatus,
}
