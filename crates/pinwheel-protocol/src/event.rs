//! The ledger's event envelope.
//!
//! Events are immutable facts. A [`NewEvent`] is what callers hand to the
//! store; an [`EventRecord`] is what the store hands back, stamped with its
//! insertion sequence. Within one season the log is totally ordered by
//! `(round_number, sequence)`; `created_at` is display-only.

use crate::error::{LeagueError, LeagueResult};
use crate::ids::{EventId, GovernorId, SeasonId};
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lazy stream of stored events, as produced by an event store query.
pub type EventRecordStream = BoxStream<'static, LeagueResult<EventRecord>>;

/// Event type tags written by the Pinwheel core.
pub mod event_types {
    pub const SEASON_STARTED: &str = "season.started";
    pub const SEASON_ACTIVATED: &str = "season.activated";
    pub const SEASON_COMPLETED: &str = "season.completed";
    pub const RULESET_AMENDED: &str = "ruleset.amended";
    pub const GOVERNOR_ENROLLED: &str = "governor.enrolled";

    pub const TOKEN_GRANTED: &str = "token.granted";
    pub const TOKEN_SPENT: &str = "token.spent";
    pub const TOKEN_ADJUSTED: &str = "token.adjusted";

    pub const TRADE_OFFERED: &str = "trade.offered";
    pub const TRADE_ACCEPTED: &str = "trade.accepted";
    pub const TRADE_REJECTED: &str = "trade.rejected";
    pub const TRADE_EXPIRED: &str = "trade.expired";

    pub const PROPOSAL_SUBMITTED: &str = "proposal.submitted";
    pub const PROPOSAL_AMENDED: &str = "proposal.amended";
    pub const VOTE_CAST: &str = "vote.cast";

    pub const GAME_COMPLETED: &str = "game.completed";
    pub const MIRROR_DELIVERED: &str = "mirror.delivered";
}

/// True for the event types that count as a governor's governance actions:
/// votes, anything proposal-related, anything trade-related.
pub fn is_governance_action(event_type: &str) -> bool {
    event_type == event_types::VOTE_CAST
        || event_type.starts_with("proposal.")
        || event_type.starts_with("trade.")
}

/// True for `token.*` and `trade.*`, which only the token economy may write
/// after checking balances and trade state.
pub fn is_economy_event(event_type: &str) -> bool {
    event_type.starts_with("token.") || event_type.starts_with("trade.")
}

/// The entity an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateType {
    Season,
    Governor,
    Team,
    Proposal,
    Trade,
    Game,
    Mirror,
}

impl AggregateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Season => "season",
            Self::Governor => "governor",
            Self::Team => "team",
            Self::Proposal => "proposal",
            Self::Trade => "trade",
            Self::Game => "game",
            Self::Mirror => "mirror",
        }
    }
}

impl fmt::Display for AggregateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AggregateType> for String {
    fn from(value: AggregateType) -> Self {
        value.as_str().to_owned()
    }
}

/// An event that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEvent {
    /// Caller-pinned id. When set, re-appending the same fact is a no-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<EventId>,
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub season_id: SeasonId,
    pub round_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor_id: Option<GovernorId>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl NewEvent {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        season_id: SeasonId,
        round_number: u32,
    ) -> Self {
        Self {
            event_id: None,
            event_type: event_type.into(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: aggregate_type.into(),
            season_id,
            round_number,
            governor_id: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn governor(mut self, governor_id: GovernorId) -> Self {
        self.governor_id = Some(governor_id);
        self
    }

    pub fn with_event_id(mut self, event_id: EventId) -> Self {
        self.event_id = Some(event_id);
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }

    /// Attach a typed payload.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> LeagueResult<Self> {
        self.payload = serde_json::to_value(payload)?;
        Ok(self)
    }

    /// Shape checks the store runs before anything is written.
    pub fn validate(&self) -> LeagueResult<()> {
        if self.season_id.is_blank() {
            return Err(LeagueError::validation("event is missing season_id"));
        }
        if self.event_type.trim().is_empty() {
            return Err(LeagueError::validation("event is missing event_type"));
        }
        if self.aggregate_type.trim().is_empty() {
            return Err(LeagueError::validation("event is missing aggregate_type"));
        }
        if self.round_number < 1 {
            return Err(LeagueError::validation(format!(
                "round_number must be >= 1, got {}",
                self.round_number
            )));
        }
        if let Some(event_id) = &self.event_id
            && event_id.is_blank()
        {
            return Err(LeagueError::validation("pinned event_id is blank"));
        }
        Ok(())
    }
}

/// A stored, immutable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    /// Insertion sequence assigned by the store; unique across the ledger.
    pub sequence: u64,
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub season_id: SeasonId,
    pub round_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor_id: Option<GovernorId>,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl EventRecord {
    /// Decode the payload into its typed form. A payload that does not fit
    /// the expected shape is a validation failure, not a silent default.
    pub fn payload_as<T: DeserializeOwned>(&self) -> LeagueResult<T> {
        serde_json::from_value(self.payload.clone()).map_err(|error| {
            LeagueError::validation(format!(
                "malformed {} payload in event {}: {error}",
                self.event_type, self.event_id
            ))
        })
    }

    pub fn is_type(&self, event_type: &str) -> bool {
        self.event_type == event_type
    }
}

/// Matches an event type exactly (`vote.cast`) or by namespace (`trade.*`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EventTypePattern {
    Exact(String),
    Prefix(String),
}

impl EventTypePattern {
    /// Parse `trade.*` as a prefix pattern and anything else as exact.
    pub fn parse(pattern: &str) -> Self {
        match pattern.strip_suffix('*') {
            Some(prefix) => Self::Prefix(prefix.to_owned()),
            None => Self::Exact(pattern.to_owned()),
        }
    }

    pub fn matches(&self, event_type: &str) -> bool {
        match self {
            Self::Exact(exact) => exact == event_type,
            Self::Prefix(prefix) => event_type.starts_with(prefix.as_str()),
        }
    }
}

/// Restricts a season query. Empty filter means "every event in the season".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_round: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_round: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<EventTypePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governor_id: Option<GovernorId>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn rounds(mut self, from: u32, to: u32) -> Self {
        self.from_round = Some(from);
        self.to_round = Some(to);
        self
    }

    pub fn round(self, round_number: u32) -> Self {
        self.rounds(round_number, round_number)
    }

    pub fn up_to_round(mut self, round_number: u32) -> Self {
        self.to_round = Some(round_number);
        self
    }

    pub fn event_type(mut self, pattern: &str) -> Self {
        self.event_types.push(EventTypePattern::parse(pattern));
        self
    }

    pub fn aggregate(mut self, aggregate_id: impl Into<String>) -> Self {
        self.aggregate_id = Some(aggregate_id.into());
        self
    }

    pub fn governor(mut self, governor_id: GovernorId) -> Self {
        self.governor_id = Some(governor_id);
        self
    }

    /// In-memory evaluation of the filter, mirroring what stores push down.
    pub fn matches(&self, event: &EventRecord) -> bool {
        if self.from_round.is_some_and(|from| event.round_number < from) {
            return false;
        }
        if self.to_round.is_some_and(|to| event.round_number > to) {
            return false;
        }
        if !self.event_types.is_empty()
            && !self
                .event_types
                .iter()
                .any(|pattern| pattern.matches(&event.event_type))
        {
            return false;
        }
        if let Some(aggregate_id) = &self.aggregate_id
            && aggregate_id != &event.aggregate_id
        {
            return false;
        }
        if let Some(governor_id) = &self.governor_id
            && event.governor_id.as_ref() != Some(governor_id)
        {
            return false;
        }
        true
    }
}
