//! # pinwheel-protocol: shared contract for the Pinwheel league ledger
//!
//! This crate defines the types every other Pinwheel crate agrees on. It has
//! no runtime dependencies (no tokio, no SQLite) so it can be used as a pure
//! contract crate by boundary layers as well.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (SeasonId, GovernorId, TradeId, ...)
//! - [`event`]: `NewEvent` / `EventRecord` envelope, event type tags, filters
//! - [`league`]: League, Season, Ruleset, Team, Hooper, Enrollment
//! - [`game`]: game results consumed by standings
//! - [`token`]: token kinds, balances, trades and the trade state machine
//! - [`mirror`]: mirror reports and the privacy boundary types
//! - [`ports`]: repository-style boundary traits
//! - [`error`]: LeagueError, LeagueResult

pub mod error;
pub mod event;
pub mod game;
pub mod ids;
pub mod league;
pub mod mirror;
pub mod ports;
pub mod token;

pub use error::{LeagueError, LeagueResult};
pub use event::{
    AggregateType, EventFilter, EventRecord, EventRecordStream, EventTypePattern, NewEvent,
    event_types, is_economy_event, is_governance_action,
};
pub use game::GameResult;
pub use ids::{
    EventId, GovernorId, HooperId, LeagueId, MirrorId, ProposalId, SeasonId, TeamId, TradeId,
};
pub use league::{
    Enrollment, Governor, Hooper, League, Ruleset, Season, SeasonStartedPayload, SeasonStatus,
    Team,
};
pub use mirror::{
    Mirror, MirrorDeliveredPayload, MirrorType, PrescriptiveScan, ReportContent,
};
pub use ports::{LeagueRepository, RosterWrite, WriteBatch};
pub use token::{
    TokenAllotment, TokenBalance, TokenChange, TokenDelta, TokenKind, Trade, TradeOffer,
    TradeResolvedPayload, TradeStatus,
};
