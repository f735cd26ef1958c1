//! Append-only event ledger for Pinwheel seasons.
//!
//! [`EventStore`] is the only mutation primitive the core has: `append`
//! (single event or batch), never update or delete. Queries are scoped to a
//! season and come back as a lazy stream ordered by
//! `(round_number, insertion sequence)`. [`SqliteLedger`] is the durable
//! implementation; it also stores the roster snapshots behind
//! [`pinwheel_protocol::LeagueRepository`] so that roster writes and events
//! can share one transaction.

mod locks;
mod schema;
mod sqlite;

use async_trait::async_trait;
use futures_util::TryStreamExt;
use pinwheel_protocol::{
    EventFilter, EventId, EventRecord, EventRecordStream, LeagueError, LeagueResult, NewEvent,
    SeasonId,
};

pub use locks::SeasonLocks;
pub use sqlite::SqliteLedger;

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Validate and durably append one event. Fails with
    /// `LeagueError::Validation` before touching storage when a required
    /// field is missing.
    async fn append(&self, event: NewEvent) -> LeagueResult<EventId>;

    /// Append every event in one transaction, or none of them.
    async fn append_batch(&self, events: Vec<NewEvent>) -> LeagueResult<Vec<EventId>>;

    /// Lazy, finite, restartable season query. Nothing is read until the
    /// stream is polled; dropping it early has no side effects; calling
    /// `query` again starts over from the beginning.
    fn query(&self, season_id: &SeasonId, filter: EventFilter) -> EventRecordStream;

    /// Last insertion sequence written for the season, 0 when empty.
    async fn head(&self, season_id: &SeasonId) -> LeagueResult<u64>;

    /// Highest round number written for the season, 0 when empty.
    async fn head_round(&self, season_id: &SeasonId) -> LeagueResult<u32>;

    /// Refuse a write filed before the season's latest round. Folds replay
    /// in `(round_number, seq)` order, so an event slotted behind the facts
    /// it was checked against would replay ahead of them.
    ///
    /// Callers must hold the season's writer lock for the check to stay true
    /// until their append lands.
    async fn require_current_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<()> {
        let head = self.head_round(season_id).await?;
        if round_number < head {
            return Err(LeagueError::invalid_argument(format!(
                "round {round_number} is behind season {season_id}, which is at round {head}"
            )));
        }
        Ok(())
    }

    /// Drain a query into memory.
    async fn read(&self, season_id: &SeasonId, filter: EventFilter) -> LeagueResult<Vec<EventRecord>> {
        self.query(season_id, filter).try_collect().await
    }
}
