use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use pinwheel_protocol::{
    Enrollment, EventFilter, EventId, EventRecord, EventRecordStream, EventTypePattern,
    GameResult, GovernorId, Hooper, League, LeagueError, LeagueId, LeagueRepository,
    LeagueResult, Mirror, MirrorId, NewEvent, ReportContent, RosterWrite, Ruleset, Season,
    SeasonId, SeasonStatus, Team, TeamId, WriteBatch, event_types,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use tracing::{debug, instrument, warn};

use crate::EventStore;
use crate::schema::SCHEMA_SQL;

const DEFAULT_PAGE_SIZE: usize = 256;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn db_error(error: rusqlite::Error) -> LeagueError {
    LeagueError::Persistence(error.to_string())
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> LeagueResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| LeagueError::Serialization(format!("bad timestamp {raw:?}: {error}")))
}

/// SQLite-backed ledger: the append-only `events` table plus the roster
/// snapshot tables, behind one connection.
///
/// Every write runs in a transaction that is rolled back when any step
/// fails, so readers never observe part of a batch.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
    page_size: usize,
}

impl SqliteLedger {
    /// Open or create a ledger file. WAL journaling is enabled so readers
    /// are not blocked by the writer.
    pub fn open(path: impl AsRef<Path>) -> LeagueResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                LeagueError::Persistence(format!("failed to create {parent:?}: {error}"))
            })?;
        }
        let conn = Connection::open(path).map_err(db_error)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(db_error)?;
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(db_error)?;
        debug!(path = ?path, journal_mode = %mode, "ledger opened");
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// A private in-memory ledger, used by tests and demos.
    pub fn in_memory() -> LeagueResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        Self::initialize(conn, None)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> LeagueResult<Self> {
        conn.execute_batch(SCHEMA_SQL).map_err(db_error)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Number of rows fetched per page by [`EventStore::query`].
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn blocking<T, F>(&self, op: F) -> LeagueResult<T>
    where
        F: FnOnce(&mut Connection) -> LeagueResult<T> + Send + 'static,
        T: Send + 'static,
    {
        run_blocking(Arc::clone(&self.conn), op).await
    }
}

async fn run_blocking<T, F>(conn: Arc<Mutex<Connection>>, op: F) -> LeagueResult<T>
where
    F: FnOnce(&mut Connection) -> LeagueResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.lock();
        op(&mut guard)
    })
    .await
    .map_err(|error| LeagueError::Persistence(format!("ledger task failed: {error}")))?
}

// ─── Write path ────────────────────────────────────────────────────

fn commit_batch(conn: &mut Connection, batch: WriteBatch) -> LeagueResult<Vec<EventId>> {
    for event in &batch.events {
        event.validate()?;
    }
    for write in &batch.roster {
        if let RosterWrite::InsertMirror(mirror) = write {
            mirror.validate()?;
        }
    }

    let tx = conn.transaction().map_err(db_error)?;
    for write in &batch.roster {
        apply_roster_write(&tx, write)?;
    }
    let mut event_ids = Vec::with_capacity(batch.events.len());
    for event in &batch.events {
        event_ids.push(insert_event(&tx, event)?);
    }
    tx.commit().map_err(db_error)?;
    Ok(event_ids)
}

fn insert_event(tx: &Transaction<'_>, event: &NewEvent) -> LeagueResult<EventId> {
    if let Some(event_id) = &event.event_id {
        let existing = tx
            .query_row(
                "SELECT event_type, aggregate_id, season_id, round_number
                 FROM events WHERE event_id = ?1",
                params![event_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_error)?;
        if let Some((event_type, aggregate_id, season_id, round_number)) = existing {
            let same_fact = event_type == event.event_type
                && aggregate_id == event.aggregate_id
                && season_id == event.season_id.as_str()
                && round_number == i64::from(event.round_number);
            if same_fact {
                debug!(event_id = %event_id, "duplicate append ignored");
                return Ok(event_id.clone());
            }
            return Err(LeagueError::validation(format!(
                "event id {event_id} already records a different fact"
            )));
        }
    }

    let event_id = event.event_id.clone().unwrap_or_default();
    let payload = serde_json::to_string(&event.payload)?;
    tx.execute(
        "INSERT INTO events (event_id, event_type, aggregate_id, aggregate_type, season_id,
                             round_number, governor_id, payload, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            event_id.as_str(),
            event.event_type,
            event.aggregate_id,
            event.aggregate_type,
            event.season_id.as_str(),
            i64::from(event.round_number),
            event.governor_id.as_ref().map(GovernorId::as_str),
            payload,
            timestamp(Utc::now()),
        ],
    )
    .map_err(db_error)?;
    Ok(event_id)
}

fn apply_roster_write(tx: &Transaction<'_>, write: &RosterWrite) -> LeagueResult<()> {
    match write {
        RosterWrite::InsertSeason(season) => {
            tx.execute(
                "INSERT INTO seasons (id, league_id, name, status, starting_ruleset,
                                      current_ruleset, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    season.id.as_str(),
                    season.league_id.as_str(),
                    season.name,
                    season.status.as_str(),
                    serde_json::to_string(&season.starting_ruleset)?,
                    serde_json::to_string(&season.current_ruleset)?,
                    timestamp(season.created_at),
                ],
            )
            .map_err(db_error)?;
        }
        RosterWrite::SetSeasonStatus { season_id, status } => {
            let current = tx
                .query_row(
                    "SELECT status FROM seasons WHERE id = ?1",
                    params![season_id.as_str()],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(db_error)?
                .ok_or_else(|| LeagueError::NotFound(format!("season {season_id}")))?;
            let current: SeasonStatus = current.parse()?;
            if !current.can_transition_to(*status) {
                return Err(LeagueError::InvalidTransition {
                    entity: format!("season {season_id}"),
                    from: current.to_string(),
                    to: status.to_string(),
                });
            }
            tx.execute(
                "UPDATE seasons SET status = ?1 WHERE id = ?2",
                params![status.as_str(), season_id.as_str()],
            )
            .map_err(db_error)?;
        }
        RosterWrite::SetCurrentRuleset { season_id, ruleset } => {
            let updated = tx
                .execute(
                    "UPDATE seasons SET current_ruleset = ?1 WHERE id = ?2",
                    params![serde_json::to_string(ruleset)?, season_id.as_str()],
                )
                .map_err(db_error)?;
            if updated == 0 {
                return Err(LeagueError::NotFound(format!("season {season_id}")));
            }
        }
        RosterWrite::InsertTeam(team) => {
            tx.execute(
                "INSERT INTO teams (id, season_id, name, color, motto)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    team.id.as_str(),
                    team.season_id.as_str(),
                    team.name,
                    team.color,
                    team.motto,
                ],
            )
            .map_err(db_error)?;
        }
        RosterWrite::InsertHooper(hooper) => {
            tx.execute(
                "INSERT INTO hoopers (id, team_id, season_id, name, archetype, attributes)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    hooper.id.as_str(),
                    hooper.team_id.as_str(),
                    hooper.season_id.as_str(),
                    hooper.name,
                    hooper.archetype,
                    serde_json::to_string(&hooper.attributes)?,
                ],
            )
            .map_err(db_error)?;
        }
        RosterWrite::UpsertGovernor(governor) => {
            tx.execute(
                "INSERT INTO governors (id, username) VALUES (?1, ?2)
                 ON CONFLICT (id) DO NOTHING",
                params![governor.id.as_str(), governor.username],
            )
            .map_err(db_error)?;
        }
        RosterWrite::InsertEnrollment(enrollment) => {
            let already = tx
                .query_row(
                    "SELECT 1 FROM enrollments WHERE season_id = ?1 AND governor_id = ?2",
                    params![
                        enrollment.season_id.as_str(),
                        enrollment.governor_id.as_str()
                    ],
                    |_| Ok(()),
                )
                .optional()
                .map_err(db_error)?;
            if already.is_some() {
                return Err(LeagueError::invalid_argument(format!(
                    "governor {} is already enrolled in season {}",
                    enrollment.governor_id, enrollment.season_id
                )));
            }
            tx.execute(
                "INSERT INTO enrollments (season_id, governor_id, team_id) VALUES (?1, ?2, ?3)",
                params![
                    enrollment.season_id.as_str(),
                    enrollment.governor_id.as_str(),
                    enrollment.team_id.as_str(),
                ],
            )
            .map_err(db_error)?;
        }
        RosterWrite::InsertMirror(mirror) => {
            tx.execute(
                "INSERT INTO mirrors (id, season_id, mirror_type, round_number, team_id,
                                      governor_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    mirror.id.as_str(),
                    mirror.season_id.as_str(),
                    mirror.mirror_type.as_str(),
                    i64::from(mirror.round_number),
                    mirror.team_id.as_ref().map(TeamId::as_str),
                    mirror.governor_id.as_ref().map(GovernorId::as_str),
                    mirror.content.reveal(),
                    timestamp(mirror.created_at),
                ],
            )
            .map_err(db_error)?;
        }
    }
    Ok(())
}

// ─── Read path ─────────────────────────────────────────────────────

struct EventRow {
    sequence: i64,
    event_id: String,
    event_type: String,
    aggregate_id: String,
    aggregate_type: String,
    season_id: String,
    round_number: i64,
    governor_id: Option<String>,
    payload: String,
    created_at: String,
}

impl EventRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence: row.get(0)?,
            event_id: row.get(1)?,
            event_type: row.get(2)?,
            aggregate_id: row.get(3)?,
            aggregate_type: row.get(4)?,
            season_id: row.get(5)?,
            round_number: row.get(6)?,
            governor_id: row.get(7)?,
            payload: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_record(self) -> LeagueResult<EventRecord> {
        let round_number = u32::try_from(self.round_number).map_err(|_| {
            LeagueError::Serialization(format!("round_number {} out of range", self.round_number))
        })?;
        Ok(EventRecord {
            event_id: EventId::from(self.event_id),
            sequence: u64::try_from(self.sequence).unwrap_or_default(),
            event_type: self.event_type,
            aggregate_id: self.aggregate_id,
            aggregate_type: self.aggregate_type,
            season_id: SeasonId::from(self.season_id),
            round_number,
            governor_id: self.governor_id.map(GovernorId::from),
            payload: serde_json::from_str(&self.payload)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Keyset position of the last event handed out: `(round_number, seq)`.
type Cursor = (i64, i64);

fn read_page(
    conn: &Connection,
    season_id: &SeasonId,
    filter: &EventFilter,
    after: Option<Cursor>,
    page_size: usize,
) -> LeagueResult<Vec<EventRecord>> {
    let mut sql = String::from(
        "SELECT seq, event_id, event_type, aggregate_id, aggregate_type, season_id,
                round_number, governor_id, payload, created_at
         FROM events WHERE season_id = ?",
    );
    let mut values = vec![Value::Text(season_id.as_str().to_owned())];

    if let Some((round_number, seq)) = after {
        sql.push_str(" AND (round_number > ? OR (round_number = ? AND seq > ?))");
        values.extend([
            Value::Integer(round_number),
            Value::Integer(round_number),
            Value::Integer(seq),
        ]);
    }
    if let Some(from) = filter.from_round {
        sql.push_str(" AND round_number >= ?");
        values.push(Value::Integer(i64::from(from)));
    }
    if let Some(to) = filter.to_round {
        sql.push_str(" AND round_number <= ?");
        values.push(Value::Integer(i64::from(to)));
    }
    if !filter.event_types.is_empty() {
        let clauses: Vec<&str> = filter
            .event_types
            .iter()
            .map(|pattern| match pattern {
                EventTypePattern::Exact(exact) => {
                    values.push(Value::Text(exact.clone()));
                    "event_type = ?"
                }
                EventTypePattern::Prefix(prefix) => {
                    // substr counts characters, not bytes.
                    let length = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
                    values.push(Value::Integer(length));
                    values.push(Value::Text(prefix.clone()));
                    "substr(event_type, 1, ?) = ?"
                }
            })
            .collect();
        sql.push_str(" AND (");
        sql.push_str(&clauses.join(" OR "));
        sql.push(')');
    }
    if let Some(aggregate_id) = &filter.aggregate_id {
        sql.push_str(" AND aggregate_id = ?");
        values.push(Value::Text(aggregate_id.clone()));
    }
    if let Some(governor_id) = &filter.governor_id {
        sql.push_str(" AND governor_id = ?");
        values.push(Value::Text(governor_id.as_str().to_owned()));
    }
    sql.push_str(" ORDER BY round_number ASC, seq ASC LIMIT ?");
    values.push(Value::Integer(i64::try_from(page_size).unwrap_or(i64::MAX)));

    let mut stmt = conn.prepare_cached(&sql).map_err(db_error)?;
    let rows = stmt
        .query_map(params_from_iter(values.iter()), EventRow::from_row)
        .map_err(db_error)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(db_error)?;
    rows.into_iter().map(EventRow::into_record).collect()
}

fn season_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<[String; 7]> {
    Ok([
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ])
}

fn decode_season(raw: [String; 7]) -> LeagueResult<Season> {
    let [id, league_id, name, status, starting, current, created_at] = raw;
    Ok(Season {
        id: SeasonId::from(id),
        league_id: LeagueId::from(league_id),
        name,
        status: status.parse()?,
        starting_ruleset: serde_json::from_str::<Ruleset>(&starting)?,
        current_ruleset: serde_json::from_str::<Ruleset>(&current)?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn team_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: TeamId::from(row.get::<_, String>(0)?),
        season_id: SeasonId::from(row.get::<_, String>(1)?),
        name: row.get(2)?,
        color: row.get(3)?,
        motto: row.get(4)?,
    })
}

fn enrollment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Enrollment> {
    Ok(Enrollment {
        season_id: SeasonId::from(row.get::<_, String>(0)?),
        governor_id: GovernorId::from(row.get::<_, String>(1)?),
        team_id: TeamId::from(row.get::<_, String>(2)?),
    })
}

// ─── EventStore ────────────────────────────────────────────────────

#[async_trait]
impl EventStore for SqliteLedger {
    #[instrument(
        skip(self, event),
        fields(
            season_id = %event.season_id,
            event_type = %event.event_type,
            round = event.round_number
        )
    )]
    async fn append(&self, event: NewEvent) -> LeagueResult<EventId> {
        let batch = WriteBatch {
            roster: Vec::new(),
            events: vec![event],
        };
        let mut ids = self.blocking(move |conn| commit_batch(conn, batch)).await?;
        let event_id = ids
            .pop()
            .ok_or_else(|| LeagueError::Persistence("append returned no event id".into()))?;
        debug!(event_id = %event_id, "event appended to ledger");
        Ok(event_id)
    }

    #[instrument(skip(self, events), fields(count = events.len()))]
    async fn append_batch(&self, events: Vec<NewEvent>) -> LeagueResult<Vec<EventId>> {
        let batch = WriteBatch {
            roster: Vec::new(),
            events,
        };
        let ids = self.blocking(move |conn| commit_batch(conn, batch)).await?;
        debug!(count = ids.len(), "event batch committed");
        Ok(ids)
    }

    fn query(&self, season_id: &SeasonId, filter: EventFilter) -> EventRecordStream {
        let conn = Arc::clone(&self.conn);
        let season_id = season_id.clone();
        let page_size = self.page_size;

        Box::pin(stream! {
            let mut after: Option<Cursor> = None;
            loop {
                let page = {
                    let season_id = season_id.clone();
                    let filter = filter.clone();
                    run_blocking(Arc::clone(&conn), move |conn| {
                        read_page(conn, &season_id, &filter, after, page_size)
                    })
                    .await
                };
                let page = match page {
                    Ok(page) => page,
                    Err(error) => {
                        warn!(%error, "event query page failed");
                        yield Err(error);
                        break;
                    }
                };
                let exhausted = page.len() < page_size;
                for event in page {
                    after = Some((i64::from(event.round_number), event.sequence as i64));
                    yield Ok(event);
                }
                if exhausted {
                    break;
                }
            }
        })
    }

    async fn head(&self, season_id: &SeasonId) -> LeagueResult<u64> {
        let season_id = season_id.clone();
        self.blocking(move |conn| {
            let head: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(seq), 0) FROM events WHERE season_id = ?1",
                    params![season_id.as_str()],
                    |row| row.get(0),
                )
                .map_err(db_error)?;
            Ok(u64::try_from(head).unwrap_or_default())
        })
        .await
    }

    async fn head_round(&self, season_id: &SeasonId) -> LeagueResult<u32> {
        let season_id = season_id.clone();
        self.blocking(move |conn| {
            let round: i64 = conn
                .query_row(
                    "SELECT COALESCE(MAX(round_number), 0) FROM events WHERE season_id = ?1",
                    params![season_id.as_str()],
                    |row| row.get(0),
                )
                .map_err(db_error)?;
            Ok(u32::try_from(round).unwrap_or_default())
        })
        .await
    }
}

// ─── LeagueRepository ──────────────────────────────────────────────

#[async_trait]
impl LeagueRepository for SqliteLedger {
    async fn append_event(&self, event: NewEvent) -> LeagueResult<EventId> {
        self.append(event).await
    }

    #[instrument(
        skip(self, batch),
        fields(roster_writes = batch.roster.len(), events = batch.events.len())
    )]
    async fn commit(&self, batch: WriteBatch) -> LeagueResult<Vec<EventId>> {
        let ids = self.blocking(move |conn| commit_batch(conn, batch)).await?;
        debug!(count = ids.len(), "write batch committed");
        Ok(ids)
    }

    async fn get_games_for_round(
        &self,
        season_id: &SeasonId,
        round_number: u32,
    ) -> LeagueResult<Vec<GameResult>> {
        let filter = EventFilter::all()
            .round(round_number)
            .event_type(event_types::GAME_COMPLETED);
        self.read(season_id, filter)
            .await?
            .iter()
            .map(EventRecord::payload_as::<GameResult>)
            .collect()
    }

    #[instrument(skip(self))]
    async fn create_league(&self, name: &str) -> LeagueResult<League> {
        if name.trim().is_empty() {
            return Err(LeagueError::validation("league name is empty"));
        }
        let league = League {
            id: LeagueId::new_uuid(),
            name: name.to_owned(),
            created_at: Utc::now(),
        };
        let row = league.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO leagues (id, name, created_at) VALUES (?1, ?2, ?3)",
                params![row.id.as_str(), row.name, timestamp(row.created_at)],
            )
            .map_err(db_error)?;
            Ok(())
        })
        .await?;
        debug!(league_id = %league.id, "league created");
        Ok(league)
    }

    async fn get_league(&self, league_id: &LeagueId) -> LeagueResult<Option<League>> {
        let league_id = league_id.clone();
        self.blocking(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, name, created_at FROM leagues WHERE id = ?1",
                    params![league_id.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()
                .map_err(db_error)?;
            raw.map(|(id, name, created_at)| {
                Ok(League {
                    id: LeagueId::from(id),
                    name,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    #[instrument(skip(self), fields(league_id = %league_id))]
    async fn create_season(&self, league_id: &LeagueId, name: &str) -> LeagueResult<Season> {
        if self.get_league(league_id).await?.is_none() {
            return Err(LeagueError::invalid_argument(format!(
                "league {league_id} does not exist"
            )));
        }
        let season = Season::new(league_id.clone(), name, Ruleset::default());
        let mut batch = WriteBatch::new();
        batch.write(RosterWrite::InsertSeason(season.clone()));
        self.commit(batch).await?;
        Ok(season)
    }

    async fn get_season(&self, season_id: &SeasonId) -> LeagueResult<Option<Season>> {
        let season_id = season_id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, league_id, name, status, starting_ruleset, current_ruleset, created_at
                 FROM seasons WHERE id = ?1",
                params![season_id.as_str()],
                season_from_row,
            )
            .optional()
            .map_err(db_error)?
            .map(decode_season)
            .transpose()
        })
        .await
    }

    async fn get_teams_for_season(&self, season_id: &SeasonId) -> LeagueResult<Vec<Team>> {
        let season_id = season_id.clone();
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, season_id, name, color, motto FROM teams
                     WHERE season_id = ?1 ORDER BY rowid",
                )
                .map_err(db_error)?;
            stmt.query_map(params![season_id.as_str()], team_from_row)
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)
        })
        .await
    }

    async fn get_team(&self, team_id: &TeamId) -> LeagueResult<Option<Team>> {
        let team_id = team_id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, season_id, name, color, motto FROM teams WHERE id = ?1",
                params![team_id.as_str()],
                team_from_row,
            )
            .optional()
            .map_err(db_error)
        })
        .await
    }

    async fn get_hoopers_for_team(&self, team_id: &TeamId) -> LeagueResult<Vec<Hooper>> {
        let team_id = team_id.clone();
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT id, team_id, season_id, name, archetype, attributes FROM hoopers
                     WHERE team_id = ?1 ORDER BY rowid",
                )
                .map_err(db_error)?;
            let rows = stmt
                .query_map(params![team_id.as_str()], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)?;
            rows.into_iter()
                .map(|(id, team_id, season_id, name, archetype, attributes)| {
                    Ok(Hooper {
                        id: id.into(),
                        team_id: team_id.into(),
                        season_id: season_id.into(),
                        name,
                        archetype,
                        attributes: serde_json::from_str(&attributes)?,
                    })
                })
                .collect()
        })
        .await
    }

    async fn get_enrollments(&self, season_id: &SeasonId) -> LeagueResult<Vec<Enrollment>> {
        let season_id = season_id.clone();
        self.blocking(move |conn| {
            let mut stmt = conn
                .prepare_cached(
                    "SELECT season_id, governor_id, team_id FROM enrollments
                     WHERE season_id = ?1 ORDER BY rowid",
                )
                .map_err(db_error)?;
            stmt.query_map(params![season_id.as_str()], enrollment_from_row)
                .map_err(db_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(db_error)
        })
        .await
    }

    async fn get_enrollment(
        &self,
        season_id: &SeasonId,
        governor_id: &GovernorId,
    ) -> LeagueResult<Option<Enrollment>> {
        let season_id = season_id.clone();
        let governor_id = governor_id.clone();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT season_id, governor_id, team_id FROM enrollments
                 WHERE season_id = ?1 AND governor_id = ?2",
                params![season_id.as_str(), governor_id.as_str()],
                enrollment_from_row,
            )
            .optional()
            .map_err(db_error)
        })
        .await
    }

    async fn get_mirror(&self, mirror_id: &MirrorId) -> LeagueResult<Option<Mirror>> {
        let mirror_id = mirror_id.clone();
        self.blocking(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT id, season_id, mirror_type, round_number, team_id, governor_id,
                            content, created_at
                     FROM mirrors WHERE id = ?1",
                    params![mirror_id.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<String>>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                        ))
                    },
                )
                .optional()
                .map_err(db_error)?;
            raw.map(
                |(id, season_id, mirror_type, round, team_id, governor_id, content, created_at)| {
                    Ok(Mirror {
                        id: MirrorId::from(id),
                        season_id: SeasonId::from(season_id),
                        mirror_type: mirror_type.parse()?,
                        round_number: u32::try_from(round).map_err(|_| {
                            LeagueError::Serialization(format!("mirror round {round} out of range"))
                        })?,
                        team_id: team_id.map(TeamId::from),
                        governor_id: governor_id.map(GovernorId::from),
                        content: ReportContent::new(content),
                        created_at: parse_timestamp(&created_at)?,
                    })
                },
            )
            .transpose()
        })
        .await
    }
}
