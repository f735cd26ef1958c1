//! SQLite schema for the ledger database.

/// Idempotent DDL run on every open.
pub(crate) const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS events (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id       TEXT    NOT NULL UNIQUE,
    event_type     TEXT    NOT NULL,
    aggregate_id   TEXT    NOT NULL,
    aggregate_type TEXT    NOT NULL,
    season_id      TEXT    NOT NULL,
    round_number   INTEGER NOT NULL CHECK (round_number >= 1),
    governor_id    TEXT,
    payload        TEXT    NOT NULL,
    created_at     TEXT    NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_season_order
    ON events (season_id, round_number, seq);
CREATE INDEX IF NOT EXISTS idx_events_season_governor
    ON events (season_id, governor_id);

CREATE TRIGGER IF NOT EXISTS events_no_update
BEFORE UPDATE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are append-only');
END;

CREATE TRIGGER IF NOT EXISTS events_no_delete
BEFORE DELETE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are append-only');
END;

CREATE TABLE IF NOT EXISTS leagues (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS seasons (
    id               TEXT PRIMARY KEY,
    league_id        TEXT NOT NULL REFERENCES leagues (id),
    name             TEXT NOT NULL,
    status           TEXT NOT NULL,
    starting_ruleset TEXT NOT NULL,
    current_ruleset  TEXT NOT NULL,
    created_at       TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS teams (
    id        TEXT PRIMARY KEY,
    season_id TEXT NOT NULL REFERENCES seasons (id),
    name      TEXT NOT NULL,
    color     TEXT NOT NULL,
    motto     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS hoopers (
    id         TEXT PRIMARY KEY,
    team_id    TEXT NOT NULL REFERENCES teams (id),
    season_id  TEXT NOT NULL REFERENCES seasons (id),
    name       TEXT NOT NULL,
    archetype  TEXT NOT NULL,
    attributes TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS governors (
    id       TEXT PRIMARY KEY,
    username TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS enrollments (
    season_id   TEXT NOT NULL REFERENCES seasons (id),
    governor_id TEXT NOT NULL REFERENCES governors (id),
    team_id     TEXT NOT NULL REFERENCES teams (id),
    PRIMARY KEY (season_id, governor_id)
);

CREATE TABLE IF NOT EXISTS mirrors (
    id           TEXT PRIMARY KEY,
    season_id    TEXT    NOT NULL REFERENCES seasons (id),
    mirror_type  TEXT    NOT NULL,
    round_number INTEGER NOT NULL CHECK (round_number >= 1),
    team_id      TEXT,
    governor_id  TEXT,
    content      TEXT    NOT NULL,
    created_at   TEXT    NOT NULL
);

CREATE TRIGGER IF NOT EXISTS mirrors_no_update
BEFORE UPDATE ON mirrors
BEGIN
    SELECT RAISE(ABORT, 'mirrors are immutable');
END;
"#;
