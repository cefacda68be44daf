//! Local record store backed by SQLite
//!
//! This module handles all persistence:
//! - Opening the database file and applying embedded migrations
//! - The settings singleton, stored as one JSON document under a fixed key
//! - Week records, upserted by id, with a secondary index on week index

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Mood, Settings, WeekRecord};

/// Embedded migrations, applied in order and at most once each
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema",
    include_str!("../db/migrations/001_initial_schema.sql"),
)];

/// Key of the settings singleton
const SETTINGS_KEY: &str = "user";

const WEEK_COLUMNS: &str =
    "id, week_index, start_date, end_date, title, notes, mood, color";

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path`, running any pending migrations
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            Error::StorageUnavailable(format!("failed to open {}: {}", path.display(), e))
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let count = run_migrations(&conn)?;
        if count > 0 {
            info!(count = count, "Applied migrations");
        }

        Ok(Self { conn })
    }

    pub fn get_settings(&self) -> Result<Option<Settings>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                [SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;

        value
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    Error::StorageUnavailable(format!("stored settings are unreadable: {}", e))
                })
            })
            .transpose()
    }

    /// Overwrite the settings singleton
    pub fn put_settings(&self, settings: Settings) -> Result<Settings> {
        settings.validate()?;
        let json = serde_json::to_string(&settings)
            .map_err(|e| Error::validation(format!("settings cannot be serialized: {}", e)))?;

        self.conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![SETTINGS_KEY, json],
        )?;

        debug!(dob = %settings.dob, years = settings.life_expectancy_years, "Saved settings");
        Ok(settings)
    }

    /// All stored week records, in no particular order
    pub fn list_week_records(&self) -> Result<Vec<WeekRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM weeks", WEEK_COLUMNS))?;

        let records = stmt
            .query_map([], week_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(count = records.len(), "Loaded week records");
        Ok(records)
    }

    pub fn get_week_record(&self, id: &str) -> Result<Option<WeekRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM weeks WHERE id = ?1", WEEK_COLUMNS))?;

        Ok(stmt.query_row([id], week_from_row).optional()?)
    }

    /// Insert or replace the record sharing `record.id`
    pub fn put_week_record(&self, record: WeekRecord) -> Result<WeekRecord> {
        record.validate()?;

        self.conn.execute(
            "INSERT INTO weeks (id, week_index, start_date, end_date, title, notes, mood, color, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET
                week_index = excluded.week_index,
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                title = excluded.title,
                notes = excluded.notes,
                mood = excluded.mood,
                color = excluded.color,
                updated_at = excluded.updated_at",
            params![
                record.id,
                record.week_index,
                record.start_date,
                record.end_date,
                record.title,
                record.notes,
                record.mood,
                record.color,
            ],
        )?;

        debug!(id = %record.id, week_index = record.week_index, "Saved week record");
        Ok(record)
    }

    /// Count all week records in the database
    pub fn count_week_records(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM weeks", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Run pending migrations, returning how many were applied
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL
        );",
    )?;

    let mut applied = 0;

    for (version, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_migrations WHERE version = ?1",
            [version],
            |row| row.get(0),
        )?;

        if already_applied {
            continue;
        }

        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql).map_err(|e| {
            Error::StorageUnavailable(format!("failed to apply migration {}: {}", version, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            [version],
        )?;
        tx.commit()?;

        debug!(version = %version, "Applied migration");
        applied += 1;
    }

    Ok(applied)
}

fn week_from_row(row: &Row<'_>) -> rusqlite::Result<WeekRecord> {
    Ok(WeekRecord {
        id: row.get(0)?,
        week_index: row.get(1)?,
        start_date: row.get(2)?,
        end_date: row.get(3)?,
        title: row.get(4)?,
        notes: row.get(5)?,
        mood: row.get(6)?,
        color: row.get(7)?,
    })
}

impl ToSql for Mood {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Mood {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: Error| FromSqlError::Other(Box::new(e)))
    }
}
