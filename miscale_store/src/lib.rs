#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! SQLite-backed [`MeasurementStore`].
//!
//! One `measurements` table, timestamps stored as RFC 3339 UTC strings with a
//! fixed precision so lexical order is chronological. Schema changes are
//! applied in order and tracked in `PRAGMA user_version`.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use eyre::{Result, WrapErr, bail, eyre};
use miscale_core::{FinalizedMeasurement, MeasurementStore, StoredMeasurement};
use rusqlite::{Connection, Row, Transaction, params};

const CURRENT_SCHEMA_VERSION: i32 = 1;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and bring its schema
    /// up to date. Parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("creating directory {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .wrap_err_with(|| format!("opening database {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .wrap_err("enabling WAL journal")?;
        tracing::debug!(path = %path.display(), "measurement store opened");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().wrap_err("opening in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn schema_version(&self) -> Result<i32> {
        self.conn()
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .wrap_err("reading user_version pragma")
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .wrap_err("reading user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "database version ({version}) is newer than supported schema ({CURRENT_SCHEMA_VERSION})"
        );
    }
    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .wrap_err("opening migration transaction")?;
    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        apply_migration(&tx, next).wrap_err_with(|| format!("migration to version {next} failed"))?;
        version = next;
    }
    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .wrap_err("updating user_version pragma")?;
    tx.commit().wrap_err("committing migrations")?;
    tracing::info!(version = CURRENT_SCHEMA_VERSION, "measurement schema migrated");
    Ok(())
}

fn apply_migration(tx: &Transaction<'_>, version: i32) -> Result<()> {
    match version {
        1 => tx
            .execute_batch(include_str!("schema/v1.sql"))
            .wrap_err("executing schema/v1.sql"),
        other => bail!("no migration defined for version {other}"),
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| eyre!("invalid timestamp '{value}': {e}"))
}

struct RawRow {
    id: i64,
    timestamp: String,
    weight: f64,
    impedance: i64,
    bmi: f64,
    bmr: f64,
    body_fat_percentage: f64,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            timestamp: row.get("timestamp")?,
            weight: row.get("weight")?,
            impedance: row.get("impedance")?,
            bmi: row.get("bmi")?,
            bmr: row.get("bmr")?,
            body_fat_percentage: row.get("body_fat_percentage")?,
        })
    }

    fn into_stored(self) -> Result<StoredMeasurement> {
        let impedance = u16::try_from(self.impedance)
            .map_err(|_| eyre!("row {}: impedance {} out of range", self.id, self.impedance))?;
        Ok(StoredMeasurement {
            id: self.id,
            measurement: FinalizedMeasurement {
                weight: self.weight,
                impedance,
                bmi: self.bmi,
                bmr: self.bmr,
                body_fat_percentage: self.body_fat_percentage,
                timestamp: parse_ts(&self.timestamp)?,
            },
        })
    }
}

impl MeasurementStore for SqliteStore {
    fn write(&self, m: &FinalizedMeasurement) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO measurements (timestamp, weight, impedance, bmi, bmr, body_fat_percentage)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                format_ts(&m.timestamp),
                m.weight,
                i64::from(m.impedance),
                m.bmi,
                m.bmr,
                m.body_fat_percentage,
            ],
        )
        .wrap_err("inserting measurement")?;
        let id = conn.last_insert_rowid();
        tracing::debug!(id, weight_kg = m.weight, "measurement saved");
        Ok(id)
    }

    fn query(&self, limit: Option<usize>) -> Result<Vec<StoredMeasurement>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = match limit {
            Some(n) => i64::try_from(n).unwrap_or(i64::MAX),
            None => -1,
        };
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT id, timestamp, weight, impedance, bmi, bmr, body_fat_percentage
                 FROM measurements
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?1",
            )
            .wrap_err("preparing measurement query")?;
        let rows = stmt
            .query_map(params![limit], RawRow::read)
            .wrap_err("querying measurements")?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.wrap_err("reading measurement row")?.into_stored()?);
        }
        Ok(out)
    }
}
