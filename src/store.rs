//! Data store for configurations, trades and job progress
//!
//! SQLite-backed. The `trade` table carries one column per registered trade
//! attribute, named exactly like the attribute.

use chrono::Utc;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::attributes::{self, Attribute, AttributeKind, AttributeValue, FieldValue};
use crate::config::Configuration;
use crate::error::StoreError;
use crate::progress::ProgressSink;
use crate::types::TradeRecord;

/// Source of run inputs
pub trait DataStore {
    fn fetch_configuration(&self, config_id: i64) -> Result<Configuration, StoreError>;

    fn fetch_trades(&self, instrument: &str, sheet_name: &str)
        -> Result<Vec<TradeRecord>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.create_tables()?;
        info!("Opened trade store at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.create_tables()?;
        Ok(store)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.lock();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS configuration (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                settings TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        let columns: Vec<String> = attributes::all()
            .map(|a| format!("\"{}\" {}", a.name, sql_type(a.kind)))
            .collect();
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS trade (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    instrument TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    {}
                )",
                columns.join(",\n")
            ),
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_trade_sheet ON trade(instrument, timeframe)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS job_progress (
                job_id TEXT PRIMARY KEY,
                percent INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Store tables ready");
        Ok(())
    }

    pub fn insert_configuration(&self, name: &str, settings: &Value) -> Result<i64, StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO configuration (name, settings, created_at) VALUES (?1, ?2, ?3)",
            params![name, settings.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_trades(
        &self,
        instrument: &str,
        timeframe: &str,
        trades: &[TradeRecord],
    ) -> Result<usize, StoreError> {
        let attrs: Vec<&'static Attribute> = attributes::all().collect();
        let names: Vec<String> = attrs.iter().map(|a| format!("\"{}\"", a.name)).collect();
        let placeholders: Vec<String> = (3..attrs.len() + 3).map(|i| format!("?{}", i)).collect();
        let sql = format!(
            "INSERT INTO trade (instrument, timeframe, {}) VALUES (?1, ?2, {})",
            names.join(", "),
            placeholders.join(", ")
        );

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for trade in trades {
                let row = [
                    SqlValue::Text(instrument.to_string()),
                    SqlValue::Text(timeframe.to_string()),
                ]
                .into_iter()
                .chain(attrs.iter().map(|a| to_sql_value(a.get(trade))));
                stmt.execute(params_from_iter(row))?;
            }
        }
        tx.commit()?;

        info!(
            "Stored {} trades for {} / {}",
            trades.len(),
            instrument,
            timeframe
        );
        Ok(trades.len())
    }

    pub fn set_progress(&self, job_id: &str, percent: u8) -> Result<(), StoreError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO job_progress (job_id, percent, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(job_id) DO UPDATE SET percent = excluded.percent,
                                               updated_at = excluded.updated_at",
            params![job_id, percent, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get_progress(&self, job_id: &str) -> Result<Option<u8>, StoreError> {
        let conn = self.lock();
        let percent = conn
            .query_row(
                "SELECT percent FROM job_progress WHERE job_id = ?1",
                params![job_id],
                |row| row.get::<_, u8>(0),
            )
            .optional()?;
        Ok(percent)
    }
}

impl DataStore for SqliteStore {
    fn fetch_configuration(&self, config_id: i64) -> Result<Configuration, StoreError> {
        let conn = self.lock();
        let row = conn.query_row(
            "SELECT id, name, settings FROM configuration WHERE id = ?1",
            params![config_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        );

        let (id, name, raw) = match row {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(StoreError::ConfigurationNotFound(config_id))
            }
            Err(e) => return Err(e.into()),
        };

        let settings = serde_json::from_str(&raw)
            .map_err(|source| StoreError::SettingsDecode { id, source })?;
        Ok(Configuration { id, name, settings })
    }

    fn fetch_trades(
        &self,
        instrument: &str,
        sheet_name: &str,
    ) -> Result<Vec<TradeRecord>, StoreError> {
        let attrs: Vec<&'static Attribute> = attributes::all().collect();
        let columns: Vec<String> = attrs.iter().map(|a| format!("\"{}\"", a.name)).collect();
        let sql = format!(
            "SELECT {} FROM trade WHERE instrument = ?1 AND timeframe = ?2 ORDER BY id",
            columns.join(", ")
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![instrument, sheet_name])?;

        let mut trades = Vec::new();
        while let Some(row) = rows.next()? {
            let mut trade = TradeRecord::default();
            for (index, attr) in attrs.iter().enumerate() {
                let value: SqlValue = row.get(index)?;
                match from_sql_value(attr, value) {
                    Ok(Some(field)) => attr.set(&mut trade, field),
                    Ok(None) => {}
                    Err(message) => {
                        return Err(StoreError::InvalidRow {
                            row: trades.len() + 1,
                            message,
                        })
                    }
                }
            }
            trades.push(trade);
        }

        info!(
            "Loaded {} trades for {} / {}",
            trades.len(),
            instrument,
            sheet_name
        );
        Ok(trades)
    }
}

impl ProgressSink for SqliteStore {
    fn report(&self, job_id: &str, percent: u8) {
        if let Err(e) = self.set_progress(job_id, percent) {
            warn!("Failed to store progress for job {}: {}", job_id, e);
        }
    }
}

fn sql_type(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Bool | AttributeKind::Integer => "INTEGER",
        AttributeKind::Number => "REAL",
        AttributeKind::Text => "TEXT",
    }
}

fn to_sql_value(value: AttributeValue<'_>) -> SqlValue {
    match value {
        AttributeValue::Bool(b) => SqlValue::Integer(i64::from(b)),
        AttributeValue::Number(n) => SqlValue::Real(n),
        AttributeValue::Text(s) => SqlValue::Text(s.to_string()),
    }
}

/// `Ok(None)` for NULL cells, which keep the field's default
fn from_sql_value(attr: &Attribute, value: SqlValue) -> Result<Option<FieldValue>, String> {
    let field = match (attr.kind, value) {
        (_, SqlValue::Null) => return Ok(None),
        (AttributeKind::Bool, SqlValue::Integer(i)) => FieldValue::Bool(i != 0),
        (AttributeKind::Number | AttributeKind::Integer, SqlValue::Integer(i)) => {
            FieldValue::Number(i as f64)
        }
        (AttributeKind::Number | AttributeKind::Integer, SqlValue::Real(f)) => {
            FieldValue::Number(f)
        }
        (_, SqlValue::Text(text)) => attr.parse_cell(&text)?,
        (kind, other) => {
            return Err(format!(
                "column {} holds {:?}, expected {}",
                attr.name,
                other.data_type(),
                kind.label()
            ))
        }
    };
    Ok(Some(field))
}

/// Header cell to attribute name: trimmed, spaces become underscores
fn column_attribute(header: &str) -> Option<&'static Attribute> {
    let name = header.trim().trim_start_matches('\u{feff}').replace(' ', "_");
    attributes::lookup(&name)
}

/// Read trades from CSV with a header row naming attributes.
///
/// Unknown columns are ignored. Empty numeric cells read as 0 and commas are
/// accepted as decimal separators.
pub fn read_trades_csv<R: Read>(reader: R) -> Result<Vec<TradeRecord>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: Vec<Option<&'static Attribute>> =
        reader.headers()?.iter().map(column_attribute).collect();
    let ignored: Vec<&str> = reader
        .headers()?
        .iter()
        .zip(&columns)
        .filter(|(_, attr)| attr.is_none())
        .map(|(header, _)| header)
        .collect();
    if !ignored.is_empty() {
        debug!("Ignoring unknown CSV columns: {:?}", ignored);
    }

    let mut trades = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let row = index + 2;
        let mut trade = TradeRecord::default();
        for (cell, attr) in record.iter().zip(&columns) {
            let Some(attr) = attr else { continue };
            let field = attr
                .parse_cell(cell)
                .map_err(|message| StoreError::InvalidRow { row, message })?;
            attr.set(&mut trade, field);
        }
        trades.push(trade);
    }
    Ok(trades)
}

/// Load trades from a CSV file
pub fn load_trades_csv(path: impl AsRef<Path>) -> Result<Vec<TradeRecord>, StoreError> {
    let file = std::fs::File::open(path.as_ref())?;
    read_trades_csv(file)
}
