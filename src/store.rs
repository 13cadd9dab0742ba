use crate::error::{Result, TrackerError};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Expense record - write-once, delete-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Assigned by storage on insert, stable for the life of the row
    pub id: i64,
    pub amount: f64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Event for audit trail: every insert and delete is recorded
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

// ============================================================================
// STORAGE CONTRACT
// ============================================================================

/// What the core needs from persistent storage
pub trait ExpenseStore {
    /// Persist a new expense and return it with its assigned id
    fn insert(&self, amount: f64, description: &str, created_at: DateTime<Utc>) -> Result<Expense>;

    /// All records with `created_at >= since`, in no particular order
    fn query_since(&self, since: DateTime<Utc>) -> Result<Vec<Expense>>;

    /// All records, newest first
    fn query_all(&self) -> Result<Vec<Expense>>;

    /// Remove one record; `TrackerError::NotFound` if the id is unknown
    fn delete_by_id(&self, id: i64) -> Result<()>;
}

// ============================================================================
// SQLITE STORE
// ============================================================================

const ACTOR: &str = "expense_tracker";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        setup_database(&conn)?;
        info!(path = ?path.as_ref(), "opened expense database");
        Ok(SqliteStore { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn })
    }

    pub fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM expenses", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Audit events for one expense, newest first
    pub fn events_for_expense(&self, id: i64) -> Result<Vec<Event>> {
        get_events_for_entity(&self.conn, "expense", &id.to_string())
    }

    fn select(&self, sql: &str, since: Option<String>) -> Result<Vec<Expense>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = match since {
            Some(ts) => stmt.query_map(params![ts], row_to_expense)?,
            None => stmt.query_map([], row_to_expense)?,
        };
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl ExpenseStore for SqliteStore {
    fn insert(&self, amount: f64, description: &str, created_at: DateTime<Utc>) -> Result<Expense> {
        // Row and audit entry commit together or not at all
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO expenses (amount, description, created_at) VALUES (?1, ?2, ?3)",
            params![amount, description, encode_timestamp(created_at)],
        )?;

        let expense = Expense {
            id: tx.last_insert_rowid(),
            amount,
            description: description.to_string(),
            created_at,
        };

        let event = Event::new(
            "expense_added",
            "expense",
            &expense.id.to_string(),
            serde_json::json!({
                "amount": expense.amount,
                "description": expense.description,
                "created_at": expense.created_at.to_rfc3339(),
            }),
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        debug!(id = expense.id, amount, "inserted expense");
        Ok(expense)
    }

    fn query_since(&self, since: DateTime<Utc>) -> Result<Vec<Expense>> {
        self.select(
            "SELECT id, amount, description, created_at
             FROM expenses
             WHERE created_at >= ?1",
            Some(encode_timestamp(since)),
        )
    }

    fn query_all(&self) -> Result<Vec<Expense>> {
        self.select(
            "SELECT id, amount, description, created_at
             FROM expenses
             ORDER BY created_at DESC, id DESC",
            None,
        )
    }

    fn delete_by_id(&self, id: i64) -> Result<()> {
        let existing: Option<f64> = self
            .conn
            .query_row(
                "SELECT amount FROM expenses WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(amount) = existing else {
            return Err(TrackerError::NotFound(id));
        };

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM expenses WHERE id = ?1", params![id])?;

        let event = Event::new(
            "expense_deleted",
            "expense",
            &id.to_string(),
            serde_json::json!({ "amount": amount }),
            ACTOR,
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        info!(id, "deleted expense");
        Ok(())
    }
}

// ============================================================================
// SCHEMA & HELPERS
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases silently keep "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // created_at is fixed-width RFC 3339 UTC, so text order == time order
    conn.execute(
        "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            amount REAL NOT NULL,
            description TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_expenses_created_at ON expenses(created_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            encode_timestamp(event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: decode_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        5,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

fn row_to_expense(row: &rusqlite::Row<'_>) -> rusqlite::Result<Expense> {
    let created_at: String = row.get(3)?;
    Ok(Expense {
        id: row.get(0)?,
        amount: row.get(1)?,
        description: row.get(2)?,
        created_at: decode_timestamp(3, &created_at)?,
    })
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                column,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
