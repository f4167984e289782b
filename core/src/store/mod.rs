//! SQLite persistence layer: the ledger store.
//!
//! RULE: Only the store talks to the database.
//! The service and the billing engine call store methods, they never
//! execute SQL directly. Money is stored as decimal text and parsed
//! back into `Decimal`; SQL never does arithmetic on it.

use crate::{
    error::{WsmsError, WsmsResult},
    event::{LedgerEvent, LedgerEventEntry},
    types::{CustomerId, Units},
};
use rusqlite::{params, types::Type, Connection, ErrorCode, Row};
use rust_decimal::Decimal;
use std::time::Duration;

mod bill;
mod customer;
mod reading;
mod report;
mod tariff;

pub use bill::BillingTxn;

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

pub struct LedgerStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl LedgerStore {
    pub fn open(path: &str) -> WsmsResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> WsmsResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// A second connection to the same ledger file, e.g. for another
    /// writer thread. An in-memory ledger gets a fresh, empty database.
    pub fn reopen(&self) -> WsmsResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// How long a writer waits for another connection's transaction.
    pub fn set_busy_timeout(&self, timeout_ms: u64) -> WsmsResult<()> {
        self.conn.busy_timeout(Duration::from_millis(timeout_ms))?;
        Ok(())
    }

    /// Apply all schema migrations in order. Safe to run repeatedly.
    pub fn migrate(&self) -> WsmsResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_customers.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_tariff_rates.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_readings_and_bills.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_ledger_events.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/005_ledger_meta.sql"))?;
        Ok(())
    }

    /// Cheap liveness check.
    pub fn health_check(&self) -> WsmsResult<()> {
        self.conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    // ── Ledger events ──────────────────────────────────────────

    pub fn append_event(&self, event: &LedgerEvent) -> WsmsResult<()> {
        insert_event(&self.conn, event)
    }

    /// All events concerning one customer, oldest first.
    pub fn events_for_customer(&self, customer_id: CustomerId) -> WsmsResult<Vec<LedgerEventEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, customer_id, event_type, payload, recorded_at
             FROM ledger_event WHERE customer_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![customer_id], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn events_of_type(&self, event_type: &str) -> WsmsResult<Vec<LedgerEventEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, customer_id, event_type, payload, recorded_at
             FROM ledger_event WHERE event_type = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![event_type], event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEventEntry> {
    Ok(LedgerEventEntry {
        id:          Some(row.get(0)?),
        customer_id: row.get(1)?,
        event_type:  row.get(2)?,
        payload:     row.get(3)?,
        recorded_at: row.get(4)?,
    })
}

/// Append an event on whatever connection or transaction is current.
pub(crate) fn insert_event(conn: &Connection, event: &LedgerEvent) -> WsmsResult<()> {
    conn.execute(
        "INSERT INTO ledger_event (customer_id, event_type, payload, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            event.customer_id(),
            event.event_type(),
            serde_json::to_string(event)?,
            now_timestamp(),
        ],
    )?;
    Ok(())
}

pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}

fn conversion_error(idx: usize, ty: Type, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, msg.into())
}

/// Read a decimal-text money column.
pub(crate) fn money_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    raw.parse::<Decimal>()
        .map_err(|e| conversion_error(idx, Type::Text, format!("bad amount '{raw}': {e}")))
}

/// Bind meter units to a signed INTEGER column.
pub(crate) fn units_param(units: Units) -> WsmsResult<i64> {
    i64::try_from(units).map_err(|_| {
        WsmsError::Validation(format!("{units} units is too large to store"))
    })
}

/// Read a non-negative integer column as meter units.
pub(crate) fn units_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Units> {
    let raw: i64 = row.get(idx)?;
    Units::try_from(raw)
        .map_err(|_| conversion_error(idx, Type::Integer, format!("negative units {raw}")))
}

pub(crate) fn optional_units_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Units>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => units_column(row, idx).map(Some),
        None => Ok(None),
    }
}

/// Parse a text column through `FromStr`.
pub(crate) fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| conversion_error(idx, Type::Text, e.to_string()))
}

/// Decode a JSON text column.
pub(crate) fn json_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| conversion_error(idx, Type::Text, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrate_is_idempotent() {
        let store = LedgerStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.migrate().unwrap();
        store.health_check().unwrap();
    }

    #[test]
    fn events_round_trip_through_the_log() {
        let store = LedgerStore::in_memory().unwrap();
        store.migrate().unwrap();
        store
            .append_event(&LedgerEvent::TariffReplaced { tier_count: 3, by: 1 })
            .unwrap();
        let entries = store.events_of_type("tariff_replaced").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].customer_id, None);
        assert_eq!(
            entries[0].decode().unwrap(),
            LedgerEvent::TariffReplaced { tier_count: 3, by: 1 }
        );
    }
}
