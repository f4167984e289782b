use super::{insert_event, units_column, units_param, LedgerStore};
use crate::{
    billing::MeterReading,
    error::{WsmsError, WsmsResult},
    event::LedgerEvent,
    ledger::ReadingRecord,
    types::{CustomerId, ReadingId, Units, UserId},
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const READING_SELECT: &str =
    "SELECT mr.id, mr.customer_id, c.full_name, mr.reading_month, mr.previous_reading,
            mr.current_reading, mr.units_consumed, mr.created_by, mr.created_at
     FROM meter_readings mr
     LEFT JOIN customers c ON mr.customer_id = c.id";

impl LedgerStore {
    // ── Meter readings ────────────────────────────────────────────

    /// Readings, newest period first, optionally for one customer.
    pub fn readings(&self, customer_id: Option<CustomerId>) -> WsmsResult<Vec<ReadingRecord>> {
        let sql = format!(
            "{READING_SELECT}
             WHERE ?1 IS NULL OR mr.customer_id = ?1
             ORDER BY mr.reading_month DESC, mr.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![customer_id], reading_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn reading(&self, reading_id: ReadingId) -> WsmsResult<Option<ReadingRecord>> {
        fetch_reading(&self.conn, reading_id)
    }

    pub fn latest_reading(&self, customer_id: CustomerId) -> WsmsResult<Option<ReadingRecord>> {
        let sql = format!(
            "{READING_SELECT}
             WHERE mr.customer_id = ?1
             ORDER BY mr.reading_month DESC, mr.id DESC
             LIMIT 1"
        );
        let reading = self
            .conn
            .query_row(&sql, params![customer_id], reading_from_row)
            .optional()?;
        Ok(reading)
    }

    /// Most recently entered readings across all customers.
    pub fn recent_readings(&self, limit: usize) -> WsmsResult<Vec<ReadingRecord>> {
        let sql = format!(
            "{READING_SELECT}
             ORDER BY mr.created_at DESC, mr.id DESC
             LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], reading_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn total_consumption(&self) -> WsmsResult<Units> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(units_consumed), 0) FROM meter_readings",
            [],
            |row| row.get(0),
        )?;
        Ok(total.max(0) as Units)
    }

    /// Change the current value of a customer's latest reading.
    ///
    /// Earlier readings are frozen: a later one was computed from them.
    /// The bill generated from the reading is left untouched.
    pub fn correct_reading(
        &mut self,
        reading_id:  ReadingId,
        new_current: Units,
        by:          UserId,
    ) -> WsmsResult<ReadingRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing = fetch_reading(&tx, reading_id)?
            .ok_or(WsmsError::NotFound { entity: "reading", id: reading_id })?;

        let later: i64 = tx.query_row(
            "SELECT COUNT(*) FROM meter_readings
             WHERE customer_id = ?1 AND reading_month > ?2",
            params![existing.customer_id, existing.period],
            |row| row.get(0),
        )?;
        if later > 0 {
            return Err(WsmsError::Validation(
                "cannot edit past readings: only the latest reading can be modified".into(),
            ));
        }

        let corrected = MeterReading::new(existing.previous_reading, new_current)?;
        let units = corrected.units_consumed()?;

        tx.execute(
            "UPDATE meter_readings SET current_reading = ?1, units_consumed = ?2 WHERE id = ?3",
            params![units_param(new_current)?, units_param(units)?, reading_id],
        )?;
        insert_event(
            &tx,
            &LedgerEvent::ReadingCorrected {
                reading_id,
                customer_id: existing.customer_id,
                period:      existing.period,
                old_current: existing.current_reading,
                new_current,
                by,
            },
        )?;

        let updated = fetch_reading(&tx, reading_id)?
            .ok_or(WsmsError::NotFound { entity: "reading", id: reading_id })?;
        tx.commit()?;
        Ok(updated)
    }
}

pub(crate) fn fetch_reading(conn: &Connection, reading_id: ReadingId) -> WsmsResult<Option<ReadingRecord>> {
    let sql = format!("{READING_SELECT} WHERE mr.id = ?1");
    let reading = conn
        .query_row(&sql, params![reading_id], reading_from_row)
        .optional()?;
    Ok(reading)
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<ReadingRecord> {
    Ok(ReadingRecord {
        id:               row.get(0)?,
        customer_id:      row.get(1)?,
        customer_name:    row.get(2)?,
        period:           row.get(3)?,
        previous_reading: units_column(row, 4)?,
        current_reading:  units_column(row, 5)?,
        units_consumed:   units_column(row, 6)?,
        created_by:       row.get(7)?,
        created_at:       row.get(8)?,
    })
}
