use super::{
    insert_event, is_unique_violation, json_column, money_column, now_timestamp,
    optional_units_column, parsed_column, reading::fetch_reading, tariff::load_tiers,
    units_column, units_param, LedgerStore,
};
use crate::{
    billing::{Bill, BillStatus, MeterReading, UnpaidBill},
    error::{WsmsError, WsmsResult},
    event::LedgerEvent,
    ledger::{BillReceipt, BillRecord},
    tariff::{RateTableProvider, TariffTier},
    types::{BillId, CustomerId, Period, UserId},
};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const BILL_SELECT: &str =
    "SELECT b.id, b.customer_id, c.full_name, b.reading_id, mr.current_reading, b.bill_month,
            b.units, b.current_charge, b.arrears, b.arrears_breakdown, b.total_amount,
            b.status, b.generated_by, b.generated_at
     FROM bills b
     LEFT JOIN customers c ON b.customer_id = c.id
     LEFT JOIN meter_readings mr ON b.reading_id = mr.id";

/// One bill generation, from arrears snapshot to commit.
///
/// Opened with `BEGIN IMMEDIATE`: the write lock is taken up front, so
/// no other connection can insert or settle a bill between the arrears
/// read and the bill write. Dropping the value without calling
/// `persist` rolls everything back.
pub struct BillingTxn<'a> {
    tx: Transaction<'a>,
}

impl LedgerStore {
    pub fn begin_billing(&mut self) -> WsmsResult<BillingTxn<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(BillingTxn { tx })
    }

    // ── Bills ─────────────────────────────────────────────────────

    /// Bills, newest period first, optionally for one customer.
    pub fn bills(&self, customer_id: Option<CustomerId>) -> WsmsResult<Vec<BillRecord>> {
        let sql = format!(
            "{BILL_SELECT}
             WHERE ?1 IS NULL OR b.customer_id = ?1
             ORDER BY b.bill_month DESC, b.id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![customer_id], bill_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn bill(&self, bill_id: BillId) -> WsmsResult<Option<BillRecord>> {
        fetch_bill(&self.conn, bill_id)
    }

    /// Most recently generated bills across all customers.
    pub fn recent_bills(&self, limit: usize) -> WsmsResult<Vec<BillRecord>> {
        let sql = format!(
            "{BILL_SELECT}
             ORDER BY b.generated_at DESC, b.id DESC
             LIMIT ?1"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], bill_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn pending_bill_count(&self) -> WsmsResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bills WHERE status = 'UNPAID'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn unpaid_principals(&self, customer_id: CustomerId) -> WsmsResult<Vec<UnpaidBill>> {
        load_unpaid_principals(&self.conn, customer_id)
    }

    /// Apply a status change and log it. Returns the updated bill.
    pub fn set_bill_status(
        &mut self,
        bill_id: BillId,
        target:  BillStatus,
        by:      UserId,
    ) -> WsmsResult<BillRecord> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bill = fetch_bill(&tx, bill_id)?
            .ok_or(WsmsError::NotFound { entity: "bill", id: bill_id })?;
        let next = bill.status.transition_to(target)?;

        if next != bill.status {
            tx.execute(
                "UPDATE bills SET status = ?1 WHERE id = ?2",
                params![next.as_str(), bill_id],
            )?;
            insert_event(
                &tx,
                &LedgerEvent::BillStatusChanged {
                    bill_id,
                    customer_id: bill.customer_id,
                    from: bill.status,
                    to: next,
                    by,
                },
            )?;
        }

        let updated = fetch_bill(&tx, bill_id)?
            .ok_or(WsmsError::NotFound { entity: "bill", id: bill_id })?;
        tx.commit()?;
        Ok(updated)
    }
}

impl BillingTxn<'_> {
    pub fn customer_exists(&self, customer_id: CustomerId) -> WsmsResult<bool> {
        let found: Option<i64> = self
            .tx
            .query_row(
                "SELECT id FROM customers WHERE id = ?1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Whether the customer already has a reading or bill for `period`.
    pub fn period_recorded(&self, customer_id: CustomerId, period: Period) -> WsmsResult<bool> {
        let count: i64 = self.tx.query_row(
            "SELECT (SELECT COUNT(*) FROM bills WHERE customer_id = ?1 AND bill_month = ?2)
                  + (SELECT COUNT(*) FROM meter_readings WHERE customer_id = ?1 AND reading_month = ?2)",
            params![customer_id, period],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn fetch_unpaid_principals(&self, customer_id: CustomerId) -> WsmsResult<Vec<UnpaidBill>> {
        load_unpaid_principals(&self.tx, customer_id)
    }

    /// Insert the reading and its bill, log the bill, and commit.
    pub fn persist(
        self,
        customer_id: CustomerId,
        reading:     &MeterReading,
        bill:        &Bill,
        by:          UserId,
    ) -> WsmsResult<BillReceipt> {
        let now = now_timestamp();
        let duplicate = || {
            WsmsError::Conflict(format!(
                "reading already recorded for customer {customer_id} in {}",
                bill.period
            ))
        };

        self.tx
            .execute(
                "INSERT INTO meter_readings
                    (customer_id, reading_month, previous_reading, current_reading,
                     units_consumed, created_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    customer_id,
                    bill.period,
                    units_param(reading.previous_reading)?,
                    units_param(reading.current_reading)?,
                    units_param(bill.units)?,
                    by,
                    &now,
                ],
            )
            .map_err(|e| if is_unique_violation(&e) { duplicate() } else { e.into() })?;
        let reading_id = self.tx.last_insert_rowid();

        self.tx
            .execute(
                "INSERT INTO bills
                    (customer_id, reading_id, bill_month, units, current_charge, arrears,
                     arrears_breakdown, total_amount, status, generated_by, generated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    customer_id,
                    reading_id,
                    bill.period,
                    units_param(bill.units)?,
                    bill.current_charge.to_string(),
                    bill.arrears_total.to_string(),
                    serde_json::to_string(&bill.arrears_breakdown)?,
                    bill.total_amount.to_string(),
                    bill.status.as_str(),
                    by,
                    &now,
                ],
            )
            .map_err(|e| if is_unique_violation(&e) { duplicate() } else { e.into() })?;
        let bill_id = self.tx.last_insert_rowid();

        insert_event(
            &self.tx,
            &LedgerEvent::BillGenerated {
                bill_id,
                reading_id,
                customer_id,
                period:       bill.period,
                units:        bill.units,
                total_amount: bill.total_amount,
                arrears:      bill.arrears_total,
                by,
            },
        )?;

        let reading = fetch_reading(&self.tx, reading_id)?
            .ok_or(WsmsError::NotFound { entity: "reading", id: reading_id })?;
        let bill = fetch_bill(&self.tx, bill_id)?
            .ok_or(WsmsError::NotFound { entity: "bill", id: bill_id })?;
        self.tx.commit()?;
        Ok(BillReceipt { reading, bill })
    }
}

/// Tariffs read inside the billing transaction come from the same
/// snapshot as the arrears.
impl RateTableProvider for BillingTxn<'_> {
    fn fetch_tiers(&self) -> WsmsResult<Vec<TariffTier>> {
        load_tiers(&self.tx)
    }
}

fn load_unpaid_principals(conn: &Connection, customer_id: CustomerId) -> WsmsResult<Vec<UnpaidBill>> {
    let mut stmt = conn.prepare(
        "SELECT bill_month, total_amount, arrears
         FROM bills
         WHERE customer_id = ?1 AND status = 'UNPAID'
         ORDER BY bill_month ASC",
    )?;
    let rows = stmt.query_map(params![customer_id], |row| {
        let period: Period = row.get(0)?;
        let total = money_column(row, 1)?;
        let arrears = money_column(row, 2)?;
        Ok(UnpaidBill { period, principal_amount: total - arrears })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub(crate) fn fetch_bill(conn: &Connection, bill_id: BillId) -> WsmsResult<Option<BillRecord>> {
    let sql = format!("{BILL_SELECT} WHERE b.id = ?1");
    let bill = conn
        .query_row(&sql, params![bill_id], bill_from_row)
        .optional()?;
    Ok(bill)
}

fn bill_from_row(row: &Row<'_>) -> rusqlite::Result<BillRecord> {
    Ok(BillRecord {
        id:                row.get(0)?,
        customer_id:       row.get(1)?,
        customer_name:     row.get(2)?,
        reading_id:        row.get(3)?,
        current_reading:   optional_units_column(row, 4)?,
        period:            row.get(5)?,
        units:             units_column(row, 6)?,
        current_charge:    money_column(row, 7)?,
        arrears:           money_column(row, 8)?,
        arrears_breakdown: json_column(row, 9)?,
        total_amount:      money_column(row, 10)?,
        status:            parsed_column(row, 11)?,
        generated_by:      row.get(12)?,
        generated_at:      row.get(13)?,
    })
}
