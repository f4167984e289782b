use super::{money_column, parsed_column, units_column, LedgerStore};
use crate::{
    error::WsmsResult,
    report::{BillFact, CustomerRef},
};

impl LedgerStore {
    // ── Report inputs ─────────────────────────────────────────────

    /// Every bill's money and volume, oldest period first.
    pub fn bill_facts(&self) -> WsmsResult<Vec<BillFact>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, bill_month, units, total_amount, arrears, status
             FROM bills ORDER BY bill_month ASC, id ASC",
        )?;
        let facts = stmt
            .query_map([], |row| {
                Ok(BillFact {
                    customer_id:  row.get(0)?,
                    period:       row.get(1)?,
                    units:        units_column(row, 2)?,
                    total_amount: money_column(row, 3)?,
                    arrears:      money_column(row, 4)?,
                    status:       parsed_column(row, 5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(facts)
    }

    pub fn customer_refs(&self) -> WsmsResult<Vec<CustomerRef>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, full_name, account_number FROM customers ORDER BY id ASC")?;
        let refs = stmt
            .query_map([], |row| {
                Ok(CustomerRef {
                    id:             row.get(0)?,
                    full_name:      row.get(1)?,
                    account_number: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(refs)
    }
}
