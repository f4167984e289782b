use super::{is_unique_violation, now_timestamp, LedgerStore};
use crate::{
    customer::{Customer, CustomerGroup, GroupSummary, NewCustomer, NewGroup},
    error::{WsmsError, WsmsResult},
    types::{CustomerId, GroupId},
};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const CUSTOMER_SELECT: &str =
    "SELECT c.id, c.customer_code, c.account_number, c.full_name, c.address, c.phone,
            c.meter_number, c.created_at, g.id, g.group_code, g.group_name
     FROM customers c
     LEFT JOIN customer_groups g ON c.group_id = g.id";

impl LedgerStore {
    // ── Customer groups ───────────────────────────────────────────

    pub fn create_group(&self, group: &NewGroup) -> WsmsResult<GroupId> {
        insert_group(&self.conn, group)
    }

    pub fn groups(&self) -> WsmsResult<Vec<CustomerGroup>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, group_code, group_name, description, is_active, manager_id
             FROM customer_groups ORDER BY group_code ASC",
        )?;
        let rows = stmt.query_map([], group_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn group(&self, group_id: GroupId) -> WsmsResult<Option<CustomerGroup>> {
        let group = self
            .conn
            .query_row(
                "SELECT id, group_code, group_name, description, is_active, manager_id
                 FROM customer_groups WHERE id = ?1",
                params![group_id],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    // ── Customers ─────────────────────────────────────────────────

    /// Insert a customer, and its inline group if one is given, in one
    /// transaction. Code, meter number and account number are unique.
    pub fn create_customer(&mut self, c: &NewCustomer) -> WsmsResult<CustomerId> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM customers
                 WHERE customer_code = ?1 OR meter_number = ?2
                    OR (?3 IS NOT NULL AND account_number = ?3)
                 LIMIT 1",
                params![&c.customer_code, &c.meter_number, &c.account_number],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Err(WsmsError::Conflict(
                "customer with this code, account number, or meter number already exists".into(),
            ));
        }

        let group_id = match (&c.new_group, c.group_id) {
            (Some(new_group), _) => Some(insert_group(&tx, new_group)?),
            (None, Some(group_id)) => {
                let found: Option<i64> = tx
                    .query_row(
                        "SELECT id FROM customer_groups WHERE id = ?1",
                        params![group_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if found.is_none() {
                    return Err(WsmsError::NotFound { entity: "group", id: group_id });
                }
                Some(group_id)
            }
            (None, None) => None,
        };

        tx.execute(
            "INSERT INTO customers
                (customer_code, account_number, full_name, address, phone, meter_number,
                 group_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &c.customer_code,
                &c.account_number,
                &c.full_name,
                &c.address,
                &c.phone,
                &c.meter_number,
                group_id,
                now_timestamp(),
            ],
        )?;
        let customer_id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(customer_id)
    }

    pub fn customers(&self, group_id: Option<GroupId>) -> WsmsResult<Vec<Customer>> {
        let sql = format!(
            "{CUSTOMER_SELECT}
             WHERE ?1 IS NULL OR c.group_id = ?1
             ORDER BY c.full_name ASC, c.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![group_id], customer_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn customer(&self, customer_id: CustomerId) -> WsmsResult<Option<Customer>> {
        let sql = format!("{CUSTOMER_SELECT} WHERE c.id = ?1");
        let customer = self
            .conn
            .query_row(&sql, params![customer_id], customer_from_row)
            .optional()?;
        Ok(customer)
    }

    pub fn customer_count(&self) -> WsmsResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Insert a group on the current connection or transaction.
fn insert_group(conn: &Connection, group: &NewGroup) -> WsmsResult<GroupId> {
    let inserted = conn.execute(
        "INSERT INTO customer_groups
            (group_code, group_name, description, is_active, manager_id, created_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?5)",
        params![
            &group.group_code,
            &group.group_name,
            &group.description,
            group.manager_id,
            now_timestamp(),
        ],
    );
    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(e) if is_unique_violation(&e) => Err(WsmsError::Conflict(format!(
            "group code '{}' already exists",
            group.group_code
        ))),
        Err(e) => Err(e.into()),
    }
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerGroup> {
    Ok(CustomerGroup {
        id:          row.get(0)?,
        group_code:  row.get(1)?,
        group_name:  row.get(2)?,
        description: row.get(3)?,
        is_active:   row.get::<_, i32>(4)? != 0,
        manager_id:  row.get(5)?,
    })
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let group = match row.get::<_, Option<GroupId>>(8)? {
        Some(id) => Some(GroupSummary {
            id,
            group_code: row.get(9)?,
            group_name: row.get(10)?,
        }),
        None => None,
    };
    Ok(Customer {
        id:             row.get(0)?,
        customer_code:  row.get(1)?,
        account_number: row.get(2)?,
        full_name:      row.get(3)?,
        address:        row.get(4)?,
        phone:          row.get(5)?,
        meter_number:   row.get(6)?,
        created_at:     row.get(7)?,
        group,
    })
}
