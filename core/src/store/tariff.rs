use super::{
    insert_event, money_column, now_timestamp, optional_units_column, units_column, units_param,
    LedgerStore,
};
use crate::{
    error::WsmsResult,
    event::LedgerEvent,
    tariff::{validate_tiers, RateTableProvider, TariffTier},
    types::UserId,
};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

const TARIFF_SEEDED_KEY: &str = "tariff_seeded";

impl LedgerStore {
    // ── Tariff ────────────────────────────────────────────────────

    /// Write the default schedule the first time a ledger is opened.
    ///
    /// Returns false once a schedule has ever been seeded or replaced,
    /// even if that schedule is now empty.
    pub fn seed_default_tariff(&mut self, tiers: &[TariffTier]) -> WsmsResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let seeded: Option<String> = tx
            .query_row(
                "SELECT value FROM ledger_meta WHERE key = ?1",
                params![TARIFF_SEEDED_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let stored: i64 = tx.query_row("SELECT COUNT(*) FROM tariff_rates", [], |row| row.get(0))?;

        // Ledgers created before the flag existed count as seeded if they hold rows.
        let fresh = seeded.is_none() && stored == 0;
        if fresh {
            insert_tiers(&tx, tiers)?;
        }
        mark_tariff_seeded(&tx)?;
        tx.commit()?;

        if fresh {
            log::info!("tariff: seeded {} tiers into new ledger", tiers.len());
        }
        Ok(fresh)
    }

    /// Swap the whole schedule atomically. The caller validates first.
    pub fn replace_tariff(&mut self, tiers: &[TariffTier], by: UserId) -> WsmsResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM tariff_rates", [])?;
        insert_tiers(&tx, tiers)?;
        mark_tariff_seeded(&tx)?;
        insert_event(&tx, &LedgerEvent::TariffReplaced { tier_count: tiers.len(), by })?;
        tx.commit()?;
        Ok(())
    }
}

impl RateTableProvider for LedgerStore {
    fn fetch_tiers(&self) -> WsmsResult<Vec<TariffTier>> {
        load_tiers(&self.conn)
    }
}

/// Read and validate the schedule on the current connection or transaction.
pub(crate) fn load_tiers(conn: &Connection) -> WsmsResult<Vec<TariffTier>> {
    let mut stmt = conn.prepare(
        "SELECT min_units, max_units, rate_per_unit
         FROM tariff_rates ORDER BY min_units ASC",
    )?;
    let tiers = stmt
        .query_map([], |row| {
            Ok(TariffTier {
                lower_bound:   units_column(row, 0)?,
                upper_bound:   optional_units_column(row, 1)?,
                rate_per_unit: money_column(row, 2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    validate_tiers(tiers)
}

fn insert_tiers(conn: &Connection, tiers: &[TariffTier]) -> WsmsResult<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO tariff_rates (min_units, max_units, rate_per_unit) VALUES (?1, ?2, ?3)",
    )?;
    for tier in tiers {
        stmt.execute(params![
            units_param(tier.lower_bound)?,
            tier.upper_bound.map(units_param).transpose()?,
            tier.rate_per_unit.to_string(),
        ])?;
    }
    Ok(())
}

fn mark_tariff_seeded(conn: &Connection) -> WsmsResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO ledger_meta (key, value, updated_at) VALUES (?1, '1', ?2)",
        params![TARIFF_SEEDED_KEY, now_timestamp()],
    )?;
    Ok(())
}
