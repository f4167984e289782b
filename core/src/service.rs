//! The utility service: the one entry point operators and the CLI call.
//!
//! RULES:
//!   - Every operation takes the acting user and checks the permission
//!     matrix before touching the store.
//!   - Reading input is validated before any transaction is opened.
//!   - Bill generation reads arrears and writes the bill inside one
//!     `BEGIN IMMEDIATE` transaction.

use crate::{
    access::{Action, Actor},
    billing::{generate_bill, BillStatus, MeterReading},
    config::AppConfig,
    customer::{Customer, CustomerGroup, NewCustomer, NewGroup},
    error::{WsmsError, WsmsResult},
    event::LedgerEventEntry,
    ledger::{BillReceipt, BillRecord, ReadingRecord, ReadingSubmission},
    report::{
        customer_summaries, revenue_by_month, usage_by_month, CustomerSummaryRow,
        DashboardSummary, RevenueRow, UsageRow,
    },
    store::LedgerStore,
    tariff::{compute_tier_charge, validate_tiers, RateTableProvider, TariffTier},
    types::{BillId, CustomerId, GroupId, ReadingId, Units},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A charge preview for a hypothetical consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub units:  Units,
    pub charge: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub database:     String,
    pub tariff_tiers: usize,
}

pub struct UtilityService {
    pub store:  LedgerStore,
    pub config: AppConfig,
}

impl UtilityService {
    /// Open (or create) the database file, migrate it and, on first
    /// open only, seed the configured tariff.
    pub fn open(db_path: &str, config: AppConfig) -> WsmsResult<Self> {
        let store = LedgerStore::open(db_path)?;
        Self::with_store(store, config)
    }

    pub fn in_memory(config: AppConfig) -> WsmsResult<Self> {
        Self::with_store(LedgerStore::in_memory()?, config)
    }

    pub fn with_store(mut store: LedgerStore, config: AppConfig) -> WsmsResult<Self> {
        store.set_busy_timeout(config.settings.busy_timeout_ms)?;
        store.migrate()?;
        let default_tiers = config.tariff.fetch_tiers()?;
        if store.seed_default_tariff(&default_tiers)? {
            log::info!("tariff: using default schedule '{}'", config.tariff.tariff_id);
        }
        Ok(Self { store, config })
    }

    /// In-memory service with the test config.
    pub fn build_test() -> WsmsResult<Self> {
        Self::in_memory(AppConfig::default_test())
    }

    // ── Customer registry ─────────────────────────────────────────

    pub fn create_group(&mut self, actor: &Actor, group: NewGroup) -> WsmsResult<CustomerGroup> {
        actor.authorize(Action::ManageGroups)?;
        let group = group.normalized()?;
        let group_id = self.store.create_group(&group)?;
        log::info!("group={group_id} created: {} by user={}", group.group_code, actor.user_id);
        self.store
            .group(group_id)?
            .ok_or(WsmsError::NotFound { entity: "group", id: group_id })
    }

    pub fn list_groups(&self, actor: &Actor) -> WsmsResult<Vec<CustomerGroup>> {
        actor.authorize(Action::ViewRecords)?;
        self.store.groups()
    }

    pub fn create_customer(&mut self, actor: &Actor, customer: NewCustomer) -> WsmsResult<Customer> {
        actor.authorize(Action::ManageCustomers)?;
        let customer = customer.normalized()?;
        let customer_id = self.store.create_customer(&customer).map_err(|e| {
            if let WsmsError::Conflict(_) = e {
                log::warn!("customer {} rejected: {e}", customer.customer_code);
            }
            e
        })?;
        log::info!(
            "customer={customer_id} registered: {} meter={} by user={}",
            customer.customer_code, customer.meter_number, actor.user_id
        );
        self.get_customer(actor, customer_id)
    }

    pub fn list_customers(&self, actor: &Actor, group_id: Option<GroupId>) -> WsmsResult<Vec<Customer>> {
        actor.authorize(Action::ViewRecords)?;
        self.store.customers(group_id)
    }

    pub fn get_customer(&self, actor: &Actor, customer_id: CustomerId) -> WsmsResult<Customer> {
        actor.authorize(Action::ViewRecords)?;
        self.store
            .customer(customer_id)?
            .ok_or(WsmsError::NotFound { entity: "customer", id: customer_id })
    }

    // ── Reading desk ──────────────────────────────────────────────

    /// Record a reading and generate its bill in one transaction.
    ///
    /// The bill carries every UNPAID bill's principal as arrears. A
    /// second reading for the same customer and period is a `Conflict`
    /// and leaves the ledger unchanged.
    pub fn submit_reading(&mut self, actor: &Actor, submission: ReadingSubmission) -> WsmsResult<BillReceipt> {
        actor.authorize(Action::RecordReading)?;
        let ReadingSubmission { customer_id, period, previous_reading, current_reading } = submission;

        let reading = MeterReading::new(previous_reading, current_reading).map_err(|e| {
            log::warn!("customer={customer_id} period={period} reading rejected: {e}");
            e
        })?;

        let txn = self.store.begin_billing()?;
        if !txn.customer_exists(customer_id)? {
            return Err(WsmsError::NotFound { entity: "customer", id: customer_id });
        }
        if txn.period_recorded(customer_id, period)? {
            log::warn!("customer={customer_id} period={period} already billed");
            return Err(WsmsError::Conflict(format!(
                "reading already recorded for this period ({period})"
            )));
        }

        let tiers = txn.fetch_tiers().map_err(|e| {
            log::error!("billing: customer={customer_id} tariff unusable: {e}");
            e
        })?;
        let unpaid = txn.fetch_unpaid_principals(customer_id)?;
        let bill = generate_bill(&reading, &tiers, &unpaid, period)?;
        log::debug!(
            "billing: customer={customer_id} period={period} units={} charge={} arrears={} over {} unpaid bills",
            bill.units, bill.current_charge, bill.arrears_total, unpaid.len()
        );

        let receipt = txn.persist(customer_id, &reading, &bill, actor.user_id)?;
        log::info!(
            "billing: customer={customer_id} period={period} bill={} total={} by user={}",
            receipt.bill.id, receipt.bill.total_amount, actor.user_id
        );
        Ok(receipt)
    }

    pub fn list_readings(&self, actor: &Actor, customer_id: Option<CustomerId>) -> WsmsResult<Vec<ReadingRecord>> {
        actor.authorize(Action::ViewRecords)?;
        self.store.readings(customer_id)
    }

    pub fn latest_reading(&self, actor: &Actor, customer_id: CustomerId) -> WsmsResult<Option<ReadingRecord>> {
        actor.authorize(Action::ViewRecords)?;
        self.store.latest_reading(customer_id)
    }

    /// The value the next reading should start from: the latest
    /// current reading, or 0 for a new meter.
    pub fn suggested_previous_reading(&self, actor: &Actor, customer_id: CustomerId) -> WsmsResult<Units> {
        Ok(self
            .latest_reading(actor, customer_id)?
            .map(|r| r.current_reading)
            .unwrap_or(0))
    }

    pub fn correct_reading(
        &mut self,
        actor:       &Actor,
        reading_id:  ReadingId,
        new_current: Units,
    ) -> WsmsResult<ReadingRecord> {
        actor.authorize(Action::CorrectReading)?;
        let updated = self
            .store
            .correct_reading(reading_id, new_current, actor.user_id)
            .map_err(|e| {
                if e.is_user_error() {
                    log::warn!("reading={reading_id} correction rejected: {e}");
                }
                e
            })?;
        log::info!(
            "reading={reading_id} customer={} corrected to {new_current} by user={}",
            updated.customer_id, actor.user_id
        );
        Ok(updated)
    }

    /// Price `units` against the live tariff table without recording anything.
    pub fn quote(&self, actor: &Actor, units: Units) -> WsmsResult<Quote> {
        actor.authorize(Action::ViewRecords)?;
        let tiers = self.store.fetch_tiers()?;
        Ok(Quote { units, charge: compute_tier_charge(units, &tiers) })
    }

    // ── Bill desk ─────────────────────────────────────────────────

    pub fn list_bills(&self, actor: &Actor, customer_id: Option<CustomerId>) -> WsmsResult<Vec<BillRecord>> {
        actor.authorize(Action::ViewRecords)?;
        self.store.bills(customer_id)
    }

    pub fn get_bill(&self, actor: &Actor, bill_id: BillId) -> WsmsResult<BillRecord> {
        actor.authorize(Action::ViewRecords)?;
        self.store
            .bill(bill_id)?
            .ok_or(WsmsError::NotFound { entity: "bill", id: bill_id })
    }

    pub fn set_bill_status(&mut self, actor: &Actor, bill_id: BillId, status: BillStatus) -> WsmsResult<BillRecord> {
        actor.authorize(Action::ChangeBillStatus)?;
        let bill = self.store.set_bill_status(bill_id, status, actor.user_id)?;
        log::info!(
            "bill={bill_id} customer={} status={} by user={}",
            bill.customer_id, bill.status, actor.user_id
        );
        Ok(bill)
    }

    pub fn tariff_tiers(&self, actor: &Actor) -> WsmsResult<Vec<TariffTier>> {
        actor.authorize(Action::ViewRecords)?;
        self.store.fetch_tiers()
    }

    pub fn replace_tariff(&mut self, actor: &Actor, tiers: Vec<TariffTier>) -> WsmsResult<Vec<TariffTier>> {
        actor.authorize(Action::ManageTariff)?;
        let tiers = validate_tiers(tiers).map_err(|e| {
            log::warn!("tariff replacement rejected: {e}");
            e
        })?;
        self.store.replace_tariff(&tiers, actor.user_id)?;
        log::info!("tariff: replaced with {} tiers by user={}", tiers.len(), actor.user_id);
        Ok(tiers)
    }

    // ── Reports ───────────────────────────────────────────────────

    pub fn revenue_report(&self, actor: &Actor) -> WsmsResult<Vec<RevenueRow>> {
        actor.authorize(Action::ViewReports)?;
        Ok(revenue_by_month(&self.store.bill_facts()?))
    }

    pub fn usage_report(&self, actor: &Actor) -> WsmsResult<Vec<UsageRow>> {
        actor.authorize(Action::ViewReports)?;
        Ok(usage_by_month(&self.store.bill_facts()?))
    }

    pub fn customer_summary_report(&self, actor: &Actor) -> WsmsResult<Vec<CustomerSummaryRow>> {
        actor.authorize(Action::ViewReports)?;
        let customers = self.store.customer_refs()?;
        Ok(customer_summaries(&customers, &self.store.bill_facts()?))
    }

    pub fn dashboard_summary(&self, actor: &Actor) -> WsmsResult<DashboardSummary> {
        actor.authorize(Action::ViewDashboard)?;
        let limit = self.config.settings.recent_activity_limit;
        let total_revenue: Decimal = self
            .store
            .bill_facts()?
            .iter()
            .map(|f| f.total_amount)
            .sum();
        Ok(DashboardSummary {
            total_customers:   self.store.customer_count()?,
            total_consumption: self.store.total_consumption()?,
            total_revenue,
            pending_bills:     self.store.pending_bill_count()?,
            recent_readings:   self.store.recent_readings(limit)?,
            recent_bills:      self.store.recent_bills(limit)?,
        })
    }

    pub fn customer_events(&self, actor: &Actor, customer_id: CustomerId) -> WsmsResult<Vec<LedgerEventEntry>> {
        actor.authorize(Action::ViewReports)?;
        self.store.events_for_customer(customer_id)
    }

    /// No actor: health checks run before anyone logs in.
    pub fn health(&self) -> WsmsResult<HealthReport> {
        self.store.health_check()?;
        let tiers = self.store.fetch_tiers()?;
        Ok(HealthReport { database: "connected".into(), tariff_tiers: tiers.len() })
    }
}
