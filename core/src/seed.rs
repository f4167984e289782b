//! Demo data: one group of customers with two months of billed readings.
//!
//! Everything is drawn from `SeedRng` streams and goes through the
//! public service operations, so demo bills are priced and carry
//! arrears exactly like real ones. Same seed, same data.

use crate::{
    access::{Actor, Role},
    billing::BillStatus,
    customer::{NewCustomer, NewGroup},
    error::WsmsResult,
    ledger::ReadingSubmission,
    name_generator::NameGenerator,
    rng::{DemoStream, SeedRng},
    service::UtilityService,
    types::{GroupId, Period, UserId},
};
use serde::{Deserialize, Serialize};

/// User id recorded on demo writes.
pub const DEMO_USER: UserId = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSummary {
    pub group_id:   GroupId,
    pub customers:  usize,
    pub readings:   usize,
    pub bills_paid: usize,
}

/// Seed `settings.demo_customers` customers into a fresh group.
///
/// Codes embed the seed, so different seeds can share one database;
/// seeding the same seed twice is a `Conflict`.
pub fn seed_demo_data(service: &mut UtilityService, seed: u64) -> WsmsResult<SeedSummary> {
    let admin = Actor::new(DEMO_USER, Role::Admin);
    let mut names = SeedRng::new(seed, DemoStream::Names);
    let mut addresses = SeedRng::new(seed, DemoStream::Addresses);
    let mut usage = SeedRng::new(seed, DemoStream::Consumption);

    let group = service.create_group(
        &admin,
        NewGroup {
            group_code:  format!("DEMO-{seed}"),
            group_name:  format!("Demo district {seed}"),
            description: Some("Generated demo customers".into()),
            manager_id:  None,
        },
    )?;

    let first_month = Period::new(2024, 1)?;
    let second_month = first_month.next();
    let count = service.config.settings.demo_customers;
    let mut summary = SeedSummary { group_id: group.id, customers: 0, readings: 0, bills_paid: 0 };

    for i in 1..=count {
        let customer = service.create_customer(
            &admin,
            NewCustomer {
                customer_code:  format!("D{seed}-{i:03}"),
                account_number: Some(format!("ACC-{seed}-{i:03}")),
                full_name:      NameGenerator::full_name(&mut names),
                address:        NameGenerator::address(&mut addresses),
                phone:          None,
                meter_number:   format!("MTR-{seed}-{i:03}"),
                group_id:       Some(group.id),
                new_group:      None,
            },
        )?;
        summary.customers += 1;

        let start = usage.range_inclusive(0, 500);
        let mut previous = start;
        for (month, period) in [first_month, second_month].into_iter().enumerate() {
            let current = previous + usage.range_inclusive(5, 60);
            let receipt = service.submit_reading(
                &admin,
                ReadingSubmission {
                    customer_id:      customer.id,
                    period,
                    previous_reading: previous,
                    current_reading:  current,
                },
            )?;
            summary.readings += 1;
            previous = current;

            // Every other customer settled their first bill.
            if month == 0 && i % 2 == 0 {
                service.set_bill_status(&admin, receipt.bill.id, BillStatus::Paid)?;
                summary.bills_paid += 1;
            }
        }
    }

    log::info!(
        "seed={seed} demo data: {} customers, {} readings, {} bills paid",
        summary.customers, summary.readings, summary.bills_paid
    );
    Ok(summary)
}
