//! Revenue, usage and per-customer reports.
//!
//! The store hands over raw bill facts; all money is summed here in
//! decimal, never in SQL floating point.

use crate::{
    billing::BillStatus,
    ledger::{BillRecord, ReadingRecord},
    types::{CustomerId, Period, Units},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// The monetary and volume facts of one bill.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillFact {
    pub customer_id:  CustomerId,
    pub period:       Period,
    pub units:        Units,
    pub total_amount: Decimal,
    pub arrears:      Decimal,
    pub status:       BillStatus,
}

impl BillFact {
    pub fn principal(&self) -> Decimal {
        self.total_amount - self.arrears
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRef {
    pub id:             CustomerId,
    pub full_name:      String,
    pub account_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueRow {
    pub month:             Period,
    pub total_billed:      Decimal,
    pub total_collected:   Decimal,
    pub total_outstanding: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRow {
    pub month:       Period,
    pub total_units: Units,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSummaryRow {
    pub customer_id:                   CustomerId,
    pub full_name:                     String,
    pub account_number:                Option<String>,
    pub total_bills:                   u64,
    pub total_billed_amount:           Decimal,
    pub total_paid_amount:             Decimal,
    pub current_outstanding_principal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_customers:   u64,
    pub total_consumption: Units,
    pub total_revenue:     Decimal,
    pub pending_bills:     u64,
    pub recent_readings:   Vec<ReadingRecord>,
    pub recent_bills:      Vec<BillRecord>,
}

/// Billed, collected (PAID) and outstanding (UNPAID) totals per month,
/// newest month first.
pub fn revenue_by_month(facts: &[BillFact]) -> Vec<RevenueRow> {
    let mut months: BTreeMap<Period, RevenueRow> = BTreeMap::new();
    for fact in facts {
        let row = months.entry(fact.period).or_insert_with(|| RevenueRow {
            month:             fact.period,
            total_billed:      Decimal::ZERO,
            total_collected:   Decimal::ZERO,
            total_outstanding: Decimal::ZERO,
        });
        row.total_billed += fact.total_amount;
        match fact.status {
            BillStatus::Paid    => row.total_collected += fact.total_amount,
            BillStatus::Unpaid  => row.total_outstanding += fact.total_amount,
            BillStatus::Partial => {}
        }
    }
    months.into_values().rev().collect()
}

/// Units billed per month, newest month first.
pub fn usage_by_month(facts: &[BillFact]) -> Vec<UsageRow> {
    let mut months: BTreeMap<Period, Units> = BTreeMap::new();
    for fact in facts {
        *months.entry(fact.period).or_default() += fact.units;
    }
    months
        .into_iter()
        .rev()
        .map(|(month, total_units)| UsageRow { month, total_units })
        .collect()
}

/// One row per customer, bills or not, ordered by name.
pub fn customer_summaries(customers: &[CustomerRef], facts: &[BillFact]) -> Vec<CustomerSummaryRow> {
    let mut by_customer: HashMap<CustomerId, Vec<&BillFact>> = HashMap::new();
    for fact in facts {
        by_customer.entry(fact.customer_id).or_default().push(fact);
    }

    let mut rows: Vec<CustomerSummaryRow> = customers
        .iter()
        .map(|c| {
            let bills = by_customer.get(&c.id).map(Vec::as_slice).unwrap_or_default();
            let mut row = CustomerSummaryRow {
                customer_id:                   c.id,
                full_name:                     c.full_name.clone(),
                account_number:                c.account_number.clone(),
                total_bills:                   bills.len() as u64,
                total_billed_amount:           Decimal::ZERO,
                total_paid_amount:             Decimal::ZERO,
                current_outstanding_principal: Decimal::ZERO,
            };
            for bill in bills {
                row.total_billed_amount += bill.total_amount;
                match bill.status {
                    BillStatus::Paid    => row.total_paid_amount += bill.total_amount,
                    BillStatus::Unpaid  => row.current_outstanding_principal += bill.principal(),
                    BillStatus::Partial => {}
                }
            }
            row
        })
        .collect();

    rows.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.customer_id.cmp(&b.customer_id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn fact(customer_id: CustomerId, period: &str, total: &str, arrears: &str, status: BillStatus) -> BillFact {
        BillFact {
            customer_id,
            period: period.parse().unwrap(),
            units: 10,
            total_amount: money(total),
            arrears: money(arrears),
            status,
        }
    }

    #[test]
    fn revenue_splits_collected_and_outstanding() {
        let facts = vec![
            fact(1, "2024-01", "20.00", "0", BillStatus::Paid),
            fact(2, "2024-01", "15.00", "0", BillStatus::Unpaid),
            fact(1, "2024-02", "30.00", "0", BillStatus::Unpaid),
        ];
        let rows = revenue_by_month(&facts);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month.to_string(), "2024-02");
        assert_eq!(rows[1].total_billed, money("35.00"));
        assert_eq!(rows[1].total_collected, money("20.00"));
        assert_eq!(rows[1].total_outstanding, money("15.00"));
    }

    #[test]
    fn usage_sums_units_newest_first() {
        let facts = vec![
            fact(1, "2024-01", "1", "0", BillStatus::Paid),
            fact(2, "2024-01", "1", "0", BillStatus::Paid),
            fact(1, "2024-03", "1", "0", BillStatus::Unpaid),
        ];
        let rows = usage_by_month(&facts);
        assert_eq!(rows[0].month.to_string(), "2024-03");
        assert_eq!(rows[1].total_units, 20);
    }

    #[test]
    fn customer_summary_counts_principal_only() {
        let customers = vec![
            CustomerRef { id: 2, full_name: "Zed".into(), account_number: None },
            CustomerRef { id: 1, full_name: "Amy".into(), account_number: Some("ACC-1".into()) },
        ];
        let facts = vec![
            fact(1, "2024-01", "20.00", "0", BillStatus::Unpaid),
            fact(1, "2024-02", "50.00", "20.00", BillStatus::Unpaid),
            fact(1, "2023-12", "5.00", "0", BillStatus::Paid),
        ];
        let rows = customer_summaries(&customers, &facts);
        assert_eq!(rows[0].full_name, "Amy");
        assert_eq!(rows[0].total_bills, 3);
        assert_eq!(rows[0].total_billed_amount, money("75.00"));
        assert_eq!(rows[0].total_paid_amount, money("5.00"));
        assert_eq!(rows[0].current_outstanding_principal, money("50.00"));
        assert_eq!(rows[1].total_bills, 0);
        assert_eq!(rows[1].total_billed_amount, Decimal::ZERO);
    }
}
