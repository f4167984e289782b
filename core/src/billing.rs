//! Billing engine: turns a meter reading, a tariff schedule and the
//! customer's unpaid principals into a bill.
//!
//! RULE: nothing in this module touches the store. Callers fetch the
//! inputs and persist the output inside one ledger transaction.

use crate::{
    error::{WsmsError, WsmsResult},
    tariff::{compute_tier_charge, TariffTier},
    types::{Period, Units, MAX_STORED_UNITS},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterReading {
    pub previous_reading: Units,
    pub current_reading:  Units,
}

impl MeterReading {
    /// Build a reading, rejecting a meter that went backwards or a
    /// value too large to store.
    pub fn new(previous_reading: Units, current_reading: Units) -> WsmsResult<Self> {
        if previous_reading.max(current_reading) > MAX_STORED_UNITS {
            return Err(WsmsError::Validation(format!(
                "meter reading {} exceeds the largest storable value {MAX_STORED_UNITS}",
                previous_reading.max(current_reading)
            )));
        }
        let reading = Self { previous_reading, current_reading };
        reading.units_consumed()?;
        Ok(reading)
    }

    pub fn units_consumed(&self) -> WsmsResult<Units> {
        self.current_reading
            .checked_sub(self.previous_reading)
            .ok_or(WsmsError::InvalidReading {
                previous: self.previous_reading,
                current:  self.current_reading,
            })
    }
}

/// A bill still owed, reduced to the amount it newly billed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnpaidBill {
    pub period:           Period,
    /// `total_amount - arrears` of that bill. Carrying the principal
    /// rather than the total keeps old arrears from compounding.
    pub principal_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrearsLine {
    pub period: Period,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BillStatus {
    Unpaid,
    /// Reserved for partial payments. No code path produces it yet.
    Partial,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unpaid  => "UNPAID",
            Self::Partial => "PARTIAL",
            Self::Paid    => "PAID",
        }
    }

    /// Apply an explicit status change.
    ///
    /// Only PAID and UNPAID may be set this way; setting the current
    /// status again is a no-op.
    pub fn transition_to(self, target: BillStatus) -> WsmsResult<BillStatus> {
        match target {
            Self::Paid | Self::Unpaid => Ok(target),
            Self::Partial => Err(WsmsError::Validation(format!(
                "cannot move bill from {self} to {target}: status must be PAID or UNPAID"
            ))),
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = WsmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UNPAID"  => Ok(Self::Unpaid),
            "PARTIAL" => Ok(Self::Partial),
            "PAID"    => Ok(Self::Paid),
            other     => Err(WsmsError::Validation(format!("unknown bill status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bill {
    pub period:            Period,
    pub units:             Units,
    pub current_charge:    Decimal,
    pub arrears_total:     Decimal,
    pub arrears_breakdown: Vec<ArrearsLine>,
    pub total_amount:      Decimal,
    pub status:            BillStatus,
}

impl Bill {
    /// The part of this bill that was newly charged this period.
    pub fn principal(&self) -> Decimal {
        self.total_amount - self.arrears_total
    }
}

/// Sum unpaid principals and list them oldest period first.
pub fn compute_arrears(unpaid_bills: &[UnpaidBill]) -> (Decimal, Vec<ArrearsLine>) {
    let mut breakdown: Vec<ArrearsLine> = unpaid_bills
        .iter()
        .map(|b| {
            assert!(
                b.principal_amount >= Decimal::ZERO,
                "negative principal {} for {}", b.principal_amount, b.period
            );
            ArrearsLine { period: b.period, amount: b.principal_amount }
        })
        .collect();
    breakdown.sort_by_key(|line| line.period);

    let total: Decimal = breakdown.iter().map(|line| line.amount).sum();
    (total, breakdown)
}

/// Compute a complete, UNPAID bill for one period.
pub fn generate_bill(
    reading:      &MeterReading,
    tiers:        &[TariffTier],
    unpaid_bills: &[UnpaidBill],
    period:       Period,
) -> WsmsResult<Bill> {
    let units = reading.units_consumed()?;
    let current_charge = compute_tier_charge(units, tiers);
    let (arrears_total, arrears_breakdown) = compute_arrears(unpaid_bills);

    Ok(Bill {
        period,
        units,
        current_charge,
        arrears_total,
        arrears_breakdown,
        total_amount: current_charge + arrears_total,
        status: BillStatus::Unpaid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn period(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn two_tier() -> Vec<TariffTier> {
        vec![
            TariffTier::bounded(0, 10, money("1.00")),
            TariffTier::unbounded(10, money("2.00")),
        ]
    }

    #[test]
    fn arrears_sum_and_oldest_first() {
        let unpaid = vec![
            UnpaidBill { period: period("2024-02"), principal_amount: money("30.00") },
            UnpaidBill { period: period("2024-01"), principal_amount: money("20.00") },
        ];
        let (total, breakdown) = compute_arrears(&unpaid);
        assert_eq!(total, money("50.00"));
        assert_eq!(breakdown[0].period, period("2024-01"));
        assert_eq!(breakdown[0].amount, money("20.00"));
        assert_eq!(breakdown[1].period, period("2024-02"));
    }

    #[test]
    #[should_panic(expected = "negative principal")]
    fn negative_principal_fails_loudly() {
        let unpaid = vec![UnpaidBill { period: period("2024-01"), principal_amount: money("-5.00") }];
        compute_arrears(&unpaid);
    }

    #[test]
    fn readings_beyond_storage_range_are_invalid() {
        let too_big = crate::types::MAX_STORED_UNITS + 1;
        assert!(matches!(MeterReading::new(0, too_big), Err(WsmsError::Validation(_))));
        assert!(MeterReading::new(0, crate::types::MAX_STORED_UNITS).is_ok());
    }

    #[test]
    fn no_arrears() {
        let (total, breakdown) = compute_arrears(&[]);
        assert_eq!(total, Decimal::ZERO);
        assert!(breakdown.is_empty());
    }

    #[test]
    fn full_bill_example() {
        let reading = MeterReading::new(100, 150).unwrap();
        let unpaid = vec![
            UnpaidBill { period: period("2024-01"), principal_amount: money("20.00") },
            UnpaidBill { period: period("2024-02"), principal_amount: money("30.00") },
        ];
        let bill = generate_bill(&reading, &two_tier(), &unpaid, period("2024-03")).unwrap();

        assert_eq!(bill.units, 50);
        assert_eq!(bill.current_charge, money("90.00"));
        assert_eq!(bill.arrears_total, money("50.00"));
        assert_eq!(bill.total_amount, money("140.00"));
        assert_eq!(bill.status, BillStatus::Unpaid);
        assert_eq!(bill.principal(), money("90.00"));
    }

    #[test]
    fn zero_consumption_still_bills() {
        let reading = MeterReading::new(80, 80).unwrap();
        let bill = generate_bill(&reading, &two_tier(), &[], period("2024-05")).unwrap();
        assert_eq!(bill.units, 0);
        assert_eq!(bill.current_charge, Decimal::ZERO);
        assert_eq!(bill.total_amount, Decimal::ZERO);
    }

    #[test]
    fn meter_going_backwards_is_rejected() {
        assert!(matches!(
            MeterReading::new(50, 40),
            Err(WsmsError::InvalidReading { previous: 50, current: 40 })
        ));

        let raw = MeterReading { previous_reading: 50, current_reading: 40 };
        assert!(matches!(
            generate_bill(&raw, &two_tier(), &[], period("2024-05")),
            Err(WsmsError::InvalidReading { .. })
        ));
    }

    #[test]
    fn status_toggle() {
        assert_eq!(BillStatus::Unpaid.transition_to(BillStatus::Paid).unwrap(), BillStatus::Paid);
        assert_eq!(BillStatus::Paid.transition_to(BillStatus::Unpaid).unwrap(), BillStatus::Unpaid);
        assert_eq!(BillStatus::Paid.transition_to(BillStatus::Paid).unwrap(), BillStatus::Paid);
        assert!(BillStatus::Unpaid.transition_to(BillStatus::Partial).is_err());
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("paid".parse::<BillStatus>().unwrap(), BillStatus::Paid);
        assert_eq!("UNPAID".parse::<BillStatus>().unwrap(), BillStatus::Unpaid);
        assert!("pending".parse::<BillStatus>().is_err());
        assert_eq!(serde_json::to_string(&BillStatus::Partial).unwrap(), "\"PARTIAL\"");
    }
}
