//! Persisted readings and bills, as the store hands them back.

use crate::{
    billing::{ArrearsLine, BillStatus},
    types::{BillId, CustomerId, Period, ReadingId, Units, UserId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A meter reading submitted for one customer and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSubmission {
    pub customer_id:      CustomerId,
    pub period:           Period,
    pub previous_reading: Units,
    pub current_reading:  Units,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingRecord {
    pub id:               ReadingId,
    pub customer_id:      CustomerId,
    pub customer_name:    Option<String>,
    pub period:           Period,
    pub previous_reading: Units,
    pub current_reading:  Units,
    pub units_consumed:   Units,
    pub created_by:       Option<UserId>,
    pub created_at:       String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillRecord {
    pub id:                BillId,
    pub customer_id:       CustomerId,
    pub customer_name:     Option<String>,
    pub reading_id:        ReadingId,
    /// Meter value of the reading this bill was generated from.
    pub current_reading:   Option<Units>,
    pub period:            Period,
    pub units:             Units,
    pub current_charge:    Decimal,
    pub arrears:           Decimal,
    pub arrears_breakdown: Vec<ArrearsLine>,
    pub total_amount:      Decimal,
    pub status:            BillStatus,
    pub generated_by:      Option<UserId>,
    pub generated_at:      String,
}

impl BillRecord {
    /// The amount newly billed in this bill's period, excluding the
    /// arrears it carried.
    pub fn principal(&self) -> Decimal {
        self.total_amount - self.arrears
    }
}

/// What a successful reading submission returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillReceipt {
    pub reading: ReadingRecord,
    pub bill:    BillRecord,
}
