//! Ledger events: the append-only audit trail of billing changes.
//!
//! RULE: every change to a bill or reading after creation, and every
//! bill creation, is recorded here in the same transaction as the
//! change itself. Variants are only ever appended.

use crate::{
    billing::BillStatus,
    types::{BillId, CustomerId, Period, ReadingId, Units, UserId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    BillGenerated {
        bill_id:      BillId,
        reading_id:   ReadingId,
        customer_id:  CustomerId,
        period:       Period,
        units:        Units,
        total_amount: Decimal,
        arrears:      Decimal,
        by:           UserId,
    },
    BillStatusChanged {
        bill_id:     BillId,
        customer_id: CustomerId,
        from:        BillStatus,
        to:          BillStatus,
        by:          UserId,
    },
    ReadingCorrected {
        reading_id:  ReadingId,
        customer_id: CustomerId,
        period:      Period,
        old_current: Units,
        new_current: Units,
        by:          UserId,
    },
    TariffReplaced {
        tier_count: usize,
        by:         UserId,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BillGenerated { .. }     => "bill_generated",
            Self::BillStatusChanged { .. } => "bill_status_changed",
            Self::ReadingCorrected { .. }  => "reading_corrected",
            Self::TariffReplaced { .. }    => "tariff_replaced",
        }
    }

    /// The customer the event concerns, if any.
    pub fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Self::BillGenerated { customer_id, .. }
            | Self::BillStatusChanged { customer_id, .. }
            | Self::ReadingCorrected { customer_id, .. } => Some(*customer_id),
            Self::TariffReplaced { .. } => None,
        }
    }
}

/// A ledger event as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEventEntry {
    pub id:          Option<i64>,
    pub customer_id: Option<CustomerId>,
    pub event_type:  String,
    pub payload:     String, // JSON-serialized LedgerEvent
    pub recorded_at: String,
}

impl LedgerEventEntry {
    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
