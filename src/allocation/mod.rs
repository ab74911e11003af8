//! Payment-to-invoice allocation.
//!
//! Given one unit's payments, invoices and pinned (explicit) allocations,
//! works out how much of every invoice counts as paid and what the unit's
//! aggregate totals are. Nothing in here touches the store; the ledger layer
//! feeds records in and writes the results back.

mod engine;

pub use engine::{allocate, available_on_payment, invoice_coverage, unit_totals};

use chrono::NaiveDate;

use crate::money::{Money, Percent};

/// A payment as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentLine {
    pub id: u64,
    pub date: Option<NaiveDate>,
    pub amount: Money,
}

/// An invoice as seen by the engine. FIFO priority is `(issue_date, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceLine {
    pub id: u64,
    pub issue_date: NaiveDate,
    pub subtotal: Money,
}

/// Part of a payment pinned to a specific invoice by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedAmount {
    pub payment_id: u64,
    pub invoice_id: u64,
    pub amount: Money,
}

/// How one invoice ends up covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceCoverage {
    pub invoice_id: u64,
    /// Pinned money counted on this invoice (capped at its subtotal).
    pub explicit: Money,
    /// Money taken from the unallocated pool.
    pub fifo: Money,
    pub paid: Money,
    pub remaining: Money,
}

/// Result of walking a unit's invoices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coverage {
    /// In FIFO order.
    pub invoices: Vec<InvoiceCoverage>,
    /// Pool left over after every invoice took its share.
    pub unallocated: Money,
}

/// Unit-level aggregates, derived from payments alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitTotals {
    pub total_paid: Money,
    pub remaining_debt: Money,
    pub progress: Percent,
}

/// Everything the engine derives for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub invoices: Vec<InvoiceCoverage>,
    pub unit: UnitTotals,
    pub unallocated: Money,
}

impl Allocation {
    pub fn coverage_for(&self, invoice_id: u64) -> Option<&InvoiceCoverage> {
        self.invoices.iter().find(|c| c.invoice_id == invoice_id)
    }
}
