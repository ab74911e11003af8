use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::Ledger;
use crate::allocation::{self, Allocation, Coverage, UnitTotals};
use crate::money::Money;

impl Ledger {
    /// Re-derive a unit's paid / remaining / progress from its payments.
    /// A unit that no longer exists is skipped.
    pub fn recompute_unit(&mut self, unit_id: u64) -> Option<UnitTotals> {
        let Some(total_price) = self.store.unit(unit_id).map(|u| u.total_price) else {
            warn!(unit_id, "skipping unit totals recompute, unit not found");
            return None;
        };

        let totals = allocation::unit_totals(total_price, &self.store.payment_lines(unit_id));
        let unit = self.store.unit_mut(unit_id)?;
        unit.total_paid = totals.total_paid;
        unit.remaining_debt = totals.remaining_debt;
        unit.payment_progress = totals.progress;
        debug!(
            unit_id,
            paid = %totals.total_paid,
            remaining = %totals.remaining_debt,
            "unit totals recomputed"
        );
        Some(totals)
    }

    /// Re-derive paid / remaining for every invoice of a unit (pins first,
    /// then FIFO by issue date). A unit that no longer exists is skipped.
    pub fn recompute_invoices(&mut self, unit_id: u64) -> Option<Coverage> {
        if self.store.unit(unit_id).is_none() {
            warn!(unit_id, "skipping invoice recompute, unit not found");
            return None;
        }

        let total_payments: Money = self
            .store
            .payment_lines(unit_id)
            .iter()
            .map(|p| p.amount)
            .sum();
        let coverage = allocation::invoice_coverage(
            &self.store.invoice_lines(unit_id),
            &self.store.pinned_lines(unit_id),
            total_payments,
        );

        for c in &coverage.invoices {
            if let Some(invoice) = self.store.invoice_mut(c.invoice_id) {
                invoice.total_paid_on_invoice = c.paid;
                invoice.remaining_on_invoice = c.remaining;
            }
        }
        debug!(
            unit_id,
            invoices = coverage.invoices.len(),
            unallocated = %coverage.unallocated,
            "invoice coverage recomputed"
        );
        Some(coverage)
    }

    /// Both recomputes for one unit.
    pub fn recompute(&mut self, unit_id: u64) {
        self.recompute_unit(unit_id);
        self.recompute_invoices(unit_id);
    }

    pub(crate) fn recompute_units(&mut self, unit_ids: impl IntoIterator<Item = u64>) {
        let ids: BTreeSet<u64> = unit_ids.into_iter().collect();
        for id in ids {
            self.recompute(id);
        }
    }

    /// Recompute every unit; returns how many were processed.
    pub fn recompute_all(&mut self) -> usize {
        let ids: Vec<u64> = self.store.units.iter().map(|u| u.id).collect();
        let count = ids.len();
        self.recompute_units(ids);
        count
    }

    /// What the engine derives for a unit right now, without writing anything.
    pub fn allocation_for_unit(&self, unit_id: u64) -> Option<Allocation> {
        let unit = self.store.unit(unit_id)?;
        Some(allocation::allocate(
            unit.total_price,
            &self.store.payment_lines(unit_id),
            &self.store.invoice_lines(unit_id),
            &self.store.pinned_lines(unit_id),
        ))
    }
}
