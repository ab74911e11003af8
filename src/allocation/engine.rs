use std::collections::HashMap;

use super::{
    Allocation, Coverage, InvoiceCoverage, InvoiceLine, PaymentLine, PinnedAmount, UnitTotals,
};
use crate::money::{Money, Percent};

/// Unit aggregates from the raw sum of payments. Overpayment is absorbed:
/// the remaining debt bottoms out at zero while progress may pass 100%.
pub fn unit_totals(total_price: Money, payments: &[PaymentLine]) -> UnitTotals {
    let total_paid: Money = payments.iter().map(|p| p.amount).sum();
    UnitTotals {
        total_paid,
        remaining_debt: total_price.floor_sub(total_paid),
        progress: Percent::of(total_paid, total_price),
    }
}

/// Hybrid FIFO with pinning.
///
/// The pool is computed once as `total_payments - all pinned amounts` and
/// then spent across every invoice in `(issue_date, id)` order, invoices with
/// pins included for whatever their pins leave uncovered.
pub fn invoice_coverage(
    invoices: &[InvoiceLine],
    pins: &[PinnedAmount],
    total_payments: Money,
) -> Coverage {
    let mut explicit_by_invoice: HashMap<u64, Money> = HashMap::new();
    let mut total_explicit = Money::ZERO;
    for pin in pins {
        *explicit_by_invoice.entry(pin.invoice_id).or_default() += pin.amount;
        total_explicit += pin.amount;
    }

    let mut pool = total_payments.floor_sub(total_explicit);

    let mut ordered: Vec<&InvoiceLine> = invoices.iter().collect();
    ordered.sort_by_key(|inv| (inv.issue_date, inv.id));

    let mut out = Vec::with_capacity(ordered.len());
    for inv in ordered {
        let pinned = explicit_by_invoice
            .get(&inv.id)
            .copied()
            .unwrap_or_default();
        let subtotal = inv.subtotal.max(Money::ZERO);
        let explicit = pinned.min(subtotal);
        let need = subtotal.floor_sub(explicit);
        let fifo = pool.min(need);
        let paid = explicit + fifo;
        pool -= fifo;

        out.push(InvoiceCoverage {
            invoice_id: inv.id,
            explicit,
            fifo,
            paid,
            remaining: subtotal.floor_sub(paid),
        });
    }

    Coverage {
        invoices: out,
        unallocated: pool,
    }
}

/// Derive invoice coverage and unit totals in one pass over the inputs.
pub fn allocate(
    total_price: Money,
    payments: &[PaymentLine],
    invoices: &[InvoiceLine],
    pins: &[PinnedAmount],
) -> Allocation {
    let unit = unit_totals(total_price, payments);
    let coverage = invoice_coverage(invoices, pins, unit.total_paid);
    Allocation {
        invoices: coverage.invoices,
        unit,
        unallocated: coverage.unallocated,
    }
}

/// How much of a payment can still be pinned. The pin for `replacing`
/// (if any) is left out since an upsert overwrites it.
pub fn available_on_payment(
    payment_amount: Money,
    pins_of_payment: &[PinnedAmount],
    replacing: Option<u64>,
) -> Money {
    let pinned: Money = pins_of_payment
        .iter()
        .filter(|p| Some(p.invoice_id) != replacing)
        .map(|p| p.amount)
        .sum();
    payment_amount - pinned
}
