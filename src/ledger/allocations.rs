use tracing::info;

use super::Ledger;
use crate::allocation::available_on_payment;
use crate::error::{FieldErrors, LedgerError, Result};
use crate::money::Money;
use crate::store::PaymentAllocation;

#[derive(Debug, Clone, Copy)]
pub struct AllocationInput {
    pub payment_id: u64,
    pub invoice_id: u64,
    pub amount: Money,
}

impl Ledger {
    /// What is left on a payment for pinning to `invoice_id`. The existing
    /// pin on that invoice does not count, since pinning again replaces it.
    pub fn available_for(&self, payment_id: u64, invoice_id: Option<u64>) -> Result<Money> {
        let payment = self
            .store
            .payment(payment_id)
            .ok_or(LedgerError::PaymentNotFound(payment_id))?;
        Ok(available_on_payment(
            payment.amount,
            &self.store.pinned_for_payment(payment_id),
            invoice_id,
        ))
    }

    /// Pin part of a payment to an invoice of the same unit. A second pin for
    /// the same pair replaces the first. Returns the allocation id.
    pub fn add_allocation(&mut self, input: AllocationInput) -> Result<u64> {
        let mut errors = FieldErrors::new();
        if !input.amount.is_positive() {
            errors.push("amount", "must be greater than zero");
        }
        errors.into_result()?;

        let payment_unit = self
            .store
            .payment(input.payment_id)
            .map(|p| p.unit_id)
            .ok_or(LedgerError::PaymentNotFound(input.payment_id))?;
        let invoice_unit = self
            .store
            .invoice(input.invoice_id)
            .map(|i| i.unit_id)
            .ok_or_else(|| LedgerError::InvoiceNotFound(input.invoice_id.to_string()))?;
        if payment_unit != invoice_unit {
            return Err(LedgerError::AllocationUnitMismatch {
                payment: input.payment_id,
                invoice: input.invoice_id,
            });
        }

        let available = self.available_for(input.payment_id, Some(input.invoice_id))?;
        if input.amount > available {
            return Err(LedgerError::AllocationExceedsAvailable {
                payment: input.payment_id,
                available,
            });
        }

        let existing = self
            .store
            .allocations
            .iter_mut()
            .find(|a| a.payment_id == input.payment_id && a.invoice_id == input.invoice_id);
        let id = match existing {
            Some(alloc) => {
                alloc.amount = input.amount;
                alloc.id
            }
            None => {
                let id = self.store.next_allocation_id();
                self.store.allocations.push(PaymentAllocation {
                    id,
                    payment_id: input.payment_id,
                    invoice_id: input.invoice_id,
                    amount: input.amount,
                });
                id
            }
        };
        info!(
            allocation_id = id,
            payment_id = input.payment_id,
            invoice_id = input.invoice_id,
            amount = %input.amount,
            "allocation pinned"
        );

        self.recompute(payment_unit);
        Ok(id)
    }

    pub fn delete_allocation(&mut self, id: u64) -> Result<()> {
        let alloc = self
            .store
            .allocation(id)
            .cloned()
            .ok_or(LedgerError::AllocationNotFound(id))?;

        let mut touched = Vec::new();
        if let Some(p) = self.store.payment(alloc.payment_id) {
            touched.push(p.unit_id);
        }
        if let Some(i) = self.store.invoice(alloc.invoice_id) {
            touched.push(i.unit_id);
        }

        self.store.allocations.retain(|a| a.id != id);
        info!(allocation_id = id, "allocation removed");

        self.recompute_units(touched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ClientInput, InvoiceInput, PaymentInput, UnitInput};
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// One unit with a 1000 payment and two invoices of 1000 (Jan, Feb).
    fn setup() -> (Ledger, u64, u64, u64) {
        let mut ledger = Ledger::new(Default::default());
        let client = ledger
            .create_client(
                ClientInput {
                    full_name: "Albana Hoxha".into(),
                    ..Default::default()
                },
                d(2024, 1, 1),
            )
            .unwrap();
        let unit = ledger
            .create_unit(UnitInput {
                block: "7A".into(),
                total_price: Some(Money::from_major(10_000)),
                client_id: Some(client),
                ..Default::default()
            })
            .unwrap();
        let payment = ledger
            .add_payment(PaymentInput {
                unit_id: unit,
                amount: Money::from_major(1_000),
                ..Default::default()
            })
            .unwrap();
        let jan = ledger
            .create_invoice(
                InvoiceInput {
                    unit_id: unit,
                    issue_date: Some(d(2024, 1, 1)),
                    subtotal: Money::from_major(1_000),
                    ..Default::default()
                },
                d(2024, 3, 1),
            )
            .unwrap();
        let feb = ledger
            .create_invoice(
                InvoiceInput {
                    unit_id: unit,
                    issue_date: Some(d(2024, 2, 1)),
                    subtotal: Money::from_major(1_000),
                    ..Default::default()
                },
                d(2024, 3, 1),
            )
            .unwrap();
        (ledger, payment, jan, feb)
    }

    fn paid(ledger: &Ledger, invoice: u64) -> Money {
        ledger.store.invoice(invoice).unwrap().total_paid_on_invoice
    }

    #[test]
    fn pin_takes_precedence_over_fifo() {
        let (mut ledger, payment, jan, feb) = setup();
        assert_eq!(paid(&ledger, jan), Money::from_major(1_000));
        assert_eq!(paid(&ledger, feb), Money::ZERO);

        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(800),
            })
            .unwrap();

        assert_eq!(paid(&ledger, feb), Money::from_major(800));
        assert_eq!(paid(&ledger, jan), Money::from_major(200));
        let jan_inv = ledger.store.invoice(jan).unwrap();
        assert_eq!(jan_inv.remaining_on_invoice, Money::from_major(800));
    }

    #[test]
    fn pin_beyond_available_is_rejected() {
        let (mut ledger, payment, jan, feb) = setup();
        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: jan,
                amount: Money::from_major(700),
            })
            .unwrap();

        let err = ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(400),
            })
            .unwrap_err();
        match err {
            LedgerError::AllocationExceedsAvailable { available, .. } => {
                assert_eq!(available, Money::from_major(300))
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            ledger.available_for(payment, Some(jan)).unwrap(),
            Money::from_major(1_000)
        );
    }

    #[test]
    fn repinning_same_pair_replaces_amount() {
        let (mut ledger, payment, jan, _) = setup();
        let first = ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: jan,
                amount: Money::from_major(900),
            })
            .unwrap();
        let second = ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: jan,
                amount: Money::from_major(1_000),
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.store.allocations.len(), 1);
        assert_eq!(ledger.store.allocations[0].amount, Money::from_major(1_000));
    }

    #[test]
    fn zero_amount_and_unknown_refs_are_rejected() {
        let (mut ledger, payment, jan, _) = setup();
        assert!(matches!(
            ledger.add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: jan,
                amount: Money::ZERO,
            }),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.add_allocation(AllocationInput {
                payment_id: 99,
                invoice_id: jan,
                amount: Money::from_major(1),
            }),
            Err(LedgerError::PaymentNotFound(99))
        ));
        assert!(matches!(
            ledger.add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: 99,
                amount: Money::from_major(1),
            }),
            Err(LedgerError::InvoiceNotFound(_))
        ));
    }

    #[test]
    fn removing_pin_returns_to_fifo() {
        let (mut ledger, payment, jan, feb) = setup();
        let id = ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(800),
            })
            .unwrap();
        ledger.delete_allocation(id).unwrap();
        assert_eq!(paid(&ledger, jan), Money::from_major(1_000));
        assert_eq!(paid(&ledger, feb), Money::ZERO);
        assert!(matches!(
            ledger.delete_allocation(id),
            Err(LedgerError::AllocationNotFound(_))
        ));
    }

    #[test]
    fn deleting_pinned_payment_drops_its_allocations() {
        let (mut ledger, payment, _, feb) = setup();
        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(500),
            })
            .unwrap();
        ledger.delete_payment(payment).unwrap();
        assert!(ledger.store.allocations.is_empty());
        assert_eq!(paid(&ledger, feb), Money::ZERO);
    }

    #[test]
    fn payment_cannot_shrink_below_pins() {
        let (mut ledger, payment, jan, _) = setup();
        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: jan,
                amount: Money::from_major(600),
            })
            .unwrap();
        let unit_id = ledger.store.payment(payment).unwrap().unit_id;
        let err = ledger
            .update_payment(
                payment,
                PaymentInput {
                    unit_id,
                    amount: Money::from_major(500),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::PaymentBelowPinned { .. }));
    }

    /// A second unit of the same owner with its own 1000 invoice.
    fn other_unit(ledger: &mut Ledger) -> (u64, u64) {
        let owner = ledger.store.clients[0].id;
        let unit = ledger
            .create_unit(UnitInput {
                block: "7B".into(),
                total_price: Some(Money::from_major(5_000)),
                client_id: Some(owner),
                ..Default::default()
            })
            .unwrap();
        let invoice = ledger
            .create_invoice(
                InvoiceInput {
                    unit_id: unit,
                    issue_date: Some(d(2024, 1, 1)),
                    subtotal: Money::from_major(1_000),
                    ..Default::default()
                },
                d(2024, 3, 1),
            )
            .unwrap();
        (unit, invoice)
    }

    #[test]
    fn pin_to_invoice_of_another_unit_is_rejected() {
        let (mut ledger, payment, jan, _) = setup();
        let (_, foreign) = other_unit(&mut ledger);
        let before = ledger.store.clone();

        let err = ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: foreign,
                amount: Money::from_major(800),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::AllocationUnitMismatch { payment: p, invoice: i } if p == payment && i == foreign
        ));
        assert_eq!(ledger.store, before);
        assert_eq!(paid(&ledger, jan), Money::from_major(1_000));
        assert_eq!(paid(&ledger, foreign), Money::ZERO);
    }

    #[test]
    fn pinned_payment_cannot_move_to_another_unit() {
        let (mut ledger, payment, _, feb) = setup();
        let (second, _) = other_unit(&mut ledger);
        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(800),
            })
            .unwrap();
        let before = ledger.store.clone();

        let err = ledger
            .update_payment(
                payment,
                PaymentInput {
                    unit_id: second,
                    amount: Money::from_major(1_000),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::AllocationUnitMismatch { .. }));
        assert_eq!(ledger.store, before);
        assert_eq!(paid(&ledger, feb), Money::from_major(800));
    }

    #[test]
    fn invoice_with_pins_cannot_move_to_another_unit() {
        let (mut ledger, payment, _, feb) = setup();
        let (second, _) = other_unit(&mut ledger);
        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(800),
            })
            .unwrap();
        let before = ledger.store.clone();

        let err = ledger
            .update_invoice(
                feb,
                InvoiceInput {
                    unit_id: second,
                    issue_date: Some(d(2024, 2, 1)),
                    subtotal: Money::from_major(1_000),
                    ..Default::default()
                },
                d(2024, 3, 1),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::AllocationUnitMismatch { .. }));
        assert_eq!(ledger.store, before);
    }
}
