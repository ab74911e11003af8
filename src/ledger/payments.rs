use chrono::NaiveDate;
use tracing::info;

use super::validate::{clean, non_negative};
use super::Ledger;
use crate::error::{FieldErrors, LedgerError, Result};
use crate::money::Money;
use crate::store::Payment;

#[derive(Debug, Clone, Default)]
pub struct PaymentInput {
    pub unit_id: u64,
    /// Defaults to the unit's owner.
    pub client_id: Option<u64>,
    pub label: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Money,
}

/// A payment input with its client resolved.
struct CheckedPayment {
    unit_id: u64,
    client_id: u64,
    label: Option<String>,
    date: Option<NaiveDate>,
    amount: Money,
}

impl Ledger {
    fn check_payment(&self, input: PaymentInput) -> Result<CheckedPayment> {
        let mut errors = FieldErrors::new();
        non_negative(&mut errors, "amount", input.amount);

        let unit = self.store.unit(input.unit_id);
        if unit.is_none() {
            errors.push("unit_id", format!("unit #{} does not exist", input.unit_id));
        }

        let client_id = input.client_id.or_else(|| unit.and_then(|u| u.client_id));
        match client_id {
            Some(id) if self.store.client(id).is_none() => {
                errors.push("client_id", format!("client #{id} does not exist"));
            }
            Some(_) => {}
            None if unit.is_some() => {
                errors.push("client_id", "is required when the unit has no owner");
            }
            None => {}
        }
        errors.into_result()?;

        Ok(CheckedPayment {
            unit_id: input.unit_id,
            client_id: client_id.unwrap_or_default(),
            label: clean(input.label),
            date: input.date,
            amount: input.amount,
        })
    }

    pub fn add_payment(&mut self, input: PaymentInput) -> Result<u64> {
        let checked = self.check_payment(input)?;
        let id = self.store.next_payment_id();
        let unit_id = checked.unit_id;
        self.store.payments.push(Payment {
            id,
            unit_id,
            client_id: checked.client_id,
            label: checked.label,
            date: checked.date,
            amount: checked.amount,
        });
        info!(payment_id = id, unit_id, amount = %checked.amount, "payment recorded");
        self.recompute(unit_id);
        Ok(id)
    }

    /// Edit a payment. Its amount may not drop below what is already pinned
    /// to invoices, and it may only move to another unit once nothing is
    /// pinned. Moving it recomputes both units.
    pub fn update_payment(&mut self, id: u64, input: PaymentInput) -> Result<()> {
        let old_unit = self
            .store
            .payment(id)
            .map(|p| p.unit_id)
            .ok_or(LedgerError::PaymentNotFound(id))?;
        let checked = self.check_payment(input)?;

        let pinned: Money = self
            .store
            .allocations_for_payment(id)
            .map(|a| a.amount)
            .sum();
        if checked.amount < pinned {
            return Err(LedgerError::PaymentBelowPinned { payment: id, pinned });
        }
        if checked.unit_id != old_unit {
            if let Some(alloc) = self.store.allocations_for_payment(id).next() {
                return Err(LedgerError::AllocationUnitMismatch {
                    payment: id,
                    invoice: alloc.invoice_id,
                });
            }
        }

        let payment = self
            .store
            .payment_mut(id)
            .ok_or(LedgerError::PaymentNotFound(id))?;
        payment.unit_id = checked.unit_id;
        payment.client_id = checked.client_id;
        payment.label = checked.label;
        payment.date = checked.date;
        payment.amount = checked.amount;
        info!(payment_id = id, "payment updated");

        self.recompute_units([old_unit, checked.unit_id]);
        Ok(())
    }

    /// Remove a payment together with its pinned allocations.
    pub fn delete_payment(&mut self, id: u64) -> Result<()> {
        let payment = self
            .store
            .payment(id)
            .cloned()
            .ok_or(LedgerError::PaymentNotFound(id))?;

        let mut touched = vec![payment.unit_id];
        for alloc in self.store.allocations_for_payment(id) {
            if let Some(inv) = self.store.invoice(alloc.invoice_id) {
                touched.push(inv.unit_id);
            }
        }

        self.store.allocations.retain(|a| a.payment_id != id);
        self.store.payments.retain(|p| p.id != id);
        info!(payment_id = id, unit_id = payment.unit_id, "payment deleted");

        self.recompute_units(touched);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ClientInput, UnitInput};

    fn setup() -> (Ledger, u64, u64) {
        let mut ledger = Ledger::new(Default::default());
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let client = ledger
            .create_client(
                ClientInput {
                    full_name: "Driton Gashi".into(),
                    ..Default::default()
                },
                today,
            )
            .unwrap();
        let unit = ledger
            .create_unit(UnitInput {
                block: "7A".into(),
                total_price: Some(Money::from_major(71_725)),
                client_id: Some(client),
                ..Default::default()
            })
            .unwrap();
        (ledger, client, unit)
    }

    #[test]
    fn payment_updates_unit_totals() {
        let (mut ledger, client, unit) = setup();
        let id = ledger
            .add_payment(PaymentInput {
                unit_id: unit,
                amount: Money::from_major(10_000),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(ledger.store.payment(id).unwrap().client_id, client);
        let u = ledger.store.unit(unit).unwrap();
        assert_eq!(u.total_paid, Money::from_major(10_000));
        assert_eq!(u.remaining_debt, Money::from_major(61_725));
        assert_eq!(u.payment_progress.to_string(), "13.94");
    }

    #[test]
    fn payment_on_unsold_unit_needs_a_client() {
        let mut ledger = Ledger::new(Default::default());
        let unit = ledger
            .create_unit(UnitInput {
                block: "7B".into(),
                ..Default::default()
            })
            .unwrap();
        let err = ledger
            .add_payment(PaymentInput {
                unit_id: unit,
                amount: Money::from_major(5),
                ..Default::default()
            })
            .unwrap_err();
        match err {
            LedgerError::Validation(errors) => assert!(errors.has("client_id")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(ledger.store.payments.is_empty());
    }

    #[test]
    fn negative_amount_is_rejected() {
        let (mut ledger, _, unit) = setup();
        let err = ledger
            .add_payment(PaymentInput {
                unit_id: unit,
                amount: Money::from_major(-1),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref e) if e.has("amount")));
    }

    #[test]
    fn deleting_payment_restores_debt() {
        let (mut ledger, _, unit) = setup();
        let id = ledger
            .add_payment(PaymentInput {
                unit_id: unit,
                amount: Money::from_major(1_000),
                ..Default::default()
            })
            .unwrap();
        ledger.delete_payment(id).unwrap();
        let u = ledger.store.unit(unit).unwrap();
        assert_eq!(u.total_paid, Money::ZERO);
        assert_eq!(u.remaining_debt, Money::from_major(71_725));
        assert!(matches!(
            ledger.delete_payment(id),
            Err(LedgerError::PaymentNotFound(_))
        ));
    }

    #[test]
    fn moving_payment_recomputes_both_units() {
        let (mut ledger, client, first) = setup();
        let second = ledger
            .create_unit(UnitInput {
                block: "7B".into(),
                total_price: Some(Money::from_major(1_000)),
                client_id: Some(client),
                ..Default::default()
            })
            .unwrap();
        let id = ledger
            .add_payment(PaymentInput {
                unit_id: first,
                amount: Money::from_major(400),
                ..Default::default()
            })
            .unwrap();

        ledger
            .update_payment(
                id,
                PaymentInput {
                    unit_id: second,
                    amount: Money::from_major(400),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(ledger.store.unit(first).unwrap().total_paid, Money::ZERO);
        assert_eq!(
            ledger.store.unit(second).unwrap().remaining_debt,
            Money::from_major(600)
        );
    }
}
