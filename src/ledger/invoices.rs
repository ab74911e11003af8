use chrono::{Duration, NaiveDate};
use tracing::info;

use super::numbering::NumberPattern;
use super::validate::{clean, non_negative};
use super::Ledger;
use crate::error::{FieldErrors, LedgerError, Result};
use crate::money::Money;
use crate::store::Invoice;

#[derive(Debug, Clone, Default)]
pub struct InvoiceInput {
    /// Generated from the configured template when `None` on create; kept
    /// as-is when `None` on update.
    pub invoice_number: Option<String>,
    /// Defaults to the unit's owner.
    pub client_id: Option<u64>,
    pub unit_id: u64,
    /// Defaults to today.
    pub issue_date: Option<NaiveDate>,
    /// Defaults to the issue date plus the configured payment terms.
    pub due_date: Option<NaiveDate>,
    pub subtotal: Money,
    pub notes: Option<String>,
}

struct CheckedInvoice {
    invoice_number: Option<String>,
    client_id: u64,
    unit_id: u64,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    subtotal: Money,
    notes: Option<String>,
}

impl Ledger {
    fn check_invoice(&self, input: InvoiceInput, today: NaiveDate) -> Result<CheckedInvoice> {
        let mut errors = FieldErrors::new();
        non_negative(&mut errors, "subtotal", input.subtotal);

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

        let invoice_number = input
            .invoice_number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let issue_date = input.issue_date.unwrap_or(today);
        let due_date = input
            .due_date
            .unwrap_or_else(|| issue_date + Duration::days(i64::from(self.due_days)));
        if due_date < issue_date {
            errors.push("due_date", "must not be before the issue date");
        }
        errors.into_result()?;

        Ok(CheckedInvoice {
            invoice_number,
            client_id: client_id.unwrap_or_default(),
            unit_id: input.unit_id,
            issue_date,
            due_date,
            subtotal: input.subtotal,
            notes: clean(input.notes),
        })
    }

    /// The number the next generated invoice issued on `date` would get.
    pub fn next_invoice_number(&self, date: NaiveDate) -> Result<String> {
        let pattern = NumberPattern::for_date(&self.number_format, date);
        let seq = pattern
            .next_sequence(self.store.invoices.iter().map(|i| i.invoice_number.as_str()))?;
        pattern.claim(seq, |n| self.store.invoice_by_number(n).is_some())
    }

    pub fn create_invoice(&mut self, input: InvoiceInput, today: NaiveDate) -> Result<u64> {
        let checked = self.check_invoice(input, today)?;

        let invoice_number = match checked.invoice_number {
            Some(number) => {
                if self.store.invoice_by_number(&number).is_some() {
                    return Err(LedgerError::InvoiceNumberTaken(number));
                }
                number
            }
            None => self.next_invoice_number(checked.issue_date)?,
        };

        let id = self.store.next_invoice_id();
        self.store.invoices.push(Invoice {
            id,
            invoice_number: invoice_number.clone(),
            client_id: checked.client_id,
            unit_id: checked.unit_id,
            issue_date: checked.issue_date,
            due_date: checked.due_date,
            subtotal: checked.subtotal,
            total_paid_on_invoice: Money::ZERO,
            remaining_on_invoice: checked.subtotal,
            notes: checked.notes,
        });
        info!(invoice_id = id, number = %invoice_number, unit_id = checked.unit_id, "invoice created");

        self.recompute(checked.unit_id);
        Ok(id)
    }

    /// Edit an invoice. It may only move to another unit once no payment is
    /// pinned to it; both units are then recomputed.
    pub fn update_invoice(&mut self, id: u64, input: InvoiceInput, today: NaiveDate) -> Result<()> {
        let old_unit = self
            .store
            .invoice(id)
            .map(|i| i.unit_id)
            .ok_or_else(|| LedgerError::InvoiceNotFound(id.to_string()))?;
        let checked = self.check_invoice(input, today)?;

        if let Some(number) = &checked.invoice_number {
            if self
                .store
                .invoice_by_number(number)
                .is_some_and(|other| other.id != id)
            {
                return Err(LedgerError::InvoiceNumberTaken(number.clone()));
            }
        }
        if checked.unit_id != old_unit {
            if let Some(alloc) = self.store.allocations_for_invoice(id).next() {
                return Err(LedgerError::AllocationUnitMismatch {
                    payment: alloc.payment_id,
                    invoice: id,
                });
            }
        }

        let invoice = self
            .store
            .invoice_mut(id)
            .ok_or_else(|| LedgerError::InvoiceNotFound(id.to_string()))?;
        if let Some(number) = checked.invoice_number {
            invoice.invoice_number = number;
        }
        invoice.client_id = checked.client_id;
        invoice.unit_id = checked.unit_id;
        invoice.issue_date = checked.issue_date;
        invoice.due_date = checked.due_date;
        invoice.subtotal = checked.subtotal;
        invoice.notes = checked.notes;
        info!(invoice_id = id, "invoice updated");

        self.recompute_units([old_unit, checked.unit_id]);
        Ok(())
    }

    /// Remove an invoice together with the allocations pinned to it.
    pub fn delete_invoice(&mut self, id: u64) -> Result<()> {
        let unit_id = self
            .store
            .invoice(id)
            .map(|i| i.unit_id)
            .ok_or_else(|| LedgerError::InvoiceNotFound(id.to_string()))?;

        let mut touched = vec![unit_id];
        touched.extend(self.payment_units_pinned_to(id));

        self.store.allocations.retain(|a| a.invoice_id != id);
        self.store.invoices.retain(|i| i.id != id);
        info!(invoice_id = id, unit_id, "invoice deleted");

        self.recompute_units(touched);
        Ok(())
    }

    /// Look an invoice up by number, falling back to its numeric id.
    pub fn find_invoice(&self, reference: &str) -> Result<&Invoice> {
        let reference = reference.trim();
        self.store
            .invoice_by_number(reference)
            .or_else(|| {
                reference
                    .trim_start_matches('#')
                    .parse::<u64>()
                    .ok()
                    .and_then(|id| self.store.invoice(id))
            })
            .ok_or_else(|| LedgerError::InvoiceNotFound(reference.to_string()))
    }

    fn payment_units_pinned_to(&self, invoice_id: u64) -> Vec<u64> {
        self.store
            .allocations_for_invoice(invoice_id)
            .filter_map(|a| self.store.payment(a.payment_id))
            .map(|p| p.unit_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ClientInput, PaymentInput, UnitInput};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup() -> (Ledger, u64) {
        let mut ledger = Ledger::new(Default::default());
        let client = ledger
            .create_client(
                ClientInput {
                    full_name: "Luan Berisha".into(),
                    ..Default::default()
                },
                d(2024, 1, 1),
            )
            .unwrap();
        let unit = ledger
            .create_unit(UnitInput {
                block: "7A".into(),
                total_price: Some(Money::from_major(2_000)),
                client_id: Some(client),
                ..Default::default()
            })
            .unwrap();
        (ledger, unit)
    }

    fn invoice_on(unit_id: u64, issued: NaiveDate, subtotal: i64) -> InvoiceInput {
        InvoiceInput {
            unit_id,
            issue_date: Some(issued),
            subtotal: Money::from_major(subtotal),
            ..Default::default()
        }
    }

    #[test]
    fn generated_numbers_follow_template_and_sequence() {
        let (mut ledger, unit) = setup();
        let today = d(2024, 3, 15);
        let a = ledger.create_invoice(invoice_on(unit, today, 10), today).unwrap();
        let b = ledger.create_invoice(invoice_on(unit, today, 10), today).unwrap();
        assert_eq!(ledger.store.invoice(a).unwrap().invoice_number, "202403-0001");
        assert_eq!(ledger.store.invoice(b).unwrap().invoice_number, "202403-0002");

        let april = d(2024, 4, 2);
        let c = ledger.create_invoice(invoice_on(unit, april, 10), april).unwrap();
        assert_eq!(ledger.store.invoice(c).unwrap().invoice_number, "202404-0001");
    }

    #[test]
    fn highest_possible_custom_number_stops_generation_cleanly() {
        let (mut ledger, unit) = setup();
        let today = d(2024, 3, 15);
        let top = format!("202403-{}", u64::MAX);
        ledger
            .create_invoice(
                InvoiceInput {
                    invoice_number: Some(top.clone()),
                    ..invoice_on(unit, today, 10)
                },
                today,
            )
            .unwrap();
        let before = ledger.store.clone();

        let err = ledger
            .create_invoice(invoice_on(unit, today, 10), today)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvoiceSequenceOverflow(last) if last == top));
        assert_eq!(ledger.store, before);
    }

    #[test]
    fn due_date_defaults_to_payment_terms() {
        let (mut ledger, unit) = setup();
        let issued = d(2024, 1, 10);
        let id = ledger.create_invoice(invoice_on(unit, issued, 10), issued).unwrap();
        assert_eq!(ledger.store.invoice(id).unwrap().due_date, d(2024, 2, 9));
    }

    #[test]
    fn duplicate_custom_number_is_rejected() {
        let (mut ledger, unit) = setup();
        let today = d(2024, 1, 10);
        let mut input = invoice_on(unit, today, 10);
        input.invoice_number = Some("A-1".into());
        ledger.create_invoice(input.clone(), today).unwrap();
        assert!(matches!(
            ledger.create_invoice(input, today),
            Err(LedgerError::InvoiceNumberTaken(n)) if n == "A-1"
        ));
        assert_eq!(ledger.store.invoices.len(), 1);
    }

    #[test]
    fn renumbering_onto_another_invoice_is_rejected() {
        let (mut ledger, unit) = setup();
        let today = d(2024, 1, 10);
        let first = ledger.create_invoice(invoice_on(unit, today, 10), today).unwrap();
        let second = ledger.create_invoice(invoice_on(unit, today, 10), today).unwrap();
        let taken = ledger.store.invoice(first).unwrap().invoice_number.clone();

        let mut edit = invoice_on(unit, today, 10);
        edit.invoice_number = Some(taken.clone());
        assert!(matches!(
            ledger.update_invoice(second, edit.clone(), today),
            Err(LedgerError::InvoiceNumberTaken(_))
        ));
        ledger.update_invoice(first, edit, today).unwrap();
    }

    #[test]
    fn due_before_issue_is_a_field_error() {
        let (mut ledger, unit) = setup();
        let mut input = invoice_on(unit, d(2024, 2, 1), 10);
        input.due_date = Some(d(2024, 1, 1));
        let err = ledger.create_invoice(input, d(2024, 2, 1)).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(ref e) if e.has("due_date")));
    }

    #[test]
    fn moving_invoice_recomputes_old_and_new_unit() {
        let (mut ledger, first) = setup();
        let owner = ledger.store.unit(first).unwrap().client_id;
        let second = ledger
            .create_unit(UnitInput {
                block: "7B".into(),
                total_price: Some(Money::from_major(5_000)),
                client_id: owner,
                ..Default::default()
            })
            .unwrap();
        ledger
            .add_payment(PaymentInput {
                unit_id: first,
                amount: Money::from_major(300),
                ..Default::default()
            })
            .unwrap();

        let today = d(2024, 1, 10);
        let early = ledger.create_invoice(invoice_on(first, d(2024, 1, 1), 200), today).unwrap();
        let late = ledger.create_invoice(invoice_on(first, d(2024, 1, 5), 200), today).unwrap();
        assert_eq!(ledger.store.invoice(late).unwrap().total_paid_on_invoice, Money::from_major(100));

        ledger
            .update_invoice(early, invoice_on(second, d(2024, 1, 1), 200), today)
            .unwrap();

        assert_eq!(ledger.store.invoice(late).unwrap().total_paid_on_invoice, Money::from_major(200));
        let moved = ledger.store.invoice(early).unwrap();
        assert_eq!(moved.total_paid_on_invoice, Money::ZERO);
        assert_eq!(moved.remaining_on_invoice, Money::from_major(200));
    }

    #[test]
    fn find_invoice_by_number_or_id() {
        let (mut ledger, unit) = setup();
        let today = d(2024, 6, 1);
        let id = ledger.create_invoice(invoice_on(unit, today, 10), today).unwrap();
        assert_eq!(ledger.find_invoice("202406-0001").unwrap().id, id);
        assert_eq!(ledger.find_invoice(&id.to_string()).unwrap().id, id);
        assert!(ledger.find_invoice("nope").is_err());
    }
}
