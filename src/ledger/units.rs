use chrono::NaiveDate;
use tracing::info;

use super::validate::{clean, non_negative};
use super::Ledger;
use crate::error::{FieldErrors, LedgerError, Result};
use crate::money::{Money, Percent};
use crate::store::{Unit, UnitKind, UnitStatus};

#[derive(Debug, Clone, Default)]
pub struct UnitInput {
    pub block: String,
    pub kind: UnitKind,
    pub list_number: Option<u32>,
    pub floor: Option<i32>,
    pub apartment_number: Option<String>,
    pub area_m2: Option<f64>,
    pub price_per_m2: Option<Money>,
    pub total_price: Option<Money>,
    pub sale_date: Option<NaiveDate>,
    pub contract_info: Option<String>,
    pub comments: Option<String>,
    pub client_id: Option<u64>,
}

/// Pricing edits that leave the rest of the unit alone.
#[derive(Debug, Clone, Default)]
pub struct UnitPatch {
    pub price_per_m2: Option<Money>,
    pub total_price: Option<Money>,
    pub comments: Option<String>,
}

impl Ledger {
    fn check_unit(&self, input: UnitInput) -> Result<UnitInput> {
        let input = UnitInput {
            block: input.block.trim().to_string(),
            apartment_number: clean(input.apartment_number),
            contract_info: clean(input.contract_info),
            comments: clean(input.comments),
            ..input
        };

        let mut errors = FieldErrors::new();
        if input.block.is_empty() {
            errors.push("block", "is required");
        }
        if let Some(area) = input.area_m2 {
            if !area.is_finite() || area < 0.0 {
                errors.push("area_m2", "must be a non-negative number");
            }
        }
        if let Some(price) = input.price_per_m2 {
            non_negative(&mut errors, "price_per_m2", price);
        }
        if let Some(total) = input.total_price {
            non_negative(&mut errors, "total_price", total);
        }
        if let Some(client_id) = input.client_id {
            if self.store.client(client_id).is_none() {
                errors.push("client_id", format!("client #{client_id} does not exist"));
            }
        }
        errors.into_result()?;
        Ok(input)
    }

    pub fn create_unit(&mut self, input: UnitInput) -> Result<u64> {
        let input = self.check_unit(input)?;
        let id = self.store.next_unit_id();
        self.store.units.push(Unit {
            id,
            block: input.block,
            kind: input.kind,
            list_number: input.list_number,
            floor: input.floor,
            apartment_number: input.apartment_number,
            area_m2: input.area_m2,
            price_per_m2: input.price_per_m2,
            total_price: input.total_price.unwrap_or_default(),
            sale_date: input.sale_date,
            contract_info: input.contract_info,
            comments: input.comments,
            client_id: input.client_id,
            total_paid: Money::ZERO,
            remaining_debt: Money::ZERO,
            payment_progress: Percent::ZERO,
        });
        self.recompute_unit(id);
        info!(unit_id = id, "unit created");
        Ok(id)
    }

    pub fn update_unit(&mut self, id: u64, patch: UnitPatch) -> Result<()> {
        let mut errors = FieldErrors::new();
        if let Some(price) = patch.price_per_m2 {
            non_negative(&mut errors, "price_per_m2", price);
        }
        if let Some(total) = patch.total_price {
            non_negative(&mut errors, "total_price", total);
        }
        errors.into_result()?;

        let unit = self
            .store
            .unit_mut(id)
            .ok_or(LedgerError::UnitNotFound(id))?;
        if let Some(price) = patch.price_per_m2 {
            unit.price_per_m2 = Some(price);
        }
        if let Some(total) = patch.total_price {
            unit.total_price = total;
        }
        if let Some(comments) = clean(patch.comments) {
            unit.comments = Some(comments);
        }
        self.recompute_unit(id);
        info!(unit_id = id, "unit updated");
        Ok(())
    }

    /// Replace every editable field of the unit. Derived totals are recomputed.
    pub fn update_unit_full(&mut self, id: u64, input: UnitInput) -> Result<()> {
        if self.store.unit(id).is_none() {
            return Err(LedgerError::UnitNotFound(id));
        }
        let input = self.check_unit(input)?;
        let unit = self
            .store
            .unit_mut(id)
            .ok_or(LedgerError::UnitNotFound(id))?;
        unit.block = input.block;
        unit.kind = input.kind;
        unit.list_number = input.list_number;
        unit.floor = input.floor;
        unit.apartment_number = input.apartment_number;
        unit.area_m2 = input.area_m2;
        unit.price_per_m2 = input.price_per_m2;
        unit.total_price = input.total_price.unwrap_or_default();
        unit.sale_date = input.sale_date;
        unit.contract_info = input.contract_info;
        unit.comments = input.comments;
        unit.client_id = input.client_id;
        self.recompute_unit(id);
        info!(unit_id = id, "unit replaced");
        Ok(())
    }

    pub fn unit_status(&self, id: u64) -> Result<UnitStatus> {
        self.store
            .unit(id)
            .map(Unit::status)
            .ok_or(LedgerError::UnitNotFound(id))
    }

    /// Refused while the unit has payments or invoices.
    pub fn delete_unit(&mut self, id: u64) -> Result<()> {
        if self.store.unit(id).is_none() {
            return Err(LedgerError::UnitNotFound(id));
        }
        let in_use = self.store.payments_for_unit(id).next().is_some()
            || self.store.invoices_for_unit(id).next().is_some();
        if in_use {
            return Err(LedgerError::UnitInUse(id));
        }
        self.store.units.retain(|u| u.id != id);
        info!(unit_id = id, "unit deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Ledger, u64) {
        let mut ledger = Ledger::new(Default::default());
        let id = ledger
            .create_unit(UnitInput {
                block: "7A".into(),
                list_number: Some(1),
                area_m2: Some(75.5),
                price_per_m2: Some(Money::from_major(950)),
                total_price: Some(Money::from_major(71_725)),
                ..Default::default()
            })
            .unwrap();
        (ledger, id)
    }

    #[test]
    fn new_unit_starts_with_full_debt() {
        let (ledger, id) = seeded();
        let unit = ledger.store.unit(id).unwrap();
        assert_eq!(unit.total_paid, Money::ZERO);
        assert_eq!(unit.remaining_debt, Money::from_major(71_725));
        assert_eq!(unit.payment_progress, Percent::ZERO);
    }

    #[test]
    fn price_change_recomputes_debt() {
        let (mut ledger, id) = seeded();
        ledger
            .update_unit(
                id,
                UnitPatch {
                    total_price: Some(Money::from_major(80_000)),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(
            ledger.store.unit(id).unwrap().remaining_debt,
            Money::from_major(80_000)
        );
    }

    #[test]
    fn invalid_unit_is_not_written() {
        let mut ledger = Ledger::new(Default::default());
        let result = ledger.create_unit(UnitInput {
            block: " ".into(),
            area_m2: Some(-3.0),
            total_price: Some(Money::from_major(-1)),
            client_id: Some(42),
            ..Default::default()
        });
        match result {
            Err(LedgerError::Validation(errors)) => {
                for field in ["block", "area_m2", "total_price", "client_id"] {
                    assert!(errors.has(field), "missing {field}");
                }
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(ledger.store.units.is_empty());
        assert_eq!(ledger.store.counters.unit, 0);
    }

    #[test]
    fn missing_unit_is_reported() {
        let mut ledger = Ledger::new(Default::default());
        assert!(matches!(
            ledger.update_unit(9, UnitPatch::default()),
            Err(LedgerError::UnitNotFound(9))
        ));
        assert!(matches!(
            ledger.delete_unit(9),
            Err(LedgerError::UnitNotFound(9))
        ));
    }
}
