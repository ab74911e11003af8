mod records;

pub use records::{
    Block, Client, Invoice, InvoiceStatus, Payment, PaymentAllocation, Unit, UnitKind, UnitStatus,
};

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::allocation::{InvoiceLine, PaymentLine, PinnedAmount};
use crate::error::{LedgerError, Result};

/// Last id handed out per entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Counters {
    #[serde(default)]
    pub client: u64,
    #[serde(default)]
    pub unit: u64,
    #[serde(default)]
    pub payment: u64,
    #[serde(default)]
    pub invoice: u64,
    #[serde(default)]
    pub allocation: u64,
}

fn bump(slot: &mut u64) -> u64 {
    *slot += 1;
    *slot
}

/// Every record of the ledger, as persisted in `ledger.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Store {
    #[serde(default)]
    pub counters: Counters,
    #[serde(default)]
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub units: Vec<Unit>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub allocations: Vec<PaymentAllocation>,
}

impl Store {
    pub fn next_client_id(&mut self) -> u64 {
        bump(&mut self.counters.client)
    }

    pub fn next_unit_id(&mut self) -> u64 {
        bump(&mut self.counters.unit)
    }

    pub fn next_payment_id(&mut self) -> u64 {
        bump(&mut self.counters.payment)
    }

    pub fn next_invoice_id(&mut self) -> u64 {
        bump(&mut self.counters.invoice)
    }

    pub fn next_allocation_id(&mut self) -> u64 {
        bump(&mut self.counters.allocation)
    }

    pub fn client(&self, id: u64) -> Option<&Client> {
        self.clients.iter().find(|c| c.id == id)
    }

    pub fn client_mut(&mut self, id: u64) -> Option<&mut Client> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    pub fn unit(&self, id: u64) -> Option<&Unit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: u64) -> Option<&mut Unit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn payment(&self, id: u64) -> Option<&Payment> {
        self.payments.iter().find(|p| p.id == id)
    }

    pub fn payment_mut(&mut self, id: u64) -> Option<&mut Payment> {
        self.payments.iter_mut().find(|p| p.id == id)
    }

    pub fn invoice(&self, id: u64) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.id == id)
    }

    pub fn invoice_mut(&mut self, id: u64) -> Option<&mut Invoice> {
        self.invoices.iter_mut().find(|i| i.id == id)
    }

    pub fn invoice_by_number(&self, number: &str) -> Option<&Invoice> {
        self.invoices.iter().find(|i| i.invoice_number == number)
    }

    pub fn allocation(&self, id: u64) -> Option<&PaymentAllocation> {
        self.allocations.iter().find(|a| a.id == id)
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.blocks.iter().any(|b| b.name == name)
    }

    pub fn payments_for_unit(&self, unit_id: u64) -> impl Iterator<Item = &Payment> {
        self.payments.iter().filter(move |p| p.unit_id == unit_id)
    }

    pub fn invoices_for_unit(&self, unit_id: u64) -> impl Iterator<Item = &Invoice> {
        self.invoices.iter().filter(move |i| i.unit_id == unit_id)
    }

    pub fn allocations_for_payment(
        &self,
        payment_id: u64,
    ) -> impl Iterator<Item = &PaymentAllocation> {
        self.allocations
            .iter()
            .filter(move |a| a.payment_id == payment_id)
    }

    pub fn allocations_for_invoice(
        &self,
        invoice_id: u64,
    ) -> impl Iterator<Item = &PaymentAllocation> {
        self.allocations
            .iter()
            .filter(move |a| a.invoice_id == invoice_id)
    }

    /// Allocations whose payment belongs to the unit.
    pub fn allocations_for_unit(&self, unit_id: u64) -> Vec<&PaymentAllocation> {
        self.allocations
            .iter()
            .filter(|a| {
                self.payment(a.payment_id)
                    .is_some_and(|p| p.unit_id == unit_id)
            })
            .collect()
    }

    /// Engine inputs for one unit, ordered `(date, id)` with undated payments first.
    pub fn payment_lines(&self, unit_id: u64) -> Vec<PaymentLine> {
        let mut lines: Vec<PaymentLine> = self
            .payments_for_unit(unit_id)
            .map(|p| PaymentLine {
                id: p.id,
                date: p.date,
                amount: p.amount,
            })
            .collect();
        lines.sort_by_key(|p| (p.date, p.id));
        lines
    }

    /// Engine inputs for one unit, ordered `(issue_date, id)`.
    pub fn invoice_lines(&self, unit_id: u64) -> Vec<InvoiceLine> {
        let mut lines: Vec<InvoiceLine> = self
            .invoices_for_unit(unit_id)
            .map(|i| InvoiceLine {
                id: i.id,
                issue_date: i.issue_date,
                subtotal: i.subtotal,
            })
            .collect();
        lines.sort_by_key(|i| (i.issue_date, i.id));
        lines
    }

    pub fn pinned_lines(&self, unit_id: u64) -> Vec<PinnedAmount> {
        self.allocations_for_unit(unit_id)
            .into_iter()
            .map(to_pinned)
            .collect()
    }

    pub fn pinned_for_payment(&self, payment_id: u64) -> Vec<PinnedAmount> {
        self.allocations_for_payment(payment_id)
            .map(to_pinned)
            .collect()
    }
}

fn to_pinned(a: &PaymentAllocation) -> PinnedAmount {
    PinnedAmount {
        payment_id: a.payment_id,
        invoice_id: a.invoice_id,
        amount: a.amount,
    }
}

/// Load the ledger file; a missing file is an empty ledger.
pub fn load_store(path: &Path) -> Result<Store> {
    if !path.exists() {
        return Ok(Store::default());
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| LedgerError::StoreParse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save the ledger file through a temporary sibling so a failed write never
/// leaves a truncated ledger behind.
pub fn save_store(path: &Path, store: &Store) -> Result<()> {
    let content =
        toml::to_string_pretty(store).map_err(|e| LedgerError::StoreWrite(e.to_string()))?;

    let tmp = tmp_path_for(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|ext| ext.to_str()) {
        Some(existing) => format!("{existing}.tmp"),
        None => String::from("tmp"),
    };
    tmp.set_extension(ext);
    tmp
}
