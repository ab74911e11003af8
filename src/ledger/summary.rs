use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::Ledger;
use crate::error::{LedgerError, Result};
use crate::money::{Money, Percent};
use crate::store::{Client, Invoice, InvoiceStatus, Payment, Unit};

/// How many debtors the dashboard lists.
const TOP_DEBTORS: usize = 5;

/// How far ahead the dashboard looks for upcoming due dates.
pub const UPCOMING_DAYS: i64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct DebtorRow {
    pub client_id: u64,
    pub full_name: String,
    pub units: usize,
    pub remaining: Money,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary {
    pub block: String,
    pub units: usize,
    pub total_price: Money,
    pub total_paid: Money,
    pub remaining: Money,
}

#[derive(Debug, Clone)]
pub struct ClientOverview {
    pub client: Client,
    pub units: Vec<Unit>,
    pub payments: Vec<Payment>,
    pub invoices: Vec<Invoice>,
    pub total_price: Money,
    pub total_paid: Money,
    pub remaining: Money,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub units_total: usize,
    pub units_sold: usize,
    pub expected: Money,
    pub collected: Money,
    pub remaining: Money,
    pub collection_rate: Percent,
    pub invoices_paid: usize,
    pub invoices_partial: usize,
    pub invoices_unpaid: usize,
    pub overdue: Vec<Invoice>,
    pub upcoming: Vec<Invoice>,
    pub invoiced_this_month: Money,
    pub collected_this_month: Money,
    pub new_clients_this_month: usize,
    pub top_debtors: Vec<DebtorRow>,
}

impl Dashboard {
    pub fn overdue_total(&self) -> Money {
        self.overdue.iter().map(|i| i.remaining_on_invoice).sum()
    }

    pub fn upcoming_total(&self) -> Money {
        self.upcoming.iter().map(|i| i.remaining_on_invoice).sum()
    }
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

impl Ledger {
    pub fn dashboard(&self, today: NaiveDate) -> Dashboard {
        let units = &self.store.units;
        let invoices = &self.store.invoices;

        let expected: Money = units.iter().map(|u| u.total_price).sum();
        let collected: Money = units.iter().map(|u| u.total_paid).sum();
        let remaining: Money = units.iter().map(|u| u.remaining_debt).sum();

        let count_status =
            |status: InvoiceStatus| invoices.iter().filter(|i| i.status() == status).count();

        let mut overdue: Vec<Invoice> = invoices
            .iter()
            .filter(|i| i.is_overdue(today))
            .cloned()
            .collect();
        overdue.sort_by_key(|i| (i.due_date, i.id));
        let mut upcoming: Vec<Invoice> = invoices
            .iter()
            .filter(|i| i.is_due_within(today, UPCOMING_DAYS))
            .cloned()
            .collect();
        upcoming.sort_by_key(|i| (i.due_date, i.id));

        let mut top_debtors = self.debtors();
        top_debtors.truncate(TOP_DEBTORS);

        Dashboard {
            units_total: units.len(),
            units_sold: units
                .iter()
                .filter(|u| u.client_id.is_some() || u.total_price.is_positive())
                .count(),
            expected,
            collected,
            remaining,
            collection_rate: Percent::of(collected, expected),
            invoices_paid: count_status(InvoiceStatus::Paid),
            invoices_partial: count_status(InvoiceStatus::Partial),
            invoices_unpaid: count_status(InvoiceStatus::Unpaid),
            overdue,
            upcoming,
            invoiced_this_month: invoices
                .iter()
                .filter(|i| same_month(i.issue_date, today))
                .map(|i| i.subtotal)
                .sum(),
            collected_this_month: self
                .store
                .payments
                .iter()
                .filter(|p| p.date.is_some_and(|d| same_month(d, today)))
                .map(|p| p.amount)
                .sum(),
            new_clients_this_month: self
                .store
                .clients
                .iter()
                .filter(|c| same_month(c.created_at, today))
                .count(),
            top_debtors,
        }
    }

    /// Every client owning at least one unit, by remaining debt descending.
    pub fn debtors(&self) -> Vec<DebtorRow> {
        let mut by_client: BTreeMap<u64, (usize, Money)> = BTreeMap::new();
        for unit in &self.store.units {
            if let Some(client_id) = unit.client_id {
                let entry = by_client.entry(client_id).or_insert((0, Money::ZERO));
                entry.0 += 1;
                entry.1 += unit.remaining_debt;
            }
        }

        let mut rows: Vec<DebtorRow> = by_client
            .into_iter()
            .map(|(client_id, (units, remaining))| DebtorRow {
                client_id,
                full_name: self
                    .store
                    .client(client_id)
                    .map(|c| c.full_name.clone())
                    .unwrap_or_else(|| format!("Client {client_id}")),
                units,
                remaining,
            })
            .collect();
        rows.sort_by(|a, b| b.remaining.cmp(&a.remaining).then(a.client_id.cmp(&b.client_id)));
        rows
    }

    /// Per-block totals, including registered blocks that have no units yet.
    pub fn block_summaries(&self) -> Vec<BlockSummary> {
        let mut blocks: BTreeMap<&str, BlockSummary> = self
            .store
            .blocks
            .iter()
            .map(|b| {
                (
                    b.name.as_str(),
                    BlockSummary {
                        block: b.name.clone(),
                        units: 0,
                        total_price: Money::ZERO,
                        total_paid: Money::ZERO,
                        remaining: Money::ZERO,
                    },
                )
            })
            .collect();

        for unit in &self.store.units {
            let summary = blocks.entry(unit.block.as_str()).or_insert_with(|| BlockSummary {
                block: unit.block.clone(),
                units: 0,
                total_price: Money::ZERO,
                total_paid: Money::ZERO,
                remaining: Money::ZERO,
            });
            summary.units += 1;
            summary.total_price += unit.total_price;
            summary.total_paid += unit.total_paid;
            summary.remaining += unit.remaining_debt;
        }
        blocks.into_values().collect()
    }

    pub fn client_overview(&self, client_id: u64) -> Result<ClientOverview> {
        let client = self
            .store
            .client(client_id)
            .cloned()
            .ok_or(LedgerError::ClientNotFound(client_id))?;

        let units: Vec<Unit> = self
            .store
            .units
            .iter()
            .filter(|u| u.client_id == Some(client_id))
            .cloned()
            .collect();
        let mut payments: Vec<Payment> = self
            .store
            .payments
            .iter()
            .filter(|p| p.client_id == client_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.date, p.id));
        let mut invoices: Vec<Invoice> = self
            .store
            .invoices
            .iter()
            .filter(|i| i.client_id == client_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.issue_date, i.id));

        Ok(ClientOverview {
            total_price: units.iter().map(|u| u.total_price).sum(),
            total_paid: units.iter().map(|u| u.total_paid).sum(),
            remaining: units.iter().map(|u| u.remaining_debt).sum(),
            client,
            units,
            payments,
            invoices,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ClientInput, InvoiceInput, PaymentInput, UnitInput};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn client(ledger: &mut Ledger, name: &str) -> u64 {
        ledger
            .create_client(
                ClientInput {
                    full_name: name.into(),
                    ..Default::default()
                },
                d(2024, 5, 2),
            )
            .unwrap()
    }

    fn unit(ledger: &mut Ledger, block: &str, price: i64, owner: Option<u64>) -> u64 {
        ledger
            .create_unit(UnitInput {
                block: block.into(),
                total_price: Some(Money::from_major(price)),
                client_id: owner,
                ..Default::default()
            })
            .unwrap()
    }

    fn populated() -> (Ledger, u64, u64) {
        let mut ledger = Ledger::new(Default::default());
        let arta = client(&mut ledger, "Arta");
        let besnik = client(&mut ledger, "Besnik");
        let a1 = unit(&mut ledger, "7A", 1_000, Some(arta));
        unit(&mut ledger, "7A", 3_000, Some(besnik));
        unit(&mut ledger, "7B", 0, None);
        ledger.create_block("7C").unwrap();

        ledger
            .add_payment(PaymentInput {
                unit_id: a1,
                date: Some(d(2024, 5, 10)),
                amount: Money::from_major(600),
                ..Default::default()
            })
            .unwrap();
        for (issued, due) in [(d(2024, 4, 1), d(2024, 4, 30)), (d(2024, 5, 1), d(2024, 6, 1))] {
            ledger
                .create_invoice(
                    InvoiceInput {
                        unit_id: a1,
                        issue_date: Some(issued),
                        due_date: Some(due),
                        subtotal: Money::from_major(500),
                        ..Default::default()
                    },
                    issued,
                )
                .unwrap();
        }
        (ledger, arta, besnik)
    }

    #[test]
    fn dashboard_totals() {
        let (ledger, _, besnik) = populated();
        let dash = ledger.dashboard(d(2024, 5, 15));

        assert_eq!(dash.units_total, 3);
        assert_eq!(dash.units_sold, 2);
        assert_eq!(dash.expected, Money::from_major(4_000));
        assert_eq!(dash.collected, Money::from_major(600));
        assert_eq!(dash.remaining, Money::from_major(3_400));
        assert_eq!(dash.collection_rate.to_string(), "15.00");

        assert_eq!(dash.invoices_paid, 1);
        assert_eq!(dash.invoices_partial, 1);
        assert_eq!(dash.invoices_unpaid, 0);
        assert!(dash.overdue.is_empty());
        assert_eq!(dash.upcoming.len(), 1);
        assert_eq!(dash.upcoming_total(), Money::from_major(400));

        assert_eq!(dash.invoiced_this_month, Money::from_major(500));
        assert_eq!(dash.collected_this_month, Money::from_major(600));
        assert_eq!(dash.new_clients_this_month, 2);
        assert_eq!(dash.top_debtors[0].client_id, besnik);
    }

    #[test]
    fn overdue_after_due_date() {
        let (ledger, _, _) = populated();
        let dash = ledger.dashboard(d(2024, 6, 5));
        assert_eq!(dash.overdue.len(), 1);
        assert_eq!(dash.overdue_total(), Money::from_major(400));
    }

    #[test]
    fn blocks_include_empty_registered_ones() {
        let (ledger, _, _) = populated();
        let blocks = ledger.block_summaries();
        let names: Vec<&str> = blocks.iter().map(|b| b.block.as_str()).collect();
        assert_eq!(names, ["7A", "7B", "7C"]);
        assert_eq!(blocks[0].units, 2);
        assert_eq!(blocks[0].remaining, Money::from_major(3_400));
        assert_eq!(blocks[2].units, 0);
    }

    #[test]
    fn client_overview_collects_records() {
        let (ledger, arta, _) = populated();
        let overview = ledger.client_overview(arta).unwrap();
        assert_eq!(overview.units.len(), 1);
        assert_eq!(overview.payments.len(), 1);
        assert_eq!(overview.invoices.len(), 2);
        assert_eq!(overview.remaining, Money::from_major(400));
        assert!(matches!(
            ledger.client_overview(99),
            Err(LedgerError::ClientNotFound(99))
        ));
    }
}
