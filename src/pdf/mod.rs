//! Printable invoice and client statement documents.
//!
//! Builders here collect everything a page shows into plain serialisable
//! structs with amounts and dates already formatted; [`typst`] renders them.

mod typst;

pub use typst::{render_invoice, render_statement};

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::{Company, Config};
use crate::error::{LedgerError, Result};
use crate::format::{format_date, format_money, format_opt_date};
use crate::ledger::Ledger;
use crate::money::Money;
use crate::store::{Client, Unit};

#[derive(Debug, Clone, Serialize)]
pub struct Party {
    pub name: String,
    pub lines: Vec<String>,
    pub tax_id: Option<String>,
}

impl Party {
    fn company(company: &Company) -> Self {
        let place = [company.city.as_deref(), company.country.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        let lines = [
            company.address.clone(),
            Some(place).filter(|p| !p.is_empty()),
            company.email.clone(),
            company.phone.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();
        Self {
            name: company.name.clone(),
            lines,
            tax_id: company.tax_id.clone(),
        }
    }

    fn client(client: &Client) -> Self {
        let lines = [
            client.residence.clone(),
            client.phone.clone(),
            client.email.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();
        Self {
            name: client.full_name.clone(),
            lines,
            tax_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitLine {
    pub label: String,
    pub kind: String,
    pub area: Option<String>,
    pub price: String,
}

/// A payment (or part of one) counted towards the invoice.
#[derive(Debug, Clone, Serialize)]
pub struct ContributionLine {
    pub payment: String,
    pub date: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceDocument {
    pub number: String,
    pub issue_date: String,
    pub due_date: String,
    pub status: String,
    pub company: Party,
    pub bill_to: Party,
    pub unit: UnitLine,
    pub subtotal: String,
    pub paid: String,
    pub remaining: String,
    pub pinned: String,
    pub in_order: String,
    pub contributions: Vec<ContributionLine>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementRow {
    pub number: String,
    pub unit: String,
    pub issue_date: String,
    pub due_date: String,
    pub subtotal: String,
    pub paid: String,
    pub remaining: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementUnit {
    pub label: String,
    pub price: String,
    pub paid: String,
    pub remaining: String,
    pub progress: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementDocument {
    pub generated: String,
    pub company: Party,
    pub client: Party,
    pub units: Vec<StatementUnit>,
    pub rows: Vec<StatementRow>,
    pub invoiced: String,
    pub paid: String,
    pub remaining: String,
    pub unit_remaining: String,
}

fn unit_line(unit: &Unit, symbol: &str) -> UnitLine {
    UnitLine {
        label: unit.label(),
        kind: unit.kind.to_string(),
        area: unit.area_m2.map(|a| format!("{a:.2} m²")),
        price: format_money(unit.total_price, symbol),
    }
}

pub fn invoice_document(ledger: &Ledger, config: &Config, invoice_id: u64) -> Result<InvoiceDocument> {
    let store = &ledger.store;
    let settings = &config.invoice;
    let symbol = settings.currency_symbol.as_str();
    let money = |m: Money| format_money(m, symbol);

    let invoice = store
        .invoice(invoice_id)
        .ok_or_else(|| LedgerError::InvoiceNotFound(invoice_id.to_string()))?;
    let client = store
        .client(invoice.client_id)
        .ok_or(LedgerError::ClientNotFound(invoice.client_id))?;
    let unit = store
        .unit(invoice.unit_id)
        .ok_or(LedgerError::UnitNotFound(invoice.unit_id))?;

    let coverage = ledger
        .allocation_for_unit(unit.id)
        .and_then(|a| a.coverage_for(invoice.id).cloned());
    let (pinned, in_order) = coverage
        .map(|c| (c.explicit, c.fifo))
        .unwrap_or((Money::ZERO, Money::ZERO));

    let contributions = store
        .allocations_for_invoice(invoice.id)
        .filter_map(|a| store.payment(a.payment_id).map(|p| (p, a.amount)))
        .map(|(p, amount)| ContributionLine {
            payment: p.label.clone().unwrap_or_else(|| format!("Payment #{}", p.id)),
            date: format_opt_date(p.date, &settings.date_format),
            amount: money(amount),
        })
        .collect();

    Ok(InvoiceDocument {
        number: invoice.invoice_number.clone(),
        issue_date: format_date(invoice.issue_date, &settings.date_format),
        due_date: format_date(invoice.due_date, &settings.date_format),
        status: invoice.status().to_string(),
        company: Party::company(&config.company),
        bill_to: Party::client(client),
        unit: unit_line(unit, symbol),
        subtotal: money(invoice.subtotal),
        paid: money(invoice.total_paid_on_invoice),
        remaining: money(invoice.remaining_on_invoice),
        pinned: money(pinned),
        in_order: money(in_order),
        contributions,
        notes: invoice.notes.clone(),
    })
}

pub fn statement_document(
    ledger: &Ledger,
    config: &Config,
    client_id: u64,
    today: NaiveDate,
) -> Result<StatementDocument> {
    let settings = &config.invoice;
    let symbol = settings.currency_symbol.as_str();
    let money = |m: Money| format_money(m, symbol);
    let overview = ledger.client_overview(client_id)?;

    let units = overview
        .units
        .iter()
        .map(|u| StatementUnit {
            label: u.label(),
            price: money(u.total_price),
            paid: money(u.total_paid),
            remaining: money(u.remaining_debt),
            progress: format!("{}%", u.payment_progress),
        })
        .collect();

    let rows = overview
        .invoices
        .iter()
        .map(|i| StatementRow {
            number: i.invoice_number.clone(),
            unit: ledger
                .store
                .unit(i.unit_id)
                .map(Unit::label)
                .unwrap_or_else(|| i.unit_id.to_string()),
            issue_date: format_date(i.issue_date, &settings.date_format),
            due_date: format_date(i.due_date, &settings.date_format),
            subtotal: money(i.subtotal),
            paid: money(i.total_paid_on_invoice),
            remaining: money(i.remaining_on_invoice),
            status: i.status().to_string(),
        })
        .collect();

    Ok(StatementDocument {
        generated: format_date(today, &settings.date_format),
        company: Party::company(&config.company),
        client: Party::client(&overview.client),
        units,
        rows,
        invoiced: money(overview.invoices.iter().map(|i| i.subtotal).sum()),
        paid: money(overview.invoices.iter().map(|i| i.total_paid_on_invoice).sum()),
        remaining: money(overview.invoices.iter().map(|i| i.remaining_on_invoice).sum()),
        unit_remaining: money(overview.remaining),
    })
}

/// `invoice-202401-0001.pdf`, with path separators replaced.
pub fn invoice_file_name(number: &str) -> String {
    format!("invoice-{}.pdf", number.replace(['/', '\\'], "-"))
}

pub fn statement_file_name(client_id: u64, today: NaiveDate) -> String {
    format!("statement-{}-{}.pdf", client_id, today.format("%Y%m%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AllocationInput, ClientInput, InvoiceInput, PaymentInput, UnitInput};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn setup() -> (Ledger, u64, u64, u64) {
        let mut ledger = Ledger::new(Default::default());
        let client = ledger
            .create_client(
                ClientInput {
                    full_name: "Arta Krasniqi".into(),
                    residence: Some("Prishtine".into()),
                    ..Default::default()
                },
                d(2024, 1, 1),
            )
            .unwrap();
        let unit = ledger
            .create_unit(UnitInput {
                block: "7A".into(),
                apartment_number: Some("12".into()),
                area_m2: Some(75.5),
                total_price: Some(Money::from_major(71_725)),
                client_id: Some(client),
                ..Default::default()
            })
            .unwrap();
        let payment = ledger
            .add_payment(PaymentInput {
                unit_id: unit,
                label: Some("Deposit".into()),
                date: Some(d(2024, 1, 10)),
                amount: Money::from_major(1_000),
                ..Default::default()
            })
            .unwrap();
        let jan = ledger
            .create_invoice(
                InvoiceInput {
                    unit_id: unit,
                    issue_date: Some(d(2024, 1, 5)),
                    subtotal: Money::from_major(1_000),
                    ..Default::default()
                },
                d(2024, 1, 5),
            )
            .unwrap();
        let feb = ledger
            .create_invoice(
                InvoiceInput {
                    unit_id: unit,
                    issue_date: Some(d(2024, 2, 5)),
                    subtotal: Money::from_major(1_000),
                    ..Default::default()
                },
                d(2024, 2, 5),
            )
            .unwrap();
        ledger
            .add_allocation(AllocationInput {
                payment_id: payment,
                invoice_id: feb,
                amount: Money::from_major(800),
            })
            .unwrap();
        (ledger, client, jan, feb)
    }

    #[test]
    fn invoice_document_splits_pinned_and_in_order() {
        let (ledger, _, jan, feb) = setup();
        let config = Config::default();

        let doc = invoice_document(&ledger, &config, feb).unwrap();
        assert_eq!(doc.number, "202402-0001");
        assert_eq!(doc.issue_date, "05/02/2024");
        assert_eq!(doc.unit.label, "7A-12");
        assert_eq!(doc.unit.area.as_deref(), Some("75.50 m²"));
        assert_eq!(doc.paid, "€800.00");
        assert_eq!(doc.pinned, "€800.00");
        assert_eq!(doc.in_order, "€0.00");
        assert_eq!(doc.contributions.len(), 1);
        assert_eq!(doc.contributions[0].payment, "Deposit");

        let doc = invoice_document(&ledger, &config, jan).unwrap();
        assert_eq!(doc.in_order, "€200.00");
        assert_eq!(doc.remaining, "€800.00");
        assert_eq!(doc.bill_to.lines, ["Prishtine"]);
    }

    #[test]
    fn statement_totals() {
        let (ledger, client, _, _) = setup();
        let doc = statement_document(&ledger, &Config::default(), client, d(2024, 3, 1)).unwrap();
        assert_eq!(doc.rows.len(), 2);
        assert_eq!(doc.invoiced, "€2,000.00");
        assert_eq!(doc.paid, "€1,000.00");
        assert_eq!(doc.remaining, "€1,000.00");
        assert_eq!(doc.unit_remaining, "€70,725.00");
        assert_eq!(doc.generated, "01/03/2024");
    }

    #[test]
    fn file_names_are_path_safe() {
        assert_eq!(invoice_file_name("2024/01-7"), "invoice-2024-01-7.pdf");
        assert_eq!(
            statement_file_name(3, d(2024, 3, 1)),
            "statement-3-20240301.pdf"
        );
    }
}
