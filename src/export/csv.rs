use std::io::Write;

use ::csv::WriterBuilder;
use chrono::NaiveDate;
use serde::Serialize;

use super::{ClientFilter, InvoiceFilter, PaymentFilter, UnitFilter};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::money::Money;
use crate::store::{Store, Unit};

const ISO_DATE: &str = "%Y-%m-%d";

#[derive(Serialize)]
struct InvoiceRow<'a> {
    invoice_number: &'a str,
    client: &'a str,
    unit: String,
    issue_date: String,
    due_date: String,
    subtotal: String,
    paid: String,
    remaining: String,
    status: String,
}

#[derive(Serialize)]
struct PaymentRow<'a> {
    date: Option<String>,
    client: &'a str,
    unit: String,
    label: Option<&'a str>,
    amount: String,
}

#[derive(Serialize)]
struct UnitRow<'a> {
    block: &'a str,
    floor: Option<i32>,
    list_number: Option<u32>,
    apartment: Option<&'a str>,
    client: &'a str,
    total_price: String,
    total_paid: String,
    remaining: String,
    progress: String,
    status: String,
}

#[derive(Serialize)]
struct ClientRow<'a> {
    client_id: u64,
    name: &'a str,
    phone: Option<&'a str>,
    residence: Option<&'a str>,
    units: usize,
    total_price: String,
    total_paid: String,
    remaining: String,
}

#[derive(Serialize)]
struct TopClientRow<'a> {
    client_id: u64,
    client_name: &'a str,
    units: usize,
    remaining_debt: String,
}

fn client_name(store: &Store, id: u64) -> &str {
    store.client(id).map(|c| c.full_name.as_str()).unwrap_or("")
}

fn unit_label(store: &Store, id: u64) -> String {
    store
        .unit(id)
        .map(Unit::label)
        .unwrap_or_else(|| id.to_string())
}

/// Invoices matching `filter`, newest issue first.
pub fn write_invoices<W: Write>(
    w: W,
    ledger: &Ledger,
    filter: &InvoiceFilter,
    today: NaiveDate,
) -> Result<usize> {
    let store = &ledger.store;
    let mut invoices: Vec<_> = store
        .invoices
        .iter()
        .filter(|i| filter.matches(i, today))
        .collect();
    invoices.sort_by(|a, b| (b.issue_date, b.id).cmp(&(a.issue_date, a.id)));

    let mut wrt = WriterBuilder::new().from_writer(w);
    for inv in &invoices {
        wrt.serialize(InvoiceRow {
            invoice_number: &inv.invoice_number,
            client: client_name(store, inv.client_id),
            unit: unit_label(store, inv.unit_id),
            issue_date: inv.issue_date.format(ISO_DATE).to_string(),
            due_date: inv.due_date.format(ISO_DATE).to_string(),
            subtotal: inv.subtotal.to_string(),
            paid: inv.total_paid_on_invoice.to_string(),
            remaining: inv.remaining_on_invoice.to_string(),
            status: inv.status().to_string(),
        })?;
    }
    wrt.flush()?;
    Ok(invoices.len())
}

/// Payments matching `filter`, most recent first.
pub fn write_payments<W: Write>(w: W, ledger: &Ledger, filter: &PaymentFilter) -> Result<usize> {
    let store = &ledger.store;
    let mut payments: Vec<_> = store.payments.iter().filter(|p| filter.matches(p)).collect();
    payments.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));

    let mut wrt = WriterBuilder::new().from_writer(w);
    for p in &payments {
        wrt.serialize(PaymentRow {
            date: p.date.map(|d| d.format(ISO_DATE).to_string()),
            client: client_name(store, p.client_id),
            unit: unit_label(store, p.unit_id),
            label: p.label.as_deref(),
            amount: p.amount.to_string(),
        })?;
    }
    wrt.flush()?;
    Ok(payments.len())
}

/// Units matching `filter`, by block, floor and list number.
pub fn write_units<W: Write>(w: W, ledger: &Ledger, filter: &UnitFilter) -> Result<usize> {
    let store = &ledger.store;
    let mut units: Vec<_> = store.units.iter().filter(|u| filter.matches(u)).collect();
    units.sort_by(|a, b| {
        (&a.block, a.floor, a.list_number, a.id).cmp(&(&b.block, b.floor, b.list_number, b.id))
    });

    let mut wrt = WriterBuilder::new().from_writer(w);
    for u in &units {
        wrt.serialize(UnitRow {
            block: &u.block,
            floor: u.floor,
            list_number: u.list_number,
            apartment: u.apartment_number.as_deref(),
            client: u.client_id.map(|id| client_name(store, id)).unwrap_or(""),
            total_price: u.total_price.to_string(),
            total_paid: u.total_paid.to_string(),
            remaining: u.remaining_debt.to_string(),
            progress: u.payment_progress.to_string(),
            status: u.status().to_string(),
        })?;
    }
    wrt.flush()?;
    Ok(units.len())
}

/// Clients matching `filter` with totals over the units they own.
pub fn write_clients<W: Write>(w: W, ledger: &Ledger, filter: &ClientFilter) -> Result<usize> {
    let store = &ledger.store;
    let mut wrt = WriterBuilder::new().from_writer(w);
    let mut count = 0;
    for c in store.clients.iter().filter(|c| filter.matches(c)) {
        let owned: Vec<&Unit> = store
            .units
            .iter()
            .filter(|u| u.client_id == Some(c.id))
            .collect();
        wrt.serialize(ClientRow {
            client_id: c.id,
            name: &c.full_name,
            phone: c.phone.as_deref(),
            residence: c.residence.as_deref(),
            units: owned.len(),
            total_price: owned.iter().map(|u| u.total_price).sum::<Money>().to_string(),
            total_paid: owned.iter().map(|u| u.total_paid).sum::<Money>().to_string(),
            remaining: owned.iter().map(|u| u.remaining_debt).sum::<Money>().to_string(),
        })?;
        count += 1;
    }
    wrt.flush()?;
    Ok(count)
}

/// Clients owning units, by remaining debt descending.
pub fn write_top_clients<W: Write>(w: W, ledger: &Ledger) -> Result<usize> {
    let rows = ledger.debtors();
    let mut wrt = WriterBuilder::new().from_writer(w);
    for row in &rows {
        wrt.serialize(TopClientRow {
            client_id: row.client_id,
            client_name: &row.full_name,
            units: row.units,
            remaining_debt: row.remaining.to_string(),
        })?;
    }
    wrt.flush()?;
    Ok(rows.len())
}
