//! CSV exports of ledger records.
//!
//! Filters decide which records go out; [`csv`] turns them into rows. Every
//! writer returns the number of data rows written (the header is not counted).

pub mod csv;

pub use self::csv::{
    write_clients, write_invoices, write_payments, write_top_clients, write_units,
};

use chrono::NaiveDate;

use crate::ledger::UPCOMING_DAYS;
use crate::store::{Client, Invoice, InvoiceStatus, Payment, Unit, UnitStatus};

/// Open invoices by due date relative to today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueWindow {
    /// Remaining above zero and due before today.
    Overdue,
    /// Remaining above zero and due within the next thirty days.
    Next30,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub client_id: Option<u64>,
    pub unit_id: Option<u64>,
    pub status: Option<InvoiceStatus>,
    /// Issued on or after.
    pub issued_from: Option<NaiveDate>,
    /// Issued strictly before.
    pub issued_to: Option<NaiveDate>,
    pub due: Option<DueWindow>,
}

impl InvoiceFilter {
    pub fn overdue() -> Self {
        Self {
            due: Some(DueWindow::Overdue),
            ..Default::default()
        }
    }

    pub fn next30() -> Self {
        Self {
            due: Some(DueWindow::Next30),
            ..Default::default()
        }
    }

    pub fn matches(&self, invoice: &Invoice, today: NaiveDate) -> bool {
        if self.client_id.is_some_and(|id| invoice.client_id != id) {
            return false;
        }
        if self.unit_id.is_some_and(|id| invoice.unit_id != id) {
            return false;
        }
        if self.status.is_some_and(|s| invoice.status() != s) {
            return false;
        }
        if self.issued_from.is_some_and(|d| invoice.issue_date < d) {
            return false;
        }
        if self.issued_to.is_some_and(|d| invoice.issue_date >= d) {
            return false;
        }
        match self.due {
            Some(DueWindow::Overdue) => invoice.is_overdue(today),
            Some(DueWindow::Next30) => invoice.is_due_within(today, UPCOMING_DAYS),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub client_id: Option<u64>,
    pub unit_id: Option<u64>,
    /// Paid on or after; undated payments never match a date bound.
    pub from: Option<NaiveDate>,
    /// Paid on or before.
    pub to: Option<NaiveDate>,
}

impl PaymentFilter {
    pub fn matches(&self, payment: &Payment) -> bool {
        if self.client_id.is_some_and(|id| payment.client_id != id) {
            return false;
        }
        if self.unit_id.is_some_and(|id| payment.unit_id != id) {
            return false;
        }
        if let Some(from) = self.from {
            if !payment.date.is_some_and(|d| d >= from) {
                return false;
            }
        }
        if let Some(to) = self.to {
            if !payment.date.is_some_and(|d| d <= to) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub block: Option<String>,
    pub floor: Option<i32>,
    pub status: Option<UnitStatus>,
    pub client_id: Option<u64>,
}

impl UnitFilter {
    pub fn matches(&self, unit: &Unit) -> bool {
        if self.block.as_deref().is_some_and(|b| unit.block != b) {
            return false;
        }
        if self.floor.is_some() && unit.floor != self.floor {
            return false;
        }
        if self.status.is_some_and(|s| unit.status() != s) {
            return false;
        }
        if self.client_id.is_some() && unit.client_id != self.client_id {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientFilter {
    /// Substring of the full name or phone, case-insensitive.
    pub query: Option<String>,
}

impl ClientFilter {
    pub fn matches(&self, client: &Client) -> bool {
        let Some(query) = self.query.as_deref().map(str::to_lowercase) else {
            return true;
        };
        client.full_name.to_lowercase().contains(&query)
            || client
                .phone
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(&query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn invoice(due: NaiveDate, paid: i64, remaining: i64) -> Invoice {
        Invoice {
            id: 1,
            invoice_number: "202401-0001".into(),
            client_id: 1,
            unit_id: 1,
            issue_date: d(2024, 1, 1),
            due_date: due,
            subtotal: Money::from_major(paid + remaining),
            total_paid_on_invoice: Money::from_major(paid),
            remaining_on_invoice: Money::from_major(remaining),
            notes: None,
        }
    }

    #[test]
    fn due_windows() {
        let today = d(2024, 3, 1);
        let late = invoice(d(2024, 2, 1), 0, 100);
        let soon = invoice(d(2024, 3, 20), 50, 50);
        let settled = invoice(d(2024, 2, 1), 100, 0);
        let far = invoice(d(2024, 6, 1), 0, 100);

        let overdue = InvoiceFilter::overdue();
        assert!(overdue.matches(&late, today));
        assert!(!overdue.matches(&soon, today));
        assert!(!overdue.matches(&settled, today));

        let next30 = InvoiceFilter::next30();
        assert!(next30.matches(&soon, today));
        assert!(!next30.matches(&far, today));
        assert!(!next30.matches(&late, today));
    }

    #[test]
    fn issue_range_is_half_open() {
        let inv = invoice(d(2024, 2, 1), 0, 100);
        let filter = InvoiceFilter {
            issued_from: Some(d(2024, 1, 1)),
            issued_to: Some(d(2024, 1, 2)),
            ..Default::default()
        };
        assert!(filter.matches(&inv, d(2024, 1, 1)));
        let filter = InvoiceFilter {
            issued_to: Some(d(2024, 1, 1)),
            ..Default::default()
        };
        assert!(!filter.matches(&inv, d(2024, 1, 1)));
    }

    #[test]
    fn status_filter_uses_invoice_status() {
        let inv = invoice(d(2024, 2, 1), 50, 50);
        let partial = InvoiceFilter {
            status: Some(InvoiceStatus::Partial),
            ..Default::default()
        };
        let paid = InvoiceFilter {
            status: Some(InvoiceStatus::Paid),
            ..Default::default()
        };
        assert!(partial.matches(&inv, d(2024, 1, 1)));
        assert!(!paid.matches(&inv, d(2024, 1, 1)));
    }

    #[test]
    fn undated_payments_fall_outside_date_bounds() {
        let payment = Payment {
            id: 1,
            unit_id: 1,
            client_id: 1,
            label: None,
            date: None,
            amount: Money::from_major(10),
        };
        assert!(PaymentFilter::default().matches(&payment));
        let bounded = PaymentFilter {
            from: Some(d(2024, 1, 1)),
            ..Default::default()
        };
        assert!(!bounded.matches(&payment));
    }

    #[test]
    fn client_query_matches_name_or_phone() {
        let client = Client {
            id: 1,
            full_name: "Arta Krasniqi".into(),
            residence: None,
            phone: Some("044-123".into()),
            email: None,
            created_at: d(2024, 1, 1),
        };
        let by = |q: &str| ClientFilter {
            query: Some(q.into()),
        };
        assert!(by("krasn").matches(&client));
        assert!(by("044").matches(&client));
        assert!(!by("besa").matches(&client));
    }
}
