use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::money::{Money, Percent};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Client {
    pub id: u64,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Block {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    #[default]
    Apartment,
    Local,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitKind::Apartment => write!(f, "APARTMENT"),
            UnitKind::Local => write!(f, "LOCAL"),
        }
    }
}

/// A sellable apartment or commercial local.
///
/// `total_paid`, `remaining_debt` and `payment_progress` are derived by the
/// allocation engine and overwritten on every recompute.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Unit {
    pub id: u64,
    pub block: String,
    #[serde(default)]
    pub kind: UnitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apartment_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_m2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_m2: Option<Money>,
    #[serde(default)]
    pub total_price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sale_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<u64>,
    #[serde(default)]
    pub total_paid: Money,
    #[serde(default)]
    pub remaining_debt: Money,
    /// Hundredths of a percent.
    #[serde(default)]
    pub payment_progress: Percent,
}

impl Unit {
    /// Short label such as `7A-12`, falling back to the list number and then the id.
    pub fn label(&self) -> String {
        let tail = match (&self.apartment_number, self.list_number) {
            (Some(apt), _) if !apt.is_empty() => apt.clone(),
            (_, Some(n)) => n.to_string(),
            _ => self.id.to_string(),
        };
        format!("{}-{}", self.block, tail)
    }

    pub fn status(&self) -> UnitStatus {
        UnitStatus::from_totals(self.total_price, self.total_paid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    Paid,
    Partial,
    Unsold,
}

impl UnitStatus {
    pub fn from_totals(total_price: Money, total_paid: Money) -> Self {
        if total_price.is_zero() {
            UnitStatus::Unsold
        } else if total_paid >= total_price {
            UnitStatus::Paid
        } else if total_paid.is_positive() {
            UnitStatus::Partial
        } else {
            UnitStatus::Unsold
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paid" => Some(UnitStatus::Paid),
            "partial" => Some(UnitStatus::Partial),
            "unsold" => Some(UnitStatus::Unsold),
            _ => None,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Paid => write!(f, "PAID"),
            UnitStatus::Partial => write!(f, "PARTIAL"),
            UnitStatus::Unsold => write!(f, "UNSOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Payment {
    pub id: u64,
    pub unit_id: u64,
    pub client_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Invoice {
    pub id: u64,
    pub invoice_number: String,
    pub client_id: u64,
    pub unit_id: u64,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Money,
    #[serde(default)]
    pub total_paid_on_invoice: Money,
    #[serde(default)]
    pub remaining_on_invoice: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        if self.remaining_on_invoice.is_zero() {
            InvoiceStatus::Paid
        } else if self.total_paid_on_invoice.is_zero() {
            InvoiceStatus::Unpaid
        } else {
            InvoiceStatus::Partial
        }
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.remaining_on_invoice.is_positive() && self.due_date < today
    }

    /// Open and due between today and `days` from now, inclusive.
    pub fn is_due_within(&self, today: NaiveDate, days: i64) -> bool {
        let horizon = today + chrono::Duration::days(days);
        self.remaining_on_invoice.is_positive()
            && self.due_date >= today
            && self.due_date <= horizon
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Paid,
    Partial,
    Unpaid,
}

impl InvoiceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paid" => Some(InvoiceStatus::Paid),
            "partial" => Some(InvoiceStatus::Partial),
            "unpaid" => Some(InvoiceStatus::Unpaid),
            _ => None,
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvoiceStatus::Paid => write!(f, "PAID"),
            InvoiceStatus::Partial => write!(f, "PARTIAL"),
            InvoiceStatus::Unpaid => write!(f, "UNPAID"),
        }
    }
}

/// Part of a payment pinned to one invoice. Unique per (payment, invoice).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentAllocation {
    pub id: u64,
    pub payment_id: u64,
    pub invoice_id: u64,
    pub amount: Money,
}
