//! Validated create/update/delete operations over the [`Store`].
//!
//! Every operation checks its input before touching the store, so a returned
//! error means nothing changed. Mutations of payments, invoices or
//! allocations re-run the allocation engine for each affected unit before
//! returning.

mod allocations;
mod blocks;
mod clients;
mod invoices;
pub mod numbering;
mod payments;
mod recompute;
mod summary;
mod units;
mod validate;

pub use allocations::AllocationInput;
pub use clients::ClientInput;
pub use invoices::InvoiceInput;
pub use payments::PaymentInput;
pub use summary::{BlockSummary, ClientOverview, Dashboard, DebtorRow, UPCOMING_DAYS};
pub use units::{UnitInput, UnitPatch};
pub use validate::looks_like_email;

use crate::config::InvoiceSettings;
use crate::store::Store;

/// The store plus the settings operations need (invoice numbering, default terms).
#[derive(Debug, Clone)]
pub struct Ledger {
    pub store: Store,
    number_format: String,
    due_days: u32,
}

impl Ledger {
    pub fn new(store: Store) -> Self {
        Self::with_settings(store, &InvoiceSettings::default())
    }

    pub fn with_settings(store: Store, settings: &InvoiceSettings) -> Self {
        Self {
            store,
            number_format: settings.number_format.clone(),
            due_days: settings.due_days,
        }
    }

    pub fn into_store(self) -> Store {
        self.store
    }
}
