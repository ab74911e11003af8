pub mod allocation;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod ledger;
pub mod logging;
pub mod money;
pub mod pdf;
pub mod store;

pub use allocation::{allocate, Allocation, InvoiceCoverage, UnitTotals};
pub use config::{Company, Config, InvoiceSettings, PdfSettings};
pub use error::{FieldError, FieldErrors, LedgerError, Result};
pub use ledger::Ledger;
pub use money::{Money, Percent};
pub use store::{load_store, save_store, Store};
