use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::money::Money;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Field errors collected while validating one create/update request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was rejected.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Config directory not found at {0}. Run 'unitbook init' to create it.")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to parse ledger file {path}: {source}")]
    StoreParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write ledger file: {0}")]
    StoreWrite(String),

    #[error("Config directory already exists at {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Invalid input: {0}")]
    Validation(FieldErrors),

    #[error("Client #{0} not found")]
    ClientNotFound(u64),

    #[error("Unit #{0} not found")]
    UnitNotFound(u64),

    #[error("Payment #{0} not found")]
    PaymentNotFound(u64),

    #[error("Invoice '{0}' not found")]
    InvoiceNotFound(String),

    #[error("Allocation #{0} not found")]
    AllocationNotFound(u64),

    #[error("Allocation exceeds payment available amount ({available} available on payment #{payment})")]
    AllocationExceedsAvailable { payment: u64, available: Money },

    #[error("Payment #{payment} and invoice #{invoice} belong to different units")]
    AllocationUnitMismatch { payment: u64, invoice: u64 },

    #[error("Payment #{payment} has {pinned} pinned to invoices; amount cannot drop below it")]
    PaymentBelowPinned { payment: u64, pinned: Money },

    #[error("Invoice number '{0}' already exists")]
    InvoiceNumberTaken(String),

    #[error("Invoice sequence cannot continue past '{0}'")]
    InvoiceSequenceOverflow(String),

    #[error("Could not find a free invoice number after {attempts} attempts (last tried '{last}')")]
    InvoiceNumberExhausted { attempts: usize, last: String },

    #[error("Cannot delete unit #{0} with payments or invoices")]
    UnitInUse(u64),

    #[error("Cannot delete client #{0} with existing units, invoices or payments")]
    ClientInUse(u64),

    #[error("Cannot delete block '{0}' in use by units")]
    BlockInUse(String),

    #[error("Typst not found. Install it from https://typst.app/ or run: cargo install typst-cli")]
    TypstNotFound,

    #[error("Failed to generate PDF: {0}")]
    PdfGeneration(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
