use serde::{Deserialize, Serialize};

use crate::error::{FieldErrors, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub company: Company,
    #[serde(default)]
    pub invoice: InvoiceSettings,
    #[serde(default)]
    pub pdf: PdfSettings,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tax_id: Option<String>,
}

impl Default for Company {
    fn default() -> Self {
        Self {
            name: "Company Name".to_string(),
            address: None,
            city: None,
            country: None,
            email: None,
            phone: None,
            tax_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InvoiceSettings {
    /// `YYYY`, `MM`, `DD` date tokens plus a run of `#` for the sequence.
    pub number_format: String,
    pub currency_code: String,
    pub currency_symbol: String,
    /// `dd`, `MM`, `yyyy` tokens.
    pub date_format: String,
    pub due_days: u32,
}

impl Default for InvoiceSettings {
    fn default() -> Self {
        Self {
            number_format: "YYYYMM-####".to_string(),
            currency_code: "EUR".to_string(),
            currency_symbol: "€".to_string(),
            date_format: "dd/MM/yyyy".to_string(),
            due_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PdfSettings {
    pub output_dir: String,
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        let mut errors = FieldErrors::new();
        let code = &self.invoice.currency_code;
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push("invoice.currency_code", "must be a three-letter code");
        }
        if self.invoice.number_format.trim().is_empty() {
            errors.push("invoice.number_format", "must not be empty");
        }
        if let Some(email) = &self.company.email {
            if !crate::ledger::looks_like_email(email) {
                errors.push("company.email", "is not a valid email address");
            }
        }
        errors.into_result()
    }
}
