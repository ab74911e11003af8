use chrono::NaiveDate;
use tracing::info;

use super::validate::{clean, looks_like_email};
use super::Ledger;
use crate::error::{FieldErrors, LedgerError, Result};
use crate::store::Client;

#[derive(Debug, Clone, Default)]
pub struct ClientInput {
    pub full_name: String,
    pub residence: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl ClientInput {
    fn cleaned(self) -> Result<ClientInput> {
        let input = ClientInput {
            full_name: self.full_name.trim().to_string(),
            residence: clean(self.residence),
            phone: clean(self.phone),
            email: clean(self.email),
        };

        let mut errors = FieldErrors::new();
        if input.full_name.is_empty() {
            errors.push("full_name", "is required");
        }
        if let Some(email) = &input.email {
            if !looks_like_email(email) {
                errors.push("email", "is not a valid email address");
            }
        }
        errors.into_result()?;
        Ok(input)
    }
}

impl Ledger {
    pub fn create_client(&mut self, input: ClientInput, today: NaiveDate) -> Result<u64> {
        let input = input.cleaned()?;
        let id = self.store.next_client_id();
        self.store.clients.push(Client {
            id,
            full_name: input.full_name,
            residence: input.residence,
            phone: input.phone,
            email: input.email,
            created_at: today,
        });
        info!(client_id = id, "client created");
        Ok(id)
    }

    pub fn update_client(&mut self, id: u64, input: ClientInput) -> Result<()> {
        let input = input.cleaned()?;
        let client = self
            .store
            .client_mut(id)
            .ok_or(LedgerError::ClientNotFound(id))?;
        client.full_name = input.full_name;
        client.residence = input.residence;
        client.phone = input.phone;
        client.email = input.email;
        info!(client_id = id, "client updated");
        Ok(())
    }

    /// Update the client with the same full name (and phone, when one is
    /// given) or create a new one. Returns the id and whether it was created.
    pub fn upsert_client(&mut self, input: ClientInput, today: NaiveDate) -> Result<(u64, bool)> {
        let input = input.cleaned()?;
        let existing = self
            .store
            .clients
            .iter()
            .find(|c| {
                c.full_name == input.full_name
                    && (input.phone.is_none() || c.phone == input.phone)
            })
            .map(|c| c.id);

        match existing {
            Some(id) => {
                self.update_client(id, input)?;
                Ok((id, false))
            }
            None => Ok((self.create_client(input, today)?, true)),
        }
    }

    /// Refused while any unit, invoice or payment still references the client.
    pub fn delete_client(&mut self, id: u64) -> Result<()> {
        if self.store.client(id).is_none() {
            return Err(LedgerError::ClientNotFound(id));
        }
        let in_use = self.store.units.iter().any(|u| u.client_id == Some(id))
            || self.store.invoices.iter().any(|i| i.client_id == id)
            || self.store.payments.iter().any(|p| p.client_id == id);
        if in_use {
            return Err(LedgerError::ClientInUse(id));
        }
        self.store.clients.retain(|c| c.id != id);
        info!(client_id = id, "client deleted");
        Ok(())
    }
}
