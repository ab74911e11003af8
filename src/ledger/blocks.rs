use tracing::info;

use super::Ledger;
use crate::error::{FieldErrors, LedgerError, Result};
use crate::store::Block;

const MAX_BLOCK_NAME: usize = 100;

impl Ledger {
    /// Register a block name. Registering an existing name is a no-op.
    pub fn create_block(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        let mut errors = FieldErrors::new();
        if name.is_empty() {
            errors.push("name", "is required");
        } else if name.chars().count() > MAX_BLOCK_NAME {
            errors.push("name", format!("must be at most {MAX_BLOCK_NAME} characters"));
        }
        errors.into_result()?;

        if !self.store.has_block(name) {
            self.store.blocks.push(Block {
                name: name.to_string(),
            });
            info!(block = name, "block created");
        }
        Ok(())
    }

    /// Refused while any unit sits in the block. Unknown names are ignored.
    pub fn delete_block(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if self.store.units.iter().any(|u| u.block == name) {
            return Err(LedgerError::BlockInUse(name.to_string()));
        }
        self.store.blocks.retain(|b| b.name != name);
        info!(block = name, "block deleted");
        Ok(())
    }
}
