// crates/furrow-economics/src/access.rs
//
// Privileged callers for pool management.
//
// The admin and any executor it appoints may list, delist, and allocate.
// Only the admin may change the executor set.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use furrow_core::{AccountKey, FurrowError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    admin: AccountKey,
    executors: BTreeSet<AccountKey>,
}

impl AccessControl {
    pub fn new(admin: AccountKey) -> Self {
        Self {
            admin,
            executors: BTreeSet::new(),
        }
    }

    pub fn admin(&self) -> &AccountKey {
        &self.admin
    }

    pub fn executors(&self) -> impl Iterator<Item = &AccountKey> {
        self.executors.iter()
    }

    pub fn is_manager(&self, caller: &AccountKey) -> bool {
        self.admin == *caller || self.executors.contains(caller)
    }

    /// # Errors
    /// Returns `FurrowError::Unauthorized` unless `caller` is the admin or an executor.
    pub fn ensure_manager(&self, caller: &AccountKey) -> Result<(), FurrowError> {
        if self.is_manager(caller) {
            Ok(())
        } else {
            Err(FurrowError::Unauthorized(format!(
                "{} may not manage pool allocation",
                caller
            )))
        }
    }

    fn ensure_admin(&self, caller: &AccountKey) -> Result<(), FurrowError> {
        if self.admin == *caller {
            Ok(())
        } else {
            Err(FurrowError::Unauthorized(format!(
                "{} is not the admin",
                caller
            )))
        }
    }

    /// Returns `true` if the executor was newly added.
    pub fn add_executor(&mut self, caller: &AccountKey, executor: AccountKey) -> Result<bool, FurrowError> {
        self.ensure_admin(caller)?;
        Ok(self.executors.insert(executor))
    }

    /// Returns `true` if the executor was present.
    pub fn remove_executor(&mut self, caller: &AccountKey, executor: &AccountKey) -> Result<bool, FurrowError> {
        self.ensure_admin(caller)?;
        Ok(self.executors.remove(executor))
    }
}
