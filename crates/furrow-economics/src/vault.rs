// crates/furrow-economics/src/vault.rs
//
// Reward vault: the token balance harvests are paid from.
//
// The vault is funded once with the full supply cap at genesis. Every
// harvest withdraws from it and credits the position owner's paid balance.
// Sub-dust remainders forfeited on position removal simply stay behind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use furrow_core::{AccountKey, FurrowError};

use crate::token::Amount;

/// The reward vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "VaultRecord", from = "VaultRecord")]
pub struct RewardVault {
    balance: Amount,
    total_paid: Amount,
    paid: BTreeMap<AccountKey, Amount>,
}

/// Serialized form; JSON object keys must be strings, so the per-account
/// balances are stored as a list of pairs.
#[derive(Serialize, Deserialize)]
struct VaultRecord {
    balance: Amount,
    total_paid: Amount,
    paid: Vec<(AccountKey, Amount)>,
}

impl From<RewardVault> for VaultRecord {
    fn from(vault: RewardVault) -> Self {
        Self {
            balance: vault.balance,
            total_paid: vault.total_paid,
            paid: vault.paid.into_iter().collect(),
        }
    }
}

impl From<VaultRecord> for RewardVault {
    fn from(record: VaultRecord) -> Self {
        Self {
            balance: record.balance,
            total_paid: record.total_paid,
            paid: record.paid.into_iter().collect(),
        }
    }
}

impl RewardVault {
    /// Create a vault holding `balance` base units.
    pub fn with_balance(balance: Amount) -> Self {
        Self {
            balance,
            ..Self::default()
        }
    }

    /// Check a payout of `amount` can be covered.
    ///
    /// # Errors
    /// Returns `FurrowError::InvalidState` if the vault holds less than `amount`.
    pub fn ensure_can_pay(&self, amount: Amount) -> Result<(), FurrowError> {
        if amount > self.balance {
            return Err(FurrowError::InvalidState(format!(
                "Insufficient vault balance: requested {} but only {} available",
                amount, self.balance
            )));
        }
        Ok(())
    }

    /// Pay `amount` to `recipient`.
    ///
    /// # Errors
    /// Returns `FurrowError::InvalidState` on insufficient balance; the vault
    /// is unchanged in that case.
    pub fn pay(&mut self, recipient: AccountKey, amount: Amount) -> Result<(), FurrowError> {
        self.ensure_can_pay(amount)?;
        if amount == 0 {
            return Ok(());
        }
        self.balance -= amount;
        self.total_paid = self.total_paid.saturating_add(amount);
        let credited = self.paid.entry(recipient).or_insert(0);
        *credited = credited.saturating_add(amount);
        Ok(())
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_paid(&self) -> Amount {
        self.total_paid
    }

    /// Lifetime amount paid to `account`.
    pub fn paid_to(&self, account: &AccountKey) -> Amount {
        self.paid.get(account).copied().unwrap_or(0)
    }
}
