//! # Network Pool
//!
//! The shared reserve. Absorbs overflow drips from rich units and funds
//! tide-in for critical ones. There is exactly one per engine.

use serde::{Deserialize, Serialize};

use crate::error::{TideError, TideResult};

/// Singleton shared reserve.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPool {
    balance: u64,
}

impl NetworkPool {
    /// Creates a pool holding `balance`.
    pub fn with_balance(balance: u64) -> Self {
        Self { balance }
    }

    /// Current pool balance.
    pub fn balance(&self) -> u64 {
        self.balance
    }

    /// Adds external funds to the pool.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::InvalidAmount`] if the deposit would overflow.
    pub fn deposit(&mut self, amount: u64) -> TideResult<u64> {
        let current = self.balance;
        self.balance = current
            .checked_add(amount)
            .ok_or_else(|| TideError::InvalidAmount {
                unit: None,
                reason: format!("deposit of {} overflows pool balance {}", amount, current),
            })?;
        Ok(self.balance)
    }

    /// Removes external funds from the pool.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::InvalidAmount`] if `amount` exceeds the balance.
    pub fn withdraw(&mut self, amount: u64) -> TideResult<u64> {
        let current = self.balance;
        self.balance = current
            .checked_sub(amount)
            .ok_or_else(|| TideError::InvalidAmount {
                unit: None,
                reason: format!("withdrawal of {} exceeds pool balance {}", amount, current),
            })?;
        Ok(self.balance)
    }

    /// Overwrites the balance. Only the epoch processor calls this, after it
    /// has validated the whole epoch.
    pub(crate) fn set_balance(&mut self, balance: u64) {
        self.balance = balance;
    }
}
