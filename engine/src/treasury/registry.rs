//! # Treasury Registry
//!
//! Exclusive owner of every [`TreasuryUnit`]. Records live in a `Vec` in
//! registration order, with a `HashMap` from id to position for O(1)
//! lookups. Iteration is always in registration order so epochs and their
//! event logs are reproducible.
//!
//! Callers never get `&mut TreasuryUnit`; reads return [`UnitSnapshot`]
//! copies and writes go through the checked methods below.

use std::collections::HashMap;

use tracing::debug;

use super::unit::{Tier, TreasuryUnit, UnitHandle, UnitSnapshot};
use crate::error::{TideError, TideResult};

/// Registration-ordered set of unit treasuries.
#[derive(Clone, Debug, Default)]
pub struct TreasuryRegistry {
    units: Vec<TreasuryUnit>,
    index: HashMap<String, usize>,
}

impl TreasuryRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new unit with a zero balance.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::DuplicateUnit`] if the id is taken.
    pub fn register(&mut self, id: &str, tier: Tier) -> TideResult<UnitHandle> {
        if self.index.contains_key(id) {
            return Err(TideError::DuplicateUnit(id.to_string()));
        }

        let ordinal = self.units.len();
        self.units.push(TreasuryUnit::new(id, tier));
        self.index.insert(id.to_string(), ordinal);

        debug!(unit = id, %tier, ordinal, "unit registered");
        Ok(UnitHandle {
            id: id.to_string(),
            ordinal,
        })
    }

    /// Replaces a unit's balance outright.
    ///
    /// Any `u64` is a valid balance, so the only failure is an unknown id.
    /// Deposits and withdrawals should prefer [`credit`](Self::credit) and
    /// [`debit`](Self::debit), which check for overflow and overdraw.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::UnitNotFound`] if the id is unknown.
    pub fn update_balance(&mut self, id: &str, new_balance: u64) -> TideResult<()> {
        let unit = self.unit_mut(id)?;
        unit.balance = new_balance;
        Ok(())
    }

    /// Moves a unit to another tier. The balance is untouched; the band is
    /// re-derived from the new target on the next read.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::UnitNotFound`] if the id is unknown.
    pub fn update_tier(&mut self, id: &str, tier: Tier) -> TideResult<()> {
        let unit = self.unit_mut(id)?;
        debug!(unit = id, from = %unit.tier, to = %tier, "tier changed");
        unit.tier = tier;
        Ok(())
    }

    /// Adds `amount` to a unit's balance.
    ///
    /// # Errors
    ///
    /// [`TideError::UnitNotFound`] for an unknown id,
    /// [`TideError::InvalidAmount`] if the balance would overflow.
    pub fn credit(&mut self, id: &str, amount: u64) -> TideResult<u64> {
        let unit = self.unit_mut(id)?;
        let current = unit.balance;
        unit.balance = current
            .checked_add(amount)
            .ok_or_else(|| TideError::InvalidAmount {
                unit: Some(id.to_string()),
                reason: format!("deposit of {} overflows balance {}", amount, current),
            })?;
        Ok(unit.balance)
    }

    /// Subtracts `amount` from a unit's balance.
    ///
    /// # Errors
    ///
    /// [`TideError::UnitNotFound`] for an unknown id,
    /// [`TideError::InvalidAmount`] if `amount` exceeds the balance.
    pub fn debit(&mut self, id: &str, amount: u64) -> TideResult<u64> {
        let unit = self.unit_mut(id)?;
        let current = unit.balance;
        unit.balance = current
            .checked_sub(amount)
            .ok_or_else(|| TideError::InvalidAmount {
                unit: Some(id.to_string()),
                reason: format!("withdrawal of {} exceeds balance {}", amount, current),
            })?;
        Ok(unit.balance)
    }

    /// Snapshot of one unit.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::UnitNotFound`] if the id is unknown.
    pub fn get(&self, id: &str) -> TideResult<UnitSnapshot> {
        self.index
            .get(id)
            .map(|&i| self.units[i].snapshot())
            .ok_or_else(|| TideError::UnitNotFound(id.to_string()))
    }

    /// Snapshots of every unit, in registration order.
    pub fn list_all(&self) -> Vec<UnitSnapshot> {
        self.units.iter().map(TreasuryUnit::snapshot).collect()
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of registered units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns `true` if no units are registered.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sum of all unit balances. `u128` so it cannot overflow.
    pub fn total_balance(&self) -> u128 {
        self.units.iter().map(|u| u.balance as u128).sum()
    }

    /// Sum of all unit targets.
    pub fn total_target(&self) -> u128 {
        self.units.iter().map(|u| u.target() as u128).sum()
    }

    // -----------------------------------------------------------------------
    // Epoch processor access
    // -----------------------------------------------------------------------

    /// Read-only view of the records, in registration order.
    pub(crate) fn units(&self) -> &[TreasuryUnit] {
        &self.units
    }

    /// Mutable view of the records, for committing a validated epoch.
    pub(crate) fn units_mut(&mut self) -> &mut [TreasuryUnit] {
        &mut self.units
    }

    fn unit_mut(&mut self, id: &str) -> TideResult<&mut TreasuryUnit> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.units[i]),
            None => Err(TideError::UnitNotFound(id.to_string())),
        }
    }
}
