//! # Treasury Units
//!
//! A [`TreasuryUnit`] is one FoundUp's treasury: an id, a [`Tier`] that
//! fixes its target balance, and the balance itself. Units are created on
//! registration and never deleted. Their balances change only through the
//! epoch processor or the explicit deposit/withdraw/tier hooks on the
//! registry.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TIER_TARGETS;
use crate::health::{classify_unit, ratio_bps, HealthBand};

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Ordinal size class of a unit. Selects the target balance from the fixed
/// table in [`crate::config`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// No reserve requirement (target 0).
    T0,
    /// Target 10^8.
    T1,
    /// Target 10^9.
    T2,
    /// Target 10^10.
    T3,
    /// Target 10^11.
    T4,
    /// Target 10^12.
    T5,
}

impl Tier {
    /// Target balance for this tier, in the smallest currency unit.
    pub fn target(self) -> u64 {
        TIER_TARGETS[self.ordinal() as usize]
    }

    /// Position in the tier table, `0..=5`.
    pub fn ordinal(self) -> u8 {
        match self {
            Tier::T0 => 0,
            Tier::T1 => 1,
            Tier::T2 => 2,
            Tier::T3 => 3,
            Tier::T4 => 4,
            Tier::T5 => 5,
        }
    }

    /// Inverse of [`ordinal`](Self::ordinal). Returns `None` past T5.
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Tier::T0),
            1 => Some(Tier::T1),
            2 => Some(Tier::T2),
            3 => Some(Tier::T3),
            4 => Some(Tier::T4),
            5 => Some(Tier::T5),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.ordinal())
    }
}

// ---------------------------------------------------------------------------
// TreasuryUnit
// ---------------------------------------------------------------------------

/// The registry's record for a single unit.
///
/// Only the registry hands out `&mut` access; everything outside the crate
/// sees [`UnitSnapshot`] copies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TreasuryUnit {
    /// Caller-chosen identifier, unique within the registry.
    pub id: String,

    /// Size class; determines `target()`.
    pub tier: Tier,

    /// Current balance in the smallest currency unit.
    pub balance: u64,

    /// Number of epochs in which this unit received tide-in.
    pub support_count: u64,

    /// Cumulative tide-in received.
    pub total_received: u64,

    /// Cumulative tide-out contributed.
    pub total_contributed: u64,

    /// When the unit was registered.
    pub registered_at: DateTime<Utc>,
}

impl TreasuryUnit {
    /// Creates an empty unit.
    pub fn new(id: impl Into<String>, tier: Tier) -> Self {
        Self {
            id: id.into(),
            tier,
            balance: 0,
            support_count: 0,
            total_received: 0,
            total_contributed: 0,
            registered_at: Utc::now(),
        }
    }

    /// Target balance derived from the tier.
    pub fn target(&self) -> u64 {
        self.tier.target()
    }

    /// Current health band.
    pub fn band(&self) -> HealthBand {
        classify_unit(self.balance, self.target())
    }

    /// Copies the record into a read-only snapshot.
    pub fn snapshot(&self) -> UnitSnapshot {
        UnitSnapshot {
            id: self.id.clone(),
            tier: self.tier,
            target: self.target(),
            balance: self.balance,
            band: self.band(),
            ratio_bps: ratio_bps(self.balance, self.target()),
            support_count: self.support_count,
            total_received: self.total_received,
            total_contributed: self.total_contributed,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshots & handles
// ---------------------------------------------------------------------------

/// Point-in-time copy of a unit, safe to hand to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: String,
    pub tier: Tier,
    pub target: u64,
    pub balance: u64,
    pub band: HealthBand,
    /// Reserve ratio in basis points (10_000 for zero-target units).
    pub ratio_bps: u64,
    pub support_count: u64,
    pub total_received: u64,
    pub total_contributed: u64,
}

/// Returned by registration. Identifies the unit and its position in
/// registration order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitHandle {
    /// The unit id.
    pub id: String,
    /// Zero-based registration index. Epoch processing visits units in
    /// this order.
    pub ordinal: usize,
}
