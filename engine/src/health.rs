//! # Health Classification
//!
//! Maps a reserve ratio to a band, for units ([`HealthBand`]) and for the
//! network pool ([`NetworkHealth`]). Pure, O(1), no floats.
//!
//! Ratios are compared by cross-multiplication in `u128`:
//!
//! ```text
//! balance / target < t / 10_000   <=>   balance * 10_000 < target * t
//! ```
//!
//! Lower edges are inclusive, upper edges exclusive: a ratio of exactly 5%
//! is BUILDING, exactly 100% is STRONG. A zero target means the unit has no
//! reserve requirement; its ratio is defined as 1.0 (STRONG).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{
    ADEQUATE_BELOW_BPS, BPS_DENOMINATOR, BUILDING_BELOW_BPS, CRITICAL_BELOW_BPS,
    DEPLETED_BELOW_BPS, HEALTHY_BELOW_BPS, LOW_BELOW_BPS, POOL_TARGET_SHARE_BPS,
    STRONG_AT_MOST_BPS,
};

// ---------------------------------------------------------------------------
// HealthBand
// ---------------------------------------------------------------------------

/// Solvency band of a single unit, ordered from worst to best-funded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthBand {
    /// Below 5% of target. Eligible for tide-in.
    Critical,
    /// 5% up to (not including) 50%.
    Building,
    /// 50% up to (not including) 80%.
    Healthy,
    /// 80% up to and including 100%. Also every zero-target unit.
    Strong,
    /// Above 100%. Contributes tide-out.
    Overflow,
}

impl HealthBand {
    /// All bands, worst first.
    pub const ALL: [HealthBand; 5] = [
        HealthBand::Critical,
        HealthBand::Building,
        HealthBand::Healthy,
        HealthBand::Strong,
        HealthBand::Overflow,
    ];
}

impl fmt::Display for HealthBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthBand::Critical => write!(f, "CRITICAL"),
            HealthBand::Building => write!(f, "BUILDING"),
            HealthBand::Healthy => write!(f, "HEALTHY"),
            HealthBand::Strong => write!(f, "STRONG"),
            HealthBand::Overflow => write!(f, "OVERFLOW"),
        }
    }
}

// ---------------------------------------------------------------------------
// NetworkHealth
// ---------------------------------------------------------------------------

/// Health of the shared network pool relative to its target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetworkHealth {
    /// Below 10% of the pool target.
    Depleted,
    /// 10% up to (not including) 30%.
    Low,
    /// 30% up to (not including) 70%.
    Adequate,
    /// 70% and above.
    Thriving,
}

impl fmt::Display for NetworkHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkHealth::Depleted => write!(f, "DEPLETED"),
            NetworkHealth::Low => write!(f, "LOW"),
            NetworkHealth::Adequate => write!(f, "ADEQUATE"),
            NetworkHealth::Thriving => write!(f, "THRIVING"),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// `true` if `balance / target < threshold_bps / 10_000`.
///
/// Callers must handle `target == 0` themselves.
fn ratio_below(balance: u64, target: u64, threshold_bps: u32) -> bool {
    (balance as u128) * (BPS_DENOMINATOR as u128) < (target as u128) * (threshold_bps as u128)
}

/// `true` if `balance / target > threshold_bps / 10_000`.
fn ratio_above(balance: u64, target: u64, threshold_bps: u32) -> bool {
    (balance as u128) * (BPS_DENOMINATOR as u128) > (target as u128) * (threshold_bps as u128)
}

/// Classifies a unit by its reserve ratio.
pub fn classify_unit(balance: u64, target: u64) -> HealthBand {
    if target == 0 {
        return HealthBand::Strong;
    }

    if ratio_below(balance, target, CRITICAL_BELOW_BPS) {
        HealthBand::Critical
    } else if ratio_below(balance, target, BUILDING_BELOW_BPS) {
        HealthBand::Building
    } else if ratio_below(balance, target, HEALTHY_BELOW_BPS) {
        HealthBand::Healthy
    } else if ratio_above(balance, target, STRONG_AT_MOST_BPS) {
        HealthBand::Overflow
    } else {
        HealthBand::Strong
    }
}

/// Classifies the network pool by its reserve ratio.
///
/// `pool_target` is always floored at a positive minimum by the engine, but a
/// zero target is still handled: an empty requirement counts as THRIVING.
pub fn classify_pool(pool_balance: u64, pool_target: u64) -> NetworkHealth {
    if pool_target == 0 {
        return NetworkHealth::Thriving;
    }

    if ratio_below(pool_balance, pool_target, DEPLETED_BELOW_BPS) {
        NetworkHealth::Depleted
    } else if ratio_below(pool_balance, pool_target, LOW_BELOW_BPS) {
        NetworkHealth::Low
    } else if ratio_below(pool_balance, pool_target, ADEQUATE_BELOW_BPS) {
        NetworkHealth::Adequate
    } else {
        NetworkHealth::Thriving
    }
}

/// Pool target: 10% of the sum of all unit targets, never below
/// `min_pool_target`.
pub fn pool_target(total_unit_target: u128, min_pool_target: u64) -> u64 {
    let share =
        total_unit_target.saturating_mul(POOL_TARGET_SHARE_BPS as u128) / BPS_DENOMINATOR as u128;
    u64::try_from(share).unwrap_or(u64::MAX).max(min_pool_target)
}

/// Reserve ratio in basis points, `floor(balance * 10_000 / target)`.
///
/// A zero target reports 10_000 (a ratio of 1.0). Saturates at `u64::MAX`.
pub fn ratio_bps(balance: u64, target: u64) -> u64 {
    if target == 0 {
        return BPS_DENOMINATOR;
    }
    let scaled = (balance as u128) * (BPS_DENOMINATOR as u128) / (target as u128);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// Orders two `(balance, target)` pairs by reserve ratio, lowest first.
///
/// Exact: compares `a.balance * b.target` against `b.balance * a.target`.
/// Zero targets are treated as a ratio of 1.0.
pub fn compare_ratios(a: (u64, u64), b: (u64, u64)) -> Ordering {
    let (a_balance, a_target) = normalize(a);
    let (b_balance, b_target) = normalize(b);
    let lhs = (a_balance as u128) * (b_target as u128);
    let rhs = (b_balance as u128) * (a_target as u128);
    lhs.cmp(&rhs)
}

fn normalize((balance, target): (u64, u64)) -> (u64, u64) {
    if target == 0 {
        (1, 1)
    } else {
        (balance, target)
    }
}
