//! # Tide Configuration & Constants
//!
//! Every magic number in the tide engine lives here: the tier target table,
//! the band thresholds, and the tunable flow rates. Constants are fixed at
//! compile time; the rates are collected in [`TideConfig`], built once by the
//! host and handed to the engine.
//!
//! All rates are **basis points** (1 bp = 0.01%, 10_000 bp = 100%). The
//! engine never divides amounts by floats; see [`apply_bps`].

use serde::{Deserialize, Serialize};

use crate::error::{TideError, TideResult};

// ---------------------------------------------------------------------------
// Basis Points
// ---------------------------------------------------------------------------

/// 100% expressed in basis points.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Computes `floor(amount * bps / 10_000)`.
///
/// The multiplication happens in `u128`, so any `u64` amount with any bps
/// value up to 10_000 is exact. Truncation is toward zero.
pub fn apply_bps(amount: u64, bps: u32) -> u64 {
    let scaled = amount as u128 * bps as u128 / BPS_DENOMINATOR as u128;
    // bps <= 10_000 keeps the result <= amount; larger values saturate.
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Tier Targets
// ---------------------------------------------------------------------------

/// Target balance for tier T0 units. Zero means "no reserve requirement".
pub const TIER_0_TARGET: u64 = 0;

/// Target balance for tier T1 units (1 coin of 10^8 units).
pub const TIER_1_TARGET: u64 = 100_000_000;

/// Target balance for tier T2 units.
pub const TIER_2_TARGET: u64 = 1_000_000_000;

/// Target balance for tier T3 units.
pub const TIER_3_TARGET: u64 = 10_000_000_000;

/// Target balance for tier T4 units.
pub const TIER_4_TARGET: u64 = 100_000_000_000;

/// Target balance for tier T5 units.
pub const TIER_5_TARGET: u64 = 1_000_000_000_000;

/// Lookup table indexed by tier ordinal.
pub const TIER_TARGETS: [u64; 6] = [
    TIER_0_TARGET,
    TIER_1_TARGET,
    TIER_2_TARGET,
    TIER_3_TARGET,
    TIER_4_TARGET,
    TIER_5_TARGET,
];

// ---------------------------------------------------------------------------
// Unit Health Bands
// ---------------------------------------------------------------------------

/// Below this reserve ratio a unit is CRITICAL (5%).
pub const CRITICAL_BELOW_BPS: u32 = 500;

/// Below this reserve ratio a unit is BUILDING (50%).
pub const BUILDING_BELOW_BPS: u32 = 5_000;

/// Below this reserve ratio a unit is HEALTHY (80%).
pub const HEALTHY_BELOW_BPS: u32 = 8_000;

/// At or below this ratio a unit is STRONG; above it, OVERFLOW (100%).
pub const STRONG_AT_MOST_BPS: u32 = 10_000;

// ---------------------------------------------------------------------------
// Network Pool Health
// ---------------------------------------------------------------------------

/// Below this pool ratio the network is DEPLETED (10%).
pub const DEPLETED_BELOW_BPS: u32 = 1_000;

/// Below this pool ratio the network is LOW (30%).
pub const LOW_BELOW_BPS: u32 = 3_000;

/// Below this pool ratio the network is ADEQUATE (70%). At or above: THRIVING.
pub const ADEQUATE_BELOW_BPS: u32 = 7_000;

/// The pool target is this share of the sum of all unit targets (10%).
pub const POOL_TARGET_SHARE_BPS: u32 = 1_000;

/// Default floor for the pool target, so an ecosystem of T0 units (or no
/// units at all) still has a meaningful pool health reading.
pub const DEFAULT_MIN_POOL_TARGET: u64 = TIER_1_TARGET;

// ---------------------------------------------------------------------------
// TideConfig
// ---------------------------------------------------------------------------

/// Tunable flow parameters for the engine.
///
/// Constructed once by the host (typically deserialized from whatever config
/// source the host owns) and passed to [`TideEngine::new`](crate::TideEngine::new).
/// Missing fields fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TideConfig {
    /// Share of a unit's overflow (balance above target) dripped into the
    /// pool each epoch.
    pub overflow_drip_bps: u32,

    /// Per-unit cap on tide-in, as a share of the pool funds still
    /// available in the current epoch.
    pub support_rate_bps: u32,

    /// Upper bound on total tide-in per epoch, as a share of the pool.
    pub max_support_per_epoch_bps: u32,

    /// Share of the pool that is never lent out.
    pub min_network_reserve_bps: u32,

    /// Ratio a CRITICAL unit is refilled to (never beyond).
    pub support_threshold_bps: u32,

    /// Minimum pool target, regardless of registered unit targets.
    pub min_pool_target: u64,

    /// Number of entries in the most-supported ranking of the metrics view.
    pub top_supported_limit: usize,
}

impl Default for TideConfig {
    fn default() -> Self {
        Self {
            overflow_drip_bps: 100,
            support_rate_bps: 1_000,
            max_support_per_epoch_bps: 2_500,
            min_network_reserve_bps: 1_000,
            support_threshold_bps: CRITICAL_BELOW_BPS,
            min_pool_target: DEFAULT_MIN_POOL_TARGET,
            top_supported_limit: 5,
        }
    }
}

impl TideConfig {
    /// Checks that every rate is a valid share.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::InvalidConfig`] if any bps field exceeds 10_000,
    /// or if the support threshold is zero (tide-in would be a no-op forever).
    pub fn validate(&self) -> TideResult<()> {
        let rates = [
            ("overflow_drip_bps", self.overflow_drip_bps),
            ("support_rate_bps", self.support_rate_bps),
            ("max_support_per_epoch_bps", self.max_support_per_epoch_bps),
            ("min_network_reserve_bps", self.min_network_reserve_bps),
            ("support_threshold_bps", self.support_threshold_bps),
        ];

        for (name, bps) in rates {
            if bps as u64 > BPS_DENOMINATOR {
                return Err(TideError::InvalidConfig(format!(
                    "{} = {} exceeds {} bps",
                    name, bps, BPS_DENOMINATOR
                )));
            }
        }

        if self.support_threshold_bps == 0 {
            return Err(TideError::InvalidConfig(
                "support_threshold_bps must be non-zero".into(),
            ));
        }

        Ok(())
    }
}
