//! # Flow Planner
//!
//! Computes one epoch's tide flows from a frozen snapshot. The planner never
//! touches live state: it returns a [`FlowPlan`] of per-unit deltas plus the
//! events that describe them, and the epoch processor decides whether to
//! apply it.
//!
//! ## Phases
//!
//! ```text
//! 1. TIDE OUT: every OVERFLOW unit drips floor(overflow * drip_bps) into
//!               the pool, in registration order.
//! 2. TIDE IN:  against the post-drip pool:
//!                 reserve   = floor(pool * min_network_reserve_bps)
//!                 available = min(pool - reserve, floor(pool * max_support_per_epoch_bps))
//!               CRITICAL units, most severe ratio first (ties by id), each get
//!                 min(deficit, floor(available * support_rate_bps))
//!               where deficit = floor(target * support_threshold_bps) - balance.
//!               Stops as soon as available hits zero.
//! ```
//!
//! Each drip depends only on the unit's own pre-epoch balance, so the
//! visiting order affects event order, never amounts. Pool arithmetic runs
//! in `u128`; the processor checks the result still fits before applying.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{apply_bps, TideConfig, BPS_DENOMINATOR};
use crate::health::{compare_ratios, ratio_bps, HealthBand};

/// Name used for the pool in event `source` / `destination` fields.
pub const NETWORK_POOL_ID: &str = "network_pool";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Direction of a tide flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TideKind {
    /// Pool to a critical unit.
    TideIn,
    /// Overflowing unit to the pool.
    TideOut,
}

impl fmt::Display for TideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TideKind::TideIn => write!(f, "tide_in"),
            TideKind::TideOut => write!(f, "tide_out"),
        }
    }
}

/// One immutable entry of the audit log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TideEvent {
    pub epoch: u64,
    pub kind: TideKind,
    /// The unit on the non-pool side of the flow.
    pub unit_id: String,
    pub amount: u64,
    pub source: String,
    pub destination: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Planner input / output
// ---------------------------------------------------------------------------

/// A unit as the planner sees it: frozen balance plus its pre-epoch band.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowCandidate {
    /// Registration index; deltas are keyed by it.
    pub ordinal: usize,
    pub id: String,
    pub balance: u64,
    pub target: u64,
    pub band: HealthBand,
}

/// Net effect of one epoch on one unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitDelta {
    pub ordinal: usize,
    /// Tide-out taken from the unit.
    pub debit: u64,
    /// Tide-in given to the unit.
    pub credit: u64,
}

/// Everything one epoch would do, before any of it is applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowPlan {
    pub epoch: u64,
    /// Pool balance the plan was computed against.
    pub pool_before: u64,
    /// Pool balance after both phases (`u128`; validated before applying).
    pub pool_after: u128,
    /// Tide-in budget at the start of phase 2.
    pub available_for_support: u128,
    pub deltas: Vec<UnitDelta>,
    pub events: Vec<TideEvent>,
    pub tide_out_total: u64,
    pub tide_in_total: u64,
    /// Units that received tide-in, in the order they were served.
    pub supported: Vec<String>,
    /// Units that contributed tide-out, in registration order.
    pub contributing: Vec<String>,
    pub critical_count: usize,
    pub overflow_count: usize,
}

// ---------------------------------------------------------------------------
// FlowPlanner
// ---------------------------------------------------------------------------

/// Stateless planner bound to one configuration.
#[derive(Clone, Debug)]
pub struct FlowPlanner {
    config: TideConfig,
}

impl FlowPlanner {
    /// Creates a planner. The config is assumed validated.
    pub fn new(config: TideConfig) -> Self {
        Self { config }
    }

    /// The configuration this planner applies.
    pub fn config(&self) -> &TideConfig {
        &self.config
    }

    /// Plans both phases for `epoch` against the given snapshot.
    ///
    /// `candidates` must be in registration order.
    pub fn plan(&self, epoch: u64, candidates: &[FlowCandidate], pool_balance: u64) -> FlowPlan {
        let mut plan = FlowPlan {
            epoch,
            pool_before: pool_balance,
            pool_after: pool_balance as u128,
            ..FlowPlan::default()
        };

        plan.critical_count = candidates
            .iter()
            .filter(|c| c.band == HealthBand::Critical)
            .count();
        plan.overflow_count = candidates
            .iter()
            .filter(|c| c.band == HealthBand::Overflow)
            .count();

        self.plan_tide_out(candidates, &mut plan);
        self.plan_tide_in(candidates, &mut plan);

        plan
    }

    fn plan_tide_out(&self, candidates: &[FlowCandidate], plan: &mut FlowPlan) {
        let drip_bps = self.config.overflow_drip_bps;

        for candidate in candidates {
            if candidate.band != HealthBand::Overflow || candidate.target == 0 {
                continue;
            }

            let overflow = candidate.balance.saturating_sub(candidate.target);
            let drip = apply_bps(overflow, drip_bps);
            if drip == 0 {
                continue;
            }

            plan.pool_after += drip as u128;
            plan.tide_out_total = plan.tide_out_total.saturating_add(drip);
            plan.deltas.push(UnitDelta {
                ordinal: candidate.ordinal,
                debit: drip,
                credit: 0,
            });
            plan.contributing.push(candidate.id.clone());
            plan.events.push(TideEvent {
                epoch: plan.epoch,
                kind: TideKind::TideOut,
                unit_id: candidate.id.clone(),
                amount: drip,
                source: candidate.id.clone(),
                destination: NETWORK_POOL_ID.to_string(),
                reason: format!(
                    "overflow drip: {} bps of {} above target {}",
                    drip_bps, overflow, candidate.target
                ),
            });

            debug!(
                epoch = plan.epoch,
                unit = %candidate.id,
                overflow,
                amount = drip,
                "tide out planned"
            );
        }
    }

    fn plan_tide_in(&self, candidates: &[FlowCandidate], plan: &mut FlowPlan) {
        let pool = plan.pool_after;
        let reserve = bps_of(pool, self.config.min_network_reserve_bps);
        let epoch_cap = bps_of(pool, self.config.max_support_per_epoch_bps);
        let mut available = pool.saturating_sub(reserve).min(epoch_cap);
        plan.available_for_support = available;

        if available == 0 {
            if plan.critical_count > 0 {
                warn!(
                    epoch = plan.epoch,
                    pool = %pool,
                    critical = plan.critical_count,
                    "no pool funds available for tide in"
                );
            }
            return;
        }

        let mut critical: Vec<&FlowCandidate> = candidates
            .iter()
            .filter(|c| c.band == HealthBand::Critical && c.target > 0)
            .collect();
        critical.sort_by(|a, b| {
            compare_ratios((a.balance, a.target), (b.balance, b.target))
                .then_with(|| a.id.cmp(&b.id))
        });

        for candidate in critical {
            if available == 0 {
                debug!(
                    epoch = plan.epoch,
                    unit = %candidate.id,
                    "pool budget exhausted, remaining critical units wait"
                );
                break;
            }

            let refill_to = apply_bps(candidate.target, self.config.support_threshold_bps);
            let deficit = refill_to.saturating_sub(candidate.balance);
            let unit_cap = bps_of(available, self.config.support_rate_bps);
            // unit_cap <= available <= pool, and deficit is a u64, so the
            // minimum always fits.
            let support = (deficit as u128).min(unit_cap) as u64;
            if support == 0 {
                continue;
            }

            available -= support as u128;
            plan.pool_after -= support as u128;
            plan.tide_in_total = plan.tide_in_total.saturating_add(support);
            plan.deltas.push(UnitDelta {
                ordinal: candidate.ordinal,
                debit: 0,
                credit: support,
            });
            plan.supported.push(candidate.id.clone());
            plan.events.push(TideEvent {
                epoch: plan.epoch,
                kind: TideKind::TideIn,
                unit_id: candidate.id.clone(),
                amount: support,
                source: NETWORK_POOL_ID.to_string(),
                destination: candidate.id.clone(),
                reason: format!(
                    "critical support: ratio {} bps, deficit {} to {} bps",
                    ratio_bps(candidate.balance, candidate.target),
                    deficit,
                    self.config.support_threshold_bps
                ),
            });

            debug!(
                epoch = plan.epoch,
                unit = %candidate.id,
                deficit,
                amount = support,
                "tide in planned"
            );
        }
    }
}

/// `floor(amount * bps / 10_000)` for pool-sized `u128` amounts.
fn bps_of(amount: u128, bps: u32) -> u128 {
    // amount < 2^65 in practice (u64 pool plus u64 of drips), bps <= 10_000:
    // the product stays far below u128::MAX.
    amount.saturating_mul(bps as u128) / BPS_DENOMINATOR as u128
}
