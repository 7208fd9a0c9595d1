//! # Epoch Processor
//!
//! Turns a [`FlowPlan`] into committed state, all or nothing.
//!
//! ## State Machine
//!
//! ```text
//!   ┌──────┐  process   ┌──────────┐  plan ready  ┌──────────┐  validated  ┌───────────┐
//!   │ Idle │──────────►│ Planning │─────────────►│ Applying │────────────►│ Committed │
//!   └──▲───┘            └──────────┘              └────┬─────┘             └─────┬─────┘
//!      │                                      violation │                         │
//!      └────────────────────────────────────────────────┴─────────────────────────┘
//! ```
//!
//! 1. **PLANNING**: freeze every unit's balance, classify it, and run the
//!    planner against that snapshot. Nothing live is touched.
//! 2. **APPLYING**: stage every new balance in a scratch vector with
//!    checked arithmetic, then verify conservation and the per-flow bounds.
//!    Any failure aborts with [`TideError::InvariantViolation`] and leaves
//!    the registry and pool exactly as they were.
//! 3. **COMMITTED**: write the staged balances, bump support counters,
//!    append to the audit log, return the [`EpochResult`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{apply_bps, TideConfig};
use crate::error::{TideError, TideResult};
use crate::flow::{FlowCandidate, FlowPlan, FlowPlanner, TideEvent};
use crate::history::TideHistory;
use crate::treasury::{NetworkPool, TreasuryRegistry};

// ---------------------------------------------------------------------------
// EpochPhase
// ---------------------------------------------------------------------------

/// Where the processor is in its cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EpochPhase {
    Idle,
    Planning,
    Applying,
    Committed,
}

impl fmt::Display for EpochPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpochPhase::Idle => write!(f, "IDLE"),
            EpochPhase::Planning => write!(f, "PLANNING"),
            EpochPhase::Applying => write!(f, "APPLYING"),
            EpochPhase::Committed => write!(f, "COMMITTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// EpochResult
// ---------------------------------------------------------------------------

/// Outcome of one committed epoch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochResult {
    pub epoch: u64,
    pub tide_in_total: u64,
    pub tide_out_total: u64,
    /// CRITICAL units at the start of the epoch.
    pub critical_count: usize,
    /// OVERFLOW units at the start of the epoch.
    pub overflow_count: usize,
    /// Units that received tide-in, in the order they were served.
    pub supported_unit_ids: Vec<String>,
    /// Units that dripped into the pool, in registration order.
    pub contributing_unit_ids: Vec<String>,
    /// Tide-out events first, then tide-in.
    pub events: Vec<TideEvent>,
    pub pool_balance_before: u64,
    pub pool_balance_after: u64,
    pub committed_at: DateTime<Utc>,
}

impl EpochResult {
    /// `true` if the epoch moved nothing.
    pub fn is_quiet(&self) -> bool {
        self.events.is_empty()
    }
}

// ---------------------------------------------------------------------------
// EpochProcessor
// ---------------------------------------------------------------------------

/// Runs epochs against a registry and pool it borrows for the duration of
/// the call.
#[derive(Debug)]
pub struct EpochProcessor {
    planner: FlowPlanner,
    phase: EpochPhase,
}

impl EpochProcessor {
    /// Creates a processor. The config is assumed validated.
    pub fn new(config: TideConfig) -> Self {
        Self {
            planner: FlowPlanner::new(config),
            phase: EpochPhase::Idle,
        }
    }

    /// Current phase. Always `Idle` between calls.
    pub fn phase(&self) -> EpochPhase {
        self.phase
    }

    /// The active configuration.
    pub fn config(&self) -> &TideConfig {
        self.planner.config()
    }

    /// Processes one epoch.
    ///
    /// An epoch with no flows is a normal outcome. Out-of-order epoch numbers
    /// are processed anyway and logged.
    ///
    /// # Errors
    ///
    /// Only [`TideError::InvariantViolation`], and only if the plan would
    /// break a ledger invariant. Nothing is committed in that case.
    pub fn process(
        &mut self,
        epoch: u64,
        registry: &mut TreasuryRegistry,
        pool: &mut NetworkPool,
        history: &mut TideHistory,
    ) -> TideResult<EpochResult> {
        if let Some(last) = history.last_epoch() {
            if epoch <= last {
                warn!(epoch, last, "epoch number does not advance past last committed epoch");
            }
        }

        // --- PLANNING ---
        self.transition(epoch, EpochPhase::Planning);
        let candidates: Vec<FlowCandidate> = registry
            .units()
            .iter()
            .enumerate()
            .map(|(ordinal, unit)| FlowCandidate {
                ordinal,
                id: unit.id.clone(),
                balance: unit.balance,
                target: unit.target(),
                band: unit.band(),
            })
            .collect();
        let value_before = registry.total_balance() + pool.balance() as u128;
        let plan = self.planner.plan(epoch, &candidates, pool.balance());

        // --- APPLYING ---
        self.transition(epoch, EpochPhase::Applying);
        let staged = match self.stage(&plan, &candidates, value_before) {
            Ok(staged) => staged,
            Err(e) => {
                error!(epoch, error = %e, "epoch aborted, nothing committed");
                self.transition(epoch, EpochPhase::Idle);
                return Err(e);
            }
        };

        for (unit, balance) in registry.units_mut().iter_mut().zip(staged.balances) {
            unit.balance = balance;
        }
        pool.set_balance(staged.pool);

        // --- COMMITTED ---
        self.transition(epoch, EpochPhase::Committed);
        for delta in &plan.deltas {
            let unit = &mut registry.units_mut()[delta.ordinal];
            if delta.credit > 0 {
                unit.support_count += 1;
                unit.total_received = unit.total_received.saturating_add(delta.credit);
            }
            if delta.debit > 0 {
                unit.total_contributed = unit.total_contributed.saturating_add(delta.debit);
            }
        }
        let result = EpochResult {
            epoch,
            tide_in_total: plan.tide_in_total,
            tide_out_total: plan.tide_out_total,
            critical_count: plan.critical_count,
            overflow_count: plan.overflow_count,
            supported_unit_ids: plan.supported,
            contributing_unit_ids: plan.contributing,
            events: plan.events,
            pool_balance_before: plan.pool_before,
            pool_balance_after: staged.pool,
            committed_at: Utc::now(),
        };
        history.record(&result);

        info!(
            epoch,
            tide_out = result.tide_out_total,
            tide_in = result.tide_in_total,
            critical = result.critical_count,
            overflow = result.overflow_count,
            pool = result.pool_balance_after,
            "epoch committed"
        );

        self.transition(epoch, EpochPhase::Idle);
        Ok(result)
    }

    /// Computes every post-epoch balance without touching live state, and
    /// checks the ledger invariants against them.
    fn stage(
        &self,
        plan: &FlowPlan,
        candidates: &[FlowCandidate],
        value_before: u128,
    ) -> TideResult<Staged> {
        let violation = |detail: String| TideError::InvariantViolation {
            epoch: plan.epoch,
            detail,
        };
        let config = self.planner.config();

        let mut balances: Vec<u64> = candidates.iter().map(|c| c.balance).collect();

        for delta in &plan.deltas {
            let candidate = candidates
                .get(delta.ordinal)
                .ok_or_else(|| violation(format!("delta for unknown ordinal {}", delta.ordinal)))?;
            let current = balances[delta.ordinal];

            let drained = current.checked_sub(delta.debit).ok_or_else(|| {
                violation(format!(
                    "unit {} would go negative: balance {}, debit {}",
                    candidate.id, current, delta.debit
                ))
            })?;
            if delta.debit > 0 && drained < candidate.target {
                return Err(violation(format!(
                    "unit {} drained below target {} to {}",
                    candidate.id, candidate.target, drained
                )));
            }

            let refill_to = apply_bps(candidate.target, config.support_threshold_bps);
            if delta.credit > refill_to.saturating_sub(candidate.balance) {
                return Err(violation(format!(
                    "unit {} support {} exceeds deficit to {}",
                    candidate.id, delta.credit, refill_to
                )));
            }
            balances[delta.ordinal] = drained.checked_add(delta.credit).ok_or_else(|| {
                violation(format!("unit {} balance overflows on credit", candidate.id))
            })?;
        }

        if plan.tide_in_total as u128 > plan.available_for_support {
            return Err(violation(format!(
                "tide in {} exceeds available pool funds {}",
                plan.tide_in_total, plan.available_for_support
            )));
        }

        let pool = u64::try_from(plan.pool_after)
            .map_err(|_| violation(format!("pool balance {} overflows", plan.pool_after)))?;

        let value_after = balances.iter().map(|&b| b as u128).sum::<u128>() + pool as u128;
        if value_after != value_before {
            return Err(violation(format!(
                "conservation broken: total {} before, {} after",
                value_before, value_after
            )));
        }

        Ok(Staged { balances, pool })
    }

    fn transition(&mut self, epoch: u64, next: EpochPhase) {
        debug!(epoch, from = %self.phase, to = %next, "epoch phase");
        self.phase = next;
    }
}

/// Post-epoch state computed during APPLYING.
struct Staged {
    balances: Vec<u64>,
    pool: u64,
}
