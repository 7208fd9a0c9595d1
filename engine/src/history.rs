//! # Audit Log, History & Ecosystem Metrics
//!
//! [`TideHistory`] is the append-only record of what the engine has done:
//! every [`TideEvent`] ever committed, every [`EpochResult`], and running
//! totals. The epoch processor is the only writer, and only at commit time.
//!
//! [`MetricsSnapshot`] is a derived, read-only view over the history plus
//! current registry and pool state. Building one never mutates anything.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::epoch::EpochResult;
use crate::flow::TideEvent;
use crate::health::{classify_pool, pool_target, ratio_bps, HealthBand, NetworkHealth};
use crate::treasury::{NetworkPool, TreasuryRegistry};

// ---------------------------------------------------------------------------
// TideHistory
// ---------------------------------------------------------------------------

/// Append-only log of committed epochs and their events.
#[derive(Clone, Debug, Default)]
pub struct TideHistory {
    events: Vec<TideEvent>,
    epochs: Vec<EpochResult>,
    total_tide_in: u128,
    total_tide_out: u128,
    support_events: u64,
}

impl TideHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a committed epoch. Called once per epoch by the processor.
    pub(crate) fn record(&mut self, result: &EpochResult) {
        self.events.extend(result.events.iter().cloned());
        self.total_tide_in += result.tide_in_total as u128;
        self.total_tide_out += result.tide_out_total as u128;
        self.support_events += result.supported_unit_ids.len() as u64;
        self.epochs.push(result.clone());
    }

    /// The last `limit` epoch results, most recent last.
    pub fn tide_history(&self, limit: usize) -> Vec<EpochResult> {
        let start = self.epochs.len().saturating_sub(limit);
        self.epochs[start..].to_vec()
    }

    /// Every committed event, oldest first.
    pub fn events(&self) -> &[TideEvent] {
        &self.events
    }

    /// Committed events involving one unit, oldest first.
    pub fn events_for_unit(&self, unit_id: &str) -> Vec<TideEvent> {
        self.events
            .iter()
            .filter(|e| e.unit_id == unit_id)
            .cloned()
            .collect()
    }

    /// Number of committed epochs.
    pub fn epochs_processed(&self) -> u64 {
        self.epochs.len() as u64
    }

    /// Epoch number of the most recent commit.
    pub fn last_epoch(&self) -> Option<u64> {
        self.epochs.last().map(|r| r.epoch)
    }

    /// Cumulative tide-in across all epochs.
    pub fn total_tide_in(&self) -> u128 {
        self.total_tide_in
    }

    /// Cumulative tide-out across all epochs.
    pub fn total_tide_out(&self) -> u128 {
        self.total_tide_out
    }

    /// Cumulative number of tide-in events.
    pub fn support_events(&self) -> u64 {
        self.support_events
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Count of units per health band.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandDistribution {
    pub critical: usize,
    pub building: usize,
    pub healthy: usize,
    pub strong: usize,
    pub overflow: usize,
}

impl BandDistribution {
    fn add(&mut self, band: HealthBand) {
        match band {
            HealthBand::Critical => self.critical += 1,
            HealthBand::Building => self.building += 1,
            HealthBand::Healthy => self.healthy += 1,
            HealthBand::Strong => self.strong += 1,
            HealthBand::Overflow => self.overflow += 1,
        }
    }

    /// Number of units in `band`.
    pub fn count(&self, band: HealthBand) -> usize {
        match band {
            HealthBand::Critical => self.critical,
            HealthBand::Building => self.building,
            HealthBand::Healthy => self.healthy,
            HealthBand::Strong => self.strong,
            HealthBand::Overflow => self.overflow,
        }
    }
}

/// Entry of the most-supported ranking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedUnit {
    pub id: String,
    /// Number of epochs in which the unit received tide-in.
    pub support_count: u64,
    pub total_received: u64,
}

/// Read-only ecosystem overview.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub unit_count: usize,
    pub pool_balance: u64,
    pub pool_target: u64,
    pub pool_health: NetworkHealth,
    pub pool_ratio_bps: u64,
    /// Sum of unit balances (excludes the pool).
    pub total_treasury_balance: u128,
    /// Mean of per-unit reserve ratios, in basis points. Zero with no units.
    pub average_reserve_ratio_bps: u64,
    pub band_distribution: BandDistribution,
    pub total_tide_in: u128,
    pub total_tide_out: u128,
    pub epochs_processed: u64,
    pub last_epoch: Option<u64>,
    /// Most-supported units: support count descending, then id ascending.
    pub top_supported: Vec<SupportedUnit>,
}

impl MetricsSnapshot {
    /// Builds the view from current state.
    pub fn collect(
        registry: &TreasuryRegistry,
        pool: &NetworkPool,
        history: &TideHistory,
        min_pool_target: u64,
        top_n: usize,
    ) -> Self {
        let units = registry.units();

        let mut band_distribution = BandDistribution::default();
        let mut ratio_sum: u128 = 0;
        for unit in units {
            band_distribution.add(unit.band());
            ratio_sum += ratio_bps(unit.balance, unit.target()) as u128;
        }
        let average_reserve_ratio_bps = if units.is_empty() {
            0
        } else {
            u64::try_from(ratio_sum / units.len() as u128).unwrap_or(u64::MAX)
        };

        let mut ranked: Vec<SupportedUnit> = units
            .iter()
            .filter(|u| u.support_count > 0)
            .map(|u| SupportedUnit {
                id: u.id.clone(),
                support_count: u.support_count,
                total_received: u.total_received,
            })
            .collect();
        ranked.sort_by(|a, b| {
            Reverse(a.support_count)
                .cmp(&Reverse(b.support_count))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(top_n);

        let target = pool_target(registry.total_target(), min_pool_target);

        Self {
            unit_count: units.len(),
            pool_balance: pool.balance(),
            pool_target: target,
            pool_health: classify_pool(pool.balance(), target),
            pool_ratio_bps: ratio_bps(pool.balance(), target),
            total_treasury_balance: registry.total_balance(),
            average_reserve_ratio_bps,
            band_distribution,
            total_tide_in: history.total_tide_in(),
            total_tide_out: history.total_tide_out(),
            epochs_processed: history.epochs_processed(),
            last_epoch: history.last_epoch(),
            top_supported: ranked,
        }
    }
}
