//! # Tide Engine
//!
//! [`TideEngine`] is the in-process API: it owns the registry, the pool, the
//! epoch processor and the audit log, and is the only way callers touch
//! them. Hosts construct one explicitly and pass it (or a
//! [`SharedTideEngine`] handle) to whatever needs it.
//!
//! ## Call Surface
//!
//! ```text
//! external ledger ──► register_unit / deposit_* / withdraw_* / set_unit_tier
//! scheduler       ──► process_epoch(n)
//! reporting       ──► ecosystem_metrics / tide_history / events / unit(s)
//! ```
//!
//! Deposits and withdrawals are the only operations that change
//! [`total_value`](TideEngine::total_value); epochs only move value around.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::TideConfig;
use crate::epoch::{EpochPhase, EpochProcessor, EpochResult};
use crate::error::TideResult;
use crate::flow::TideEvent;
use crate::health::{classify_pool, pool_target, NetworkHealth};
use crate::history::{MetricsSnapshot, TideHistory};
use crate::telemetry::TideMetrics;
use crate::treasury::{NetworkPool, Tier, TreasuryRegistry, UnitHandle, UnitSnapshot};

// ---------------------------------------------------------------------------
// TideEngine
// ---------------------------------------------------------------------------

/// Owner of all tide state.
#[derive(Debug)]
pub struct TideEngine {
    config: TideConfig,
    registry: TreasuryRegistry,
    pool: NetworkPool,
    processor: EpochProcessor,
    history: TideHistory,
    telemetry: Option<TideMetrics>,
}

impl TideEngine {
    /// Creates an empty engine with an empty pool.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::InvalidConfig`](crate::TideError::InvalidConfig)
    /// if `config` fails validation.
    pub fn new(config: TideConfig) -> TideResult<Self> {
        config.validate()?;
        info!(
            drip_bps = config.overflow_drip_bps,
            support_rate_bps = config.support_rate_bps,
            max_support_bps = config.max_support_per_epoch_bps,
            reserve_bps = config.min_network_reserve_bps,
            "tide engine created"
        );
        Ok(Self {
            processor: EpochProcessor::new(config.clone()),
            config,
            registry: TreasuryRegistry::new(),
            pool: NetworkPool::default(),
            history: TideHistory::new(),
            telemetry: None,
        })
    }

    /// Attaches Prometheus handles. Every committed epoch and every external
    /// balance change is reflected in them from here on.
    pub fn with_telemetry(mut self, metrics: TideMetrics) -> Self {
        metrics.observe_state(&self.ecosystem_metrics());
        self.telemetry = Some(metrics);
        self
    }

    /// Attached telemetry, if any.
    pub fn telemetry(&self) -> Option<&TideMetrics> {
        self.telemetry.as_ref()
    }

    /// The active configuration.
    pub fn config(&self) -> &TideConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // External ledger hooks
    // -----------------------------------------------------------------------

    /// Registers a unit and seeds its balance.
    ///
    /// # Errors
    ///
    /// Returns [`TideError::DuplicateUnit`](crate::TideError::DuplicateUnit)
    /// if the id is taken; nothing is registered in that case.
    pub fn register_unit(
        &mut self,
        id: &str,
        tier: Tier,
        initial_balance: u64,
    ) -> TideResult<UnitHandle> {
        let handle = self.registry.register(id, tier)?;
        self.registry.update_balance(id, initial_balance)?;
        info!(unit = id, %tier, balance = initial_balance, "unit registered");
        self.refresh_telemetry();
        Ok(handle)
    }

    /// Adds external funds to a unit. Returns the new balance.
    pub fn deposit_to_unit(&mut self, id: &str, amount: u64) -> TideResult<u64> {
        let balance = self.registry.credit(id, amount)?;
        debug!(unit = id, amount, balance, "unit deposit");
        self.refresh_telemetry();
        Ok(balance)
    }

    /// Removes funds from a unit. Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`TideError::InvalidAmount`](crate::TideError::InvalidAmount) if
    /// `amount` exceeds the balance; the balance is left untouched.
    pub fn withdraw_from_unit(&mut self, id: &str, amount: u64) -> TideResult<u64> {
        let balance = self.registry.debit(id, amount)?;
        debug!(unit = id, amount, balance, "unit withdrawal");
        self.refresh_telemetry();
        Ok(balance)
    }

    /// Moves a unit to another tier. Takes effect at the next epoch.
    pub fn set_unit_tier(&mut self, id: &str, tier: Tier) -> TideResult<()> {
        self.registry.update_tier(id, tier)?;
        self.refresh_telemetry();
        Ok(())
    }

    /// Adds external funds to the network pool. Returns the new balance.
    pub fn deposit_to_pool(&mut self, amount: u64) -> TideResult<u64> {
        let balance = self.pool.deposit(amount)?;
        debug!(amount, balance, "pool deposit");
        self.refresh_telemetry();
        Ok(balance)
    }

    /// Removes funds from the network pool. Returns the new balance.
    pub fn withdraw_from_pool(&mut self, amount: u64) -> TideResult<u64> {
        let balance = self.pool.withdraw(amount)?;
        debug!(amount, balance, "pool withdrawal");
        self.refresh_telemetry();
        Ok(balance)
    }

    // -----------------------------------------------------------------------
    // Epochs
    // -----------------------------------------------------------------------

    /// Runs one tide epoch. See [`EpochProcessor::process`].
    ///
    /// # Errors
    ///
    /// Only [`TideError::InvariantViolation`](crate::TideError::InvariantViolation),
    /// which leaves every balance as it was before the call.
    pub fn process_epoch(&mut self, epoch: u64) -> TideResult<EpochResult> {
        let result = self.processor.process(
            epoch,
            &mut self.registry,
            &mut self.pool,
            &mut self.history,
        )?;

        if let Some(metrics) = &self.telemetry {
            metrics.observe_epoch(&result, &self.ecosystem_metrics());
        }
        Ok(result)
    }

    /// Processor phase. `Idle` whenever no epoch is running.
    pub fn phase(&self) -> EpochPhase {
        self.processor.phase()
    }

    // -----------------------------------------------------------------------
    // Read-only views
    // -----------------------------------------------------------------------

    /// Ecosystem overview built from current state.
    pub fn ecosystem_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot::collect(
            &self.registry,
            &self.pool,
            &self.history,
            self.config.min_pool_target,
            self.config.top_supported_limit,
        )
    }

    /// The last `limit` epoch results, most recent last.
    pub fn tide_history(&self, limit: usize) -> Vec<EpochResult> {
        self.history.tide_history(limit)
    }

    /// Every committed event, oldest first.
    pub fn events(&self) -> &[TideEvent] {
        self.history.events()
    }

    /// Committed events for one unit, oldest first.
    pub fn events_for_unit(&self, id: &str) -> Vec<TideEvent> {
        self.history.events_for_unit(id)
    }

    /// Snapshot of one unit.
    pub fn unit(&self, id: &str) -> TideResult<UnitSnapshot> {
        self.registry.get(id)
    }

    /// Snapshots of every unit, in registration order.
    pub fn units(&self) -> Vec<UnitSnapshot> {
        self.registry.list_all()
    }

    /// Current pool balance.
    pub fn pool_balance(&self) -> u64 {
        self.pool.balance()
    }

    /// Pool target: 10% of all unit targets, floored at `min_pool_target`.
    pub fn pool_target(&self) -> u64 {
        pool_target(self.registry.total_target(), self.config.min_pool_target)
    }

    /// Pool health band.
    pub fn pool_health(&self) -> NetworkHealth {
        classify_pool(self.pool.balance(), self.pool_target())
    }

    /// `sum(unit balances) + pool balance`.
    pub fn total_value(&self) -> u128 {
        self.registry.total_balance() + self.pool.balance() as u128
    }

    fn refresh_telemetry(&self) {
        if let Some(metrics) = &self.telemetry {
            metrics.observe_state(&self.ecosystem_metrics());
        }
    }
}

// ---------------------------------------------------------------------------
// SharedTideEngine
// ---------------------------------------------------------------------------

/// Cloneable, thread-safe handle to one [`TideEngine`].
///
/// Every mutating call holds the write lock for its whole duration, so an
/// epoch is a single critical section. Reads share the read lock and never
/// see a half-applied epoch.
#[derive(Clone, Debug)]
pub struct SharedTideEngine {
    inner: Arc<RwLock<TideEngine>>,
}

impl SharedTideEngine {
    /// Wraps an engine.
    pub fn new(engine: TideEngine) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
        }
    }

    pub fn register_unit(
        &self,
        id: &str,
        tier: Tier,
        initial_balance: u64,
    ) -> TideResult<UnitHandle> {
        self.inner.write().register_unit(id, tier, initial_balance)
    }

    pub fn deposit_to_unit(&self, id: &str, amount: u64) -> TideResult<u64> {
        self.inner.write().deposit_to_unit(id, amount)
    }

    pub fn withdraw_from_unit(&self, id: &str, amount: u64) -> TideResult<u64> {
        self.inner.write().withdraw_from_unit(id, amount)
    }

    pub fn set_unit_tier(&self, id: &str, tier: Tier) -> TideResult<()> {
        self.inner.write().set_unit_tier(id, tier)
    }

    pub fn deposit_to_pool(&self, amount: u64) -> TideResult<u64> {
        self.inner.write().deposit_to_pool(amount)
    }

    pub fn withdraw_from_pool(&self, amount: u64) -> TideResult<u64> {
        self.inner.write().withdraw_from_pool(amount)
    }

    pub fn process_epoch(&self, epoch: u64) -> TideResult<EpochResult> {
        let mut engine = self.inner.write();
        let result = engine.process_epoch(epoch);
        if let Err(e) = &result {
            warn!(epoch, error = %e, "shared engine epoch failed");
        }
        result
    }

    pub fn ecosystem_metrics(&self) -> MetricsSnapshot {
        self.inner.read().ecosystem_metrics()
    }

    pub fn tide_history(&self, limit: usize) -> Vec<EpochResult> {
        self.inner.read().tide_history(limit)
    }

    pub fn events(&self) -> Vec<TideEvent> {
        self.inner.read().events().to_vec()
    }

    pub fn events_for_unit(&self, id: &str) -> Vec<TideEvent> {
        self.inner.read().events_for_unit(id)
    }

    pub fn unit(&self, id: &str) -> TideResult<UnitSnapshot> {
        self.inner.read().unit(id)
    }

    pub fn units(&self) -> Vec<UnitSnapshot> {
        self.inner.read().units()
    }

    pub fn pool_balance(&self) -> u64 {
        self.inner.read().pool_balance()
    }

    pub fn pool_health(&self) -> NetworkHealth {
        self.inner.read().pool_health()
    }

    pub fn total_value(&self) -> u128 {
        self.inner.read().total_value()
    }

    /// Runs `f` under the read lock, for views that need several reads to
    /// agree with each other.
    pub fn with_read<R>(&self, f: impl FnOnce(&TideEngine) -> R) -> R {
        f(&self.inner.read())
    }
}

impl From<TideEngine> for SharedTideEngine {
    fn from(engine: TideEngine) -> Self {
        Self::new(engine)
    }
}
