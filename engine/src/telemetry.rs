//! # Prometheus Telemetry
//!
//! Operational gauges and counters for the tide engine. All handles live in
//! a dedicated [`prometheus::Registry`] (prefix `tide`) so they never collide
//! with a host's default registry. The host decides how to expose
//! [`TideMetrics::encode`]; the engine only keeps the values current.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

use crate::epoch::EpochResult;
use crate::history::MetricsSnapshot;

/// Holds every Prometheus handle for one engine.
///
/// Clone-friendly: prometheus handles are `Arc`s internally.
#[derive(Clone)]
pub struct TideMetrics {
    registry: Registry,
    /// Current network pool balance.
    pub pool_balance: IntGauge,
    /// Sum of all unit balances.
    pub treasury_balance: IntGauge,
    /// Number of registered units.
    pub units_registered: IntGauge,
    /// Units in the CRITICAL band after the last epoch.
    pub critical_units: IntGauge,
    /// Units in the OVERFLOW band after the last epoch.
    pub overflow_units: IntGauge,
    /// Pool balance over pool target, in basis points.
    pub pool_health_ratio_bps: IntGauge,
    /// Committed epochs.
    pub epochs_processed_total: IntCounter,
    /// Cumulative pool-to-unit flow.
    pub tide_in_total: IntCounter,
    /// Cumulative unit-to-pool flow.
    pub tide_out_total: IntCounter,
    /// Cumulative number of tide-in events.
    pub support_events_total: IntCounter,
}

impl TideMetrics {
    /// Creates and registers all metrics.
    ///
    /// # Errors
    ///
    /// Propagates registry construction or registration failures.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tide".into()), None)?;

        let gauge = |name: &str, help: &str| -> Result<IntGauge, prometheus::Error> {
            let g = IntGauge::new(name, help)?;
            registry.register(Box::new(g.clone()))?;
            Ok(g)
        };
        let counter = |name: &str, help: &str| -> Result<IntCounter, prometheus::Error> {
            let c = IntCounter::new(name, help)?;
            registry.register(Box::new(c.clone()))?;
            Ok(c)
        };

        Ok(Self {
            pool_balance: gauge("pool_balance", "Current network pool balance")?,
            treasury_balance: gauge("treasury_balance", "Sum of all unit treasury balances")?,
            units_registered: gauge("units_registered", "Number of registered units")?,
            critical_units: gauge("critical_units", "Units currently in the CRITICAL band")?,
            overflow_units: gauge("overflow_units", "Units currently in the OVERFLOW band")?,
            pool_health_ratio_bps: gauge(
                "pool_health_ratio_bps",
                "Network pool balance over pool target, in basis points",
            )?,
            epochs_processed_total: counter("epochs_processed_total", "Committed epochs")?,
            tide_in_total: counter("tide_in_total", "Cumulative tide-in from the pool to units")?,
            tide_out_total: counter(
                "tide_out_total",
                "Cumulative tide-out from overflowing units to the pool",
            )?,
            support_events_total: counter(
                "support_events_total",
                "Cumulative number of tide-in events",
            )?,
            registry,
        })
    }

    /// Folds one committed epoch and the post-epoch snapshot into the handles.
    pub fn observe_epoch(&self, result: &EpochResult, snapshot: &MetricsSnapshot) {
        self.epochs_processed_total.inc();
        self.tide_in_total.inc_by(result.tide_in_total);
        self.tide_out_total.inc_by(result.tide_out_total);
        self.support_events_total
            .inc_by(result.supported_unit_ids.len() as u64);
        self.observe_state(snapshot);
    }

    /// Refreshes the gauges from a snapshot.
    pub fn observe_state(&self, snapshot: &MetricsSnapshot) {
        self.pool_balance.set(clamp_i64(snapshot.pool_balance as u128));
        self.treasury_balance
            .set(clamp_i64(snapshot.total_treasury_balance));
        self.units_registered.set(clamp_i64(snapshot.unit_count as u128));
        self.critical_units
            .set(clamp_i64(snapshot.band_distribution.critical as u128));
        self.overflow_units
            .set(clamp_i64(snapshot.band_distribution.overflow as u128));
        self.pool_health_ratio_bps
            .set(clamp_i64(snapshot.pool_ratio_bps as u128));
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl std::fmt::Debug for TideMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TideMetrics")
            .field("pool_balance", &self.pool_balance.get())
            .field("epochs_processed_total", &self.epochs_processed_total.get())
            .finish_non_exhaustive()
    }
}

/// Prometheus integer gauges are `i64`; ledger totals can exceed that.
fn clamp_i64(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::BandDistribution;
    use crate::health::NetworkHealth;
    use chrono::Utc;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            unit_count: 3,
            pool_balance: 497_000_000,
            pool_target: 100_000_000,
            pool_health: NetworkHealth::Thriving,
            pool_ratio_bps: 49_700,
            total_treasury_balance: u128::MAX,
            average_reserve_ratio_bps: 500,
            band_distribution: BandDistribution {
                critical: 2,
                building: 1,
                ..BandDistribution::default()
            },
            total_tide_in: 3_000_000,
            total_tide_out: 0,
            epochs_processed: 1,
            last_epoch: Some(1),
            top_supported: Vec::new(),
        }
    }

    fn epoch_result() -> EpochResult {
        EpochResult {
            epoch: 1,
            tide_in_total: 3_000_000,
            tide_out_total: 500_000,
            critical_count: 1,
            overflow_count: 1,
            supported_unit_ids: vec!["u2".into()],
            contributing_unit_ids: vec!["u1".into()],
            events: Vec::new(),
            pool_balance_before: 500_000_000,
            pool_balance_after: 497_500_000,
            committed_at: Utc::now(),
        }
    }

    #[test]
    fn observe_epoch_updates_handles() {
        let metrics = TideMetrics::new().expect("registry");
        metrics.observe_epoch(&epoch_result(), &snapshot());

        assert_eq!(metrics.epochs_processed_total.get(), 1);
        assert_eq!(metrics.tide_in_total.get(), 3_000_000);
        assert_eq!(metrics.tide_out_total.get(), 500_000);
        assert_eq!(metrics.support_events_total.get(), 1);
        assert_eq!(metrics.critical_units.get(), 2);
        assert_eq!(metrics.pool_balance.get(), 497_000_000);
        assert_eq!(metrics.treasury_balance.get(), i64::MAX);
    }

    #[test]
    fn encode_uses_tide_prefix() {
        let metrics = TideMetrics::new().expect("registry");
        metrics.observe_state(&snapshot());
        let text = metrics.encode().expect("encode");
        assert!(text.contains("tide_pool_balance 497000000"));
        assert!(text.contains("tide_epochs_processed_total 0"));
    }

    #[test]
    fn independent_instances_do_not_collide() {
        let a = TideMetrics::new().expect("first");
        let b = TideMetrics::new().expect("second");
        a.epochs_processed_total.inc();
        assert_eq!(b.epochs_processed_total.get(), 0);
    }
}
