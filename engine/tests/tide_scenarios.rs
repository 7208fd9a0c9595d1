//! End-to-end tests for the tide engine.
//!
//! Each test builds its own engine through the public API only, runs one or
//! more epochs, and checks balances, events and the ledger invariants.

use tide_engine::{
    HealthBand, NetworkHealth, TideConfig, TideEngine, TideError, TideKind, Tier, NETWORK_POOL_ID,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn engine_with(config: TideConfig, pool: u64, units: &[(&str, Tier, u64)]) -> TideEngine {
    let mut engine = TideEngine::new(config).expect("valid config");
    engine.deposit_to_pool(pool).expect("pool deposit");
    for (id, tier, balance) in units {
        engine.register_unit(id, *tier, *balance).expect("register");
    }
    engine
}

fn engine(pool: u64, units: &[(&str, Tier, u64)]) -> TideEngine {
    engine_with(TideConfig::default(), pool, units)
}

/// A mixed ecosystem: rich, comfortable, poor and zero-target units.
fn mixed_engine() -> TideEngine {
    engine(
        40_000_000,
        &[
            ("whale", Tier::T2, 4_000_000_000),
            ("rich", Tier::T1, 180_000_000),
            ("steady", Tier::T1, 70_000_000),
            ("poor", Tier::T1, 1_000_000),
            ("broke", Tier::T2, 0),
            ("tiny", Tier::T3, 3_000_000),
            ("free", Tier::T0, 12_345),
        ],
    )
}

// ---------------------------------------------------------------------------
// Reference Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_a_overflow_only() {
    let mut engine = engine(500_000_000, &[("U1", Tier::T1, 150_000_000)]);
    assert_eq!(engine.unit("U1").unwrap().band, HealthBand::Overflow);

    let result = engine.process_epoch(1).unwrap();

    assert_eq!(result.tide_out_total, 500_000);
    assert_eq!(result.tide_in_total, 0);
    assert_eq!(result.overflow_count, 1);
    assert_eq!(result.critical_count, 0);
    assert_eq!(result.contributing_unit_ids, vec!["U1".to_string()]);
    assert!(result.supported_unit_ids.is_empty());
    assert_eq!(engine.unit("U1").unwrap().balance, 149_500_000);
    assert_eq!(engine.pool_balance(), 500_500_000);

    let event = &result.events[0];
    assert_eq!(event.kind, TideKind::TideOut);
    assert_eq!(event.source, "U1");
    assert_eq!(event.destination, NETWORK_POOL_ID);
    assert_eq!(event.amount, 500_000);
}

#[test]
fn scenario_b_critical_only() {
    let mut engine = engine(500_000_000, &[("U2", Tier::T1, 2_000_000)]);
    assert_eq!(engine.unit("U2").unwrap().band, HealthBand::Critical);

    let result = engine.process_epoch(1).unwrap();

    assert_eq!(result.tide_in_total, 3_000_000);
    assert_eq!(result.tide_out_total, 0);
    assert_eq!(result.supported_unit_ids, vec!["U2".to_string()]);

    let u2 = engine.unit("U2").unwrap();
    assert_eq!(u2.balance, 5_000_000);
    // Exactly on the 5% boundary: BUILDING, not CRITICAL.
    assert_eq!(u2.band, HealthBand::Building);
    assert_eq!(u2.support_count, 1);
    assert_eq!(engine.pool_balance(), 497_000_000);

    let event = &result.events[0];
    assert_eq!(event.kind, TideKind::TideIn);
    assert_eq!(event.source, NETWORK_POOL_ID);
    assert_eq!(event.destination, "U2");
}

#[test]
fn scenario_c_limited_capacity_serves_most_severe_first() {
    // Full per-unit rate so `available` is the only bound. Pool 8M gives
    // available = min(8M - 0.8M, 25% of 8M) = 2M.
    let config = TideConfig {
        support_rate_bps: 10_000,
        ..TideConfig::default()
    };
    let mut engine = engine_with(
        config,
        8_000_000,
        &[
            ("a_mild", Tier::T1, 2_000_000),
            ("z_severe", Tier::T1, 1_999_999),
        ],
    );

    let result = engine.process_epoch(1).unwrap();

    assert_eq!(result.critical_count, 2);
    assert_eq!(result.supported_unit_ids, vec!["z_severe".to_string()]);
    assert_eq!(result.tide_in_total, 2_000_000);
    assert_eq!(engine.unit("z_severe").unwrap().balance, 3_999_999);
    assert_eq!(engine.unit("a_mild").unwrap().balance, 2_000_000);
    assert_eq!(engine.unit("a_mild").unwrap().support_count, 0);
    assert_eq!(engine.pool_balance(), 6_000_000);
}

#[test]
fn scenario_c_default_rate_spreads_support() {
    let mut engine = engine(
        8_000_000,
        &[
            ("a_mild", Tier::T1, 2_000_000),
            ("z_severe", Tier::T1, 1_999_999),
        ],
    );

    let result = engine.process_epoch(1).unwrap();

    // 10% of the remaining 2M, then 10% of the remaining 1.8M.
    assert_eq!(
        result.supported_unit_ids,
        vec!["z_severe".to_string(), "a_mild".to_string()]
    );
    assert_eq!(engine.unit("z_severe").unwrap().balance, 2_199_999);
    assert_eq!(engine.unit("a_mild").unwrap().balance, 2_180_000);
    assert_eq!(result.tide_in_total, 380_000);
}

#[test]
fn equal_ratios_tie_break_by_id() {
    let mut engine = engine(
        500_000_000,
        &[("beta", Tier::T1, 0), ("alpha", Tier::T1, 0)],
    );
    let result = engine.process_epoch(1).unwrap();
    assert_eq!(
        result.supported_unit_ids,
        vec!["alpha".to_string(), "beta".to_string()]
    );
}

#[test]
fn drips_fund_tide_in_within_the_same_epoch() {
    let mut engine = engine(
        0,
        &[("rich", Tier::T1, 1_100_000_000), ("poor", Tier::T1, 0)],
    );

    let result = engine.process_epoch(1).unwrap();

    // Drip 1% of 1e9 = 10M; available = min(9M, 2.5M); per-unit 10%.
    assert_eq!(result.tide_out_total, 10_000_000);
    assert_eq!(result.tide_in_total, 250_000);
    assert_eq!(result.events[0].kind, TideKind::TideOut);
    assert_eq!(result.events[1].kind, TideKind::TideIn);
    assert_eq!(engine.pool_balance(), 9_750_000);
}

#[test]
fn empty_pool_is_a_quiet_epoch() {
    let mut engine = engine(0, &[("poor", Tier::T1, 0)]);
    let result = engine.process_epoch(1).unwrap();
    assert!(result.is_quiet());
    assert_eq!(result.critical_count, 1);
    assert_eq!(engine.unit("poor").unwrap().balance, 0);
}

#[test]
fn no_units_is_a_quiet_epoch() {
    let mut engine = engine(1_000, &[]);
    let result = engine.process_epoch(1).unwrap();
    assert!(result.is_quiet());
    assert_eq!(engine.pool_balance(), 1_000);
}

// ---------------------------------------------------------------------------
// Ledger Invariants
// ---------------------------------------------------------------------------

#[test]
fn invariants_hold_over_many_epochs() {
    let mut engine = mixed_engine();
    let total = engine.total_value();
    let threshold = engine.config().support_threshold_bps as u128;

    for epoch in 1..=200 {
        let before = engine.units();
        let result = engine.process_epoch(epoch).unwrap();
        let after = engine.units();

        assert_eq!(engine.total_value(), total, "conservation at epoch {epoch}");
        assert_eq!(result.pool_balance_after, engine.pool_balance());

        for (pre, post) in before.iter().zip(&after) {
            assert_eq!(pre.id, post.id);

            if post.balance < pre.balance {
                // Only overflow drips debit a unit.
                assert_eq!(pre.band, HealthBand::Overflow);
                assert!(
                    post.balance >= pre.target,
                    "{} drained below target at epoch {epoch}",
                    pre.id
                );
            }

            if post.balance > pre.balance {
                assert_eq!(pre.band, HealthBand::Critical);
                let refill_to = (pre.target as u128 * threshold / 10_000) as u64;
                assert!(
                    post.balance - pre.balance <= refill_to - pre.balance,
                    "{} over-supported at epoch {epoch}",
                    pre.id
                );
            }
        }
    }

    let metrics = engine.ecosystem_metrics();
    assert_eq!(metrics.epochs_processed, 200);
    assert!(metrics.total_tide_out > 0);
    assert!(metrics.total_tide_in > 0);
}

#[test]
fn pool_never_lends_past_reserve_or_epoch_cap() {
    let mut engine = mixed_engine();
    let config = engine.config().clone();

    for epoch in 1..=50 {
        let result = engine.process_epoch(epoch).unwrap();
        let pool_after_drips = result.pool_balance_before as u128 + result.tide_out_total as u128;
        let reserve = pool_after_drips * config.min_network_reserve_bps as u128 / 10_000;
        let cap = pool_after_drips * config.max_support_per_epoch_bps as u128 / 10_000;

        assert!((result.tide_in_total as u128) <= pool_after_drips - reserve);
        assert!((result.tide_in_total as u128) <= cap);
    }
}

#[test]
fn zero_target_units_never_participate() {
    let mut engine = engine(
        1_000_000_000,
        &[
            ("empty", Tier::T0, 0),
            ("loaded", Tier::T0, u64::MAX / 4),
            ("poor", Tier::T1, 0),
        ],
    );

    for epoch in 1..=20 {
        engine.process_epoch(epoch).unwrap();
    }

    for id in ["empty", "loaded"] {
        let unit = engine.unit(id).unwrap();
        assert_eq!(unit.band, HealthBand::Strong);
        assert_eq!(unit.support_count, 0);
        assert_eq!(unit.total_contributed, 0);
        assert!(engine.events_for_unit(id).is_empty());
    }
    assert_eq!(engine.unit("loaded").unwrap().balance, u64::MAX / 4);
    assert!(!engine.events_for_unit("poor").is_empty());
}

#[test]
fn failed_epoch_commits_nothing() {
    // The drip would push the pool past u64::MAX.
    let mut engine = engine(u64::MAX - 10, &[("rich", Tier::T1, 100_100_000)]);
    let units_before = engine.units();
    let pool_before = engine.pool_balance();

    let err = engine.process_epoch(1).unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, TideError::InvariantViolation { epoch: 1, .. }));
    assert_eq!(engine.units(), units_before);
    assert_eq!(engine.pool_balance(), pool_before);
    assert!(engine.tide_history(10).is_empty());
    assert!(engine.events().is_empty());

    // Once the pool has headroom the same epoch goes through.
    engine.withdraw_from_pool(1_000_000).unwrap();
    let result = engine.process_epoch(1).unwrap();
    assert_eq!(result.tide_out_total, 1_000);
}

// ---------------------------------------------------------------------------
// External Hooks & Errors
// ---------------------------------------------------------------------------

#[test]
fn external_hooks_report_typed_errors() {
    let mut engine = engine(100, &[("u1", Tier::T1, 50)]);

    assert_eq!(
        engine.register_unit("u1", Tier::T2, 0),
        Err(TideError::DuplicateUnit("u1".into()))
    );
    assert_eq!(
        engine.deposit_to_unit("ghost", 1),
        Err(TideError::UnitNotFound("ghost".into()))
    );
    assert!(matches!(
        engine.set_unit_tier("ghost", Tier::T1),
        Err(TideError::UnitNotFound(_))
    ));
    assert!(matches!(engine.unit("ghost"), Err(TideError::UnitNotFound(_))));

    let overdraw = engine.withdraw_from_unit("u1", 51).unwrap_err();
    assert!(!overdraw.is_fatal());
    assert!(matches!(overdraw, TideError::InvalidAmount { unit: Some(ref u), .. } if u == "u1"));

    assert!(matches!(
        engine.deposit_to_pool(u64::MAX),
        Err(TideError::InvalidAmount { unit: None, .. })
    ));
    assert_eq!(engine.total_value(), 150);
}

#[test]
fn tier_change_takes_effect_next_epoch() {
    let mut engine = engine(500_000_000, &[("u1", Tier::T1, 150_000_000)]);

    // 150M against a T3 target of 1e10 is 1.5%: CRITICAL.
    engine.set_unit_tier("u1", Tier::T3).unwrap();
    assert_eq!(engine.unit("u1").unwrap().band, HealthBand::Critical);

    let result = engine.process_epoch(1).unwrap();
    assert_eq!(result.tide_out_total, 0);
    assert_eq!(result.supported_unit_ids, vec!["u1".to_string()]);
    // Deficit is 350M; the per-unit cap is 10% of the 125M available.
    assert_eq!(result.tide_in_total, 12_500_000);
}

#[test]
fn out_of_order_epochs_are_processed() {
    let mut engine = engine(500_000_000, &[("u1", Tier::T1, 150_000_000)]);
    engine.process_epoch(5).unwrap();
    engine.process_epoch(3).unwrap();
    engine.process_epoch(3).unwrap();

    let epochs: Vec<u64> = engine.tide_history(10).iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![5, 3, 3]);
}

// ---------------------------------------------------------------------------
// Metrics & History
// ---------------------------------------------------------------------------

#[test]
fn metrics_and_history_views() {
    let mut engine = mixed_engine();
    for epoch in 1..=10 {
        engine.process_epoch(epoch).unwrap();
    }

    let metrics = engine.ecosystem_metrics();
    assert_eq!(metrics.unit_count, 7);
    assert_eq!(metrics.epochs_processed, 10);
    assert_eq!(metrics.last_epoch, Some(10));
    assert_eq!(metrics.pool_balance, engine.pool_balance());
    assert_eq!(
        metrics.total_treasury_balance + metrics.pool_balance as u128,
        engine.total_value()
    );
    let distributed: usize = HealthBand::ALL
        .iter()
        .map(|b| metrics.band_distribution.count(*b))
        .sum();
    assert_eq!(distributed, 7);

    // Support counts descending, ids ascending on ties.
    let top = &metrics.top_supported;
    assert!(!top.is_empty());
    assert!(top.len() <= engine.config().top_supported_limit);
    for pair in top.windows(2) {
        assert!(
            pair[0].support_count > pair[1].support_count
                || (pair[0].support_count == pair[1].support_count && pair[0].id < pair[1].id)
        );
    }

    let history = engine.tide_history(3);
    let epochs: Vec<u64> = history.iter().map(|r| r.epoch).collect();
    assert_eq!(epochs, vec![8, 9, 10]);

    let total_events: usize = engine.tide_history(100).iter().map(|r| r.events.len()).sum();
    assert_eq!(engine.events().len(), total_events);

    // Reads never mutate.
    assert_eq!(engine.ecosystem_metrics(), metrics);
}

#[test]
fn pool_health_follows_balance() {
    let mut engine = engine(0, &[("u1", Tier::T2, 500_000_000)]);
    // Target = max(10% of 1e9, 1e8) = 1e8.
    assert_eq!(engine.pool_target(), 100_000_000);
    assert_eq!(engine.pool_health(), NetworkHealth::Depleted);

    engine.deposit_to_pool(10_000_000).unwrap();
    assert_eq!(engine.pool_health(), NetworkHealth::Low);
    engine.deposit_to_pool(20_000_000).unwrap();
    assert_eq!(engine.pool_health(), NetworkHealth::Adequate);
    engine.deposit_to_pool(40_000_000).unwrap();
    assert_eq!(engine.pool_health(), NetworkHealth::Thriving);
}

#[test]
fn epoch_result_serializes_to_json() {
    let mut engine = engine(500_000_000, &[("U2", Tier::T1, 2_000_000)]);
    let result = engine.process_epoch(1).unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["tide_in_total"], 3_000_000);
    assert_eq!(json["events"][0]["kind"], "tide_in");

    let back: tide_engine::EpochResult = serde_json::from_value(json).unwrap();
    assert_eq!(back, result);

    let metrics = serde_json::to_value(engine.ecosystem_metrics()).unwrap();
    assert_eq!(metrics["pool_health"], "THRIVING");
}
