// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Tide Engine: Treasury Rebalancing Core
//!
//! Periodic, IMF-style rebalancing of integer treasuries across a dynamic set
//! of independent units and one shared network pool. Rich units drip part of
//! their overflow into the pool; units close to empty are refilled from it,
//! most severe first, under per-unit and per-epoch caps. Money is never
//! created or destroyed by an epoch.
//!
//! ## Architecture
//!
//! - **config** - Protocol constants and the typed `TideConfig`.
//! - **health** - Band classification for units and the pool. Integer-only.
//! - **treasury** - The unit registry and the network pool.
//! - **flow** - Plans one epoch's tide-out and tide-in from a snapshot.
//! - **epoch** - PLANNING / APPLYING / COMMITTED, all or nothing.
//! - **history** - Append-only audit log and the metrics view over it.
//! - **engine** - The public facade and its thread-safe handle.
//! - **telemetry** - Prometheus gauges and counters.
//! - **logging** - `tracing` subscriber setup for hosts.
//!
//! ## Quick Start
//!
//! ```
//! use tide_engine::{Tier, TideConfig, TideEngine};
//!
//! let mut engine = TideEngine::new(TideConfig::default()).unwrap();
//! engine.deposit_to_pool(500_000_000).unwrap();
//! engine.register_unit("u2", Tier::T1, 2_000_000).unwrap();
//!
//! let result = engine.process_epoch(1).unwrap();
//! assert_eq!(result.tide_in_total, 3_000_000);
//! assert_eq!(engine.unit("u2").unwrap().balance, 5_000_000);
//! ```
//!
//! ## Ground Rules
//!
//! 1. Amounts are `u64`, rates are basis points, rounding is always floor.
//! 2. No floats anywhere a balance is computed.
//! 3. `sum(unit balances) + pool` only changes through deposits and withdrawals.

pub mod config;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod flow;
pub mod health;
pub mod history;
pub mod logging;
pub mod telemetry;
pub mod treasury;

pub use config::TideConfig;
pub use engine::{SharedTideEngine, TideEngine};
pub use epoch::{EpochPhase, EpochResult};
pub use error::{TideError, TideResult};
pub use flow::{TideEvent, TideKind, NETWORK_POOL_ID};
pub use health::{HealthBand, NetworkHealth};
pub use history::{BandDistribution, MetricsSnapshot, SupportedUnit};
pub use telemetry::TideMetrics;
pub use treasury::{Tier, UnitHandle, UnitSnapshot};
