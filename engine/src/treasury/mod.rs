//! # Treasury Module: Unit Balances & the Network Pool
//!
//! ```text
//! unit.rs     - Tier table lookup, unit record, snapshots, handles
//! registry.rs - Registration-ordered owner of every unit record
//! pool.rs     - The singleton network pool
//! ```
//!
//! All amounts are `u64` in the smallest currency unit. Deposits and
//! withdrawals use `checked_add` / `checked_sub`; a balance can never go
//! negative or wrap.

pub mod pool;
pub mod registry;
pub mod unit;

pub use pool::NetworkPool;
pub use registry::TreasuryRegistry;
pub use unit::{Tier, TreasuryUnit, UnitHandle, UnitSnapshot};
