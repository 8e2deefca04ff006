//! Position synchronization and cross-chain aggregation
//!
//! - Per-(series, chain) snapshots, rate-limited on the reporting side
//! - Aggregated per-series totals, recomputed from the snapshot set on
//!   every write instead of being kept as running sums

pub mod aggregation;
pub mod book;

pub use book::{AggregatedPosition, ChainPositionSnapshot, PositionBook};
