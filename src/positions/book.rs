//! Snapshot storage and the derived aggregated view

use super::aggregation::aggregate;
use crate::error::{PoolError, PoolResult};
use crate::types::{ChainId, SeriesId};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Most recent position reported by one chain for one series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPositionSnapshot {
    pub long_amount: u128,
    pub short_amount: u128,
    pub locked_collateral: u128,
    pub last_sync_timestamp: u64,
}

impl ChainPositionSnapshot {
    /// Signed long/short imbalance of this chain
    pub fn delta(&self) -> PoolResult<i128> {
        let long = i128::try_from(self.long_amount).map_err(|_| PoolError::ArithmeticOverflow)?;
        let short = i128::try_from(self.short_amount).map_err(|_| PoolError::ArithmeticOverflow)?;
        long.checked_sub(short).ok_or(PoolError::ArithmeticOverflow)
    }
}

/// Global view of a series across every reporting chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedPosition {
    pub total_long_across_chains: u128,
    pub total_short_across_chains: u128,
    pub total_collateral_across_chains: u128,
    pub is_settled: bool,
    pub net_settlement_amount: i128,
}

/// Snapshot arena keyed by (series, chain) plus the aggregates derived from it
pub struct PositionBook {
    snapshots: HashMap<(SeriesId, ChainId), ChainPositionSnapshot>,
    aggregated: HashMap<SeriesId, AggregatedPosition>,
    min_sync_interval: u64,
}

impl PositionBook {
    pub fn new(min_sync_interval: u64) -> Self {
        Self {
            snapshots: HashMap::new(),
            aggregated: HashMap::new(),
            min_sync_interval,
        }
    }

    /// Interval gate for locally reported syncs
    ///
    /// The first report of a (series, chain) pair is always admitted.
    pub fn check_sync_interval(
        &self,
        series_id: SeriesId,
        chain_id: ChainId,
        now: u64,
    ) -> PoolResult<()> {
        if let Some(snapshot) = self.snapshots.get(&(series_id, chain_id)) {
            let elapsed = now.saturating_sub(snapshot.last_sync_timestamp);
            if elapsed < self.min_sync_interval {
                return Err(PoolError::SyncTooFrequent {
                    series_id,
                    chain_id,
                    retry_after: snapshot
                        .last_sync_timestamp
                        .saturating_add(self.min_sync_interval),
                });
            }
        }
        Ok(())
    }

    /// Overwrite the snapshot for (series, chain) and re-derive the aggregate
    ///
    /// Timestamps strictly increase per (series, chain); a snapshot stamped
    /// at or before the stored one is rejected.
    pub fn record(
        &mut self,
        series_id: SeriesId,
        chain_id: ChainId,
        snapshot: ChainPositionSnapshot,
        chains: &[ChainId],
    ) -> PoolResult<AggregatedPosition> {
        self.ensure_unsettled(series_id)?;

        if let Some(stored) = self.snapshots.get(&(series_id, chain_id)) {
            if snapshot.last_sync_timestamp <= stored.last_sync_timestamp {
                return Err(PoolError::SyncTooFrequent {
                    series_id,
                    chain_id,
                    retry_after: stored.last_sync_timestamp.saturating_add(1),
                });
            }
        }

        let previous = self.snapshots.insert((series_id, chain_id), snapshot);
        match self.reaggregate(series_id, chains) {
            Ok(position) => Ok(position),
            Err(e) => {
                // Keep the book consistent with the last good aggregate
                match previous {
                    Some(prev) => self.snapshots.insert((series_id, chain_id), prev),
                    None => self.snapshots.remove(&(series_id, chain_id)),
                };
                Err(e)
            }
        }
    }

    fn reaggregate(
        &mut self,
        series_id: SeriesId,
        chains: &[ChainId],
    ) -> PoolResult<AggregatedPosition> {
        let totals = aggregate(series_id, chains, &self.snapshots)?;

        let position = self.aggregated.entry(series_id).or_default();
        position.total_long_across_chains = totals.total_long;
        position.total_short_across_chains = totals.total_short;
        position.total_collateral_across_chains = totals.total_collateral;

        debug!(
            "Series {} aggregated over {} chains: long={} short={} collateral={}",
            series_id,
            totals.reporting_chains,
            totals.total_long,
            totals.total_short,
            totals.total_collateral
        );
        Ok(*position)
    }

    pub fn ensure_unsettled(&self, series_id: SeriesId) -> PoolResult<()> {
        if self.is_settled(series_id) {
            return Err(PoolError::AlreadySettled(series_id));
        }
        Ok(())
    }

    pub fn is_settled(&self, series_id: SeriesId) -> bool {
        self.aggregated
            .get(&series_id)
            .map(|p| p.is_settled)
            .unwrap_or(false)
    }

    /// Terminal transition; fails if the series is already settled
    pub fn mark_settled(&mut self, series_id: SeriesId, net_settlement_amount: i128) -> PoolResult<AggregatedPosition> {
        self.ensure_unsettled(series_id)?;
        let position = self.aggregated.entry(series_id).or_default();
        position.is_settled = true;
        position.net_settlement_amount = net_settlement_amount;
        Ok(*position)
    }

    pub fn snapshot(&self, series_id: SeriesId, chain_id: ChainId) -> Option<ChainPositionSnapshot> {
        self.snapshots.get(&(series_id, chain_id)).copied()
    }

    pub fn aggregated(&self, series_id: SeriesId) -> Option<AggregatedPosition> {
        self.aggregated.get(&series_id).copied()
    }

    /// Signed long/short imbalance for one chain, zero when it never reported
    pub fn settlement_delta(&self, series_id: SeriesId, chain_id: ChainId) -> PoolResult<i128> {
        match self.snapshots.get(&(series_id, chain_id)) {
            Some(snapshot) => snapshot.delta(),
            None => Ok(0),
        }
    }

    /// Sum of aggregated collateral over every known series
    pub fn total_collateral_across_chains(&self) -> u128 {
        self.aggregated
            .values()
            .fold(0u128, |acc, p| acc.saturating_add(p.total_collateral_across_chains))
    }
}
