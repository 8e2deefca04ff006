//! Fold per-chain snapshots into one global view per series

use super::book::ChainPositionSnapshot;
use crate::error::{PoolError, PoolResult};
use crate::types::{ChainId, SeriesId};

use std::collections::HashMap;

/// Sums over every chain that has reported the series
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateTotals {
    pub total_long: u128,
    pub total_short: u128,
    pub total_collateral: u128,
    pub reporting_chains: usize,
}

/// Sum the snapshots of `series_id` over `chains`
///
/// Chains without a snapshot contribute zero.
pub fn aggregate(
    series_id: SeriesId,
    chains: &[ChainId],
    snapshots: &HashMap<(SeriesId, ChainId), ChainPositionSnapshot>,
) -> PoolResult<AggregateTotals> {
    let mut totals = AggregateTotals::default();

    for chain_id in chains {
        let Some(snapshot) = snapshots.get(&(series_id, *chain_id)) else {
            continue;
        };

        totals.total_long = totals
            .total_long
            .checked_add(snapshot.long_amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        totals.total_short = totals
            .total_short
            .checked_add(snapshot.short_amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        totals.total_collateral = totals
            .total_collateral
            .checked_add(snapshot.locked_collateral)
            .ok_or(PoolError::ArithmeticOverflow)?;
        totals.reporting_chains += 1;
    }

    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(long: u128, short: u128, collateral: u128) -> ChainPositionSnapshot {
        ChainPositionSnapshot {
            long_amount: long,
            short_amount: short,
            locked_collateral: collateral,
            last_sync_timestamp: 1,
        }
    }

    #[test]
    fn test_missing_snapshots_contribute_zero() {
        let series = SeriesId::repeat_byte(1);
        let mut snapshots = HashMap::new();
        snapshots.insert((series, 1), snapshot(100, 40, 5_000));
        snapshots.insert((series, 10), snapshot(20, 80, 3_000));
        snapshots.insert((SeriesId::repeat_byte(2), 10), snapshot(999, 999, 999));

        let totals = aggregate(series, &[1, 10, 137], &snapshots).unwrap();
        assert_eq!(
            totals,
            AggregateTotals {
                total_long: 120,
                total_short: 120,
                total_collateral: 8_000,
                reporting_chains: 2,
            }
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let series = SeriesId::repeat_byte(1);
        let mut snapshots = HashMap::new();
        snapshots.insert((series, 1), snapshot(u128::MAX, 0, 0));
        snapshots.insert((series, 2), snapshot(1, 0, 0));

        assert!(matches!(
            aggregate(series, &[1, 2], &snapshots),
            Err(PoolError::ArithmeticOverflow)
        ));
    }
}
