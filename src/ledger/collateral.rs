//! Per-series collateral accounting over pool custody

use super::token::CollateralToken;
use crate::error::{PoolError, PoolResult};
use crate::types::SeriesId;

use alloy_primitives::Address;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Local collateral balances backing each series
///
/// Settlement gating lives with the caller; the ledger only guarantees that
/// per-series balances never go negative and always sum to `total_locked`.
pub struct CollateralLedger {
    token: Box<dyn CollateralToken>,
    series_collateral: HashMap<SeriesId, u128>,
    total_locked: u128,
}

impl CollateralLedger {
    pub fn new(token: Box<dyn CollateralToken>) -> Self {
        Self {
            token,
            series_collateral: HashMap::new(),
            total_locked: 0,
        }
    }

    /// Move `amount` from `from` into custody against `series_id`
    pub fn lock(&mut self, series_id: SeriesId, from: Address, amount: u128) -> PoolResult<u128> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let current = self.collateral_for(series_id);
        let series_total = current
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        let total_locked = self
            .total_locked
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;

        self.token.transfer_in(from, amount)?;

        self.series_collateral.insert(series_id, series_total);
        self.total_locked = total_locked;

        debug!(
            "Locked {} for series {} (series total {})",
            amount, series_id, series_total
        );
        Ok(series_total)
    }

    /// Pay `amount` of the series' collateral out to `recipient`
    pub fn release(
        &mut self,
        series_id: SeriesId,
        recipient: Address,
        amount: u128,
    ) -> PoolResult<u128> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if recipient.is_zero() {
            return Err(PoolError::ZeroAddress);
        }

        let available = self.collateral_for(series_id);
        if amount > available {
            return Err(PoolError::InsufficientCollateral {
                requested: amount,
                available,
            });
        }

        self.token.transfer_out(recipient, amount)?;

        let remaining = available - amount;
        self.series_collateral.insert(series_id, remaining);
        self.total_locked -= amount;

        debug!(
            "Released {} of series {} to {} ({} remaining)",
            amount, series_id, recipient, remaining
        );
        Ok(remaining)
    }

    /// Withdraw custody balance that is not backing any series
    pub fn withdraw_stray(&mut self, to: Address, amount: u128) -> PoolResult<()> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        if to.is_zero() {
            return Err(PoolError::ZeroAddress);
        }

        let available = self.stray_balance();
        if amount > available {
            return Err(PoolError::InsufficientLiquidity {
                requested: amount,
                available,
            });
        }

        self.token.transfer_out(to, amount)?;
        warn!("Emergency withdrawal of {} to {}", amount, to);
        Ok(())
    }

    /// Swap the custody token; only allowed while nothing is locked
    pub fn replace_token(&mut self, token: Box<dyn CollateralToken>) -> PoolResult<Address> {
        if self.total_locked > 0 {
            return Err(PoolError::CollateralOutstanding {
                locked: self.total_locked,
            });
        }
        let previous = std::mem::replace(&mut self.token, token);
        Ok(previous.address())
    }

    pub fn collateral_for(&self, series_id: SeriesId) -> u128 {
        self.series_collateral.get(&series_id).copied().unwrap_or(0)
    }

    pub fn total_locked(&self) -> u128 {
        self.total_locked
    }

    pub fn stray_balance(&self) -> u128 {
        self.token.custody_balance().saturating_sub(self.total_locked)
    }

    pub fn token_address(&self) -> Address {
        self.token.address()
    }
}
