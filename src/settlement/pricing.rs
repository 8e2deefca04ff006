//! Pricing collaborator consumed at settlement time

use crate::error::{PoolError, PoolResult};

#[cfg(test)]
use mockall::automock;

/// Payoff source for settlement
///
/// Prices and strikes share one unit; payoffs are in collateral units.
#[cfg_attr(test, automock)]
pub trait PricingOracle: Send + Sync {
    /// Payoff of `amount` contracts at expiry; never negative for a holder
    fn compute_payoff(
        &self,
        settlement_price: u128,
        strike: u128,
        is_call: bool,
        amount: u128,
    ) -> PoolResult<i128>;

    fn is_in_the_money(&self, settlement_price: u128, strike: u128, is_call: bool) -> bool;
}

/// Intrinsic value only: `max(price - strike, 0)` for calls, mirrored for puts
#[derive(Debug, Default, Clone, Copy)]
pub struct IntrinsicPricer;

impl IntrinsicPricer {
    fn intrinsic(settlement_price: u128, strike: u128, is_call: bool) -> u128 {
        if is_call {
            settlement_price.saturating_sub(strike)
        } else {
            strike.saturating_sub(settlement_price)
        }
    }
}

impl PricingOracle for IntrinsicPricer {
    fn compute_payoff(
        &self,
        settlement_price: u128,
        strike: u128,
        is_call: bool,
        amount: u128,
    ) -> PoolResult<i128> {
        let payoff = Self::intrinsic(settlement_price, strike, is_call)
            .checked_mul(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        i128::try_from(payoff).map_err(|_| PoolError::ArithmeticOverflow)
    }

    fn is_in_the_money(&self, settlement_price: u128, strike: u128, is_call: bool) -> bool {
        Self::intrinsic(settlement_price, strike, is_call) > 0
    }
}
