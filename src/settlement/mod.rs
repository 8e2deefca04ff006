//! Settlement computation
//!
//! The hub computes the net settlement of a series from the aggregated
//! long/short totals; spokes record the payout the hub computed for them.

pub mod pricing;

pub use pricing::{IntrinsicPricer, PricingOracle};

use crate::error::{PoolError, PoolResult};
use crate::types::ChainId;

use serde::{Deserialize, Serialize};

/// Inputs supplied by the caller that settles a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTerms {
    pub settlement_price: u128,
    pub strike: u128,
    pub is_call: bool,
}

impl SettlementTerms {
    pub fn validate(&self) -> PoolResult<()> {
        if self.settlement_price == 0 {
            return Err(PoolError::InvalidSettlementPrice);
        }
        Ok(())
    }
}

/// Kept per settled series for the read surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_price: u128,
    /// Only known on the hub
    pub strike: Option<u128>,
    pub is_call: Option<bool>,
    pub net_settlement_amount: i128,
    pub settled_at: u64,
}

/// Payout computed by the hub for one remote chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainPayout {
    pub chain_id: ChainId,
    pub payout: i128,
}

/// Long payoff minus short payoff
///
/// Balanced exposure nets to zero; an out-of-the-money series nets to zero
/// without consulting the payoff function.
pub fn net_settlement(
    pricer: &dyn PricingOracle,
    terms: &SettlementTerms,
    long_amount: u128,
    short_amount: u128,
) -> PoolResult<i128> {
    if !pricer.is_in_the_money(terms.settlement_price, terms.strike, terms.is_call) {
        return Ok(0);
    }

    let long_payoff =
        pricer.compute_payoff(terms.settlement_price, terms.strike, terms.is_call, long_amount)?;
    let short_payoff =
        pricer.compute_payoff(terms.settlement_price, terms.strike, terms.is_call, short_amount)?;

    long_payoff
        .checked_sub(short_payoff)
        .ok_or(PoolError::ArithmeticOverflow)
}
