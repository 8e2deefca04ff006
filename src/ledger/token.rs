//! Fungible collateral token seen from the pool's custody account

use crate::error::{PoolError, PoolResult};

use alloy_primitives::Address;
use std::collections::HashMap;

/// Transfer primitive against a single fungible balance
pub trait CollateralToken: Send + Sync {
    /// Token contract address
    fn address(&self) -> Address;

    /// Pull `amount` from `from` into pool custody
    fn transfer_in(&mut self, from: Address, amount: u128) -> PoolResult<()>;

    /// Push `amount` out of pool custody to `to`
    fn transfer_out(&mut self, to: Address, amount: u128) -> PoolResult<()>;

    /// Balance currently held by the pool
    fn custody_balance(&self) -> u128;
}

/// Token ledger kept in process
///
/// Used by the service when the collateral token is simulated locally, and
/// by tests.
#[derive(Debug, Clone)]
pub struct InMemoryToken {
    address: Address,
    balances: HashMap<Address, u128>,
    custody: u128,
}

impl InMemoryToken {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balances: HashMap::new(),
            custody: 0,
        }
    }

    /// Mint to an external account
    pub fn credit(&mut self, account: Address, amount: u128) {
        *self.balances.entry(account).or_insert(0) += amount;
    }

    /// Send tokens straight to custody without going through the ledger
    pub fn donate(&mut self, amount: u128) {
        self.custody += amount;
    }

    pub fn balance_of(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }
}

impl CollateralToken for InMemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    fn transfer_in(&mut self, from: Address, amount: u128) -> PoolResult<()> {
        let balance = self.balances.entry(from).or_insert(0);
        if *balance < amount {
            return Err(PoolError::TokenTransfer(format!(
                "{} holds {}, needs {}",
                from, balance, amount
            )));
        }
        *balance -= amount;
        self.custody = self
            .custody
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        Ok(())
    }

    fn transfer_out(&mut self, to: Address, amount: u128) -> PoolResult<()> {
        if self.custody < amount {
            return Err(PoolError::TokenTransfer(format!(
                "custody holds {}, needs {}",
                self.custody, amount
            )));
        }
        self.custody -= amount;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }

    fn custody_balance(&self) -> u128 {
        self.custody
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_in_requires_balance() {
        let user = Address::repeat_byte(7);
        let mut token = InMemoryToken::new(Address::repeat_byte(1));
        token.credit(user, 100);

        assert!(matches!(
            token.transfer_in(user, 101),
            Err(PoolError::TokenTransfer(_))
        ));
        token.transfer_in(user, 60).unwrap();
        assert_eq!(token.balance_of(user), 40);
        assert_eq!(token.custody_balance(), 60);

        token.transfer_out(user, 60).unwrap();
        assert_eq!(token.balance_of(user), 100);
        assert_eq!(token.custody_balance(), 0);
    }
}
