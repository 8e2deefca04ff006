//! Owner-gated administration, orthogonal to the settlement state machine

use super::PoolDomain;
use crate::error::{PoolError, PoolResult};
use crate::events::ProtocolEvent;
use crate::ledger::CollateralToken;

use alloy_primitives::Address;
use tracing::{info, warn};

impl PoolDomain {
    /// Block new collateral deposits
    pub fn pause(&mut self, caller: Address) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.access.set_paused(true);
        self.emit(ProtocolEvent::Paused {
            chain_id: self.chain_id,
        });
        warn!("Pool on chain {} paused", self.chain_id);
        Ok(())
    }

    pub fn unpause(&mut self, caller: Address) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.access.set_paused(false);
        self.emit(ProtocolEvent::Unpaused {
            chain_id: self.chain_id,
        });
        info!("Pool on chain {} unpaused", self.chain_id);
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        let previous_owner = self.access.transfer_ownership(new_owner)?;
        self.emit(ProtocolEvent::OwnershipTransferred {
            chain_id: self.chain_id,
            previous_owner,
            new_owner,
        });
        Ok(())
    }

    /// Recover custody balance that does not back any series
    pub fn emergency_withdraw(&mut self, caller: Address, to: Address, amount: u128) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.ledger.withdraw_stray(to, amount)?;
        self.emit(ProtocolEvent::EmergencyWithdrawal {
            chain_id: self.chain_id,
            to,
            amount,
        });
        Ok(())
    }

    pub fn set_collateral_token(
        &mut self,
        caller: Address,
        token: Box<dyn CollateralToken>,
    ) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        let new_token = token.address();
        if new_token.is_zero() {
            return Err(PoolError::ZeroAddress);
        }
        let previous_token = self.ledger.replace_token(token)?;
        self.emit(ProtocolEvent::CollateralTokenUpdated {
            chain_id: self.chain_id,
            previous_token,
            new_token,
        });
        info!(
            "Collateral token on chain {} changed {} -> {}",
            self.chain_id, previous_token, new_token
        );
        Ok(())
    }
}
