//! Owner and relayer authorization
//!
//! A single owner controls administrative mutations; a set of relayers may
//! submit synchronization, settlement and message-lifecycle operations.

use crate::error::{PoolError, PoolResult};

use alloy_primitives::Address;
use std::collections::HashSet;
use tracing::info;

pub struct AccessControl {
    owner: Address,
    relayers: HashSet<Address>,
    paused: bool,
}

impl AccessControl {
    pub fn new(owner: Address) -> PoolResult<Self> {
        if owner.is_zero() {
            return Err(PoolError::ZeroAddress);
        }
        Ok(Self {
            owner,
            relayers: HashSet::new(),
            paused: false,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn only_owner(&self, caller: Address) -> PoolResult<()> {
        if caller != self.owner {
            return Err(PoolError::NotOwner(caller));
        }
        Ok(())
    }

    pub fn only_relayer(&self, caller: Address) -> PoolResult<()> {
        if !self.relayers.contains(&caller) {
            return Err(PoolError::UnauthorizedRelayer(caller));
        }
        Ok(())
    }

    pub fn is_relayer(&self, address: Address) -> bool {
        self.relayers.contains(&address)
    }

    pub fn set_relayer(&mut self, relayer: Address, enabled: bool) -> PoolResult<()> {
        if relayer.is_zero() {
            return Err(PoolError::ZeroAddress);
        }
        if enabled {
            self.relayers.insert(relayer);
        } else {
            self.relayers.remove(&relayer);
        }
        info!("Relayer {} enabled = {}", relayer, enabled);
        Ok(())
    }

    pub fn transfer_ownership(&mut self, new_owner: Address) -> PoolResult<Address> {
        if new_owner.is_zero() {
            return Err(PoolError::ZeroAddress);
        }
        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(previous)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn when_not_paused(&self) -> PoolResult<()> {
        if self.paused {
            return Err(PoolError::ContractPaused);
        }
        Ok(())
    }
}
