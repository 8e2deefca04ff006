//! Chain registry - the set of domains this deployment knows about
//!
//! Registration is the only way a chain id becomes visible to the rest of
//! the protocol. Deployments are never removed; deactivation only flips a
//! flag so snapshot history stays attributable.

use crate::error::{PoolError, PoolResult};
use crate::types::ChainId;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// A pool deployment on one chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDeployment {
    pub chain_id: ChainId,
    pub deployment_address: Address,
    pub is_active: bool,
}

/// Registered deployments, kept in registration order
pub struct ChainRegistry {
    deployments: HashMap<ChainId, ChainDeployment>,
    order: Vec<ChainId>,
}

impl ChainRegistry {
    /// Create a registry containing the local deployment
    pub fn new(local_chain_id: ChainId, local_address: Address) -> PoolResult<Self> {
        let mut registry = Self {
            deployments: HashMap::new(),
            order: Vec::new(),
        };
        registry.register(local_chain_id, local_address)?;
        Ok(registry)
    }

    /// Register a new deployment as active
    pub fn register(&mut self, chain_id: ChainId, address: Address) -> PoolResult<()> {
        if self.deployments.contains_key(&chain_id) {
            return Err(PoolError::ChainAlreadyRegistered(chain_id));
        }
        if address.is_zero() {
            return Err(PoolError::ZeroAddress);
        }

        self.deployments.insert(
            chain_id,
            ChainDeployment {
                chain_id,
                deployment_address: address,
                is_active: true,
            },
        );
        self.order.push(chain_id);

        info!("Registered chain {} at {}", chain_id, address);
        Ok(())
    }

    pub fn activate(&mut self, chain_id: ChainId) -> PoolResult<()> {
        self.set_active(chain_id, true)
    }

    pub fn deactivate(&mut self, chain_id: ChainId) -> PoolResult<()> {
        self.set_active(chain_id, false)
    }

    fn set_active(&mut self, chain_id: ChainId, active: bool) -> PoolResult<()> {
        let deployment = self
            .deployments
            .get_mut(&chain_id)
            .ok_or(PoolError::ChainNotRegistered(chain_id))?;
        deployment.is_active = active;

        debug!("Chain {} active = {}", chain_id, active);
        Ok(())
    }

    /// Returns `(registered, active)`
    pub fn is_chain_active(&self, chain_id: ChainId) -> (bool, bool) {
        match self.deployments.get(&chain_id) {
            Some(d) => (true, d.is_active),
            None => (false, false),
        }
    }

    /// Fail unless the chain is registered and active
    pub fn require_active(&self, chain_id: ChainId) -> PoolResult<&ChainDeployment> {
        let deployment = self
            .deployments
            .get(&chain_id)
            .ok_or(PoolError::ChainNotRegistered(chain_id))?;
        if !deployment.is_active {
            return Err(PoolError::ChainInactive(chain_id));
        }
        Ok(deployment)
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&ChainDeployment> {
        self.deployments.get(&chain_id)
    }

    /// Chain ids in registration order
    pub fn registered_chains(&self) -> Vec<ChainId> {
        self.order.clone()
    }

    pub fn chain_count(&self) -> usize {
        self.order.len()
    }
}
