//! Liquidity rebalancing requests between chains
//!
//! Only intent and completion are recorded here. Moving the funds is left
//! to the relayers, the same way settlement messages are delivered.

use crate::error::{PoolError, PoolResult};
use crate::types::ChainId;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceRequest {
    pub id: u64,
    pub from_chain_id: ChainId,
    pub to_chain_id: ChainId,
    pub amount: u128,
    pub executed: bool,
}

pub struct RebalanceCoordinator {
    next_id: u64,
    requests: BTreeMap<u64, RebalanceRequest>,
}

impl RebalanceCoordinator {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            requests: BTreeMap::new(),
        }
    }

    pub fn request(
        &mut self,
        from_chain_id: ChainId,
        to_chain_id: ChainId,
        amount: u128,
    ) -> PoolResult<RebalanceRequest> {
        if from_chain_id == to_chain_id {
            return Err(PoolError::SelfTarget(from_chain_id));
        }
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(PoolError::ArithmeticOverflow)?;

        let request = RebalanceRequest {
            id,
            from_chain_id,
            to_chain_id,
            amount,
            executed: false,
        };
        self.requests.insert(id, request.clone());

        info!(
            "Rebalance {} requested: {} from chain {} to chain {}",
            id, amount, from_chain_id, to_chain_id
        );
        Ok(request)
    }

    pub fn execute(&mut self, id: u64) -> PoolResult<RebalanceRequest> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or(PoolError::RebalanceNotFound(id))?;
        if request.executed {
            return Err(PoolError::RebalanceAlreadyExecuted(id));
        }
        request.executed = true;

        info!("Rebalance {} executed", id);
        Ok(request.clone())
    }

    pub fn get(&self, id: u64) -> Option<&RebalanceRequest> {
        self.requests.get(&id)
    }

    pub fn open_requests(&self) -> Vec<RebalanceRequest> {
        self.requests
            .values()
            .filter(|r| !r.executed)
            .cloned()
            .collect()
    }
}

impl Default for RebalanceCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
