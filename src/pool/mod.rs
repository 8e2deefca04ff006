//! Pool domain - the complete local state of one chain's deployment
//!
//! A `PoolDomain` runs either as the hub (aggregates every chain and
//! computes settlements) or as a spoke (reports its own positions and
//! executes the payouts the hub computed). Each operation runs atomically
//! against `&mut self`; cross-chain effects only leave the domain as
//! events and PENDING messages picked up by relayers.

mod admin;

#[cfg(test)]
mod tests;

use crate::access::AccessControl;
use crate::clock::Clock;
use crate::error::{PoolError, PoolResult};
use crate::events::ProtocolEvent;
use crate::ledger::{CollateralLedger, CollateralToken};
use crate::messaging::{CrossChainMessage, MessageKind, MessageProtocol};
use crate::positions::{AggregatedPosition, ChainPositionSnapshot, PositionBook};
use crate::rebalance::{RebalanceCoordinator, RebalanceRequest};
use crate::registry::{ChainDeployment, ChainRegistry};
use crate::settlement::{
    net_settlement, ChainPayout, PricingOracle, SettlementRecord, SettlementTerms,
};
use crate::types::{ChainId, MessageId, SeriesId};

use alloy_primitives::Address;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Construction parameters for one domain
#[derive(Debug, Clone)]
pub struct DomainParams {
    pub chain_id: ChainId,
    pub deployment_address: Address,
    pub is_hub: bool,
    pub hub_chain_id: ChainId,
    pub owner: Address,
    pub min_sync_interval_secs: u64,
    pub message_expiry_secs: u64,
}

pub struct PoolDomain {
    chain_id: ChainId,
    is_hub: bool,
    hub_chain_id: ChainId,
    registry: ChainRegistry,
    access: AccessControl,
    ledger: CollateralLedger,
    positions: PositionBook,
    messages: MessageProtocol,
    rebalances: RebalanceCoordinator,
    settlements: HashMap<SeriesId, SettlementRecord>,
    pricer: Arc<dyn PricingOracle>,
    clock: Arc<dyn Clock>,
    outbox: Vec<ProtocolEvent>,
}

impl PoolDomain {
    pub fn new(
        params: DomainParams,
        token: Box<dyn CollateralToken>,
        pricer: Arc<dyn PricingOracle>,
        clock: Arc<dyn Clock>,
    ) -> PoolResult<Self> {
        if params.is_hub && params.hub_chain_id != params.chain_id {
            return Err(PoolError::Config(format!(
                "hub chain {} must name itself as hub, got {}",
                params.chain_id, params.hub_chain_id
            )));
        }
        if !params.is_hub && params.hub_chain_id == params.chain_id {
            return Err(PoolError::Config(format!(
                "spoke chain {} cannot be its own hub",
                params.chain_id
            )));
        }

        let registry = ChainRegistry::new(params.chain_id, params.deployment_address)?;
        let access = AccessControl::new(params.owner)?;

        info!(
            "Pool domain initialized on chain {} as {} (hub {})",
            params.chain_id,
            if params.is_hub { "hub" } else { "spoke" },
            params.hub_chain_id
        );

        Ok(Self {
            chain_id: params.chain_id,
            is_hub: params.is_hub,
            hub_chain_id: params.hub_chain_id,
            registry,
            access,
            ledger: CollateralLedger::new(token),
            positions: PositionBook::new(params.min_sync_interval_secs),
            messages: MessageProtocol::new(params.chain_id, params.message_expiry_secs),
            rebalances: RebalanceCoordinator::new(),
            settlements: HashMap::new(),
            pricer,
            clock,
            outbox: vec![ProtocolEvent::ChainRegistered {
                chain_id: params.chain_id,
                registered_chain: params.chain_id,
                deployment_address: params.deployment_address,
            }],
        })
    }

    fn emit(&mut self, event: ProtocolEvent) {
        self.outbox.push(event);
    }

    /// Take every event produced since the last drain
    pub fn drain_events(&mut self) -> Vec<ProtocolEvent> {
        std::mem::take(&mut self.outbox)
    }

    fn send_message(&mut self, dest_chain: ChainId, kind: MessageKind) -> PoolResult<CrossChainMessage> {
        let message = self.messages.send(dest_chain, kind, self.clock.now())?;
        self.emit(ProtocolEvent::MessageSent {
            chain_id: self.chain_id,
            message_id: message.id,
            dest_chain,
            nonce: message.nonce,
            timestamp: message.timestamp,
            kind,
        });
        Ok(message)
    }

    // ----- Chain registry -----

    pub fn register_chain(&mut self, caller: Address, chain_id: ChainId, address: Address) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.registry.register(chain_id, address)?;
        self.emit(ProtocolEvent::ChainRegistered {
            chain_id: self.chain_id,
            registered_chain: chain_id,
            deployment_address: address,
        });
        Ok(())
    }

    pub fn activate_chain(&mut self, caller: Address, chain_id: ChainId) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.registry.activate(chain_id)?;
        self.emit(ProtocolEvent::ChainStatusChanged {
            chain_id: self.chain_id,
            target_chain: chain_id,
            is_active: true,
        });
        Ok(())
    }

    pub fn deactivate_chain(&mut self, caller: Address, chain_id: ChainId) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.registry.deactivate(chain_id)?;
        self.emit(ProtocolEvent::ChainStatusChanged {
            chain_id: self.chain_id,
            target_chain: chain_id,
            is_active: false,
        });
        Ok(())
    }

    // ----- Relayer authority -----

    pub fn set_relayer(&mut self, caller: Address, relayer: Address, enabled: bool) -> PoolResult<()> {
        self.access.only_owner(caller)?;
        self.access.set_relayer(relayer, enabled)?;
        self.emit(ProtocolEvent::RelayerUpdated {
            chain_id: self.chain_id,
            relayer,
            enabled,
        });
        Ok(())
    }

    // ----- Position synchronization -----

    /// Report this chain's own position for a series
    ///
    /// On a spoke the snapshot is also queued as a message to the hub.
    pub fn sync_position(
        &mut self,
        caller: Address,
        series_id: SeriesId,
        long_amount: u128,
        short_amount: u128,
    ) -> PoolResult<AggregatedPosition> {
        self.access.only_relayer(caller)?;
        if !self.is_hub && self.registry.get(self.hub_chain_id).is_none() {
            return Err(PoolError::ChainNotRegistered(self.hub_chain_id));
        }

        let now = self.clock.now();
        self.positions.ensure_unsettled(series_id)?;
        self.positions
            .check_sync_interval(series_id, self.chain_id, now)?;

        let snapshot = ChainPositionSnapshot {
            long_amount,
            short_amount,
            locked_collateral: self.ledger.collateral_for(series_id),
            last_sync_timestamp: now,
        };
        let chains = self.registry.registered_chains();
        let position = self
            .positions
            .record(series_id, self.chain_id, snapshot, &chains)?;

        self.emit(ProtocolEvent::PositionSynced {
            chain_id: self.chain_id,
            series_id,
            long_amount,
            short_amount,
            locked_collateral: snapshot.locked_collateral,
            timestamp: now,
        });
        if !self.is_hub {
            self.send_message(self.hub_chain_id, MessageKind::PositionSync)?;
        }

        crate::metrics::record_position_sync(self.chain_id);
        Ok(position)
    }

    /// Apply a snapshot relayed from another chain (hub only)
    pub fn receive_position_sync(
        &mut self,
        caller: Address,
        source_chain: ChainId,
        series_id: SeriesId,
        long_amount: u128,
        short_amount: u128,
        locked_collateral: u128,
    ) -> PoolResult<AggregatedPosition> {
        if !self.is_hub {
            return Err(PoolError::NotHub);
        }
        self.access.only_relayer(caller)?;
        if source_chain == self.chain_id {
            return Err(PoolError::LocalSource(source_chain));
        }
        self.registry.require_active(source_chain)?;

        let now = self.clock.now();
        let snapshot = ChainPositionSnapshot {
            long_amount,
            short_amount,
            locked_collateral,
            last_sync_timestamp: now,
        };
        let chains = self.registry.registered_chains();
        let position = self
            .positions
            .record(series_id, source_chain, snapshot, &chains)?;

        self.emit(ProtocolEvent::PositionReceived {
            chain_id: self.chain_id,
            source_chain,
            series_id,
            long_amount,
            short_amount,
            locked_collateral,
            timestamp: now,
        });

        crate::metrics::record_position_sync(source_chain);
        Ok(position)
    }

    // ----- Collateral -----

    /// Permissionless deposit of collateral backing a series
    pub fn lock_collateral(&mut self, caller: Address, series_id: SeriesId, amount: u128) -> PoolResult<u128> {
        self.access.when_not_paused()?;
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        self.positions.ensure_unsettled(series_id)?;

        let series_total = self.ledger.lock(series_id, caller, amount)?;
        self.emit(ProtocolEvent::CollateralLocked {
            chain_id: self.chain_id,
            series_id,
            depositor: caller,
            amount,
        });

        crate::metrics::record_locked_collateral(self.chain_id, self.ledger.total_locked());
        Ok(series_total)
    }

    /// Pay out settled collateral (relayer only)
    pub fn release_collateral(
        &mut self,
        caller: Address,
        series_id: SeriesId,
        amount: u128,
        recipient: Address,
    ) -> PoolResult<u128> {
        self.access.only_relayer(caller)?;
        if !self.positions.is_settled(series_id) {
            return Err(PoolError::NotSettled(series_id));
        }

        let remaining = self.ledger.release(series_id, recipient, amount)?;
        self.emit(ProtocolEvent::CollateralReleased {
            chain_id: self.chain_id,
            series_id,
            recipient,
            amount,
        });

        crate::metrics::record_locked_collateral(self.chain_id, self.ledger.total_locked());
        Ok(remaining)
    }

    // ----- Settlement -----

    /// Settle a series from the aggregated view (hub only)
    ///
    /// Every remote active chain that reported the series gets its own
    /// payout, delivered through one outbound message each.
    pub fn initiate_settlement(
        &mut self,
        caller: Address,
        series_id: SeriesId,
        terms: SettlementTerms,
    ) -> PoolResult<AggregatedPosition> {
        if !self.is_hub {
            return Err(PoolError::NotHub);
        }
        self.access.only_relayer(caller)?;
        terms.validate()?;
        self.positions.ensure_unsettled(series_id)?;

        let aggregated = self
            .positions
            .aggregated(series_id)
            .ok_or(PoolError::SeriesNotFound(series_id))?;

        let net = net_settlement(
            self.pricer.as_ref(),
            &terms,
            aggregated.total_long_across_chains,
            aggregated.total_short_across_chains,
        )?;
        let payouts = self.chain_payouts(series_id, &terms)?;

        let position = self.positions.mark_settled(series_id, net)?;
        let now = self.clock.now();
        self.settlements.insert(
            series_id,
            SettlementRecord {
                settlement_price: terms.settlement_price,
                strike: Some(terms.strike),
                is_call: Some(terms.is_call),
                net_settlement_amount: net,
                settled_at: now,
            },
        );
        self.emit(ProtocolEvent::SettlementInitiated {
            chain_id: self.chain_id,
            series_id,
            settlement_price: terms.settlement_price,
            strike: terms.strike,
            is_call: terms.is_call,
            net_settlement_amount: net,
        });

        for payout in payouts {
            let message = self.send_message(payout.chain_id, MessageKind::Settlement)?;
            self.emit(ProtocolEvent::SettlementDispatched {
                chain_id: self.chain_id,
                series_id,
                dest_chain: payout.chain_id,
                settlement_price: terms.settlement_price,
                payout: payout.payout,
                message_id: message.id,
            });
        }

        info!(
            "Series {} settled at {} (strike {}, call {}): net {}",
            series_id, terms.settlement_price, terms.strike, terms.is_call, net
        );
        crate::metrics::record_settlement(self.chain_id);
        Ok(position)
    }

    fn chain_payouts(&self, series_id: SeriesId, terms: &SettlementTerms) -> PoolResult<Vec<ChainPayout>> {
        let mut payouts = Vec::new();
        for chain_id in self.registry.registered_chains() {
            if chain_id == self.chain_id || self.registry.is_chain_active(chain_id) != (true, true) {
                continue;
            }
            let Some(snapshot) = self.positions.snapshot(series_id, chain_id) else {
                continue;
            };
            let payout = net_settlement(
                self.pricer.as_ref(),
                terms,
                snapshot.long_amount,
                snapshot.short_amount,
            )?;
            payouts.push(ChainPayout { chain_id, payout });
        }
        Ok(payouts)
    }

    /// Record the payout the hub computed for this chain (spoke only)
    pub fn execute_settlement(
        &mut self,
        caller: Address,
        series_id: SeriesId,
        settlement_price: u128,
        payout_amount: i128,
    ) -> PoolResult<AggregatedPosition> {
        if self.is_hub {
            return Err(PoolError::NotSpoke);
        }
        self.access.only_relayer(caller)?;
        if settlement_price == 0 {
            return Err(PoolError::InvalidSettlementPrice);
        }

        let position = self.positions.mark_settled(series_id, payout_amount)?;
        self.settlements.insert(
            series_id,
            SettlementRecord {
                settlement_price,
                strike: None,
                is_call: None,
                net_settlement_amount: payout_amount,
                settled_at: self.clock.now(),
            },
        );
        self.emit(ProtocolEvent::SettlementExecuted {
            chain_id: self.chain_id,
            series_id,
            settlement_price,
            payout: payout_amount,
        });

        debug!("Series {} settled from hub payout {}", series_id, payout_amount);
        crate::metrics::record_settlement(self.chain_id);
        Ok(position)
    }

    /// Signed long/short imbalance of one chain for a series
    pub fn get_settlement_delta(&self, series_id: SeriesId, chain_id: ChainId) -> PoolResult<i128> {
        self.positions.settlement_delta(series_id, chain_id)
    }

    // ----- Message lifecycle -----

    pub fn confirm_message(&mut self, caller: Address, id: MessageId) -> PoolResult<CrossChainMessage> {
        self.access.only_relayer(caller)?;
        let message = self.messages.confirm(id, self.clock.now())?;
        self.emit(ProtocolEvent::MessageResolved {
            chain_id: self.chain_id,
            message_id: id,
            status: message.status,
        });
        crate::metrics::record_message_resolved(self.chain_id, message.status);
        Ok(message)
    }

    pub fn fail_message(&mut self, caller: Address, id: MessageId) -> PoolResult<CrossChainMessage> {
        self.access.only_relayer(caller)?;
        let message = self.messages.fail(id, self.clock.now())?;
        self.emit(ProtocolEvent::MessageResolved {
            chain_id: self.chain_id,
            message_id: id,
            status: message.status,
        });
        crate::metrics::record_message_resolved(self.chain_id, message.status);
        Ok(message)
    }

    // ----- Rebalancing -----

    pub fn request_rebalance(
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
        for chain_id in [from_chain_id, to_chain_id] {
            if self.registry.get(chain_id).is_none() {
                return Err(PoolError::ChainNotRegistered(chain_id));
            }
        }

        let request = self.rebalances.request(from_chain_id, to_chain_id, amount)?;
        self.emit(ProtocolEvent::RebalanceRequested {
            chain_id: self.chain_id,
            request_id: request.id,
            from_chain: from_chain_id,
            to_chain: to_chain_id,
            amount,
        });

        let counterpart = if to_chain_id != self.chain_id {
            to_chain_id
        } else {
            from_chain_id
        };
        self.send_message(counterpart, MessageKind::Rebalance)?;

        crate::metrics::record_rebalance(self.chain_id, "requested");
        Ok(request)
    }

    pub fn execute_rebalance(&mut self, caller: Address, id: u64) -> PoolResult<RebalanceRequest> {
        self.access.only_relayer(caller)?;
        let request = self.rebalances.execute(id)?;
        self.emit(ProtocolEvent::RebalanceExecuted {
            chain_id: self.chain_id,
            request_id: id,
        });
        crate::metrics::record_rebalance(self.chain_id, "executed");
        Ok(request)
    }

    // ----- Read surface -----

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn is_hub(&self) -> bool {
        self.is_hub
    }

    pub fn hub_chain_id(&self) -> ChainId {
        self.hub_chain_id
    }

    pub fn get_registered_chains(&self) -> Vec<ChainId> {
        self.registry.registered_chains()
    }

    pub fn get_chain_deployment(&self, chain_id: ChainId) -> Option<ChainDeployment> {
        self.registry.get(chain_id).cloned()
    }

    pub fn is_chain_active(&self, chain_id: ChainId) -> (bool, bool) {
        self.registry.is_chain_active(chain_id)
    }

    pub fn get_chain_snapshot(&self, series_id: SeriesId, chain_id: ChainId) -> Option<ChainPositionSnapshot> {
        self.positions.snapshot(series_id, chain_id)
    }

    pub fn get_aggregated_position(&self, series_id: SeriesId) -> Option<AggregatedPosition> {
        self.positions.aggregated(series_id)
    }

    pub fn get_settlement_record(&self, series_id: SeriesId) -> Option<SettlementRecord> {
        self.settlements.get(&series_id).cloned()
    }

    pub fn get_message(&self, id: MessageId) -> Option<CrossChainMessage> {
        self.messages.get(id).cloned()
    }

    pub fn pending_messages(&self) -> Vec<CrossChainMessage> {
        self.messages.pending()
    }

    pub fn expired_pending_messages(&self) -> Vec<CrossChainMessage> {
        self.messages.expired_pending(self.clock.now())
    }

    pub fn current_nonce(&self) -> u64 {
        self.messages.current_nonce()
    }

    pub fn get_rebalance_request(&self, id: u64) -> Option<RebalanceRequest> {
        self.rebalances.get(id).cloned()
    }

    pub fn open_rebalance_requests(&self) -> Vec<RebalanceRequest> {
        self.rebalances.open_requests()
    }

    pub fn get_total_collateral_across_chains(&self) -> u128 {
        self.positions.total_collateral_across_chains()
    }

    pub fn local_collateral(&self, series_id: SeriesId) -> u128 {
        self.ledger.collateral_for(series_id)
    }

    pub fn total_locked(&self) -> u128 {
        self.ledger.total_locked()
    }

    pub fn collateral_token(&self) -> Address {
        self.ledger.token_address()
    }

    pub fn is_paused(&self) -> bool {
        self.access.is_paused()
    }

    pub fn owner(&self) -> Address {
        self.access.owner()
    }

    pub fn is_relayer(&self, address: Address) -> bool {
        self.access.is_relayer(address)
    }
}
