//! Protocol event types
//!
//! Every state change on a domain produces one event. Events are drained
//! from the domain after each operation, published to subscribers, counted
//! in metrics and optionally journaled.

use crate::messaging::{MessageKind, MessageStatus};
use crate::types::{ChainId, MessageId, SeriesId};

use alloy_primitives::Address;
use serde::Serialize;

/// Events emitted by a pool domain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolEvent {
    ChainRegistered {
        chain_id: ChainId,
        registered_chain: ChainId,
        deployment_address: Address,
    },

    ChainStatusChanged {
        chain_id: ChainId,
        target_chain: ChainId,
        is_active: bool,
    },

    RelayerUpdated {
        chain_id: ChainId,
        relayer: Address,
        enabled: bool,
    },

    /// Local position reported
    PositionSynced {
        chain_id: ChainId,
        series_id: SeriesId,
        long_amount: u128,
        short_amount: u128,
        locked_collateral: u128,
        timestamp: u64,
    },

    /// Remote position applied on the hub
    PositionReceived {
        chain_id: ChainId,
        source_chain: ChainId,
        series_id: SeriesId,
        long_amount: u128,
        short_amount: u128,
        locked_collateral: u128,
        timestamp: u64,
    },

    CollateralLocked {
        chain_id: ChainId,
        series_id: SeriesId,
        depositor: Address,
        amount: u128,
    },

    CollateralReleased {
        chain_id: ChainId,
        series_id: SeriesId,
        recipient: Address,
        amount: u128,
    },

    SettlementInitiated {
        chain_id: ChainId,
        series_id: SeriesId,
        settlement_price: u128,
        strike: u128,
        is_call: bool,
        net_settlement_amount: i128,
    },

    /// Per-chain payout the hub sends to a spoke
    SettlementDispatched {
        chain_id: ChainId,
        series_id: SeriesId,
        dest_chain: ChainId,
        settlement_price: u128,
        payout: i128,
        message_id: MessageId,
    },

    SettlementExecuted {
        chain_id: ChainId,
        series_id: SeriesId,
        settlement_price: u128,
        payout: i128,
    },

    MessageSent {
        chain_id: ChainId,
        message_id: MessageId,
        dest_chain: ChainId,
        nonce: u64,
        timestamp: u64,
        kind: MessageKind,
    },

    MessageResolved {
        chain_id: ChainId,
        message_id: MessageId,
        status: MessageStatus,
    },

    RebalanceRequested {
        chain_id: ChainId,
        request_id: u64,
        from_chain: ChainId,
        to_chain: ChainId,
        amount: u128,
    },

    RebalanceExecuted {
        chain_id: ChainId,
        request_id: u64,
    },

    Paused {
        chain_id: ChainId,
    },

    Unpaused {
        chain_id: ChainId,
    },

    OwnershipTransferred {
        chain_id: ChainId,
        previous_owner: Address,
        new_owner: Address,
    },

    EmergencyWithdrawal {
        chain_id: ChainId,
        to: Address,
        amount: u128,
    },

    CollateralTokenUpdated {
        chain_id: ChainId,
        previous_token: Address,
        new_token: Address,
    },
}

impl ProtocolEvent {
    /// Chain that emitted the event
    pub fn chain_id(&self) -> ChainId {
        match self {
            ProtocolEvent::ChainRegistered { chain_id, .. }
            | ProtocolEvent::ChainStatusChanged { chain_id, .. }
            | ProtocolEvent::RelayerUpdated { chain_id, .. }
            | ProtocolEvent::PositionSynced { chain_id, .. }
            | ProtocolEvent::PositionReceived { chain_id, .. }
            | ProtocolEvent::CollateralLocked { chain_id, .. }
            | ProtocolEvent::CollateralReleased { chain_id, .. }
            | ProtocolEvent::SettlementInitiated { chain_id, .. }
            | ProtocolEvent::SettlementDispatched { chain_id, .. }
            | ProtocolEvent::SettlementExecuted { chain_id, .. }
            | ProtocolEvent::MessageSent { chain_id, .. }
            | ProtocolEvent::MessageResolved { chain_id, .. }
            | ProtocolEvent::RebalanceRequested { chain_id, .. }
            | ProtocolEvent::RebalanceExecuted { chain_id, .. }
            | ProtocolEvent::Paused { chain_id }
            | ProtocolEvent::Unpaused { chain_id }
            | ProtocolEvent::OwnershipTransferred { chain_id, .. }
            | ProtocolEvent::EmergencyWithdrawal { chain_id, .. }
            | ProtocolEvent::CollateralTokenUpdated { chain_id, .. } => *chain_id,
        }
    }

    /// Get event name for metrics
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolEvent::ChainRegistered { .. } => "chain_registered",
            ProtocolEvent::ChainStatusChanged { .. } => "chain_status_changed",
            ProtocolEvent::RelayerUpdated { .. } => "relayer_updated",
            ProtocolEvent::PositionSynced { .. } => "position_synced",
            ProtocolEvent::PositionReceived { .. } => "position_received",
            ProtocolEvent::CollateralLocked { .. } => "collateral_locked",
            ProtocolEvent::CollateralReleased { .. } => "collateral_released",
            ProtocolEvent::SettlementInitiated { .. } => "settlement_initiated",
            ProtocolEvent::SettlementDispatched { .. } => "settlement_dispatched",
            ProtocolEvent::SettlementExecuted { .. } => "settlement_executed",
            ProtocolEvent::MessageSent { .. } => "message_sent",
            ProtocolEvent::MessageResolved { .. } => "message_resolved",
            ProtocolEvent::RebalanceRequested { .. } => "rebalance_requested",
            ProtocolEvent::RebalanceExecuted { .. } => "rebalance_executed",
            ProtocolEvent::Paused { .. } => "paused",
            ProtocolEvent::Unpaused { .. } => "unpaused",
            ProtocolEvent::OwnershipTransferred { .. } => "ownership_transferred",
            ProtocolEvent::EmergencyWithdrawal { .. } => "emergency_withdrawal",
            ProtocolEvent::CollateralTokenUpdated { .. } => "collateral_token_updated",
        }
    }

    /// Check if a relayer has to carry this event to another chain
    pub fn requires_relay(&self) -> bool {
        matches!(
            self,
            ProtocolEvent::MessageSent { .. } | ProtocolEvent::SettlementDispatched { .. }
        )
    }
}
