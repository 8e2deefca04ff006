//! Cross-chain message lifecycle
//!
//! Message identity is derived from `(source, dest, nonce, timestamp)` so any
//! relayer observing the originating event computes the same id. A message
//! is created PENDING and resolves exactly once to CONFIRMED or FAILED,
//! unless its expiry window has passed.

use crate::error::{PoolError, PoolResult};
use crate::types::{ChainId, MessageId};

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Confirmed,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Confirmed => "confirmed",
            MessageStatus::Failed => "failed",
        }
    }
}

/// What the originating action was, for relayers routing the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    PositionSync,
    Settlement,
    Rebalance,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::PositionSync => "position_sync",
            MessageKind::Settlement => "settlement",
            MessageKind::Rebalance => "rebalance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossChainMessage {
    pub id: MessageId,
    pub source_chain: ChainId,
    pub dest_chain: ChainId,
    pub nonce: u64,
    pub timestamp: u64,
    pub kind: MessageKind,
    pub status: MessageStatus,
}

/// keccak256 over the four values as 32-byte big-endian words
pub fn message_id(source_chain: ChainId, dest_chain: ChainId, nonce: u64, timestamp: u64) -> MessageId {
    let mut hasher = Keccak256::new();
    for word in [source_chain, dest_chain, nonce, timestamp] {
        let mut buf = [0u8; 32];
        buf[24..].copy_from_slice(&word.to_be_bytes());
        hasher.update(buf);
    }
    MessageId::from_slice(&hasher.finalize())
}

/// Outbound messages originated by this domain
pub struct MessageProtocol {
    local_chain_id: ChainId,
    nonce: u64,
    expiry_secs: u64,
    messages: HashMap<MessageId, CrossChainMessage>,
}

impl MessageProtocol {
    pub fn new(local_chain_id: ChainId, expiry_secs: u64) -> Self {
        Self {
            local_chain_id,
            nonce: 0,
            expiry_secs,
            messages: HashMap::new(),
        }
    }

    /// Allocate the next nonce and record a PENDING message to `dest_chain`
    pub fn send(&mut self, dest_chain: ChainId, kind: MessageKind, now: u64) -> PoolResult<CrossChainMessage> {
        let nonce = self.nonce.checked_add(1).ok_or(PoolError::ArithmeticOverflow)?;
        let id = message_id(self.local_chain_id, dest_chain, nonce, now);

        let message = CrossChainMessage {
            id,
            source_chain: self.local_chain_id,
            dest_chain,
            nonce,
            timestamp: now,
            kind,
            status: MessageStatus::Pending,
        };

        self.nonce = nonce;
        self.messages.insert(id, message.clone());

        debug!(
            "Message {} queued: {} -> {} nonce {}",
            hex::encode(id),
            self.local_chain_id,
            dest_chain,
            nonce
        );
        Ok(message)
    }

    pub fn confirm(&mut self, id: MessageId, now: u64) -> PoolResult<CrossChainMessage> {
        self.resolve(id, MessageStatus::Confirmed, now)
    }

    pub fn fail(&mut self, id: MessageId, now: u64) -> PoolResult<CrossChainMessage> {
        self.resolve(id, MessageStatus::Failed, now)
    }

    fn resolve(&mut self, id: MessageId, status: MessageStatus, now: u64) -> PoolResult<CrossChainMessage> {
        let expiry_secs = self.expiry_secs;
        let message = self
            .messages
            .get_mut(&id)
            .ok_or(PoolError::MessageNotFound(id))?;

        if message.status != MessageStatus::Pending {
            return Err(PoolError::MessageAlreadyProcessed(id));
        }
        if is_expired(message, now, expiry_secs) {
            return Err(PoolError::MessageExpired(id));
        }

        message.status = status;
        info!("Message {} {}", hex::encode(id), status.as_str());
        Ok(message.clone())
    }

    pub fn get(&self, id: MessageId) -> Option<&CrossChainMessage> {
        self.messages.get(&id)
    }

    /// Last nonce handed out; zero before the first message
    pub fn current_nonce(&self) -> u64 {
        self.nonce
    }

    pub fn pending(&self) -> Vec<CrossChainMessage> {
        let mut pending: Vec<_> = self
            .messages
            .values()
            .filter(|m| m.status == MessageStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|m| m.nonce);
        pending
    }

    /// PENDING messages that can no longer be confirmed or failed
    pub fn expired_pending(&self, now: u64) -> Vec<CrossChainMessage> {
        self.pending()
            .into_iter()
            .filter(|m| is_expired(m, now, self.expiry_secs))
            .collect()
    }
}

fn is_expired(message: &CrossChainMessage, now: u64, expiry_secs: u64) -> bool {
    now.saturating_sub(message.timestamp) > expiry_secs
}
