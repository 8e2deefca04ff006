//! Journal abstraction over event persistence

use crate::error::PoolResult;
use crate::events::ProtocolEvent;

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Sink for protocol events emitted by the domain
#[async_trait]
pub trait EventJournal: Send + Sync {
    async fn record(&self, event: &ProtocolEvent) -> PoolResult<()>;
}

/// Bounded in-memory journal holding the most recent events
pub struct MemoryJournal {
    capacity: usize,
    events: RwLock<VecDeque<ProtocolEvent>>,
}

impl MemoryJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::new()),
        }
    }

    /// Most recent events, oldest first
    pub async fn recent(&self, limit: usize) -> Vec<ProtocolEvent> {
        let events = self.events.read().await;
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventJournal for MemoryJournal {
    async fn record(&self, event: &ProtocolEvent) -> PoolResult<()> {
        let mut events = self.events.write().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event.clone());
        Ok(())
    }
}
