//! Service loop wrapping a `PoolDomain`

use crate::error::PoolResult;
use crate::events::ProtocolEvent;
use crate::pool::PoolDomain;
use crate::state::EventJournal;

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, Notify, RwLock};
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// Single-writer wrapper around the local domain
pub struct SettlementService {
    /// Local protocol state
    domain: Arc<RwLock<PoolDomain>>,
    /// Event broadcast channel
    event_tx: broadcast::Sender<ProtocolEvent>,
    /// Receiver reserved for the journaling loop, created up front so no
    /// event published before `run` starts is lost
    journal_rx: Mutex<Option<broadcast::Receiver<ProtocolEvent>>>,
    /// Event sinks
    journals: Vec<Arc<dyn EventJournal>>,
    /// Expiry sweep period
    sweep_interval: Duration,
    /// Shutdown flag
    shutdown: Arc<RwLock<bool>>,
    /// Wakes the loop out of `select!` on stop
    shutdown_notify: Notify,
}

impl SettlementService {
    pub fn new(
        mut domain: PoolDomain,
        journals: Vec<Arc<dyn EventJournal>>,
        sweep_interval_secs: u64,
        event_buffer: usize,
    ) -> Self {
        let (event_tx, journal_rx) = broadcast::channel(event_buffer.max(1));

        for event in domain.drain_events() {
            crate::metrics::record_event(&event);
            let _ = event_tx.send(event);
        }

        Self {
            domain: Arc::new(RwLock::new(domain)),
            event_tx,
            journal_rx: Mutex::new(Some(journal_rx)),
            journals,
            sweep_interval: Duration::from_secs(sweep_interval_secs.max(1)),
            shutdown: Arc::new(RwLock::new(false)),
            shutdown_notify: Notify::new(),
        }
    }

    /// Run one mutating operation atomically and publish its events
    pub async fn execute<T, F>(&self, op: F) -> PoolResult<T>
    where
        F: FnOnce(&mut PoolDomain) -> PoolResult<T>,
    {
        let (result, events) = {
            let mut domain = self.domain.write().await;
            let result = op(&mut domain);
            (result, domain.drain_events())
        };

        if let Err(e) = &result {
            crate::metrics::record_rejected(e.kind());
            if e.should_alert() {
                error!("Operation failed: {}", e);
            } else {
                debug!("Operation rejected: {}", e);
            }
        }

        for event in events {
            crate::metrics::record_event(&event);
            // No receivers is fine; the journal loop may not be running
            let _ = self.event_tx.send(event);
        }

        result
    }

    /// Read from the domain without mutating it
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&PoolDomain) -> T,
    {
        let domain = self.domain.read().await;
        f(&domain)
    }

    /// Subscribe to protocol events
    pub fn subscribe_events(&self) -> broadcast::Receiver<ProtocolEvent> {
        self.event_tx.subscribe()
    }

    /// Main journaling and sweep loop
    pub async fn run(&self) -> PoolResult<()> {
        let Some(mut event_rx) = self.journal_rx.lock().await.take() else {
            warn!("Settlement service loop already running");
            return Ok(());
        };

        let mut sweep_interval = interval(self.sweep_interval);

        info!("Settlement service started");

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tokio::select! {
                // Journal incoming events
                Ok(event) = event_rx.recv() => {
                    self.journal(&event).await;
                }

                // Periodic expiry sweep
                _ = sweep_interval.tick() => {
                    self.sweep_expired().await;
                }

                _ = self.shutdown_notify.notified() => {
                    break;
                }
            }
        }

        info!("Settlement service stopped");
        Ok(())
    }

    async fn journal(&self, event: &ProtocolEvent) {
        if event.requires_relay() {
            info!("Relay required: {:?}", event);
        }
        for journal in &self.journals {
            if let Err(e) = journal.record(event).await {
                error!("Error journaling {}: {}", event.name(), e);
            }
        }
    }

    /// Count PENDING messages past expiry; state is left untouched
    async fn sweep_expired(&self) -> usize {
        let (chain_id, expired) = self
            .read(|d| (d.chain_id(), d.expired_pending_messages()))
            .await;

        for message in &expired {
            warn!(
                "Message {} to chain {} (nonce {}) expired without confirmation",
                hex::encode(message.id),
                message.dest_chain,
                message.nonce
            );
        }
        crate::metrics::record_expired_pending(chain_id, expired.len());
        expired.len()
    }

    /// Stop the service loop
    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        // Permit is stored if the loop is between iterations
        self.shutdown_notify.notify_one();
        info!("Settlement service shutdown initiated");
    }
}
