//! Settlement service for one pool domain
//!
//! The service:
//! 1. Serializes every operation on the domain behind a single write lock
//! 2. Publishes the events each operation produced
//! 3. Journals events to the configured sinks
//! 4. Periodically reports PENDING messages that outlived their expiry window

pub mod engine;

pub use engine::SettlementService;
