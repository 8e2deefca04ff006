use super::*;
use crate::clock::ManualClock;
use crate::ledger::InMemoryToken;
use crate::messaging::MessageStatus;
use crate::settlement::IntrinsicPricer;

use tokio_test::{assert_err, assert_ok};

const HUB: ChainId = 1;
const SPOKE: ChainId = 42161;
const OTHER_SPOKE: ChainId = 10;
const START: u64 = 1_700_000_000;
const INTERVAL: u64 = 300;
const EXPIRY: u64 = 3_600;

const OWNER: Address = Address::repeat_byte(0x01);
const RELAYER: Address = Address::repeat_byte(0x02);
const DEPOSITOR: Address = Address::repeat_byte(0x03);
const RECIPIENT: Address = Address::repeat_byte(0x04);
const STRANGER: Address = Address::repeat_byte(0x05);

fn series() -> SeriesId {
    SeriesId::repeat_byte(0x5e)
}

fn domain(chain_id: ChainId, is_hub: bool) -> (PoolDomain, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(START));
    let mut token = InMemoryToken::new(Address::repeat_byte(0xcc));
    token.credit(DEPOSITOR, 1_000_000);

    let params = DomainParams {
        chain_id,
        deployment_address: Address::repeat_byte(chain_id as u8),
        is_hub,
        hub_chain_id: HUB,
        owner: OWNER,
        min_sync_interval_secs: INTERVAL,
        message_expiry_secs: EXPIRY,
    };
    let mut domain = PoolDomain::new(
        params,
        Box::new(token),
        Arc::new(IntrinsicPricer),
        clock.clone(),
    )
    .unwrap();
    domain.set_relayer(OWNER, RELAYER, true).unwrap();
    (domain, clock)
}

fn hub() -> (PoolDomain, Arc<ManualClock>) {
    let (mut hub, clock) = domain(HUB, true);
    hub.register_chain(OWNER, SPOKE, Address::repeat_byte(0xa1)).unwrap();
    hub.register_chain(OWNER, OTHER_SPOKE, Address::repeat_byte(0xa2)).unwrap();
    (hub, clock)
}

fn spoke() -> (PoolDomain, Arc<ManualClock>) {
    let (mut spoke, clock) = domain(SPOKE, false);
    spoke.register_chain(OWNER, HUB, Address::repeat_byte(0xb1)).unwrap();
    (spoke, clock)
}

fn call(price: u128, strike: u128) -> SettlementTerms {
    SettlementTerms {
        settlement_price: price,
        strike,
        is_call: true,
    }
}

#[test]
fn test_hub_must_name_itself() {
    let params = DomainParams {
        chain_id: HUB,
        deployment_address: Address::repeat_byte(1),
        is_hub: true,
        hub_chain_id: SPOKE,
        owner: OWNER,
        min_sync_interval_secs: INTERVAL,
        message_expiry_secs: EXPIRY,
    };
    let result = PoolDomain::new(
        params,
        Box::new(InMemoryToken::new(Address::repeat_byte(0xcc))),
        Arc::new(IntrinsicPricer),
        Arc::new(ManualClock::new(START)),
    );
    assert!(matches!(result, Err(PoolError::Config(_))));
}

#[test]
fn test_registry_is_owner_gated() {
    let (mut hub, _) = hub();
    assert!(matches!(
        hub.register_chain(STRANGER, 137, Address::repeat_byte(9)),
        Err(PoolError::NotOwner(a)) if a == STRANGER
    ));
    assert!(matches!(
        hub.register_chain(OWNER, SPOKE, Address::repeat_byte(9)),
        Err(PoolError::ChainAlreadyRegistered(SPOKE))
    ));
    assert!(matches!(
        hub.deactivate_chain(OWNER, 137),
        Err(PoolError::ChainNotRegistered(137))
    ));
    assert_eq!(hub.get_registered_chains(), vec![HUB, SPOKE, OTHER_SPOKE]);
}

#[test]
fn test_sync_requires_relayer() {
    let (mut hub, _) = hub();
    assert!(matches!(
        hub.sync_position(STRANGER, series(), 1, 1),
        Err(PoolError::UnauthorizedRelayer(a)) if a == STRANGER
    ));
}

#[test]
fn test_sync_rate_limit() {
    let (mut hub, clock) = hub();
    assert_ok!(hub.sync_position(RELAYER, series(), 100, 100));

    clock.advance(INTERVAL - 1);
    let err = assert_err!(hub.sync_position(RELAYER, series(), 150, 90));
    assert!(err.is_retryable());

    clock.advance(2);
    let position = hub.sync_position(RELAYER, series(), 150, 90).unwrap();
    assert_eq!(position.total_long_across_chains, 150);

    let snapshot = hub.get_chain_snapshot(series(), HUB).unwrap();
    assert_eq!(snapshot.short_amount, 90);
    assert_eq!(snapshot.last_sync_timestamp, START + INTERVAL + 1);
}

#[test]
fn test_sync_reports_local_collateral() {
    let (mut hub, _) = hub();
    hub.lock_collateral(DEPOSITOR, series(), 10_000).unwrap();
    let position = hub.sync_position(RELAYER, series(), 100, 100).unwrap();

    assert_eq!(position.total_collateral_across_chains, 10_000);
    assert_eq!(hub.get_chain_snapshot(series(), HUB).unwrap().locked_collateral, 10_000);
}

#[test]
fn test_aggregate_collateral_matches_latest_snapshots() {
    let (mut hub, clock) = hub();
    hub.lock_collateral(DEPOSITOR, series(), 2_000).unwrap();
    hub.sync_position(RELAYER, series(), 10, 5).unwrap();
    hub.receive_position_sync(RELAYER, SPOKE, series(), 40, 30, 7_000).unwrap();
    hub.receive_position_sync(RELAYER, OTHER_SPOKE, series(), 1, 2, 500).unwrap();
    // a later delivery overwrites, never merges
    clock.advance(1);
    let position = hub
        .receive_position_sync(RELAYER, SPOKE, series(), 45, 35, 6_000)
        .unwrap();

    let expected: u128 = [HUB, SPOKE, OTHER_SPOKE]
        .iter()
        .filter_map(|c| hub.get_chain_snapshot(series(), *c))
        .map(|s| s.locked_collateral)
        .sum();
    assert_eq!(expected, 8_500);
    assert_eq!(position.total_collateral_across_chains, expected);
    assert_eq!(position.total_long_across_chains, 56);
    assert_eq!(position.total_short_across_chains, 42);
    assert_eq!(hub.get_total_collateral_across_chains(), 8_500);
}

#[test]
fn test_receive_position_sync_checks() {
    let (mut hub, _) = hub();
    assert!(matches!(
        hub.receive_position_sync(RELAYER, 137, series(), 1, 1, 1),
        Err(PoolError::ChainNotRegistered(137))
    ));
    hub.deactivate_chain(OWNER, SPOKE).unwrap();
    assert!(matches!(
        hub.receive_position_sync(RELAYER, SPOKE, series(), 1, 1, 1),
        Err(PoolError::ChainInactive(SPOKE))
    ));
    assert!(matches!(
        hub.receive_position_sync(STRANGER, OTHER_SPOKE, series(), 1, 1, 1),
        Err(PoolError::UnauthorizedRelayer(_))
    ));

    let (mut spoke, _) = spoke();
    assert!(matches!(
        spoke.receive_position_sync(RELAYER, HUB, series(), 1, 1, 1),
        Err(PoolError::NotHub)
    ));
}

#[test]
fn test_hub_rejects_its_own_chain_as_remote_source() {
    let (mut hub, clock) = hub();
    hub.lock_collateral(DEPOSITOR, series(), 1_000).unwrap();
    hub.sync_position(RELAYER, series(), 10, 10).unwrap();
    clock.advance(INTERVAL);

    assert!(matches!(
        hub.receive_position_sync(RELAYER, HUB, series(), 10, 10, 9_999_999),
        Err(PoolError::LocalSource(HUB))
    ));
    let snapshot = hub.get_chain_snapshot(series(), HUB).unwrap();
    assert_eq!(snapshot.locked_collateral, 1_000);
    assert_eq!(snapshot.last_sync_timestamp, START);
    assert_eq!(
        hub.get_aggregated_position(series()).unwrap().total_collateral_across_chains,
        hub.local_collateral(series())
    );

    // the hub's own reporting is not throttled by the rejected delivery
    assert_ok!(hub.sync_position(RELAYER, series(), 12, 10));
}

#[test]
fn test_same_second_redelivery_rejected() {
    let (mut hub, clock) = hub();
    hub.receive_position_sync(RELAYER, SPOKE, series(), 40, 30, 7_000).unwrap();

    let err = assert_err!(hub.receive_position_sync(RELAYER, SPOKE, series(), 99, 1, 1));
    assert!(matches!(
        err,
        PoolError::SyncTooFrequent {
            chain_id: SPOKE,
            retry_after,
            ..
        } if retry_after == START + 1
    ));
    assert!(err.is_retryable());
    assert_eq!(hub.get_chain_snapshot(series(), SPOKE).unwrap().long_amount, 40);

    clock.advance(1);
    let position = hub
        .receive_position_sync(RELAYER, SPOKE, series(), 99, 1, 1)
        .unwrap();
    assert_eq!(position.total_long_across_chains, 99);
    assert_eq!(
        hub.get_chain_snapshot(series(), SPOKE).unwrap().last_sync_timestamp,
        START + 1
    );
}

#[test]
fn test_balanced_settlement_nets_to_zero() {
    let (mut hub, _) = hub();
    hub.lock_collateral(DEPOSITOR, series(), 10_000).unwrap();
    hub.sync_position(RELAYER, series(), 100, 100).unwrap();

    let position = hub
        .initiate_settlement(RELAYER, series(), call(2_500, 2_000))
        .unwrap();
    assert!(position.is_settled);
    assert_eq!(position.net_settlement_amount, 0);

    let record = hub.get_settlement_record(series()).unwrap();
    assert_eq!(record.strike, Some(2_000));
    assert_eq!(record.settled_at, START);
}

#[test]
fn test_settlement_dispatches_per_chain_payouts() {
    let (mut hub, _) = hub();
    hub.sync_position(RELAYER, series(), 100, 100).unwrap();
    hub.receive_position_sync(RELAYER, SPOKE, series(), 30, 10, 0).unwrap();
    hub.receive_position_sync(RELAYER, OTHER_SPOKE, series(), 5, 5, 0).unwrap();
    hub.deactivate_chain(OWNER, OTHER_SPOKE).unwrap();
    hub.drain_events();

    let position = hub
        .initiate_settlement(RELAYER, series(), call(2_100, 2_000))
        .unwrap();
    // long 135, short 115, 100 in the money per unit
    assert_eq!(position.net_settlement_amount, 2_000);

    let events = hub.drain_events();
    let dispatched: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProtocolEvent::SettlementDispatched {
                dest_chain,
                payout,
                message_id,
                ..
            } => Some((*dest_chain, *payout, *message_id)),
            _ => None,
        })
        .collect();
    assert_eq!(dispatched.len(), 1);
    let (dest, payout, message_id) = dispatched[0];
    assert_eq!(dest, SPOKE);
    assert_eq!(payout, 2_000);
    assert_eq!(hub.get_message(message_id).unwrap().status, MessageStatus::Pending);
}

#[test]
fn test_settlement_preconditions() {
    let (mut hub, _) = hub();
    assert!(matches!(
        hub.initiate_settlement(RELAYER, series(), call(2_000, 2_000)),
        Err(PoolError::SeriesNotFound(_))
    ));
    hub.sync_position(RELAYER, series(), 1, 1).unwrap();
    assert!(matches!(
        hub.initiate_settlement(RELAYER, series(), call(0, 2_000)),
        Err(PoolError::InvalidSettlementPrice)
    ));
    hub.initiate_settlement(RELAYER, series(), call(2_000, 2_000)).unwrap();
    assert!(matches!(
        hub.initiate_settlement(RELAYER, series(), call(2_000, 2_000)),
        Err(PoolError::AlreadySettled(_))
    ));

    let (mut spoke, _) = spoke();
    assert!(matches!(
        spoke.initiate_settlement(RELAYER, series(), call(1, 1)),
        Err(PoolError::NotHub)
    ));
}

#[test]
fn test_settled_series_is_frozen() {
    let (mut hub, clock) = hub();
    hub.lock_collateral(DEPOSITOR, series(), 1_000).unwrap();
    hub.sync_position(RELAYER, series(), 10, 10).unwrap();
    hub.initiate_settlement(RELAYER, series(), call(3_000, 2_000)).unwrap();

    assert!(matches!(
        hub.lock_collateral(DEPOSITOR, series(), 1),
        Err(PoolError::AlreadySettled(_))
    ));
    clock.advance(INTERVAL * 2);
    assert!(matches!(
        hub.sync_position(RELAYER, series(), 1, 1),
        Err(PoolError::AlreadySettled(_))
    ));
    assert!(matches!(
        hub.receive_position_sync(RELAYER, SPOKE, series(), 1, 1, 1),
        Err(PoolError::AlreadySettled(_))
    ));
}

#[test]
fn test_release_requires_settlement_and_balance() {
    let (mut spoke, _) = spoke();
    spoke.lock_collateral(DEPOSITOR, series(), 10_000).unwrap();

    assert!(matches!(
        spoke.release_collateral(RELAYER, series(), 1, RECIPIENT),
        Err(PoolError::NotSettled(_))
    ));

    spoke.execute_settlement(RELAYER, series(), 2_500, -4_000).unwrap();

    assert!(matches!(
        spoke.release_collateral(STRANGER, series(), 1, RECIPIENT),
        Err(PoolError::UnauthorizedRelayer(_))
    ));
    assert!(matches!(
        spoke.release_collateral(RELAYER, series(), 10_001, RECIPIENT),
        Err(PoolError::InsufficientCollateral {
            requested: 10_001,
            available: 10_000
        })
    ));
    assert_eq!(
        spoke.release_collateral(RELAYER, series(), 4_000, RECIPIENT).unwrap(),
        6_000
    );
    assert_eq!(spoke.total_locked(), 6_000);
}

#[test]
fn test_spoke_settlement_trusts_hub_payout() {
    let (mut spoke, _) = spoke();
    let position = spoke
        .execute_settlement(RELAYER, series(), 2_500, 1_234)
        .unwrap();
    assert!(position.is_settled);
    assert_eq!(position.net_settlement_amount, 1_234);
    assert_eq!(spoke.get_settlement_record(series()).unwrap().strike, None);

    assert!(matches!(
        spoke.execute_settlement(RELAYER, series(), 2_500, 1_234),
        Err(PoolError::AlreadySettled(_))
    ));
    assert!(matches!(
        spoke.execute_settlement(RELAYER, SeriesId::repeat_byte(1), 0, 1),
        Err(PoolError::InvalidSettlementPrice)
    ));

    let (mut hub, _) = hub();
    assert!(matches!(
        hub.execute_settlement(RELAYER, series(), 2_500, 1),
        Err(PoolError::NotSpoke)
    ));
}

#[test]
fn test_spoke_sync_queues_message_to_hub() {
    let (mut spoke, clock) = spoke();
    spoke.sync_position(RELAYER, series(), 40, 25).unwrap();

    let pending = spoke.pending_messages();
    assert_eq!(pending.len(), 1);
    let message = &pending[0];
    assert_eq!(message.source_chain, SPOKE);
    assert_eq!(message.dest_chain, HUB);
    assert_eq!(message.nonce, 1);
    assert_eq!(
        message.id,
        crate::messaging::message_id(SPOKE, HUB, 1, START)
    );

    // duplicate delivery of the confirmation fails cleanly
    spoke.confirm_message(RELAYER, message.id).unwrap();
    assert!(matches!(
        spoke.confirm_message(RELAYER, message.id),
        Err(PoolError::MessageAlreadyProcessed(_))
    ));

    clock.advance(INTERVAL);
    spoke.sync_position(RELAYER, series(), 41, 25).unwrap();
    let second = spoke.pending_messages().pop().unwrap();
    assert_eq!(second.nonce, 2);

    clock.advance(EXPIRY + 1);
    assert_eq!(spoke.expired_pending_messages().len(), 1);
    assert!(matches!(
        spoke.fail_message(RELAYER, second.id),
        Err(PoolError::MessageExpired(_))
    ));
}

#[test]
fn test_settlement_delta_per_chain() {
    let (mut hub, _) = hub();
    hub.receive_position_sync(RELAYER, SPOKE, series(), 80, 20, 0).unwrap();
    assert_eq!(hub.get_settlement_delta(series(), SPOKE).unwrap(), 60);
    assert_eq!(hub.get_settlement_delta(series(), OTHER_SPOKE).unwrap(), 0);
}

#[test]
fn test_rebalance_lifecycle() {
    let (mut hub, _) = hub();
    let request = hub.request_rebalance(SPOKE, OTHER_SPOKE, 1_000).unwrap();
    assert_eq!(request.id, 1);
    assert!(!request.executed);
    assert_eq!(hub.pending_messages()[0].dest_chain, OTHER_SPOKE);

    assert!(matches!(
        hub.execute_rebalance(STRANGER, 1),
        Err(PoolError::UnauthorizedRelayer(_))
    ));
    assert!(hub.execute_rebalance(RELAYER, 1).unwrap().executed);
    assert!(matches!(
        hub.execute_rebalance(RELAYER, 1),
        Err(PoolError::RebalanceAlreadyExecuted(1))
    ));
    assert!(hub.get_rebalance_request(1).unwrap().executed);

    assert!(matches!(
        hub.request_rebalance(SPOKE, SPOKE, 1),
        Err(PoolError::SelfTarget(SPOKE))
    ));
    assert!(matches!(
        hub.request_rebalance(SPOKE, HUB, 0),
        Err(PoolError::ZeroAmount)
    ));
    assert!(matches!(
        hub.request_rebalance(SPOKE, 137, 5),
        Err(PoolError::ChainNotRegistered(137))
    ));
}

#[test]
fn test_rebalance_toward_local_chain_messages_source() {
    let (mut hub, _) = hub();
    hub.request_rebalance(SPOKE, HUB, 500).unwrap();
    assert_eq!(hub.pending_messages()[0].dest_chain, SPOKE);
}

#[test]
fn test_pause_blocks_lock_only() {
    let (mut hub, _) = hub();
    assert!(matches!(hub.pause(STRANGER), Err(PoolError::NotOwner(_))));
    hub.pause(OWNER).unwrap();

    assert!(matches!(
        hub.lock_collateral(DEPOSITOR, series(), 100),
        Err(PoolError::ContractPaused)
    ));
    assert_ok!(hub.sync_position(RELAYER, series(), 1, 1));

    hub.unpause(OWNER).unwrap();
    assert_eq!(hub.lock_collateral(DEPOSITOR, series(), 100).unwrap(), 100);
}

#[test]
fn test_ownership_and_token_admin() {
    let (mut hub, _) = hub();
    let new_owner = Address::repeat_byte(0x99);
    hub.transfer_ownership(OWNER, new_owner).unwrap();
    assert_eq!(hub.owner(), new_owner);
    assert!(matches!(hub.pause(OWNER), Err(PoolError::NotOwner(_))));

    hub.lock_collateral(DEPOSITOR, series(), 10).unwrap();
    let replacement = Box::new(InMemoryToken::new(Address::repeat_byte(0xdd)));
    assert!(matches!(
        hub.set_collateral_token(new_owner, replacement),
        Err(PoolError::CollateralOutstanding { locked: 10 })
    ));
    assert!(matches!(
        hub.emergency_withdraw(new_owner, RECIPIENT, 1),
        Err(PoolError::InsufficientLiquidity {
            requested: 1,
            available: 0
        })
    ));
}

#[test]
fn test_events_are_drained_once() {
    let (mut hub, _) = hub();
    hub.drain_events();
    hub.lock_collateral(DEPOSITOR, series(), 50).unwrap();

    let events = hub.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name(), "collateral_locked");
    assert!(hub.drain_events().is_empty());
}
