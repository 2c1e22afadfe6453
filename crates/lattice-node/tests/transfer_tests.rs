//! End-to-end transfer scenarios

use std::sync::Arc;

use lattice_admission::LimiterConfig;
use lattice_consensus::{aggregate, cast_votes, select_committee, ConsensusError, HashVoteScheme};
use lattice_core::{
    derive_transfer_id, AccountId, AccountState, Hash, ManualClock, ReceiveBlock, SendBlock,
};
use lattice_node::{Node, NodeConfig, RejectionCategory, RejectionReason};
use lattice_state::{Ledger, StateError};

const START_MS: u64 = 1_700_000_000_000;

fn alice() -> AccountId {
    AccountId::from("alice")
}

fn bob() -> AccountId {
    AccountId::from("bob")
}

/// Node with alice (1000) and bob (0), committee 7 / threshold 5
fn setup_node() -> (Node, ManualClock) {
    let config = NodeConfig::default()
        .with_account("alice", 1000)
        .with_account("bob", 0);
    let clock = ManualClock::new(START_MS);
    let node = Node::with_clock(config, Arc::new(clock.clone())).unwrap();
    (node, clock)
}

#[test]
fn test_alice_pays_bob() {
    let (mut node, _) = setup_node();

    let receipt = node.submit_transfer(&alice(), &bob(), 125).unwrap();

    assert_eq!(node.get_balance(&alice()).unwrap(), 875);
    assert_eq!(node.get_balance(&bob()).unwrap(), 125);

    let certs = node.list_certificates();
    assert_eq!(certs.len(), 2);
    assert_ne!(certs[0].committee_id, certs[1].committee_id);
    assert_eq!(certs[0], receipt.debit_cert);
    assert_eq!(certs[1], receipt.credit_cert);
}

#[test]
fn test_zero_amount_rejected() {
    let (mut node, _) = setup_node();

    let err = node.submit_transfer(&alice(), &bob(), 0).unwrap_err();
    assert_eq!(err, RejectionReason::InvalidAmount);
    assert_eq!(err.category(), RejectionCategory::Admission);

    assert!(node.list_blocks(false).is_empty());
    assert!(node.list_certificates().is_empty());
    assert_eq!(node.get_balance(&alice()).unwrap(), 1000);
}

#[test]
fn test_duplicate_registration_rejected() {
    let (mut node, _) = setup_node();
    let before = node.ledger().clone();

    let err = node.register_account("alice", 5).unwrap_err();
    assert_eq!(err, StateError::AlreadyExists(alice()));
    assert_eq!(node.ledger(), &before);
    assert_eq!(node.get_balance(&alice()).unwrap(), 1000);
}

#[test]
fn test_oversized_committee_uses_every_account() {
    let config = NodeConfig {
        committee_size: 10,
        quorum_threshold: 5,
        ..NodeConfig::default()
    }
    .with_account("alice", 1000)
    .with_account("bob", 0)
    .with_account("carol", 0);
    let mut node = Node::new(config).unwrap();

    let receipt = node.submit_transfer(&alice(), &bob(), 10).unwrap();
    for cert in [&receipt.debit_cert, &receipt.credit_cert] {
        assert_eq!(cert.bitmap.len(), 3);
        assert_eq!(cert.threshold, 3);
        assert_eq!(cert.signer_count(), 3);
    }

    let (committee, index_map) =
        select_committee(&node.ledger().account_ids(), 10, 0, &alice(), 1).unwrap();
    assert_eq!(committee.size(), 3);
    assert_eq!(index_map.len(), 3);
}

#[test]
fn test_replay_after_reset_is_identical() {
    let (mut node, clock) = setup_node();

    let run = |node: &mut Node| {
        node.submit_transfer(&alice(), &bob(), 100).unwrap();
        node.submit_transfer(&bob(), &alice(), 40).unwrap();
        node.submit_transfer(&alice(), &bob(), 7).unwrap();
        (
            node.list_blocks(true),
            node.list_certificates().to_vec(),
            node.state_root(),
            node.epoch(),
        )
    };

    let first = run(&mut node);
    assert_eq!(first.3, 6);

    node.reset().unwrap();
    clock.set(START_MS);
    let second = run(&mut node);

    assert_eq!(first, second);
}

#[test]
fn test_independent_nodes_agree() {
    let (mut a, _) = setup_node();
    let (mut b, _) = setup_node();

    let ra = a.submit_transfer(&alice(), &bob(), 300).unwrap();
    let rb = b.submit_transfer(&alice(), &bob(), 300).unwrap();

    assert_eq!(ra, rb);
    assert_eq!(a.state_root(), b.state_root());
}

#[test]
fn test_later_clock_changes_hashes() {
    let (mut a, _) = setup_node();
    let (mut b, clock_b) = setup_node();
    clock_b.advance(1);

    let ra = a.submit_transfer(&alice(), &bob(), 300).unwrap();
    let rb = b.submit_transfer(&alice(), &bob(), 300).unwrap();
    assert_ne!(ra.debit_block.hash(), rb.debit_block.hash());
    assert_ne!(ra.debit_block.transfer_id(), rb.debit_block.transfer_id());
}

#[test]
fn test_overdraft_has_no_partial_effect() {
    let (mut node, _) = setup_node();
    node.submit_transfer(&alice(), &bob(), 1).unwrap();
    let blocks_before = node.list_blocks(false);
    let ledger_before = node.ledger().clone();
    let epoch_before = node.epoch();

    let err = node.submit_transfer(&bob(), &alice(), 2).unwrap_err();
    assert_eq!(
        err,
        RejectionReason::Ledger(StateError::InsufficientBalance { have: 1, need: 2 })
    );
    assert_eq!(err.category(), RejectionCategory::LedgerConsistency);

    assert_eq!(node.list_blocks(false), blocks_before);
    assert_eq!(node.ledger(), &ledger_before);
    assert_eq!(node.epoch(), epoch_before);
}

#[test]
fn test_rate_limit_through_node_clock() {
    let config = NodeConfig {
        limiter: LimiterConfig {
            enabled: true,
            capacity: 3.0,
            refill_rate: 2.0,
        },
        ..NodeConfig::default()
    }
    .with_account("alice", 1000)
    .with_account("bob", 0);
    let clock = ManualClock::new(START_MS);
    let mut node = Node::with_clock(config, Arc::new(clock.clone())).unwrap();

    for _ in 0..3 {
        node.submit_transfer(&alice(), &bob(), 1).unwrap();
    }
    let err = node.submit_transfer(&alice(), &bob(), 1).unwrap_err();
    assert_eq!(err, RejectionReason::RateLimited(alice()));
    assert_eq!(node.metrics_snapshot(0).total_transfers, 3);

    // A backward clock step never refills
    clock.set(START_MS - 10_000);
    assert!(node.submit_transfer(&alice(), &bob(), 1).is_err());

    clock.set(START_MS + 500);
    node.submit_transfer(&alice(), &bob(), 1).unwrap();
    assert_eq!(node.get_balance(&bob()).unwrap(), 4);
}

#[test]
fn test_stale_head_always_rejected() {
    let (mut node, _) = setup_node();
    let stale_state = node.ledger().account(&alice()).cloned().unwrap();
    node.submit_transfer(&alice(), &bob(), 10).unwrap();

    let mut ledger = node.ledger().clone();
    for amount in [1u128, 5, 990] {
        let block = SendBlock::new(
            alice(),
            &stale_state,
            ledger.state_root(),
            START_MS,
            bob(),
            amount,
            Hash::ZERO,
        );
        let err = ledger.apply_send(&block).unwrap_err();
        assert!(matches!(err, StateError::StaleHead { .. }));
    }
    assert_eq!(&ledger, node.ledger());
}

#[test]
fn test_threshold_never_undercut() {
    let members: Vec<AccountId> = (0..9).map(|i| AccountId::new(format!("acct-{}", i))).collect();
    let scheme = HashVoteScheme;
    let block_hash = Hash::new([7u8; 32]);

    for committee_size in 1..=9 {
        let (committee, _) = select_committee(&members, committee_size, 3, &members[0], 1).unwrap();
        let votes = cast_votes(&committee, &block_hash, &scheme);

        for threshold in 1..=10 {
            let effective = threshold.min(committee_size);
            for taken in 0..=votes.len() {
                match aggregate(block_hash, &votes[..taken], &committee, threshold, &scheme) {
                    Ok(cert) => {
                        assert!(cert.signer_count() >= effective);
                        assert_eq!(cert.threshold, effective);
                    }
                    Err(ConsensusError::CertificationFailed { have, need }) => {
                        assert!(taken < effective);
                        assert_eq!(have, taken);
                        assert_eq!(need, effective);
                    }
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }
        }
    }
}

#[test]
fn test_duplicate_votes_not_double_counted() {
    let members: Vec<AccountId> = ["a", "b", "c", "d"].iter().map(|s| AccountId::from(*s)).collect();
    let scheme = HashVoteScheme;
    let block_hash = Hash::new([1u8; 32]);
    let (committee, _) = select_committee(&members, 4, 0, &members[0], 1).unwrap();
    let votes = cast_votes(&committee, &block_hash, &scheme);

    let repeated = vec![votes[0].clone(), votes[0].clone(), votes[0].clone()];
    let err = aggregate(block_hash, &repeated, &committee, 2, &scheme).unwrap_err();
    assert_eq!(err, ConsensusError::CertificationFailed { have: 1, need: 2 });
}

#[test]
fn test_block_hash_stability() {
    let state = AccountState::new(1000);
    let build = |to: &str, amount: u128, timestamp: u64| {
        let to = AccountId::from(to);
        let transfer_id = derive_transfer_id(&alice(), &to, amount, 1, timestamp);
        SendBlock::new(alice(), &state, Hash::ZERO, timestamp, to, amount, transfer_id)
    };

    let base = build("bob", 125, START_MS);
    assert_eq!(base.hash(), build("bob", 125, START_MS).hash());
    assert_ne!(base.hash(), build("bob", 126, START_MS).hash());
    assert_ne!(base.hash(), build("bob", 125, START_MS + 1).hash());
    assert_ne!(base.hash(), build("carol", 125, START_MS).hash());
}

/// `apply_receive` credits whatever amount the caller passes; it does not
/// look up the send block named by `transfer_id`.
#[test]
fn test_receive_amount_is_trusted() {
    let mut ledger = Ledger::new();
    ledger.register_account(bob(), 0).unwrap();
    let bob_state = ledger.account(&bob()).cloned().unwrap();

    let orphan = ReceiveBlock::new(
        bob(),
        &bob_state,
        Hash::ZERO,
        START_MS,
        alice(),
        Hash::new([9u8; 32]),
    );
    ledger.apply_receive(&orphan, 1_000_000).unwrap();

    assert_eq!(ledger.get_balance(&bob()).unwrap(), 1_000_000);
    assert_eq!(ledger.total_supply(), 1_000_000);
}
