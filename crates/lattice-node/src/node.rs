use std::sync::Arc;
use std::time::Instant;

use lattice_admission::AdmissionLimiter;
use lattice_consensus::{aggregate, cast_votes, select_committee, ConsensusError, VoteScheme};
use lattice_core::{
    canonicalize, derive_transfer_id, AccountId, Block, Clock, Hash, QuorumCert, ReceiveBlock,
    SendBlock, SystemClock,
};
use lattice_state::{Ledger, StateError};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::error::{ConfigError, RejectionReason};
use crate::metrics::{MetricsSnapshot, NodeMetrics};

/// Both certified halves of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub debit_block: Block,
    pub credit_block: Block,
    pub debit_cert: QuorumCert,
    pub credit_cert: QuorumCert,
}

/// A block as returned by [`Node::list_blocks`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum BlockListing {
    Raw(Block),
    Canonical(String),
}

/// The transfer orchestrator.
///
/// Owns the ledger, the admission limiter, the epoch counter, and the
/// append-only block and certificate logs. Methods take `&mut self`; wrap
/// in [`crate::SharedNode`] for concurrent callers.
pub struct Node {
    config: NodeConfig,
    clock: Arc<dyn Clock>,
    scheme: Box<dyn VoteScheme>,
    ledger: Ledger,
    limiter: AdmissionLimiter,
    epoch: u64,
    blocks: Vec<Block>,
    quorum_certs: Vec<QuorumCert>,
    metrics: NodeMetrics,
}

/// Result of certifying one block against a working ledger
struct Certified {
    block: Block,
    cert: QuorumCert,
}

impl Node {
    /// Create a node on the wall clock
    pub fn new(config: NodeConfig) -> Result<Self, ConfigError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a node reading time from `clock`
    pub fn with_clock(config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        config.validate()?;

        let ledger = genesis_ledger(&config)?;
        let limiter = AdmissionLimiter::with_clock(config.limiter.clone(), Arc::clone(&clock));
        let scheme = config.vote_scheme.build();

        info!(
            "Node ready: {} accounts, committee {} / threshold {}, {} votes",
            ledger.len(),
            config.committee_size,
            config.quorum_threshold,
            scheme.name()
        );

        Ok(Node {
            config,
            clock,
            scheme,
            ledger,
            limiter,
            epoch: 0,
            blocks: Vec::new(),
            quorum_certs: Vec::new(),
            metrics: NodeMetrics::new(),
        })
    }

    /// Return to the freshly constructed state: genesis balances, epoch 0,
    /// empty logs, fresh limiter and metrics
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        self.ledger = genesis_ledger(&self.config)?;
        self.limiter.reset();
        self.epoch = 0;
        self.blocks.clear();
        self.quorum_certs.clear();
        self.metrics = NodeMetrics::new();
        info!("Node reset");
        Ok(())
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state_root(&self) -> Hash {
        self.ledger.state_root()
    }

    pub fn scheme(&self) -> &dyn VoteScheme {
        self.scheme.as_ref()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn register_account(
        &mut self,
        account_id: impl Into<AccountId>,
        initial_balance: u128,
    ) -> Result<AccountId, StateError> {
        self.ledger
            .register_account(account_id.into(), initial_balance)
    }

    pub fn get_balance(&self, account_id: &AccountId) -> Result<u128, StateError> {
        self.ledger.get_balance(account_id)
    }

    /// Balances of `accounts` in order; the first unknown account is an error
    pub fn balances(&self, accounts: &[AccountId]) -> Result<Vec<(AccountId, u128)>, StateError> {
        accounts
            .iter()
            .map(|id| Ok((id.clone(), self.ledger.get_balance(id)?)))
            .collect()
    }

    /// Move `amount` from `from` to `to`.
    ///
    /// Either both blocks are certified and applied, or nothing changes
    /// apart from the sender's limiter token.
    pub fn submit_transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<TransferReceipt, RejectionReason> {
        let started = Instant::now();

        match self.execute_transfer(from, to, amount) {
            Ok(receipt) => {
                let latency = started.elapsed();
                self.metrics.record_transfer(latency);
                info!(
                    "Transfer {} -> {} of {} committed (epoch {}, {:?})",
                    from, to, amount, self.epoch, latency
                );
                Ok(receipt)
            }
            Err(reason) => {
                warn!("Transfer {} -> {} of {} rejected: {}", from, to, amount, reason);
                Err(reason)
            }
        }
    }

    fn admit(&self, from: &AccountId, to: &AccountId, amount: u128) -> Result<(), RejectionReason> {
        if amount == 0 {
            return Err(RejectionReason::InvalidAmount);
        }
        for account in [from, to] {
            if !self.ledger.contains(account) {
                return Err(RejectionReason::UnknownAccount(account.clone()));
            }
        }
        if from == to {
            return Err(RejectionReason::SelfTransfer(from.clone()));
        }
        if !self.limiter.check_and_consume(from) {
            return Err(RejectionReason::RateLimited(from.clone()));
        }
        Ok(())
    }

    fn execute_transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<TransferReceipt, RejectionReason> {
        self.admit(from, to, amount)?;

        // All work happens on a copy; the node is only touched on success
        let mut working = self.ledger.clone();
        let mut epoch = self.epoch;
        let timestamp = self.clock.now_millis();

        let sender = working
            .account(from)
            .cloned()
            .ok_or_else(|| RejectionReason::UnknownAccount(from.clone()))?;
        let transfer_id =
            derive_transfer_id(from, to, amount, sender.next_height(), timestamp);

        let send = SendBlock::new(
            from.clone(),
            &sender,
            working.state_root(),
            timestamp,
            to.clone(),
            amount,
            transfer_id,
        );
        working.apply_send(&send)?;
        let debit = self.certify(&working, epoch, send.into())?;
        epoch += 1;
        working.set_state_root(debit.block.hash());

        let recipient = working
            .account(to)
            .cloned()
            .ok_or_else(|| RejectionReason::UnknownAccount(to.clone()))?;
        let receive = ReceiveBlock::new(
            to.clone(),
            &recipient,
            working.state_root(),
            timestamp,
            from.clone(),
            transfer_id,
        );
        working.apply_receive(&receive, amount)?;
        let credit = self.certify(&working, epoch, receive.into())?;
        epoch += 1;
        working.set_state_root(credit.block.hash());

        self.ledger = working;
        self.epoch = epoch;
        self.blocks.push(debit.block.clone());
        self.blocks.push(credit.block.clone());
        self.quorum_certs.push(debit.cert.clone());
        self.quorum_certs.push(credit.cert.clone());

        Ok(TransferReceipt {
            debit_block: debit.block,
            credit_block: credit.block,
            debit_cert: debit.cert,
            credit_cert: credit.cert,
        })
    }

    /// Sign the block as its owner, sample a committee keyed by
    /// `(epoch, owner, height)`, collect every member's vote and aggregate
    fn certify(&self, working: &Ledger, epoch: u64, mut block: Block) -> Result<Certified, ConsensusError> {
        let block_hash = block.hash();
        let owner = block.account_id().clone();
        block.set_signature(self.scheme.sign(&owner, &block_hash));

        let (committee, _) = select_committee(
            &working.account_ids(),
            self.config.committee_size,
            epoch,
            &owner,
            block.height(),
        )?;

        let votes = cast_votes(&committee, &block_hash, self.scheme.as_ref());
        let cert = aggregate(
            block_hash,
            &votes,
            &committee,
            self.config.quorum_threshold,
            self.scheme.as_ref(),
        )?;

        debug!(
            "Certified {} block {} by committee {} ({}/{})",
            block.kind(),
            block_hash.short(),
            committee.id,
            cert.signer_count(),
            cert.threshold
        );

        Ok(Certified { block, cert })
    }

    /// Committed blocks in commit order, raw or as signed canonical JSON
    pub fn list_blocks(&self, canonical: bool) -> Vec<BlockListing> {
        self.blocks
            .iter()
            .map(|block| {
                if canonical {
                    BlockListing::Canonical(block.signed_canonical_json())
                } else {
                    BlockListing::Raw(block.clone())
                }
            })
            .collect()
    }

    pub fn list_certificates(&self) -> &[QuorumCert] {
        &self.quorum_certs
    }

    /// Canonical byte footprint of the block and certificate logs
    pub fn memory_estimate_bytes(&self) -> u64 {
        let blocks: usize = self
            .blocks
            .iter()
            .map(|b| b.signed_canonical_json().len())
            .sum();
        let certs: usize = self
            .quorum_certs
            .iter()
            .map(|c| canonicalize(c).len())
            .sum();
        (blocks + certs) as u64
    }

    pub fn metrics_snapshot(&self, capacity_limit_bytes: u64) -> MetricsSnapshot {
        self.metrics
            .snapshot(self.memory_estimate_bytes(), capacity_limit_bytes)
    }
}

fn genesis_ledger(config: &NodeConfig) -> Result<Ledger, ConfigError> {
    let mut ledger = Ledger::new();
    for entry in &config.genesis.initial_balances {
        ledger.register_account(AccountId::new(entry.account_id.as_str()), entry.balance)?;
    }
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_admission::LimiterConfig;
    use lattice_consensus::{verify_qc, VoteSchemeKind};
    use lattice_core::ManualClock;

    fn test_config() -> NodeConfig {
        NodeConfig {
            committee_size: 3,
            quorum_threshold: 2,
            ..NodeConfig::default()
        }
        .with_account("alice", 1000)
        .with_account("bob", 0)
        .with_account("carol", 50)
        .with_account("dave", 50)
    }

    fn create_node(config: NodeConfig) -> (Node, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let node = Node::with_clock(config, Arc::new(clock.clone())).unwrap();
        (node, clock)
    }

    #[test]
    fn test_genesis_registration() {
        let (node, _) = create_node(test_config());
        assert_eq!(node.ledger().len(), 4);
        assert_eq!(node.get_balance(&"alice".into()).unwrap(), 1000);
        assert_eq!(node.epoch(), 0);
        assert_eq!(node.state_root(), Hash::ZERO);
    }

    #[test]
    fn test_transfer_applies_both_halves() {
        let (mut node, _) = create_node(test_config());
        let receipt = node.submit_transfer(&"alice".into(), &"bob".into(), 125).unwrap();

        assert_eq!(node.get_balance(&"alice".into()).unwrap(), 875);
        assert_eq!(node.get_balance(&"bob".into()).unwrap(), 125);
        assert_eq!(node.epoch(), 2);
        assert_eq!(node.state_root(), receipt.credit_block.hash());
        assert_eq!(node.blocks().len(), 2);
        assert_eq!(node.list_certificates().len(), 2);

        assert_eq!(receipt.debit_block.kind(), "send");
        assert_eq!(receipt.credit_block.kind(), "receive");
        assert_eq!(receipt.debit_block.transfer_id(), receipt.credit_block.transfer_id());
        assert_eq!(receipt.debit_cert.block_hash, receipt.debit_block.hash());
        assert_eq!(receipt.credit_cert.block_hash, receipt.credit_block.hash());
        assert_eq!(receipt.debit_cert.committee_epoch, 0);
        assert_eq!(receipt.credit_cert.committee_epoch, 1);
    }

    #[test]
    fn test_credit_block_hints_debit_root() {
        let (mut node, _) = create_node(test_config());
        let receipt = node.submit_transfer(&"alice".into(), &"bob".into(), 1).unwrap();
        assert_eq!(receipt.debit_block.header().state_root_hint, Hash::ZERO);
        assert_eq!(
            receipt.credit_block.header().state_root_hint,
            receipt.debit_block.hash()
        );
    }

    #[test]
    fn test_certificates_verify_against_reconstructed_committee() {
        let (mut node, _) = create_node(test_config());
        let receipt = node.submit_transfer(&"alice".into(), &"bob".into(), 5).unwrap();

        let members = node.ledger().account_ids();
        let (committee, _) = select_committee(
            &members,
            3,
            receipt.debit_cert.committee_epoch,
            &"alice".into(),
            receipt.debit_block.height(),
        )
        .unwrap();
        assert_eq!(committee.id, receipt.debit_cert.committee_id);
        verify_qc(&receipt.debit_cert, &committee, node.scheme()).unwrap();
    }

    #[test]
    fn test_block_signed_by_owner() {
        let (mut node, _) = create_node(test_config());
        let receipt = node.submit_transfer(&"alice".into(), &"bob".into(), 5).unwrap();
        let hash = receipt.debit_block.hash();
        assert!(node
            .scheme()
            .verify(&"alice".into(), &hash, receipt.debit_block.signature()));
    }

    #[test]
    fn test_admission_rejections() {
        let (mut node, _) = create_node(test_config());
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");
        let ghost = AccountId::from("ghost");

        assert_eq!(
            node.submit_transfer(&alice, &bob, 0).unwrap_err(),
            RejectionReason::InvalidAmount
        );
        assert_eq!(
            node.submit_transfer(&ghost, &bob, 1).unwrap_err(),
            RejectionReason::UnknownAccount(ghost.clone())
        );
        assert_eq!(
            node.submit_transfer(&alice, &ghost, 1).unwrap_err(),
            RejectionReason::UnknownAccount(ghost)
        );
        assert_eq!(
            node.submit_transfer(&alice, &alice, 1).unwrap_err(),
            RejectionReason::SelfTransfer(alice.clone())
        );
        assert!(node.blocks().is_empty());
        assert_eq!(node.epoch(), 0);
        assert_eq!(node.metrics_snapshot(0).total_transfers, 0);
    }

    #[test]
    fn test_insufficient_balance_leaves_no_trace() {
        let (mut node, _) = create_node(test_config());
        let before = node.ledger().clone();

        let err = node
            .submit_transfer(&"carol".into(), &"bob".into(), 51)
            .unwrap_err();
        assert!(matches!(
            err,
            RejectionReason::Ledger(StateError::InsufficientBalance { have: 50, need: 51 })
        ));
        assert_eq!(node.ledger(), &before);
        assert!(node.blocks().is_empty());
        assert!(node.list_certificates().is_empty());
        assert_eq!(node.epoch(), 0);
    }

    #[test]
    fn test_rate_limited_sender() {
        let config = NodeConfig {
            limiter: LimiterConfig {
                enabled: true,
                capacity: 2.0,
                refill_rate: 1.0,
            },
            ..test_config()
        };
        let (mut node, clock) = create_node(config);
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");

        node.submit_transfer(&alice, &bob, 1).unwrap();
        node.submit_transfer(&alice, &bob, 1).unwrap();
        assert_eq!(
            node.submit_transfer(&alice, &bob, 1).unwrap_err(),
            RejectionReason::RateLimited(alice.clone())
        );
        // Another sender is unaffected
        node.submit_transfer(&"carol".into(), &bob, 1).unwrap();

        clock.advance(1_000);
        node.submit_transfer(&alice, &bob, 1).unwrap();
        assert_eq!(node.metrics_snapshot(0).total_transfers, 4);
    }

    #[test]
    fn test_list_blocks_canonical_and_raw() {
        let (mut node, _) = create_node(test_config());
        node.submit_transfer(&"alice".into(), &"bob".into(), 7).unwrap();

        let raw = node.list_blocks(false);
        let canonical = node.list_blocks(true);
        assert_eq!(raw.len(), 2);
        assert_eq!(canonical.len(), 2);

        match (&raw[0], &canonical[0]) {
            (BlockListing::Raw(block), BlockListing::Canonical(json)) => {
                assert_eq!(json, &block.signed_canonical_json());
                assert!(json.contains(r#""kind":"send""#));
            }
            other => panic!("unexpected listing {:?}", other),
        }
    }

    #[test]
    fn test_reset_restores_genesis() {
        let (mut node, _) = create_node(test_config());
        node.submit_transfer(&"alice".into(), &"bob".into(), 7).unwrap();
        node.register_account("erin", 3).unwrap();

        node.reset().unwrap();
        assert_eq!(node.epoch(), 0);
        assert!(node.blocks().is_empty());
        assert!(node.list_certificates().is_empty());
        assert_eq!(node.get_balance(&"alice".into()).unwrap(), 1000);
        assert!(node.get_balance(&"erin".into()).is_err());
        assert_eq!(node.metrics_snapshot(0).total_transfers, 0);
    }

    #[test]
    fn test_ed25519_node() {
        let config = NodeConfig {
            vote_scheme: VoteSchemeKind::Ed25519,
            ..test_config()
        };
        let (mut node, _) = create_node(config);
        let receipt = node.submit_transfer(&"alice".into(), &"bob".into(), 9).unwrap();
        assert_eq!(receipt.debit_block.signature().len(), 64);
        assert_eq!(
            receipt.debit_cert.aggregated_signature.len(),
            receipt.debit_cert.signer_count() * 64
        );
    }

    #[test]
    fn test_metrics_track_footprint() {
        let (mut node, _) = create_node(test_config());
        assert_eq!(node.memory_estimate_bytes(), 0);
        node.submit_transfer(&"alice".into(), &"bob".into(), 7).unwrap();

        let snapshot = node.metrics_snapshot(1_000_000);
        assert_eq!(snapshot.total_transfers, 1);
        assert!(snapshot.memory_estimate_bytes > 0);
        assert!(snapshot.last_latency_ms.is_some());
        assert_eq!(
            snapshot.capacity_projection.bytes_per_transfer,
            Some(snapshot.memory_estimate_bytes)
        );
    }

    #[test]
    fn test_balances_report_unknown_account() {
        let (mut node, _) = create_node(test_config());
        node.submit_transfer(&"alice".into(), &"bob".into(), 30).unwrap();

        let report = node.balances(&[AccountId::from("bob"), AccountId::from("alice")]).unwrap();
        assert_eq!(
            report,
            vec![(AccountId::from("bob"), 30), (AccountId::from("alice"), 970)]
        );

        let ghost = AccountId::from("ghost");
        assert_eq!(
            node.balances(&[AccountId::from("alice"), ghost.clone()]).unwrap_err(),
            StateError::UnknownAccount(ghost)
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = NodeConfig {
            committee_size: 0,
            ..test_config()
        };
        assert!(matches!(Node::new(config), Err(ConfigError::Invalid(_))));
    }
}
