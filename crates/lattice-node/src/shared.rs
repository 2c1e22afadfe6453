use std::sync::Arc;
use std::time::Duration;

use lattice_core::AccountId;
use lattice_state::StateError;
use tokio::sync::{Mutex, MutexGuard};
use tracing::warn;

use crate::error::RejectionReason;
use crate::metrics::MetricsSnapshot;
use crate::node::{BlockListing, Node, TransferReceipt};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle serializing access to one [`Node`].
///
/// Transfers run one at a time; a caller that cannot get the node within
/// the lock timeout is rejected with [`RejectionReason::Timeout`].
#[derive(Clone)]
pub struct SharedNode {
    inner: Arc<Mutex<Node>>,
    lock_timeout: Duration,
}

impl SharedNode {
    pub fn new(node: Node) -> Self {
        Self::with_timeout(node, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(node: Node, lock_timeout: Duration) -> Self {
        SharedNode {
            inner: Arc::new(Mutex::new(node)),
            lock_timeout,
        }
    }

    async fn acquire(&self) -> Result<MutexGuard<'_, Node>, RejectionReason> {
        match tokio::time::timeout(self.lock_timeout, self.inner.lock()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                warn!("Node busy for {:?}, giving up", self.lock_timeout);
                Err(RejectionReason::Timeout)
            }
        }
    }

    pub async fn submit_transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<TransferReceipt, RejectionReason> {
        let mut node = self.acquire().await?;
        node.submit_transfer(from, to, amount)
    }

    pub async fn register_account(
        &self,
        account_id: impl Into<AccountId>,
        initial_balance: u128,
    ) -> Result<AccountId, StateError> {
        self.inner
            .lock()
            .await
            .register_account(account_id, initial_balance)
    }

    pub async fn get_balance(&self, account_id: &AccountId) -> Result<u128, StateError> {
        self.inner.lock().await.get_balance(account_id)
    }

    pub async fn epoch(&self) -> u64 {
        self.inner.lock().await.epoch()
    }

    pub async fn list_blocks(&self, canonical: bool) -> Vec<BlockListing> {
        self.inner.lock().await.list_blocks(canonical)
    }

    pub async fn metrics_snapshot(&self, capacity_limit_bytes: u64) -> MetricsSnapshot {
        self.inner.lock().await.metrics_snapshot(capacity_limit_bytes)
    }

    /// Run `f` with exclusive access to the node
    pub async fn with_node<R>(&self, f: impl FnOnce(&mut Node) -> R) -> R {
        let mut node = self.inner.lock().await;
        f(&mut node)
    }
}
