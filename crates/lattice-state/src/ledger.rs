use std::collections::BTreeMap;

use lattice_core::{AccountId, AccountState, Hash, ReceiveBlock, SendBlock};
use tracing::{debug, info};

use crate::error::StateError;

/// In-memory account state store.
///
/// `state_root` is the hash of the most recently committed block on any
/// account. It orders commits globally; it is not a Merkle commitment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    accounts: BTreeMap<AccountId, AccountState>,
    state_root: Hash,
}

impl Ledger {
    pub fn new() -> Self {
        Ledger {
            accounts: BTreeMap::new(),
            state_root: Hash::ZERO,
        }
    }

    /// Register a new account with an opening balance
    pub fn register_account(
        &mut self,
        account_id: AccountId,
        initial_balance: u128,
    ) -> Result<AccountId, StateError> {
        if self.accounts.contains_key(&account_id) {
            return Err(StateError::AlreadyExists(account_id));
        }
        self.accounts
            .insert(account_id.clone(), AccountState::new(initial_balance));
        info!("Registered account {} with balance {}", account_id, initial_balance);
        Ok(account_id)
    }

    pub fn get_balance(&self, account_id: &AccountId) -> Result<u128, StateError> {
        self.accounts
            .get(account_id)
            .map(|a| a.balance)
            .ok_or_else(|| StateError::UnknownAccount(account_id.clone()))
    }

    pub fn account(&self, account_id: &AccountId) -> Option<&AccountState> {
        self.accounts.get(account_id)
    }

    pub fn contains(&self, account_id: &AccountId) -> bool {
        self.accounts.contains_key(account_id)
    }

    /// Registered accounts in sorted order
    pub fn account_ids(&self) -> Vec<AccountId> {
        self.accounts.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn state_root(&self) -> Hash {
        self.state_root
    }

    pub fn set_state_root(&mut self, root: Hash) {
        self.state_root = root;
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> u128 {
        self.accounts
            .values()
            .fold(0u128, |acc, a| acc.saturating_add(a.balance))
    }

    /// Current state for an account, or a zero-value state whose head is
    /// `prev_head` if the account was never seen.
    fn current_or_bootstrap(&self, account_id: &AccountId, prev_head: Hash) -> AccountState {
        match self.accounts.get(account_id) {
            Some(state) => state.clone(),
            None => {
                debug!("Materializing unseen account {}", account_id);
                AccountState {
                    head: prev_head,
                    ..AccountState::new(0)
                }
            }
        }
    }

    fn check_head(
        account_id: &AccountId,
        state: &AccountState,
        prev_head: Hash,
    ) -> Result<(), StateError> {
        if state.head != prev_head {
            return Err(StateError::StaleHead {
                account: account_id.clone(),
                expected: state.head,
                got: prev_head,
            });
        }
        Ok(())
    }

    /// Debit the sender. Returns the account's new head.
    pub fn apply_send(&mut self, block: &SendBlock) -> Result<Hash, StateError> {
        let account_id = &block.header.account_id;
        let mut state = self.current_or_bootstrap(account_id, block.header.prev_head);

        Self::check_head(account_id, &state, block.header.prev_head)?;

        if state.balance < block.amount {
            return Err(StateError::InsufficientBalance {
                have: state.balance,
                need: block.amount,
            });
        }

        let head = block.hash();
        state.balance -= block.amount;
        state.head = head;
        state.nonce += 1;

        debug!(
            "Applied send {} on {} (nonce {}, balance {})",
            head.short(),
            account_id,
            state.nonce,
            state.balance
        );
        self.accounts.insert(account_id.clone(), state);
        Ok(head)
    }

    /// Credit the receiver with `amount`.
    ///
    /// The amount is taken on trust from the caller; it is not checked
    /// against the send block that `transfer_id` names.
    pub fn apply_receive(&mut self, block: &ReceiveBlock, amount: u128) -> Result<Hash, StateError> {
        let account_id = &block.header.account_id;
        let mut state = self.current_or_bootstrap(account_id, block.header.prev_head);

        Self::check_head(account_id, &state, block.header.prev_head)?;

        let balance = state
            .balance
            .checked_add(amount)
            .ok_or_else(|| StateError::BalanceOverflow(account_id.clone()))?;

        let head = block.hash();
        state.balance = balance;
        state.head = head;
        state.nonce += 1;

        debug!(
            "Applied receive {} on {} (nonce {}, balance {})",
            head.short(),
            account_id,
            state.nonce,
            state.balance
        );
        self.accounts.insert(account_id.clone(), state);
        Ok(head)
    }
}
