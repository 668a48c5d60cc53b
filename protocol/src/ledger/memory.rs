//! In-process ledger for tests and benches.
//!
//! Accepts every well-formed submission unless told otherwise, and records
//! what it saw. Failures are scripted: queue a rejection for the next
//! submit, fail the next gas quote, or slow submissions down to trip the
//! dispatcher's timeout.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LedgerClient, LedgerError};
use crate::transaction::SignedTransaction;

/// Chain id reported unless overridden (anvil's default).
pub const MEMORY_CHAIN_ID: u64 = 31_337;

/// How many times each [`LedgerClient`] method was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub estimate_gas_price: usize,
    pub submit: usize,
    pub current_nonce: usize,
    pub chain_id: usize,
    pub balance: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.estimate_gas_price + self.submit + self.current_nonce + self.chain_id + self.balance
    }
}

#[derive(Debug, Default)]
struct State {
    gas_price: U256,
    chain_id: u64,
    next_nonce: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    landed: HashSet<(Address, u64)>,
    submitted: Vec<SignedTransaction>,
    rejections: VecDeque<LedgerError>,
    gas_price_failures: VecDeque<LedgerError>,
    submit_delay: Option<Duration>,
    queued_delays: VecDeque<Duration>,
    calls: CallCounts,
}

/// A scriptable in-memory [`LedgerClient`].
#[derive(Debug)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// A ledger quoting 1 wei/gas on chain [`MEMORY_CHAIN_ID`], with
    /// unlimited balances.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                gas_price: U256::from(1u64),
                chain_id: MEMORY_CHAIN_ID,
                ..State::default()
            }),
        }
    }

    pub fn with_gas_price(self, gas_price: U256) -> Self {
        self.state.lock().gas_price = gas_price;
        self
    }

    pub fn with_chain_id(self, chain_id: u64) -> Self {
        self.state.lock().chain_id = chain_id;
        self
    }

    /// Sets the pending nonce the ledger reports for `address`.
    pub fn with_nonce(self, address: Address, nonce: u64) -> Self {
        self.set_nonce(address, nonce);
        self
    }

    /// Caps `address`'s balance. Submissions costing more than what is
    /// left are rejected with `insufficient funds`.
    pub fn with_balance(self, address: Address, balance: U256) -> Self {
        self.state.lock().balances.insert(address, balance);
        self
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.state.lock().next_nonce.insert(address, nonce);
    }

    /// Queues a rejection for the next submission. Queued rejections are
    /// consumed in order, one per submit.
    pub fn reject_next_submit(&self, err: LedgerError) {
        self.state.lock().rejections.push_back(err);
    }

    /// Fails the next gas price quote.
    pub fn fail_next_gas_price(&self, err: LedgerError) {
        self.state.lock().gas_price_failures.push_back(err);
    }

    /// Delays every submission by `delay` before it is processed.
    pub fn set_submit_delay(&self, delay: Option<Duration>) {
        self.state.lock().submit_delay = delay;
    }

    /// Delays only the next submission, ahead of any delay set with
    /// [`set_submit_delay`](Self::set_submit_delay). Queued delays are
    /// consumed in order, one per submit.
    pub fn delay_next_submit(&self, delay: Duration) {
        self.state.lock().queued_delays.push_back(delay);
    }

    /// Every transaction that reached `submit`, accepted or not, in arrival
    /// order.
    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.state.lock().submitted.clone()
    }

    pub fn calls(&self) -> CallCounts {
        self.state.lock().calls
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    async fn estimate_gas_price(&self) -> Result<U256, LedgerError> {
        let mut state = self.state.lock();
        state.calls.estimate_gas_price += 1;
        match state.gas_price_failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(state.gas_price),
        }
    }

    async fn submit(&self, tx: &SignedTransaction) -> Result<B256, LedgerError> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.submit += 1;
            state.submitted.push(tx.clone());
            state.queued_delays.pop_front().or(state.submit_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if let Some(err) = state.rejections.pop_front() {
            return Err(err);
        }

        let from = tx.from();
        let nonce = tx.intent().nonce();
        if !state.landed.insert((from, nonce)) {
            return Err(LedgerError::from_rpc(-32000, "nonce too low"));
        }

        if let Some(balance) = state.balances.get(&from).copied() {
            let cost = tx.intent().max_cost();
            if cost > balance {
                state.landed.remove(&(from, nonce));
                let message = format!(
                    "insufficient funds for gas * price + value: have {balance} want {cost}"
                );
                return Err(LedgerError::from_rpc(-32000, message));
            }
            state.balances.insert(from, balance - cost);
        }

        let next = state.next_nonce.entry(from).or_insert(0);
        *next = (*next).max(nonce + 1);
        Ok(tx.hash())
    }

    async fn current_nonce(&self, address: Address) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.calls.current_nonce += 1;
        Ok(state.next_nonce.get(&address).copied().unwrap_or(0))
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.calls.chain_id += 1;
        Ok(state.chain_id)
    }

    async fn balance(&self, address: Address) -> Result<U256, LedgerError> {
        let mut state = self.state.lock();
        state.calls.balance += 1;
        Ok(state.balances.get(&address).copied().unwrap_or(U256::MAX))
    }
}
