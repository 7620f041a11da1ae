//! Poll loop and lifecycle tests against an in-memory chain.
//!
//! These tests cover:
//! - Eligibility outcomes end to end
//! - Block retry budget and malformed events
//! - Confirmation depth
//! - Transfer resubmission and confirmation polling
//! - Checkpoint write failures and stops mid-block
//! - DropChain startup and shutdown

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use staking_drop_client::{
    ChainReader, CheckpointStore, DropChain, DropError, DropListener, DropResult, ListenerConfig,
    MemoryCheckpointStore, RetryConfig, TransferSubmitter, TxLookup,
};
use staking_drop_core::{
    Address, Amount, Attribute, Coin, CoreError, DropPolicies, DropPolicy, StringEvent, TxLog,
    EVENT_TYPE_BOND_EXECUTED,
};
use tokio_util::sync::CancellationToken;

const ADDR_A: &str = "stafi1qyqszqgpqyqszqgpqyqszqgpqyqszqgpfc35ey";
const ADDR_B: &str = "stafi1qgpqyqszqgpqyqszqgpqyqszqgpqyqszcuh3jj";
const SIGNER: &str = "stafi1qvpsxqcrqvpsxqcrqvpsxqcrqvpsxqcrevkscn";
const FOREIGN: &str = "cosmos1qurswpc8qurswpc8qurswpc8qurswpc8nn86qp";

// ============================================================================
// Mock chain
// ============================================================================

#[derive(Default)]
struct MockChain {
    tip: Mutex<i64>,
    tip_failures: AtomicU32,
    blocks: Mutex<HashMap<i64, Vec<TxLog>>>,
    block_queries: Mutex<HashMap<i64, u32>>,
    balances: Mutex<HashMap<String, Amount>>,
    balance_queries: AtomicU32,
    submit_errors: Mutex<HashMap<String, VecDeque<DropError>>>,
    submit_calls: AtomicU32,
    transfers: Mutex<Vec<(String, Vec<Coin>)>>,
    pending_lookups: AtomicU32,
    lookup_calls: AtomicU32,
    signer: Option<Address>,
}

impl MockChain {
    fn new(tip: i64) -> Arc<Self> {
        Arc::new(Self {
            tip: Mutex::new(tip),
            signer: Some(SIGNER.parse().unwrap()),
            ..Default::default()
        })
    }

    fn set_tip(&self, tip: i64) {
        *self.tip.lock().unwrap() = tip;
    }

    fn add_block(&self, height: i64, events: Vec<StringEvent>) {
        self.blocks
            .lock()
            .unwrap()
            .insert(height, vec![TxLog { msg_index: 0, events }]);
    }

    fn set_balance(&self, address: &str, amount: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), Amount::from(amount));
    }

    fn fail_submits(&self, recipient: &str, errors: Vec<DropError>) {
        self.submit_errors
            .lock()
            .unwrap()
            .insert(recipient.to_string(), errors.into());
    }

    fn block_queries(&self, height: i64) -> u32 {
        self.block_queries
            .lock()
            .unwrap()
            .get(&height)
            .copied()
            .unwrap_or(0)
    }

    fn transfers(&self) -> Vec<(String, Vec<Coin>)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn current_height(&self) -> DropResult<i64> {
        if self.tip_failures.load(Ordering::SeqCst) > 0 {
            self.tip_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(DropError::Rpc {
                status: 503,
                message: "node syncing".to_string(),
            });
        }
        Ok(*self.tip.lock().unwrap())
    }

    async fn block_tx_logs(&self, height: i64) -> DropResult<Vec<TxLog>> {
        *self.block_queries.lock().unwrap().entry(height).or_default() += 1;
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .unwrap_or_default())
    }

    async fn account_balance(&self, address: &Address, _denom: &str) -> DropResult<Amount> {
        self.balance_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(address.as_str())
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    async fn tx_by_hash(&self, hash: &str) -> DropResult<TxLookup> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        let height = if self.pending_lookups.load(Ordering::SeqCst) > 0 {
            self.pending_lookups.fetch_sub(1, Ordering::SeqCst);
            0
        } else {
            99
        };
        Ok(TxLookup {
            txhash: hash.to_string(),
            height,
            ..Default::default()
        })
    }
}

#[async_trait]
impl TransferSubmitter for MockChain {
    fn signer_address(&self) -> &Address {
        self.signer.as_ref().unwrap()
    }

    async fn submit_transfer(&self, recipient: &Address, coins: &[Coin]) -> DropResult<String> {
        let call = self.submit_calls.fetch_add(1, Ordering::SeqCst);

        let queued = self
            .submit_errors
            .lock()
            .unwrap()
            .get_mut(recipient.as_str())
            .and_then(VecDeque::pop_front);
        if let Some(err) = queued {
            return Err(err);
        }

        let mut balances = self.balances.lock().unwrap();
        let balance = balances.entry(recipient.to_string()).or_default();
        *balance = Amount::new(balance.as_u256() + coins[0].amount.as_u256());
        self.transfers
            .lock()
            .unwrap()
            .push((recipient.to_string(), coins.to_vec()));
        Ok(format!("TX{}", call))
    }
}

/// Store whose writes always fail.
#[derive(Default)]
struct FailingCheckpointStore {
    writes: AtomicU32,
}

#[async_trait]
impl CheckpointStore for FailingCheckpointStore {
    async fn load(&self) -> DropResult<Option<u64>> {
        Ok(None)
    }

    async fn store(&self, _height: u64) -> DropResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(DropError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only blockstore",
        )))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn bond(denom: &str, bonder: &str, amount: &str) -> StringEvent {
    StringEvent::new(
        EVENT_TYPE_BOND_EXECUTED,
        vec![
            Attribute::new("denom", denom),
            Attribute::new("bonder", bonder),
            Attribute::new("pool", "cosmos1pool"),
            Attribute::new("txhash", "BOND"),
            Attribute::new("balance", amount),
            Attribute::new("exchange_amount", amount),
        ],
    )
}

fn policies() -> DropPolicies {
    let mut map = std::collections::BTreeMap::new();
    map.insert(
        "uatom".to_string(),
        DropPolicy::new(Amount::from(100), Amount::from(5)),
    );
    DropPolicies::new(map).unwrap()
}

fn fast_config(retry_limit: u32) -> ListenerConfig {
    ListenerConfig::default().retry(RetryConfig::new(retry_limit, 1))
}

fn listener(
    chain: &Arc<MockChain>,
    store: &Arc<MemoryCheckpointStore>,
    config: ListenerConfig,
    cancel: &CancellationToken,
) -> Arc<DropListener> {
    Arc::new(DropListener::new(
        chain.clone(),
        chain.clone(),
        store.clone(),
        Arc::new(policies()),
        config,
        cancel.clone(),
    ))
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Run the listener from `start` until the checkpoint reaches `until`.
async fn run_until(
    chain: &Arc<MockChain>,
    store: &Arc<MemoryCheckpointStore>,
    config: ListenerConfig,
    start: u64,
    until: u64,
) {
    let cancel = CancellationToken::new();
    let listener = listener(chain, store, config, &cancel);
    let task = tokio::spawn(async move { listener.poll_blocks(start).await });

    wait_until(|| store.latest().is_some_and(|h| h >= until)).await;
    cancel.cancel();
    task.await.unwrap().unwrap();
}

fn assert_monotonic(history: &[u64]) {
    assert!(history.windows(2).all(|w| w[0] < w[1]), "{:?}", history);
}

// ============================================================================
// Eligibility end to end
// ============================================================================

#[tokio::test]
async fn test_eligible_bond_gets_one_drop() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 12).await;

    assert_eq!(
        chain.transfers(),
        vec![(
            ADDR_A.to_string(),
            vec![Coin::new("ufis", Amount::from(5))]
        )]
    );
    let history = store.history();
    assert_eq!(&history[..3], &[10, 11, 12]);
    assert_monotonic(&history);
}

#[tokio::test]
async fn test_bond_below_threshold_is_skipped() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "50")]);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert!(chain.transfers().is_empty());
    assert_eq!(chain.balance_queries.load(Ordering::SeqCst), 0);
    assert_eq!(store.history()[0], 10);
}

#[tokio::test]
async fn test_unsupported_denom_is_skipped() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uosmo", ADDR_A, "1000000")]);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert!(chain.transfers().is_empty());
    assert_eq!(chain.balance_queries.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_existing_reward_balance_is_skipped() {
    let chain = MockChain::new(20);
    chain.set_balance(ADDR_A, 1);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert!(chain.transfers().is_empty());
    assert_eq!(chain.balance_queries.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_same_bonder_twice_in_block_gets_one_drop() {
    let chain = MockChain::new(20);
    chain.add_block(
        10,
        vec![bond("uatom", ADDR_A, "150"), bond("uatom", ADDR_A, "300")],
    );
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert_eq!(chain.transfers().len(), 1);
}

// ============================================================================
// Block retries
// ============================================================================

#[tokio::test]
async fn test_malformed_event_exhausts_block_budget() {
    let chain = MockChain::new(20);
    let mut event = bond("uatom", ADDR_A, "150");
    event.attributes.pop();
    chain.add_block(10, vec![event]);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let result = listener(&chain, &store, fast_config(3), &cancel)
        .poll_blocks(10)
        .await;

    match result {
        Err(DropError::BlockRetriesExhausted {
            height, attempts, ..
        }) => {
            assert_eq!(height, 10);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(chain.block_queries(10), 3);
    assert!(store.history().is_empty());
}

#[tokio::test]
async fn test_malformed_event_escalates_immediately() {
    let chain = MockChain::new(20);
    let mut event = bond("uatom", ADDR_A, "150");
    event.attributes.pop();
    chain.add_block(10, vec![event]);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let config = fast_config(3).escalate_structural_errors(true);
    let result = listener(&chain, &store, config, &cancel)
        .poll_blocks(10)
        .await;

    assert!(matches!(
        result,
        Err(DropError::MalformedEvent { height: 10, .. })
    ));
    assert_eq!(chain.block_queries(10), 1);
    assert!(store.history().is_empty());
}

#[tokio::test]
async fn test_tip_failures_exhaust_budget() {
    let chain = MockChain::new(20);
    chain.tip_failures.store(100, Ordering::SeqCst);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let result = listener(&chain, &store, fast_config(4), &cancel)
        .poll_blocks(10)
        .await;

    assert!(matches!(
        result,
        Err(DropError::BlockRetriesExhausted { attempts: 4, .. })
    ));
    assert_eq!(chain.tip_failures.load(Ordering::SeqCst), 96);
}

#[tokio::test]
async fn test_transient_tip_failure_recovers() {
    let chain = MockChain::new(20);
    chain.tip_failures.store(2, Ordering::SeqCst);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(3), 10, 11).await;

    assert_eq!(&store.history()[..2], &[10, 11]);
}

#[tokio::test]
async fn test_partial_block_retry_pays_each_bonder_once() {
    let chain = MockChain::new(20);
    chain.add_block(
        10,
        vec![bond("uatom", ADDR_A, "150"), bond("uatom", ADDR_B, "150")],
    );
    chain.fail_submits(ADDR_B, vec![DropError::broadcast(Some(5), "insufficient funds")]);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    let recipients: Vec<_> = chain.transfers().into_iter().map(|(r, _)| r).collect();
    assert_eq!(recipients, vec![ADDR_A.to_string(), ADDR_B.to_string()]);
    assert_eq!(chain.block_queries(10), 2);
}

// ============================================================================
// Confirmation depth
// ============================================================================

#[tokio::test]
async fn test_waits_for_confirmation_depth() {
    let chain = MockChain::new(12);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();
    let listener = listener(&chain, &store, fast_config(2), &cancel);
    let task = tokio::spawn(async move { listener.poll_blocks(10).await });

    // 10 + 3 > 12: the wait must not consume the retry budget
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(store.history().is_empty());
    assert_eq!(chain.block_queries(10), 0);
    assert!(!task.is_finished());

    chain.set_tip(13);
    wait_until(|| store.latest() == Some(10)).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.history(), vec![10]);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_sequence_mismatch_is_resubmitted() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    chain.fail_submits(
        ADDR_A,
        vec![
            DropError::broadcast(Some(32), "account sequence mismatch: incorrect account sequence"),
            DropError::broadcast(Some(32), "Incorrect Account Sequence"),
        ],
    );
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 3);
    assert_eq!(chain.transfers().len(), 1);
    // Resubmission happens inside the block, not by retrying it
    assert_eq!(chain.block_queries(10), 1);
}

#[tokio::test]
async fn test_other_broadcast_errors_fail_the_block() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    chain.fail_submits(
        ADDR_A,
        vec![
            DropError::broadcast(Some(5), "insufficient funds"),
            DropError::broadcast(Some(5), "insufficient funds"),
        ],
    );
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let result = listener(&chain, &store, fast_config(2), &cancel)
        .poll_blocks(10)
        .await;

    assert!(matches!(
        result,
        Err(DropError::BlockRetriesExhausted { height: 10, .. })
    ));
    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 2);
    assert!(chain.transfers().is_empty());
    assert!(store.history().is_empty());
}

#[tokio::test]
async fn test_confirmation_is_polled_until_included() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    chain.pending_lookups.store(3, Ordering::SeqCst);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert_eq!(chain.lookup_calls.load(Ordering::SeqCst), 4);
    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unconfirmed_transfer_fails_the_block() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    chain.pending_lookups.store(u32::MAX, Ordering::SeqCst);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let config = fast_config(5).confirm_retry(RetryConfig::new(3, 1));
    let result = listener(&chain, &store, config, &cancel)
        .process_block(10)
        .await;

    match result {
        Err(DropError::ConfirmRetriesExhausted {
            tx_hash,
            attempts,
            last_error,
        }) => {
            assert_eq!(tx_hash, "TX0");
            assert_eq!(attempts, 3);
            assert!(last_error.contains("not yet confirmed"), "{}", last_error);
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(chain.lookup_calls.load(Ordering::SeqCst), 3);
    assert!(store.history().is_empty());
}

#[tokio::test]
async fn test_block_retry_after_unconfirmed_transfer_does_not_pay_twice() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    // First block attempt runs out of lookups; the transfer lands anyway
    chain.pending_lookups.store(2, Ordering::SeqCst);
    let store = Arc::new(MemoryCheckpointStore::new());

    let config = fast_config(5).confirm_retry(RetryConfig::new(2, 1));
    run_until(&chain, &store, config, 10, 10).await;

    assert_eq!(chain.block_queries(10), 2);
    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 1);
    assert_eq!(chain.transfers().len(), 1);
}

#[tokio::test]
async fn test_sequence_mismatch_budget_exhausted() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    let mismatches = (0..10)
        .map(|_| DropError::broadcast(Some(32), "incorrect account sequence"))
        .collect();
    chain.fail_submits(ADDR_A, mismatches);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let config = fast_config(5).submit_retry(RetryConfig::new(3, 1));
    let result = listener(&chain, &store, config, &cancel)
        .process_block(10)
        .await;

    match result {
        Err(DropError::SubmitRetriesExhausted {
            recipient,
            attempts,
            last_error,
        }) => {
            assert_eq!(recipient, ADDR_A);
            assert_eq!(attempts, 3);
            assert!(last_error.contains("incorrect account sequence"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 3);
    assert!(chain.transfers().is_empty());
}

#[tokio::test]
async fn test_signer_timeout_retries_the_block() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    chain.fail_submits(
        ADDR_A,
        vec![DropError::CommandTimeout {
            command: "stafihubd tx".to_string(),
            timeout_ms: 60_000,
        }],
    );
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(5), 10, 10).await;

    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 2);
    assert_eq!(chain.block_queries(10), 2);
    assert_eq!(chain.transfers().len(), 1);
}

#[tokio::test]
async fn test_foreign_bonder_prefix_is_malformed() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", FOREIGN, "150")]);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let config = fast_config(3).escalate_structural_errors(true);
    let result = listener(&chain, &store, config, &cancel)
        .poll_blocks(10)
        .await;

    match result {
        Err(DropError::MalformedEvent {
            height: 10,
            source: CoreError::InvalidAddress { address, .. },
        }) => assert_eq!(address, FOREIGN),
        other => panic!("unexpected result: {:?}", other),
    }
    assert_eq!(chain.balance_queries.load(Ordering::SeqCst), 0);
    assert!(chain.transfers().is_empty());
}

#[tokio::test]
async fn test_account_prefix_is_configurable() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", FOREIGN, "150")]);
    let store = Arc::new(MemoryCheckpointStore::new());

    run_until(&chain, &store, fast_config(3).account_prefix("cosmos"), 10, 10).await;

    assert_eq!(chain.transfers()[0].0, FOREIGN);
}

// ============================================================================
// Checkpointing
// ============================================================================

#[tokio::test]
async fn test_checkpoint_write_failure_does_not_stop_polling() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    let store = Arc::new(FailingCheckpointStore::default());
    let cancel = CancellationToken::new();
    let listener = DropListener::new(
        chain.clone(),
        chain.clone(),
        store.clone(),
        Arc::new(policies()),
        fast_config(2),
        cancel.clone(),
    );
    let task = tokio::spawn(async move { listener.poll_blocks(10).await });

    wait_until(|| chain.block_queries(12) > 0).await;
    cancel.cancel();
    task.await.unwrap().unwrap();

    assert!(store.writes.load(Ordering::SeqCst) >= 2);
    assert_eq!(chain.block_queries(10), 1);
    assert_eq!(chain.transfers().len(), 1);
}

#[tokio::test]
async fn test_stop_mid_block_leaves_checkpoint() {
    let chain = MockChain::new(20);
    chain.add_block(10, vec![bond("uatom", ADDR_A, "150")]);
    chain.pending_lookups.store(u32::MAX, Ordering::SeqCst);
    let store = Arc::new(MemoryCheckpointStore::new());
    let cancel = CancellationToken::new();

    let config = fast_config(5).confirm_retry(RetryConfig::new(50, 60_000));
    let listener = listener(&chain, &store, config, &cancel);
    let task = tokio::spawn(async move { listener.poll_blocks(10).await });

    wait_until(|| chain.lookup_calls.load(Ordering::SeqCst) >= 1).await;
    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("listener did not stop");

    assert!(result.unwrap().is_ok());
    assert!(store.history().is_empty());
    assert_eq!(chain.submit_calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

fn drop_chain(chain: &Arc<MockChain>, store: Arc<MemoryCheckpointStore>, start: u64) -> DropChain {
    DropChain::new(
        chain.clone(),
        chain.clone(),
        store,
        policies(),
        fast_config(2),
        start,
    )
}

#[tokio::test]
async fn test_start_requires_initialize() {
    let chain = MockChain::new(20);
    let mut service = drop_chain(&chain, Arc::new(MemoryCheckpointStore::new()), 10);

    assert!(matches!(service.start().await, Err(DropError::NotInitialized)));
}

#[tokio::test]
async fn test_start_beyond_tip_fails() {
    let chain = MockChain::new(20);
    let mut service = drop_chain(&chain, Arc::new(MemoryCheckpointStore::new()), 50);

    assert_eq!(service.initialize().await.unwrap(), 50);
    assert!(matches!(
        service.start().await,
        Err(DropError::StartBeyondTip {
            start: 50,
            latest: 20
        })
    ));
    assert!(!service.is_running());
}

#[tokio::test]
async fn test_initialize_resumes_after_checkpoint() {
    let chain = MockChain::new(40);
    let store = Arc::new(MemoryCheckpointStore::with_height(15));
    let mut service = drop_chain(&chain, store.clone(), 10);

    assert_eq!(service.initialize().await.unwrap(), 16);
    let _fatal = service.start().await.unwrap();
    wait_until(|| store.latest().is_some_and(|h| h >= 17)).await;
    service.stop();
    service.join().await.unwrap();

    let history = store.history();
    assert_eq!(&history[..3], &[15, 16, 17]);
    assert_monotonic(&history);
    assert_eq!(chain.block_queries(15), 0);
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let chain = MockChain::new(12);
    let mut service = drop_chain(&chain, Arc::new(MemoryCheckpointStore::new()), 10);
    service.initialize().await.unwrap();
    let fatal = service.start().await.unwrap();
    assert!(matches!(service.start().await, Err(DropError::AlreadyStarted)));

    service.stop();
    service.stop();
    tokio::time::timeout(Duration::from_secs(2), service.join())
        .await
        .unwrap()
        .unwrap();
    service.stop();

    // A requested stop closes the fatal channel without an error
    assert!(fatal.await.is_err());
}

#[tokio::test]
async fn test_fatal_error_reaches_supervisor() {
    let chain = MockChain::new(20);
    let store = Arc::new(MemoryCheckpointStore::new());
    let mut service = drop_chain(&chain, store.clone(), 10);
    service.initialize().await.unwrap();

    let mut event = bond("uatom", ADDR_A, "150");
    event.attributes.truncate(5);
    chain.add_block(10, vec![event]);

    let fatal = service.start().await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(2), fatal)
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(
        err,
        DropError::BlockRetriesExhausted { height: 10, .. }
    ));
    service.join().await.unwrap();
    assert!(store.history().is_empty());
}
