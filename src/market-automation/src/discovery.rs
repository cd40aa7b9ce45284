//! Discovery of the authoritative scheduled task for a (proxy, market) pair.
//!
//! The index lists every task a proxy ever submitted. Discovery keeps the ones whose withdraw
//! action targets the market and picks the newest: greatest submission date, index position
//! as tie-break. Records whose action does not decode are dropped, not fatal.
//!
//! `TaskDiscoveryClient` also holds a snapshot for display, re-run only when the
//! (proxy, market) key changes. Batch construction never reads that snapshot; it goes through
//! `TaskLookup`, which always queries afresh and leaves the snapshot alone.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use market_automation_types::{TaskReceiptWrapper, TaskStatus, WithdrawParams};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::{
    sync::{watch, RwLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    codec::TaskCodec,
    errors::{AutomationError, Result},
    index::TaskIndex,
    networks::NetworkConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DiscoveryKey {
    pub proxy: Address,
    pub market: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DiscoveryStatus {
    /// No proxy known yet; nothing fetched.
    Idle,
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredTask {
    pub wrapper: TaskReceiptWrapper,
    pub withdraw: WithdrawParams,
    /// Trigger instant in epoch seconds.
    pub trigger_at: U256,
    /// Set once the task executed successfully.
    pub explorer_link: Option<String>,
}

impl DiscoveredTask {
    pub fn status(&self) -> TaskStatus {
        self.wrapper.status
    }

    pub fn is_active(&self) -> bool {
        self.wrapper.is_active()
    }

    pub fn trigger_datetime(&self) -> Option<OffsetDateTime> {
        let seconds = i64::try_from(self.trigger_at).ok()?;
        OffsetDateTime::from_unix_timestamp(seconds).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoverySnapshot {
    pub key: Option<DiscoveryKey>,
    pub status: DiscoveryStatus,
    pub task: Option<DiscoveredTask>,
}

impl DiscoverySnapshot {
    fn idle() -> Self {
        Self {
            key: None,
            status: DiscoveryStatus::Idle,
            task: None,
        }
    }
}

/// Fresh read of the authoritative task; what batch construction consults.
///
/// Only the withdraw action has to decode: a cancel needs the receipt, not the trigger.
#[async_trait]
pub trait TaskLookup: Send + Sync {
    async fn current_task(
        &self,
        proxy: Address,
        market: Address,
    ) -> Result<Option<TaskReceiptWrapper>>;
}

/// Newest wrapper whose withdraw action targets `market`, with its decoded parameters.
pub fn select_market_task(
    wrappers: Vec<TaskReceiptWrapper>,
    market: Address,
) -> Option<(TaskReceiptWrapper, WithdrawParams)> {
    wrappers
        .into_iter()
        .enumerate()
        .filter_map(|(position, wrapper)| {
            let Some(action) = wrapper.task.actions().first() else {
                warn!(position, task = %wrapper.task.id, "dropping task without actions");
                return None;
            };
            match TaskCodec::decode_withdraw_params(&action.data) {
                Ok(params) if params.market == market => Some((position, wrapper, params)),
                Ok(_) => None,
                Err(e) => {
                    warn!(
                        position,
                        task = %wrapper.task.id,
                        error = %e,
                        "dropping undecodable task"
                    );
                    None
                }
            }
        })
        .max_by_key(|(position, wrapper, _)| (wrapper.submission_date, *position))
        .map(|(_, wrapper, params)| (wrapper, params))
}

pub struct TaskDiscoveryClient {
    index: Arc<dyn TaskIndex>,
    network: NetworkConfig,
    state: RwLock<DiscoverySnapshot>,
}

impl TaskDiscoveryClient {
    pub fn new(index: Arc<dyn TaskIndex>, network: NetworkConfig) -> Self {
        Self {
            index,
            network,
            state: RwLock::new(DiscoverySnapshot::idle()),
        }
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Query the index and derive the authoritative task for `key`. Stateless.
    pub async fn discover(&self, key: DiscoveryKey) -> Result<Option<DiscoveredTask>> {
        let wrappers = self.index.task_receipt_wrappers(key.proxy).await?;
        let total = wrappers.len();
        let Some((wrapper, withdraw)) = select_market_task(wrappers, key.market) else {
            debug!(proxy = %key.proxy, market = %key.market, total, "no task for market");
            return Ok(None);
        };

        let condition = wrapper
            .task
            .conditions()
            .first()
            .ok_or_else(|| AutomationError::decode("time condition", "task has no conditions"))?;
        let trigger_at = TaskCodec::decode_trigger_timestamp(&condition.data)?;

        let explorer_link = match (wrapper.status, wrapper.execution_hash) {
            (TaskStatus::ExecutionSucceeded, Some(hash)) => Some(self.network.tx_link(hash)),
            _ => None,
        };

        debug!(
            proxy = %key.proxy,
            market = %key.market,
            task = %wrapper.task.id,
            status = ?wrapper.status,
            "selected task"
        );
        Ok(Some(DiscoveredTask {
            wrapper,
            withdraw,
            trigger_at,
            explorer_link,
        }))
    }

    pub async fn snapshot(&self) -> DiscoverySnapshot {
        self.state.read().await.clone()
    }

    /// Point the client at `key`, re-running discovery only if the key changed.
    ///
    /// `None` (no proxy known yet) clears the snapshot to `Idle` without fetching.
    pub async fn sync(&self, key: Option<DiscoveryKey>) -> DiscoverySnapshot {
        {
            let state = self.state.read().await;
            if state.key == key {
                return state.clone();
            }
        }
        match key {
            None => {
                let mut state = self.state.write().await;
                *state = DiscoverySnapshot::idle();
                state.clone()
            }
            Some(key) => self.run(key).await,
        }
    }

    /// Re-run discovery for the current key regardless of whether it changed.
    pub async fn reload(&self) -> DiscoverySnapshot {
        let key = self.state.read().await.key;
        match key {
            Some(key) => self.run(key).await,
            None => self.snapshot().await,
        }
    }

    /// Drive `sync` from a key channel until the sender is dropped.
    pub fn spawn_watch(
        self: &Arc<Self>,
        mut keys: watch::Receiver<Option<DiscoveryKey>>,
    ) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let key = *keys.borrow_and_update();
                client.sync(key).await;
                if keys.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    async fn run(&self, key: DiscoveryKey) -> DiscoverySnapshot {
        {
            let mut state = self.state.write().await;
            *state = DiscoverySnapshot {
                key: Some(key),
                status: DiscoveryStatus::Loading,
                task: None,
            };
        }

        let outcome = self.discover(key).await;
        self.apply(key, outcome).await
    }

    /// Store an outcome unless the key moved on while it was in flight.
    async fn apply(
        &self,
        key: DiscoveryKey,
        outcome: Result<Option<DiscoveredTask>>,
    ) -> DiscoverySnapshot {
        let mut state = self.state.write().await;
        if state.key != Some(key) {
            return state.clone();
        }
        match outcome {
            Ok(task) => {
                state.status = DiscoveryStatus::Ready;
                state.task = task;
            }
            Err(e) => {
                warn!(
                    proxy = %key.proxy,
                    market = %key.market,
                    error = %e,
                    "task discovery failed"
                );
                state.status = DiscoveryStatus::Error(e.to_string());
                state.task = None;
            }
        }
        state.clone()
    }
}

#[async_trait]
impl TaskLookup for TaskDiscoveryClient {
    async fn current_task(
        &self,
        proxy: Address,
        market: Address,
    ) -> Result<Option<TaskReceiptWrapper>> {
        let wrappers = self.index.task_receipt_wrappers(proxy).await?;
        let current = select_market_task(wrappers, market).map(|(wrapper, _)| wrapper);
        info!(
            %proxy,
            %market,
            active = current.as_ref().is_some_and(TaskReceiptWrapper::is_active),
            "refreshed task state"
        );
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::Bytes;

    use super::*;
    use crate::mock::{record_with_action, withdrawal_record, StaticIndex};

    const PROXY: Address = Address::repeat_byte(0x99);
    const M1: Address = Address::repeat_byte(0x01);
    const M2: Address = Address::repeat_byte(0x02);

    fn client(index: &Arc<StaticIndex>) -> TaskDiscoveryClient {
        TaskDiscoveryClient::new(index.clone(), NetworkConfig::for_chain(1))
    }

    fn key(market: Address) -> DiscoveryKey {
        DiscoveryKey { proxy: PROXY, market }
    }

    #[tokio::test]
    async fn test_last_submitted_task_for_market_wins() {
        let index = Arc::new(StaticIndex::new(vec![
            withdrawal_record(1, PROXY, M1, TaskStatus::Canceled, 100, 1_000),
            withdrawal_record(2, PROXY, M1, TaskStatus::Canceled, 200, 2_000),
            withdrawal_record(3, PROXY, M2, TaskStatus::AwaitingExecution, 250, 9_000),
            withdrawal_record(4, PROXY, M1, TaskStatus::AwaitingExecution, 300, 3_000),
        ]));
        let client = client(&index);

        let task = client.discover(key(M1)).await.unwrap().unwrap();
        assert_eq!(task.wrapper.task.id, U256::from(4u64));
        assert_eq!(task.withdraw.market, M1);
        assert_eq!(task.trigger_at, U256::from(3_000u64));
        assert!(task.is_active());
        assert_eq!(task.explorer_link, None);

        let other = client.discover(key(M2)).await.unwrap().unwrap();
        assert_eq!(other.wrapper.task.id, U256::from(3u64));
    }

    #[tokio::test]
    async fn test_submission_date_outranks_index_order() {
        let index = Arc::new(StaticIndex::new(vec![
            withdrawal_record(1, PROXY, M1, TaskStatus::AwaitingExecution, 500, 1_000),
            withdrawal_record(2, PROXY, M1, TaskStatus::Canceled, 100, 1_000),
        ]));
        let task = client(&index).discover(key(M1)).await.unwrap().unwrap();
        assert_eq!(task.wrapper.task.id, U256::from(1u64));
    }

    #[tokio::test]
    async fn test_no_task_for_market() {
        let index = Arc::new(StaticIndex::new(vec![withdrawal_record(
            1,
            PROXY,
            M2,
            TaskStatus::AwaitingExecution,
            100,
            1_000,
        )]));
        assert_eq!(client(&index).discover(key(M1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_record_is_skipped() {
        let index = Arc::new(StaticIndex::new(vec![
            withdrawal_record(1, PROXY, M1, TaskStatus::AwaitingExecution, 100, 1_000),
            record_with_action(
                2,
                PROXY,
                TaskStatus::AwaitingExecution,
                900,
                1_000,
                Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef, 0x00]),
            ),
        ]));
        let task = client(&index).discover(key(M1)).await.unwrap().unwrap();
        assert_eq!(task.wrapper.task.id, U256::from(1u64));
    }

    #[tokio::test]
    async fn test_explorer_link_only_for_successful_execution() {
        let index = Arc::new(StaticIndex::new(vec![withdrawal_record(
            1,
            PROXY,
            M1,
            TaskStatus::ExecutionSucceeded,
            100,
            1_000,
        )]));
        let task = client(&index).discover(key(M1)).await.unwrap().unwrap();
        assert_eq!(
            task.explorer_link.as_deref(),
            Some(format!("https://etherscan.io/tx/0x{}", "e5".repeat(32)).as_str())
        );
        assert!(!task.is_active());
    }

    #[tokio::test]
    async fn test_sync_refetches_only_on_key_change() {
        let index = Arc::new(StaticIndex::new(vec![withdrawal_record(
            1,
            PROXY,
            M1,
            TaskStatus::AwaitingExecution,
            100,
            1_000,
        )]));
        let client = client(&index);

        let idle = client.sync(None).await;
        assert_eq!(idle.status, DiscoveryStatus::Idle);
        assert_eq!(index.queries(), 0);

        let ready = client.sync(Some(key(M1))).await;
        assert_eq!(ready.status, DiscoveryStatus::Ready);
        assert!(ready.task.is_some());
        assert_eq!(index.queries(), 1);

        client.sync(Some(key(M1))).await;
        assert_eq!(index.queries(), 1);

        let empty = client.sync(Some(key(M2))).await;
        assert_eq!(empty.status, DiscoveryStatus::Ready);
        assert_eq!(empty.task, None);
        assert_eq!(index.queries(), 2);

        client.reload().await;
        assert_eq!(index.queries(), 3);
    }

    #[tokio::test]
    async fn test_index_failure_surfaces_as_error_state() {
        let index = Arc::new(StaticIndex::failing("subgraph down"));
        let client = client(&index);

        let snapshot = client.sync(Some(key(M1))).await;
        assert!(matches!(
            snapshot.status,
            DiscoveryStatus::Error(ref reason) if reason.contains("subgraph down")
        ));
        assert_eq!(snapshot.task, None);
        assert!(client.current_task(PROXY, M1).await.is_err());
    }

    #[tokio::test]
    async fn test_current_task_is_fresh() {
        let index = Arc::new(StaticIndex::new(vec![withdrawal_record(
            1,
            PROXY,
            M1,
            TaskStatus::AwaitingExecution,
            100,
            1_000,
        )]));
        let client = client(&index);
        client.sync(Some(key(M1))).await;

        index.set_records(vec![withdrawal_record(1, PROXY, M1, TaskStatus::Canceled, 100, 1_000)]);
        let current = client.current_task(PROXY, M1).await.unwrap().unwrap();
        assert_eq!(current.status, TaskStatus::Canceled);
        assert_eq!(index.queries(), 2);

        let snapshot = client.snapshot().await;
        assert_eq!(snapshot.task.unwrap().status(), TaskStatus::AwaitingExecution);
    }

    #[tokio::test]
    async fn test_current_task_ignores_unreadable_trigger() {
        let mut record = withdrawal_record(1, PROXY, M1, TaskStatus::AwaitingExecution, 100, 1_000);
        record.task.tasks[0].conditions[0].data = Bytes::from_static(&[0x01, 0x02]);
        let index = Arc::new(StaticIndex::new(vec![record]));
        let client = client(&index);

        let snapshot = client.sync(Some(key(M1))).await;
        assert!(matches!(snapshot.status, DiscoveryStatus::Error(_)));

        let current = client.current_task(PROXY, M1).await.unwrap().unwrap();
        assert_eq!(current.task.id, U256::from(1u64));
        assert!(current.is_active());
    }

    #[tokio::test]
    async fn test_watch_follows_key_channel() {
        let index = Arc::new(StaticIndex::new(vec![withdrawal_record(
            1,
            PROXY,
            M1,
            TaskStatus::AwaitingExecution,
            100,
            1_000,
        )]));
        let client = Arc::new(client(&index));
        let (tx, rx) = watch::channel(None);
        let handle = client.spawn_watch(rx);

        tx.send(Some(key(M1))).unwrap();
        let mut snapshot = client.snapshot().await;
        for _ in 0..100 {
            if snapshot.status == DiscoveryStatus::Ready {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            snapshot = client.snapshot().await;
        }
        assert_eq!(snapshot.key, Some(key(M1)));
        assert_eq!(snapshot.status, DiscoveryStatus::Ready);

        drop(tx);
        handle.await.unwrap();
    }
}
