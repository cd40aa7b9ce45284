//! Index response to submitted batch, through the real parsing and discovery path.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use market_automation_types::{Batch, TaskReceiptWrapper, TaskStatus};
use serde_json::json;

use crate::{
    abi::automation::IAutomationCore,
    batch::RemoveFundingRequest,
    index::parse_task_receipts,
    mock::{withdrawal_record, MockLedger, RecordingExecutor},
    AddressRegistry, DiscoveryKey, DiscoveryStatus, MarketContracts, NetworkConfig, Result, Session,
    TaskCodec, TaskDiscoveryClient, TaskIndex, TransactionBatchBuilder,
};

const PROXY: Address = Address::repeat_byte(0x99);
const MARKET: Address = Address::repeat_byte(0x0a);
const OTHER_MARKET: Address = Address::repeat_byte(0x0b);

/// Serves a fixed GraphQL response body.
struct FixtureIndex {
    body: String,
}

#[async_trait]
impl TaskIndex for FixtureIndex {
    async fn task_receipt_wrappers(&self, _proxy: Address) -> Result<Vec<TaskReceiptWrapper>> {
        parse_task_receipts(&self.body)
    }
}

fn fixture_body() -> String {
    let records = vec![
        serde_json::to_value(withdrawal_record(
            1,
            PROXY,
            MARKET,
            TaskStatus::Canceled,
            1_600_000_000,
            1_615_000_000,
        ))
        .unwrap(),
        json!({ "taskReceipt": { "id": "not a task" } }),
        serde_json::to_value(withdrawal_record(
            2,
            PROXY,
            OTHER_MARKET,
            TaskStatus::AwaitingExecution,
            1_600_000_500,
            1_615_000_000,
        ))
        .unwrap(),
        serde_json::to_value(withdrawal_record(
            3,
            PROXY,
            MARKET,
            TaskStatus::AwaitingExecution,
            1_600_001_000,
            1_615_248_000,
        ))
        .unwrap(),
    ];
    json!({ "data": { "taskReceiptWrappers": records } }).to_string()
}

#[tokio::test]
async fn test_index_records_drive_cancellation() {
    let ledger = Arc::new(MockLedger::with_automation_registry());
    let executor = Arc::new(RecordingExecutor::new());
    let discovery = Arc::new(TaskDiscoveryClient::new(
        Arc::new(FixtureIndex { body: fixture_body() }),
        NetworkConfig::for_chain(4),
    ));

    let snapshot = discovery
        .sync(Some(DiscoveryKey {
            proxy: PROXY,
            market: MARKET,
        }))
        .await;
    assert_eq!(snapshot.status, DiscoveryStatus::Ready);
    let shown = snapshot.task.unwrap();
    assert_eq!(shown.wrapper.task.id, U256::from(3u64));
    assert_eq!(shown.trigger_at, U256::from(1_615_248_000u64));

    let registry = Arc::new(AddressRegistry::new(ledger.clone(), Address::repeat_byte(0x51)));
    let builder = TransactionBatchBuilder::new(
        Session {
            account: Address::repeat_byte(0xa1),
            proxy: PROXY,
            chain_id: 4,
        },
        MarketContracts {
            conditional_tokens: Address::repeat_byte(0xc7),
            realitio: Address::repeat_byte(0x4e),
            oracle: Address::repeat_byte(0x0c),
            factory: Address::repeat_byte(0xfa),
            arbitrator: Address::repeat_byte(0xab),
        },
        ledger.clone(),
        executor.clone(),
        discovery,
        Arc::new(TaskCodec::new(registry, ledger)),
    );

    builder
        .remove_funding(&RemoveFundingRequest {
            market: MARKET,
            shares_to_burn: U256::from(10u64),
            amount_to_merge: U256::from(10u64),
            earnings: U256::ZERO,
            collateral: Address::repeat_byte(0xee),
            condition_id: B256::repeat_byte(0xcd),
            outcome_count: 2,
        })
        .await
        .unwrap();

    let submitted: Vec<Batch> = executor.submitted();
    let cancel = submitted[0].calls().last().unwrap();
    let call = IAutomationCore::cancelTaskCall::abi_decode(&cancel.payload, true).unwrap();
    assert_eq!(call._TR.id, U256::from(3u64));
    assert_eq!(call._TR.userProxy, PROXY);
}
