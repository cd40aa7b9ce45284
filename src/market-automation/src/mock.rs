//! In-memory collaborators for tests. Enabled outside this crate by the `test-utils` feature.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use alloy_primitives::{address, keccak256, Address, Bytes, B256, U256};
use async_trait::async_trait;
use market_automation_types::{
    Action, Batch, CallKind, Condition, DataFlow, Provider, ScheduledTask, Task, TaskReceiptWrapper,
    TaskStatus, WithdrawParams,
};

use crate::{
    codec::TaskCodec,
    errors::{AutomationError, Result},
    index::TaskIndex,
    ledger::{BatchExecutor, LedgerReader, MarketDeployment, TxReceipt},
    registry::ContractName,
};

#[derive(Default)]
struct LedgerState {
    registry: HashMap<String, Address>,
    allowances: HashMap<(Address, Address, Address), U256>,
    operator_approvals: HashSet<(Address, Address, Address)>,
    outcome_slots: HashMap<B256, U256>,
    payout_denominators: HashMap<B256, U256>,
    modules: HashMap<Address, Vec<Address>>,
    collateral: HashMap<Address, Address>,
    market_conditions: HashMap<Address, B256>,
    question_id: Option<B256>,
    predicted_market: Option<Address>,
    failing: HashSet<&'static str>,
}

/// Scripted ledger. Unset allowances and slot counts read as zero, unset approvals as false.
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    registry_lookups: AtomicUsize,
}

impl MockLedger {
    pub const CORE: Address = address!("00000000000000000000000000000000000000c0");
    pub const PROVIDER: Address = address!("00000000000000000000000000000000000000c1");
    pub const PROVIDER_MODULE: Address = address!("00000000000000000000000000000000000000c2");
    pub const TIME_CONDITION: Address = address!("00000000000000000000000000000000000000c3");
    pub const WITHDRAW_ACTION: Address = address!("00000000000000000000000000000000000000c4");
    pub const EXECUTOR: Address = address!("00000000000000000000000000000000000000c5");

    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with every automation contract.
    pub fn with_automation_registry() -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.lock();
            for (name, address) in [
                (ContractName::Core, Self::CORE),
                (ContractName::Provider, Self::PROVIDER),
                (ContractName::ProviderModule, Self::PROVIDER_MODULE),
                (ContractName::TimeCondition, Self::TIME_CONDITION),
                (ContractName::WithdrawAction, Self::WITHDRAW_ACTION),
                (ContractName::Executor, Self::EXECUTOR),
            ] {
                state.registry.insert(name.key().to_string(), address);
            }
        }
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, read: &'static str) -> Result<()> {
        if self.lock().failing.contains(read) {
            return Err(AutomationError::LedgerRead(format!("{read}: scripted failure")));
        }
        Ok(())
    }

    pub fn registry_lookups(&self) -> usize {
        self.registry_lookups.load(Ordering::SeqCst)
    }

    pub fn remove_registry_entry(&self, key: &str) {
        self.lock().registry.remove(key);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.lock().allowances.insert((token, owner, spender), amount);
    }

    pub fn approve_operator(&self, conditional_tokens: Address, owner: Address, operator: Address) {
        self.lock()
            .operator_approvals
            .insert((conditional_tokens, owner, operator));
    }

    pub fn set_outcome_slots(&self, condition_id: B256, count: u64) {
        self.lock().outcome_slots.insert(condition_id, U256::from(count));
    }

    pub fn set_resolved(&self, condition_id: B256) {
        self.lock()
            .payout_denominators
            .insert(condition_id, U256::from(1u64));
    }

    pub fn set_modules(&self, proxy: Address, modules: Vec<Address>) {
        self.lock().modules.insert(proxy, modules);
    }

    pub fn set_market(&self, market: Address, collateral: Address, condition_id: B256) {
        let mut state = self.lock();
        state.collateral.insert(market, collateral);
        state.market_conditions.insert(market, condition_id);
    }

    pub fn set_question_id(&self, id: B256) {
        self.lock().question_id = Some(id);
    }

    pub fn set_predicted_market(&self, market: Address) {
        self.lock().predicted_market = Some(market);
    }

    /// Make the named read fail with `LedgerRead`.
    pub fn fail_read(&self, read: &'static str) {
        self.lock().failing.insert(read);
    }
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        self.check("allowance")?;
        Ok(self
            .lock()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default())
    }

    async fn is_approved_for_all(
        &self,
        conditional_tokens: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool> {
        self.check("isApprovedForAll")?;
        Ok(self
            .lock()
            .operator_approvals
            .contains(&(conditional_tokens, owner, operator)))
    }

    async fn outcome_slot_count(
        &self,
        _conditional_tokens: Address,
        condition_id: B256,
    ) -> Result<U256> {
        self.check("getOutcomeSlotCount")?;
        Ok(self
            .lock()
            .outcome_slots
            .get(&condition_id)
            .copied()
            .unwrap_or_default())
    }

    async fn payout_denominator(
        &self,
        _conditional_tokens: Address,
        condition_id: B256,
    ) -> Result<U256> {
        self.check("payoutDenominator")?;
        Ok(self
            .lock()
            .payout_denominators
            .get(&condition_id)
            .copied()
            .unwrap_or_default())
    }

    async fn collection_id(
        &self,
        _conditional_tokens: Address,
        parent_collection_id: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<B256> {
        self.check("getCollectionId")?;
        let mut buf = parent_collection_id.to_vec();
        buf.extend_from_slice(condition_id.as_slice());
        buf.extend_from_slice(&index_set.to_be_bytes::<32>());
        Ok(keccak256(buf))
    }

    async fn collateral_token(&self, market: Address) -> Result<Address> {
        self.check("collateralToken")?;
        self.lock()
            .collateral
            .get(&market)
            .copied()
            .ok_or_else(|| AutomationError::LedgerRead(format!("unknown market {market}")))
    }

    async fn market_condition_id(&self, market: Address) -> Result<B256> {
        self.check("conditionIds")?;
        self.lock()
            .market_conditions
            .get(&market)
            .copied()
            .ok_or_else(|| AutomationError::LedgerRead(format!("unknown market {market}")))
    }

    async fn calc_buy_amount(
        &self,
        _market: Address,
        amount: U256,
        _outcome_index: u64,
    ) -> Result<U256> {
        self.check("calcBuyAmount")?;
        Ok(amount * U256::from(2u64))
    }

    async fn calc_sell_amount(
        &self,
        _market: Address,
        amount: U256,
        _outcome_index: u64,
    ) -> Result<U256> {
        self.check("calcSellAmount")?;
        Ok(amount * U256::from(3u64))
    }

    async fn proxy_modules(&self, proxy: Address) -> Result<Vec<Address>> {
        self.check("getModules")?;
        Ok(self.lock().modules.get(&proxy).cloned().unwrap_or_default())
    }

    async fn batch_get_address(
        &self,
        _storage: Address,
        keys: &[String],
    ) -> Result<Vec<(String, Address)>> {
        self.check("batchGetAddress")?;
        self.registry_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        Ok(keys
            .iter()
            .filter_map(|k| state.registry.get(k).map(|a| (k.clone(), *a)))
            .collect())
    }

    async fn question_id(
        &self,
        _realitio: Address,
        ask_payload: &Bytes,
        _from: Address,
    ) -> Result<B256> {
        self.check("askQuestion")?;
        Ok(self.lock().question_id.unwrap_or_else(|| keccak256(ask_payload)))
    }

    async fn predict_market_address(
        &self,
        _factory: Address,
        _deployment: &MarketDeployment,
    ) -> Result<Address> {
        self.check("predictMarketAddress")?;
        self.lock()
            .predicted_market
            .ok_or(AutomationError::NotImplemented("predictMarketAddress"))
    }
}

/// Executor that records dispatched batches and reports a scripted outcome.
pub struct RecordingExecutor {
    batches: Mutex<Vec<Batch>>,
    revert: bool,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            revert: false,
        }
    }

    pub fn reverting() -> Self {
        Self {
            revert: true,
            ..Self::new()
        }
    }

    pub fn submitted(&self) -> Vec<Batch> {
        self.batches.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl BatchExecutor for RecordingExecutor {
    async fn exec_transactions(&self, batch: &Batch) -> Result<B256> {
        let mut batches = self.batches.lock().unwrap_or_else(PoisonError::into_inner);
        batches.push(batch.clone());
        Ok(B256::with_last_byte(batches.len() as u8))
    }

    async fn wait_for_transaction(&self, hash: B256) -> Result<TxReceipt> {
        Ok(TxReceipt {
            transaction_hash: hash,
            block_number: Some(100),
            success: !self.revert,
        })
    }
}

/// Index answering every proxy with the same scripted records.
pub struct StaticIndex {
    records: Mutex<std::result::Result<Vec<TaskReceiptWrapper>, String>>,
    queries: AtomicUsize,
}

impl StaticIndex {
    pub fn new(records: Vec<TaskReceiptWrapper>) -> Self {
        Self {
            records: Mutex::new(Ok(records)),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        let index = Self::new(Vec::new());
        index.fail(reason);
        index
    }

    pub fn set_records(&self, records: Vec<TaskReceiptWrapper>) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = Ok(records);
    }

    pub fn fail(&self, reason: &str) {
        *self.records.lock().unwrap_or_else(PoisonError::into_inner) = Err(reason.to_string());
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskIndex for StaticIndex {
    async fn task_receipt_wrappers(&self, _proxy: Address) -> Result<Vec<TaskReceiptWrapper>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .map_err(AutomationError::IndexUnavailable)
    }
}

/// Index record of a scheduled withdrawal from `market`, triggering at `trigger`.
pub fn withdrawal_record(
    id: u64,
    proxy: Address,
    market: Address,
    status: TaskStatus,
    submission_date: u64,
    trigger: u64,
) -> TaskReceiptWrapper {
    let withdraw = WithdrawParams {
        conditional_tokens: Address::repeat_byte(0xc7),
        market,
        position_ids: vec![U256::from(11u64), U256::from(12u64)],
        condition_id: B256::repeat_byte(0xcd),
        parent_collection_id: B256::ZERO,
        collateral: Address::repeat_byte(0xee),
        receiver: Address::repeat_byte(0xa1),
    };
    record_with_action(
        id,
        proxy,
        status,
        submission_date,
        trigger,
        TaskCodec::encode_withdraw_params(&withdraw),
    )
}

/// Index record whose action payload is `action_data` verbatim.
pub fn record_with_action(
    id: u64,
    proxy: Address,
    status: TaskStatus,
    submission_date: u64,
    trigger: u64,
    action_data: Bytes,
) -> TaskReceiptWrapper {
    let task = ScheduledTask {
        id: U256::from(id),
        proxy_address: proxy,
        provider: Provider {
            addr: MockLedger::PROVIDER,
            module: MockLedger::PROVIDER_MODULE,
        },
        index: U256::from(id),
        tasks: vec![Task {
            conditions: vec![Condition {
                instrument: MockLedger::TIME_CONDITION,
                data: TaskCodec::encode_trigger_timestamp(U256::from(trigger)),
            }],
            actions: vec![Action {
                target: MockLedger::WITHDRAW_ACTION,
                data: action_data,
                operation: CallKind::DelegateCall,
                data_flow: DataFlow::None,
                value: U256::ZERO,
                terms_ok_check: false,
            }],
            self_provider_gas_limit: U256::ZERO,
            self_provider_gas_price_ceil: U256::ZERO,
        }],
        expiry: U256::ZERO,
        cycle_id: U256::ZERO,
        submissions_left: U256::from(1u64),
    };
    let executed = status == TaskStatus::ExecutionSucceeded;
    TaskReceiptWrapper {
        task,
        submission_hash: B256::with_last_byte(id as u8),
        status,
        submission_date,
        execution_date: executed.then_some(submission_date + 10),
        execution_hash: executed.then(|| B256::repeat_byte(0xe5)),
        self_provided: false,
    }
}
