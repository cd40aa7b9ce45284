//! Collaborator seams: the on-chain reads a batch consults before it is built, and the
//! executor that dispatches it as one meta-transaction.
//!
//! Every read has a default that fails with `NotImplemented`, so a provider only implements
//! what its transport can answer (mocks, JSON-RPC, a local fork).

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use market_automation_types::Batch;
use serde::Serialize;

use crate::errors::{AutomationError, Result};

/// Parameters that determine where a market instance will be deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDeployment {
    pub salt_nonce: U256,
    pub conditional_tokens: Address,
    pub collateral: Address,
    pub condition_id: B256,
    pub creator: Address,
    pub fee: U256,
}

#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn allowance(&self, _token: Address, _owner: Address, _spender: Address) -> Result<U256> {
        Err(AutomationError::NotImplemented("allowance"))
    }

    async fn is_approved_for_all(
        &self,
        _conditional_tokens: Address,
        _owner: Address,
        _operator: Address,
    ) -> Result<bool> {
        Err(AutomationError::NotImplemented("isApprovedForAll"))
    }

    /// Zero when the condition was never prepared.
    async fn outcome_slot_count(
        &self,
        _conditional_tokens: Address,
        _condition_id: B256,
    ) -> Result<U256> {
        Err(AutomationError::NotImplemented("getOutcomeSlotCount"))
    }

    /// Non-zero once the oracle reported a result for the condition.
    async fn payout_denominator(
        &self,
        _conditional_tokens: Address,
        _condition_id: B256,
    ) -> Result<U256> {
        Err(AutomationError::NotImplemented("payoutDenominator"))
    }

    async fn collection_id(
        &self,
        _conditional_tokens: Address,
        _parent_collection_id: B256,
        _condition_id: B256,
        _index_set: U256,
    ) -> Result<B256> {
        Err(AutomationError::NotImplemented("getCollectionId"))
    }

    async fn collateral_token(&self, _market: Address) -> Result<Address> {
        Err(AutomationError::NotImplemented("collateralToken"))
    }

    async fn market_condition_id(&self, _market: Address) -> Result<B256> {
        Err(AutomationError::NotImplemented("conditionIds"))
    }

    async fn calc_buy_amount(
        &self,
        _market: Address,
        _amount: U256,
        _outcome_index: u64,
    ) -> Result<U256> {
        Err(AutomationError::NotImplemented("calcBuyAmount"))
    }

    async fn calc_sell_amount(
        &self,
        _market: Address,
        _amount: U256,
        _outcome_index: u64,
    ) -> Result<U256> {
        Err(AutomationError::NotImplemented("calcSellAmount"))
    }

    /// Modules currently enabled on the proxy account.
    async fn proxy_modules(&self, _proxy: Address) -> Result<Vec<Address>> {
        Err(AutomationError::NotImplemented("getModules"))
    }

    /// One batched registry lookup. Keys absent from the registry are simply missing from
    /// the result.
    async fn batch_get_address(
        &self,
        _storage: Address,
        _keys: &[String],
    ) -> Result<Vec<(String, Address)>> {
        Err(AutomationError::NotImplemented("batchGetAddress"))
    }

    /// Question id the registry would assign to `ask_payload` when sent by `from`.
    async fn question_id(
        &self,
        _realitio: Address,
        _ask_payload: &Bytes,
        _from: Address,
    ) -> Result<B256> {
        Err(AutomationError::NotImplemented("askQuestion (simulated)"))
    }

    async fn predict_market_address(
        &self,
        _factory: Address,
        _deployment: &MarketDeployment,
    ) -> Result<Address> {
        Err(AutomationError::NotImplemented("predictMarketAddress"))
    }
}

/// Outcome of a confirmed meta-transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub success: bool,
}

#[async_trait]
pub trait BatchExecutor: Send + Sync {
    /// Dispatch the whole batch as a single atomic meta-transaction through the proxy.
    async fn exec_transactions(&self, batch: &Batch) -> Result<B256>;

    /// Wait until `hash` is mined.
    async fn wait_for_transaction(&self, hash: B256) -> Result<TxReceipt>;
}
