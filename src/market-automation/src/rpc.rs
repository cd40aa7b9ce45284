//! `LedgerReader` over plain JSON-RPC `eth_call`.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use ethers::{
    providers::{Http, Middleware, Provider},
    types::{transaction::eip2718::TypedTransaction, TransactionRequest, H160},
};
use tracing::trace;

use crate::{
    abi::{
        automation::{IAddressStorage, IProxyModules},
        market::{IConditionalTokens, IFixedProductMarketMaker, IRealitio, IERC20},
    },
    errors::{AutomationError, Result},
    ledger::LedgerReader,
};

pub struct RpcLedger {
    provider: Provider<Http>,
}

impl RpcLedger {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| AutomationError::InvalidRequest(format!("rpc url {rpc_url}: {e}")))?;
        Ok(Self { provider })
    }

    async fn call_raw(&self, to: Address, data: Vec<u8>, from: Option<Address>) -> Result<Vec<u8>> {
        let mut request = TransactionRequest::new().to(h160(to)).data(data);
        if let Some(from) = from {
            request = request.from(h160(from));
        }
        let tx: TypedTransaction = request.into();
        let raw = self
            .provider
            .call(&tx, None)
            .await
            .map_err(|e| AutomationError::LedgerRead(format!("eth_call to {to}: {e}")))?;
        Ok(raw.to_vec())
    }

    async fn call<C: SolCall + Send>(&self, to: Address, call: C) -> Result<C::Return> {
        trace!(%to, function = C::SIGNATURE, "eth_call");
        let raw = self.call_raw(to, call.abi_encode(), None).await?;
        C::abi_decode_returns(&raw, true).map_err(|e| AutomationError::decode(C::SIGNATURE, e))
    }
}

fn h160(address: Address) -> H160 {
    H160::from_slice(address.as_slice())
}

#[async_trait]
impl LedgerReader for RpcLedger {
    async fn allowance(&self, token: Address, owner: Address, spender: Address) -> Result<U256> {
        Ok(self.call(token, IERC20::allowanceCall { owner, spender }).await?._0)
    }

    async fn is_approved_for_all(
        &self,
        conditional_tokens: Address,
        owner: Address,
        operator: Address,
    ) -> Result<bool> {
        let call = IConditionalTokens::isApprovedForAllCall { owner, operator };
        Ok(self.call(conditional_tokens, call).await?._0)
    }

    async fn outcome_slot_count(
        &self,
        conditional_tokens: Address,
        condition_id: B256,
    ) -> Result<U256> {
        let call = IConditionalTokens::getOutcomeSlotCountCall {
            conditionId: condition_id,
        };
        Ok(self.call(conditional_tokens, call).await?._0)
    }

    async fn payout_denominator(
        &self,
        conditional_tokens: Address,
        condition_id: B256,
    ) -> Result<U256> {
        let call = IConditionalTokens::payoutDenominatorCall {
            conditionId: condition_id,
        };
        Ok(self.call(conditional_tokens, call).await?._0)
    }

    async fn collection_id(
        &self,
        conditional_tokens: Address,
        parent_collection_id: B256,
        condition_id: B256,
        index_set: U256,
    ) -> Result<B256> {
        let call = IConditionalTokens::getCollectionIdCall {
            parentCollectionId: parent_collection_id,
            conditionId: condition_id,
            indexSet: index_set,
        };
        Ok(self.call(conditional_tokens, call).await?._0)
    }

    async fn collateral_token(&self, market: Address) -> Result<Address> {
        Ok(self
            .call(market, IFixedProductMarketMaker::collateralTokenCall {})
            .await?
            ._0)
    }

    async fn market_condition_id(&self, market: Address) -> Result<B256> {
        let call = IFixedProductMarketMaker::conditionIdsCall { index: U256::ZERO };
        Ok(self.call(market, call).await?._0)
    }

    async fn calc_buy_amount(
        &self,
        market: Address,
        amount: U256,
        outcome_index: u64,
    ) -> Result<U256> {
        let call = IFixedProductMarketMaker::calcBuyAmountCall {
            investmentAmount: amount,
            outcomeIndex: U256::from(outcome_index),
        };
        Ok(self.call(market, call).await?._0)
    }

    async fn calc_sell_amount(
        &self,
        market: Address,
        amount: U256,
        outcome_index: u64,
    ) -> Result<U256> {
        let call = IFixedProductMarketMaker::calcSellAmountCall {
            returnAmount: amount,
            outcomeIndex: U256::from(outcome_index),
        };
        Ok(self.call(market, call).await?._0)
    }

    async fn proxy_modules(&self, proxy: Address) -> Result<Vec<Address>> {
        Ok(self.call(proxy, IProxyModules::getModulesCall {}).await?._0)
    }

    async fn batch_get_address(
        &self,
        storage: Address,
        keys: &[String],
    ) -> Result<Vec<(String, Address)>> {
        let call = IAddressStorage::batchGetAddressCall { _keys: keys.to_vec() };
        let entries = self.call(storage, call).await?.result;
        Ok(entries.into_iter().map(|kv| (kv.key, kv.value)).collect())
    }

    async fn question_id(
        &self,
        realitio: Address,
        ask_payload: &Bytes,
        from: Address,
    ) -> Result<B256> {
        let raw = self.call_raw(realitio, ask_payload.to_vec(), Some(from)).await?;
        let returns = IRealitio::askQuestionCall::abi_decode_returns(&raw, true)
            .map_err(|e| AutomationError::decode("askQuestion", e))?;
        Ok(returns._0)
    }
}
