//! Inputs of the high-level operations. Amounts are in collateral base units.

use alloy_primitives::{Address, B256, U256};
use market_automation_types::{Batch, ScheduleIntent};
use serde::Serialize;

use super::question::QuestionSpec;
use crate::ledger::TxReceipt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuyRequest {
    pub market: Address,
    pub amount: U256,
    pub outcome_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellRequest {
    pub market: Address,
    /// Collateral to receive.
    pub amount: U256,
    pub outcome_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateMarketRequest {
    pub question: QuestionSpec,
    /// Reuse a question already asked instead of asking a new one.
    pub question_id: Option<B256>,
    pub collateral: Address,
    pub funding: U256,
    pub fee: U256,
    pub salt_nonce: U256,
    /// Initial odds; empty for an even split.
    pub distribution_hint: Vec<U256>,
    pub intent: ScheduleIntent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddFundingRequest {
    pub market: Address,
    pub amount: U256,
    pub collateral: Address,
    pub condition_id: B256,
    pub intent: ScheduleIntent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveFundingRequest {
    pub market: Address,
    pub shares_to_burn: U256,
    /// Full sets of outcome tokens merged back into collateral.
    pub amount_to_merge: U256,
    /// Fees accrued to the removed shares.
    pub earnings: U256,
    pub collateral: Address,
    pub condition_id: B256,
    pub outcome_count: u64,
}

/// A question as stored by the registry, needed to resolve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRef {
    pub id: B256,
    pub template_id: U256,
    /// The question text exactly as asked.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedeemRequest {
    pub market: Address,
    pub question: QuestionRef,
    pub outcome_count: u64,
    pub earned_collateral: U256,
    pub collateral: Address,
}

/// A market-creation batch together with the identifiers it commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPlan {
    pub batch: Batch,
    /// Predicted; the market does not exist until the batch is mined.
    pub market: Address,
    pub question_id: B256,
    pub condition_id: B256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedMarket {
    pub market: Address,
    pub question_id: B256,
    pub condition_id: B256,
    pub receipt: TxReceipt,
}
