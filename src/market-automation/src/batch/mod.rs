//! Composition of high-level market operations into single atomic batches.
//!
//! Every operation runs in two phases. `plan_*` issues the pre-check reads in order and
//! returns the batch; a failed read aborts before anything is sent. The operation itself then
//! dispatches that batch once through the proxy and waits for it to be mined.
//!
//! Automation steps consult `TaskLookup` at plan time, so the decision to submit or cancel a
//! task is made against the index as it is right now, not a cached discovery snapshot.

pub mod question;
pub mod requests;


use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use market_automation_types::{AtomicCall, Batch, ScheduleIntent};
use tracing::{debug, error, info};

use crate::{
    abi::market::{
        IConditionalTokens, IERC20, IFixedProductMarketMaker, IMarketMakerFactory, IRealitioOracle,
    },
    codec::{trigger_seconds, SubmitTaskParams, TaskCodec},
    conditional,
    config::{MarketContracts, Session},
    discovery::TaskLookup,
    errors::{AutomationError, Result},
    ledger::{BatchExecutor, LedgerReader, MarketDeployment, TxReceipt},
    registry::ContractName,
};

pub use question::QuestionSpec;
pub use requests::{
    AddFundingRequest, BuyRequest, CreateMarketRequest, CreatedMarket, MarketPlan, QuestionRef,
    RedeemRequest, RemoveFundingRequest, SellRequest,
};

/// Market and automation contract a scheduled withdrawal is built for.
struct AutomationTarget {
    market: Address,
    condition_id: B256,
    collateral: Address,
    outcome_count: u64,
}

pub struct TransactionBatchBuilder {
    session: Session,
    contracts: MarketContracts,
    ledger: Arc<dyn LedgerReader>,
    executor: Arc<dyn BatchExecutor>,
    tasks: Arc<dyn TaskLookup>,
    codec: Arc<TaskCodec>,
}

impl TransactionBatchBuilder {
    pub fn new(
        session: Session,
        contracts: MarketContracts,
        ledger: Arc<dyn LedgerReader>,
        executor: Arc<dyn BatchExecutor>,
        tasks: Arc<dyn TaskLookup>,
        codec: Arc<TaskCodec>,
    ) -> Self {
        Self {
            session,
            contracts,
            ledger,
            executor,
            tasks,
            codec,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn plan_buy_outcome_shares(&self, request: &BuyRequest) -> Result<Batch> {
        let collateral = self.ledger.collateral_token(request.market).await?;
        let min_outcome_tokens = self
            .ledger
            .calc_buy_amount(request.market, request.amount, request.outcome_index)
            .await?;

        let mut batch = Batch::new();
        if let Some(approve) = self
            .approval_if_needed(collateral, request.market, request.amount)
            .await?
        {
            batch.push(approve);
        }
        batch.push(self.pull_from_account(collateral, request.amount));
        batch.push(AtomicCall::new(
            request.market,
            IFixedProductMarketMaker::buyCall {
                investmentAmount: request.amount,
                outcomeIndex: U256::from(request.outcome_index),
                minOutcomeTokensToBuy: min_outcome_tokens,
            }
            .abi_encode(),
        ));
        Ok(batch)
    }

    pub async fn buy_outcome_shares(&self, request: &BuyRequest) -> Result<TxReceipt> {
        let batch = self
            .plan_buy_outcome_shares(request)
            .await
            .inspect_err(|e| error!(operation = "buy", error = %e, "cannot build batch"))?;
        self.submit("buy", batch).await
    }

    pub async fn plan_sell_outcome_shares(&self, request: &SellRequest) -> Result<Batch> {
        let conditional_tokens = self.contracts.conditional_tokens;
        let collateral = self.ledger.collateral_token(request.market).await?;
        let max_outcome_tokens = self
            .ledger
            .calc_sell_amount(request.market, request.amount, request.outcome_index)
            .await?;
        let approved = self
            .ledger
            .is_approved_for_all(conditional_tokens, self.session.proxy, request.market)
            .await?;

        let mut batch = Batch::new();
        if !approved {
            batch.push(AtomicCall::new(
                conditional_tokens,
                IConditionalTokens::setApprovalForAllCall {
                    operator: request.market,
                    approved: true,
                }
                .abi_encode(),
            ));
        }
        batch.push(AtomicCall::new(
            request.market,
            IFixedProductMarketMaker::sellCall {
                returnAmount: request.amount,
                outcomeIndex: U256::from(request.outcome_index),
                maxOutcomeTokensToSell: max_outcome_tokens,
            }
            .abi_encode(),
        ));
        batch.push(self.pay_to_account(collateral, request.amount));
        Ok(batch)
    }

    pub async fn sell_outcome_shares(&self, request: &SellRequest) -> Result<TxReceipt> {
        let batch = self
            .plan_sell_outcome_shares(request)
            .await
            .inspect_err(|e| error!(operation = "sell", error = %e, "cannot build batch"))?;
        self.submit("sell", batch).await
    }

    /// Ask (or reuse) the question, prepare its condition, deploy a funded market at its
    /// predicted address, and optionally schedule the withdrawal against that address.
    pub async fn plan_create_market(&self, request: &CreateMarketRequest) -> Result<MarketPlan> {
        let outcome_count = conditional::checked_outcome_count(request.question.outcome_count())?;
        if request.intent.should_submit() {
            trigger_seconds(&request.intent)?;
        }

        let contracts = self.contracts;
        let mut batch = Batch::new();

        let question_id = match request.question_id {
            Some(question_id) => question_id,
            None => {
                let ask = request.question.encode_ask(contracts.arbitrator)?;
                let question_id = self
                    .ledger
                    .question_id(contracts.realitio, &ask, self.session.proxy)
                    .await?;
                batch.push(AtomicCall::new(contracts.realitio, ask));
                question_id
            }
        };
        let condition_id = conditional::condition_id(contracts.oracle, question_id, outcome_count);
        // A freshly asked question cannot have a condition yet.
        let condition_exists = match request.question_id {
            Some(_) => !self
                .ledger
                .outcome_slot_count(contracts.conditional_tokens, condition_id)
                .await?
                .is_zero(),
            None => false,
        };

        if !condition_exists {
            batch.push(AtomicCall::new(
                contracts.conditional_tokens,
                IConditionalTokens::prepareConditionCall {
                    oracle: contracts.oracle,
                    questionId: question_id,
                    outcomeSlotCount: U256::from(outcome_count),
                }
                .abi_encode(),
            ));
        }

        batch.push(approve_unlimited(request.collateral, contracts.factory));
        batch.push(self.pull_from_account(request.collateral, request.funding));

        let market = self
            .ledger
            .predict_market_address(
                contracts.factory,
                &MarketDeployment {
                    salt_nonce: request.salt_nonce,
                    conditional_tokens: contracts.conditional_tokens,
                    collateral: request.collateral,
                    condition_id,
                    creator: self.session.proxy,
                    fee: request.fee,
                },
            )
            .await?;
        debug!(%market, %question_id, %condition_id, "predicted market address");

        batch.push(AtomicCall::new(
            contracts.factory,
            IMarketMakerFactory::create2FixedProductMarketMakerCall {
                saltNonce: request.salt_nonce,
                conditionalTokens: contracts.conditional_tokens,
                collateralToken: request.collateral,
                conditionIds: vec![condition_id],
                fee: request.fee,
                initialFunds: request.funding,
                distributionHint: request.distribution_hint.clone(),
            }
            .abi_encode(),
        ));

        if request.intent.should_submit() {
            let steps = self
                .automation_steps(
                    request.intent,
                    &AutomationTarget {
                        market,
                        condition_id,
                        collateral: request.collateral,
                        outcome_count,
                    },
                )
                .await?;
            batch.extend(steps);
        }

        Ok(MarketPlan {
            batch,
            market,
            question_id,
            condition_id,
        })
    }

    pub async fn create_market(&self, request: &CreateMarketRequest) -> Result<CreatedMarket> {
        let plan = self
            .plan_create_market(request)
            .await
            .inspect_err(|e| {
                error!(operation = "create_market", error = %e, "cannot build batch")
            })?;
        let receipt = self.submit("create_market", plan.batch).await?;
        info!(market = %plan.market, "market created");
        Ok(CreatedMarket {
            market: plan.market,
            question_id: plan.question_id,
            condition_id: plan.condition_id,
            receipt,
        })
    }

    /// Fund the market; schedule a withdrawal unless one is already awaiting execution.
    pub async fn plan_add_funding(&self, request: &AddFundingRequest) -> Result<Batch> {
        if request.intent.should_submit() {
            trigger_seconds(&request.intent)?;
        }

        let mut batch = Batch::new();
        if let Some(approve) = self
            .approval_if_needed(request.collateral, request.market, request.amount)
            .await?
        {
            batch.push(approve);
        }
        batch.push(self.pull_from_account(request.collateral, request.amount));
        batch.push(AtomicCall::new(
            request.market,
            IFixedProductMarketMaker::addFundingCall {
                addedFunds: request.amount,
                distributionHint: Vec::new(),
            }
            .abi_encode(),
        ));

        if !request.intent.should_submit() {
            return Ok(batch);
        }

        let current = self.tasks.current_task(self.session.proxy, request.market).await?;
        if let Some(task) = current.filter(|t| t.is_active()) {
            info!(
                market = %request.market,
                task = %task.task.id,
                "task already awaiting execution"
            );
            return Ok(batch);
        }

        let slots = self
            .ledger
            .outcome_slot_count(self.contracts.conditional_tokens, request.condition_id)
            .await?;
        let outcome_count = u64::try_from(slots).map_err(|_| {
            AutomationError::InvalidRequest(format!(
                "condition {} reports {slots} outcome slots",
                request.condition_id
            ))
        })?;
        let outcome_count = conditional::checked_outcome_count(outcome_count)?;

        let steps = self
            .automation_steps(
                request.intent,
                &AutomationTarget {
                    market: request.market,
                    condition_id: request.condition_id,
                    collateral: request.collateral,
                    outcome_count,
                },
            )
            .await?;
        batch.extend(steps);
        Ok(batch)
    }

    pub async fn add_funding(&self, request: &AddFundingRequest) -> Result<TxReceipt> {
        let batch = self
            .plan_add_funding(request)
            .await
            .inspect_err(|e| error!(operation = "add_funding", error = %e, "cannot build batch"))?;
        self.submit("add_funding", batch).await
    }

    /// Withdraw liquidity; an active scheduled withdrawal for the market is cancelled as the
    /// last step.
    pub async fn plan_remove_funding(&self, request: &RemoveFundingRequest) -> Result<Batch> {
        let outcome_count = conditional::checked_outcome_count(request.outcome_count)?;
        let current = self.tasks.current_task(self.session.proxy, request.market).await?;

        let mut batch = Batch::new();
        batch.push(AtomicCall::new(
            request.market,
            IFixedProductMarketMaker::removeFundingCall {
                sharesToBurn: request.shares_to_burn,
            }
            .abi_encode(),
        ));
        batch.push(AtomicCall::new(
            self.contracts.conditional_tokens,
            IConditionalTokens::mergePositionsCall {
                collateralToken: request.collateral,
                parentCollectionId: B256::ZERO,
                conditionId: request.condition_id,
                partition: conditional::single_outcome_index_sets(outcome_count),
                amount: request.amount_to_merge,
            }
            .abi_encode(),
        ));
        let payout = request
            .amount_to_merge
            .checked_add(request.earnings)
            .ok_or_else(|| {
                AutomationError::InvalidRequest("payout overflows uint256".to_string())
            })?;
        batch.push(self.pay_to_account(request.collateral, payout));

        if let Some(task) = current.filter(|t| t.is_active()) {
            info!(
                market = %request.market,
                task = %task.task.id,
                "cancelling scheduled withdrawal"
            );
            batch.push(self.codec.cancel_call(&task.task).await?);
        }
        Ok(batch)
    }

    pub async fn remove_funding(&self, request: &RemoveFundingRequest) -> Result<TxReceipt> {
        let batch = self
            .plan_remove_funding(request)
            .await
            .inspect_err(|e| {
                error!(operation = "remove_funding", error = %e, "cannot build batch")
            })?;
        self.submit("remove_funding", batch).await
    }

    pub async fn plan_redeem_positions(&self, request: &RedeemRequest) -> Result<Batch> {
        let outcome_count = conditional::checked_outcome_count(request.outcome_count)?;
        let conditional_tokens = self.contracts.conditional_tokens;
        let condition_id = self.ledger.market_condition_id(request.market).await?;
        let resolved = !self
            .ledger
            .payout_denominator(conditional_tokens, condition_id)
            .await?
            .is_zero();

        let mut batch = Batch::new();
        if !resolved {
            batch.push(AtomicCall::new(
                self.contracts.oracle,
                IRealitioOracle::resolveCall {
                    questionId: request.question.id,
                    templateId: request.question.template_id,
                    question: request.question.text.clone(),
                    numOutcomes: U256::from(outcome_count),
                }
                .abi_encode(),
            ));
        }
        batch.push(AtomicCall::new(
            conditional_tokens,
            IConditionalTokens::redeemPositionsCall {
                collateralToken: request.collateral,
                parentCollectionId: B256::ZERO,
                conditionId: condition_id,
                indexSets: conditional::single_outcome_index_sets(outcome_count),
            }
            .abi_encode(),
        ));
        if !request.earned_collateral.is_zero() {
            batch.push(self.pay_to_account(request.collateral, request.earned_collateral));
        }
        Ok(batch)
    }

    pub async fn redeem_positions(&self, request: &RedeemRequest) -> Result<TxReceipt> {
        let batch = self
            .plan_redeem_positions(request)
            .await
            .inspect_err(|e| error!(operation = "redeem", error = %e, "cannot build batch"))?;
        self.submit("redeem", batch).await
    }

    /// Enable the core module on the proxy if needed, then submit the scheduled withdrawal.
    async fn automation_steps(
        &self,
        intent: ScheduleIntent,
        target: &AutomationTarget,
    ) -> Result<Vec<AtomicCall>> {
        let conditional_tokens = self.contracts.conditional_tokens;
        let mut steps = Vec::with_capacity(2);

        if !self.codec.is_module_registered(self.session.proxy).await? {
            let core = self.codec.registry().address(ContractName::Core).await?;
            debug!(proxy = %self.session.proxy, %core, "enabling automation module");
            steps.push(AtomicCall::new(self.session.proxy, TaskCodec::encode_enable_module(core)));
        }

        let position_ids = conditional::position_ids(
            self.ledger.as_ref(),
            conditional_tokens,
            target.condition_id,
            target.collateral,
            target.outcome_count,
        )
        .await?;
        let submit = self
            .codec
            .submit_call(&SubmitTaskParams {
                intent,
                market: target.market,
                conditional_tokens,
                position_ids,
                condition_id: target.condition_id,
                collateral: target.collateral,
                receiver: self.session.account,
            })
            .await?;
        steps.push(submit);
        Ok(steps)
    }

    async fn approval_if_needed(
        &self,
        token: Address,
        spender: Address,
        amount: U256,
    ) -> Result<Option<AtomicCall>> {
        let allowance = self.ledger.allowance(token, self.session.proxy, spender).await?;
        if allowance >= amount {
            return Ok(None);
        }
        debug!(%token, %spender, %allowance, %amount, "allowance insufficient");
        Ok(Some(approve_unlimited(token, spender)))
    }

    fn pull_from_account(&self, token: Address, amount: U256) -> AtomicCall {
        AtomicCall::new(
            token,
            IERC20::transferFromCall {
                from: self.session.account,
                to: self.session.proxy,
                amount,
            }
            .abi_encode(),
        )
    }

    fn pay_to_account(&self, token: Address, amount: U256) -> AtomicCall {
        AtomicCall::new(
            token,
            IERC20::transferCall {
                to: self.session.account,
                amount,
            }
            .abi_encode(),
        )
    }

    async fn submit(&self, operation: &'static str, batch: Batch) -> Result<TxReceipt> {
        for (step, call) in batch.iter().enumerate() {
            debug!(
                operation,
                step,
                target = %call.target,
                selector = %call.selector().map(hex::encode).unwrap_or_default(),
                "batch step"
            );
        }
        info!(operation, steps = batch.len(), proxy = %self.session.proxy, "dispatching batch");

        let hash = self
            .executor
            .exec_transactions(&batch)
            .await
            .inspect_err(|e| error!(operation, error = %e, "dispatch failed"))?;
        let receipt = self.executor.wait_for_transaction(hash).await?;
        if !receipt.success {
            error!(operation, tx = %hash, "batch reverted");
            return Err(AutomationError::LedgerRejected(format!("transaction {hash} reverted")));
        }
        info!(operation, tx = %hash, block = ?receipt.block_number, "batch confirmed");
        Ok(receipt)
    }
}

fn approve_unlimited(token: Address, spender: Address) -> AtomicCall {
    AtomicCall::new(
        token,
        IERC20::approveCall {
            spender,
            amount: U256::MAX,
        }
        .abi_encode(),
    )
}
