//! Fixed binary schema of scheduled-withdrawal tasks.
//!
//! Submit layout (`submitTask(provider, task, expiryDate)`):
//! - provider: `(gelatoProvider, providerModuleGnosisSafe)`
//! - one time condition on `conditionTime`, data = `abi.encode(uint256 triggerSeconds)`
//! - one delegate-call action on `actionWithdrawLiquidityOmen`, data = `action(...)` calldata
//!   with the withdrawal arguments `(address,address,uint256[],bytes32,bytes32,address,address)`
//! - zeroed self-provider gas fields, `expiryDate = 0` (never expires)
//!
//! Decoding is the exact inverse and validates the action selector.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use market_automation_types::{
    AtomicCall, CallKind, DataFlow, ScheduleIntent, ScheduledTask, TaskSchema, WithdrawParams,
};
use serde::Serialize;

use crate::{
    abi::automation::{self as abi, IActionWithdrawLiquidity, IAutomationCore, IProxyModules},
    errors::{AutomationError, Result},
    ledger::LedgerReader,
    registry::{AddressRegistry, ContractName},
};

/// Registry names a submit payload needs.
const SUBMIT_CONTRACTS: [ContractName; 5] = [
    ContractName::Core,
    ContractName::Provider,
    ContractName::ProviderModule,
    ContractName::TimeCondition,
    ContractName::WithdrawAction,
];

/// Inputs of a scheduled withdrawal for one market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitTaskParams {
    pub intent: ScheduleIntent,
    /// May be a not-yet-deployed (predicted) address.
    pub market: Address,
    pub conditional_tokens: Address,
    pub position_ids: Vec<U256>,
    pub condition_id: B256,
    pub collateral: Address,
    pub receiver: Address,
}

/// A stored task validated against the current payload schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedTask {
    pub schema: TaskSchema,
    /// Trigger instant in epoch seconds.
    pub trigger_at: U256,
    pub withdraw: WithdrawParams,
}

pub struct TaskCodec {
    registry: Arc<AddressRegistry>,
    ledger: Arc<dyn LedgerReader>,
}

impl TaskCodec {
    pub fn new(registry: Arc<AddressRegistry>, ledger: Arc<dyn LedgerReader>) -> Self {
        Self { registry, ledger }
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    /// Encode the full `submitTask` calldata for a scheduled withdrawal.
    ///
    /// Fails with `MissingTriggerDate` before any lookup when the intent has no trigger. Past
    /// trigger instants are encoded as-is.
    pub async fn encode_submit(&self, params: &SubmitTaskParams) -> Result<Bytes> {
        let trigger = trigger_seconds(&params.intent)?;
        let addresses = self.registry.resolve(&SUBMIT_CONTRACTS).await?;

        let provider = abi::Provider {
            addr: addresses.get(ContractName::Provider)?,
            module: addresses.get(ContractName::ProviderModule)?,
        };
        let condition = abi::Condition {
            inst: addresses.get(ContractName::TimeCondition)?,
            data: Self::encode_trigger_timestamp(trigger),
        };
        let withdraw = WithdrawParams {
            conditional_tokens: params.conditional_tokens,
            market: params.market,
            position_ids: params.position_ids.clone(),
            condition_id: params.condition_id,
            parent_collection_id: B256::ZERO,
            collateral: params.collateral,
            receiver: params.receiver,
        };
        let action = abi::Action {
            addr: addresses.get(ContractName::WithdrawAction)?,
            data: Self::encode_withdraw_params(&withdraw),
            operation: CallKind::DelegateCall.as_u8(),
            dataFlow: DataFlow::None.as_u8(),
            value: U256::ZERO,
            termsOkCheck: false,
        };
        let task = abi::Task {
            conditions: vec![condition],
            actions: vec![action],
            selfProviderGasLimit: U256::ZERO,
            selfProviderGasPriceCeil: U256::ZERO,
        };

        let call = IAutomationCore::submitTaskCall {
            _provider: provider,
            _task: task,
            _expiryDate: U256::ZERO,
        };
        Ok(call.abi_encode().into())
    }

    /// `encode_submit` addressed to the core contract.
    pub async fn submit_call(&self, params: &SubmitTaskParams) -> Result<AtomicCall> {
        let payload = self.encode_submit(params).await?;
        let core = self.registry.address(ContractName::Core).await?;
        Ok(AtomicCall::new(core, payload))
    }

    /// `cancelTask(receipt)` calldata; the receipt is passed back verbatim.
    pub fn encode_cancel(task: &ScheduledTask) -> Bytes {
        IAutomationCore::cancelTaskCall {
            _TR: receipt_to_abi(task),
        }
        .abi_encode()
        .into()
    }

    /// `encode_cancel` addressed to the core contract.
    pub async fn cancel_call(&self, task: &ScheduledTask) -> Result<AtomicCall> {
        let core = self.registry.address(ContractName::Core).await?;
        Ok(AtomicCall::new(core, Self::encode_cancel(task)))
    }

    /// Proxy call enabling `module` (the core contract) so it may execute on the proxy's behalf.
    pub fn encode_enable_module(module: Address) -> Bytes {
        IProxyModules::enableModuleCall { module }.abi_encode().into()
    }

    /// Whether the core contract is already an enabled module of `proxy`.
    pub async fn is_module_registered(&self, proxy: Address) -> Result<bool> {
        let core = self.registry.address(ContractName::Core).await?;
        let modules = self.ledger.proxy_modules(proxy).await?;
        Ok(modules.contains(&core))
    }

    /// Withdraw-action calldata, selector included.
    pub fn encode_withdraw_params(params: &WithdrawParams) -> Bytes {
        IActionWithdrawLiquidity::actionCall {
            _conditionalTokens: params.conditional_tokens,
            _fixedProductMarketMaker: params.market,
            _positionIds: params.position_ids.clone(),
            _conditionId: params.condition_id,
            _parentCollectionId: params.parent_collection_id,
            _collateralToken: params.collateral,
            _receiver: params.receiver,
        }
        .abi_encode()
        .into()
    }

    /// Strip the selector from withdraw-action calldata and decode the argument tuple.
    pub fn decode_withdraw_params(payload: &[u8]) -> Result<WithdrawParams> {
        const WHAT: &str = "withdraw action";
        if payload.len() < 4 {
            return Err(AutomationError::decode(WHAT, "payload shorter than a selector"));
        }
        let (selector, args) = payload.split_at(4);
        if selector != IActionWithdrawLiquidity::actionCall::SELECTOR.as_slice() {
            return Err(AutomationError::decode(
                WHAT,
                format!("unexpected selector 0x{}", hex::encode(selector)),
            ));
        }
        let call = IActionWithdrawLiquidity::actionCall::abi_decode_raw(args, true)
            .map_err(|e| AutomationError::decode(WHAT, e))?;

        Ok(WithdrawParams {
            conditional_tokens: call._conditionalTokens,
            market: call._fixedProductMarketMaker,
            position_ids: call._positionIds,
            condition_id: call._conditionId,
            parent_collection_id: call._parentCollectionId,
            collateral: call._collateralToken,
            receiver: call._receiver,
        })
    }

    pub fn encode_trigger_timestamp(seconds: U256) -> Bytes {
        seconds.abi_encode().into()
    }

    pub fn decode_trigger_timestamp(payload: &[u8]) -> Result<U256> {
        U256::abi_decode(payload, true).map_err(|e| AutomationError::decode("time condition", e))
    }

    /// Validate a stored task against the current schema and decode its parameters.
    pub fn decode_task(task: &ScheduledTask) -> Result<DecodedTask> {
        let action = task
            .actions()
            .first()
            .ok_or_else(|| AutomationError::decode("scheduled task", "task has no actions"))?;
        let condition = task
            .conditions()
            .first()
            .ok_or_else(|| AutomationError::decode("scheduled task", "task has no conditions"))?;

        Ok(DecodedTask {
            schema: TaskSchema::CURRENT,
            trigger_at: Self::decode_trigger_timestamp(&condition.data)?,
            withdraw: Self::decode_withdraw_params(&action.data)?,
        })
    }
}

/// Trigger instant of `intent` as unsigned epoch seconds.
pub fn trigger_seconds(intent: &ScheduleIntent) -> Result<U256> {
    let ts = intent
        .trigger_unix_timestamp()
        .ok_or(AutomationError::MissingTriggerDate)?;
    let seconds = u64::try_from(ts).map_err(|_| AutomationError::TriggerOutOfRange(ts))?;
    Ok(U256::from(seconds))
}

fn receipt_to_abi(task: &ScheduledTask) -> abi::TaskReceipt {
    abi::TaskReceipt {
        id: task.id,
        userProxy: task.proxy_address,
        provider: abi::Provider {
            addr: task.provider.addr,
            module: task.provider.module,
        },
        index: task.index,
        tasks: task
            .tasks
            .iter()
            .map(|t| abi::Task {
                conditions: t
                    .conditions
                    .iter()
                    .map(|c| abi::Condition {
                        inst: c.instrument,
                        data: c.data.clone(),
                    })
                    .collect(),
                actions: t
                    .actions
                    .iter()
                    .map(|a| abi::Action {
                        addr: a.target,
                        data: a.data.clone(),
                        operation: a.operation.as_u8(),
                        dataFlow: a.data_flow.as_u8(),
                        value: a.value,
                        termsOkCheck: a.terms_ok_check,
                    })
                    .collect(),
                selfProviderGasLimit: t.self_provider_gas_limit,
                selfProviderGasPriceCeil: t.self_provider_gas_price_ceil,
            })
            .collect(),
        expiryDate: task.expiry,
        cycleId: task.cycle_id,
        submissionsLeft: task.submissions_left,
    }
}

#[cfg(test)]
mod tests {
    use market_automation_types::TaskStatus;
    use time::macros::datetime;

    use super::*;
    use crate::mock::{withdrawal_record, MockLedger};

    const PROXY: Address = Address::repeat_byte(0x99);

    fn codec(ledger: &Arc<MockLedger>) -> TaskCodec {
        let registry = Arc::new(AddressRegistry::new(ledger.clone(), Address::repeat_byte(0x51)));
        TaskCodec::new(registry, ledger.clone())
    }

    fn params(intent: ScheduleIntent) -> SubmitTaskParams {
        SubmitTaskParams {
            intent,
            market: Address::repeat_byte(0x0a),
            conditional_tokens: Address::repeat_byte(0xc7),
            position_ids: vec![U256::from(1u64), U256::from(2u64)],
            condition_id: B256::repeat_byte(0xcd),
            collateral: Address::repeat_byte(0xee),
            receiver: Address::repeat_byte(0xa1),
        }
    }

    #[tokio::test]
    async fn test_submit_payload_layout() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        let intent = ScheduleIntent::new(true, Some(datetime!(2021-03-06 0:00 UTC)));
        let payload = codec(&ledger).encode_submit(&params(intent)).await.unwrap();

        let call = IAutomationCore::submitTaskCall::abi_decode(&payload, true).unwrap();
        assert_eq!(call._expiryDate, U256::ZERO);
        assert_eq!(call._provider.addr, MockLedger::PROVIDER);
        assert_eq!(call._provider.module, MockLedger::PROVIDER_MODULE);
        assert_eq!(call._task.selfProviderGasLimit, U256::ZERO);
        assert_eq!(call._task.selfProviderGasPriceCeil, U256::ZERO);

        let condition = &call._task.conditions[0];
        assert_eq!(condition.inst, MockLedger::TIME_CONDITION);
        assert_eq!(
            TaskCodec::decode_trigger_timestamp(&condition.data).unwrap(),
            U256::from(1_614_988_800u64)
        );

        let action = &call._task.actions[0];
        assert_eq!(action.addr, MockLedger::WITHDRAW_ACTION);
        assert_eq!(action.operation, CallKind::DelegateCall.as_u8());
        assert_eq!(action.dataFlow, DataFlow::None.as_u8());
        assert_eq!(action.value, U256::ZERO);
        assert!(!action.termsOkCheck);

        let withdraw = TaskCodec::decode_withdraw_params(&action.data).unwrap();
        assert_eq!(withdraw.market, Address::repeat_byte(0x0a));
        assert_eq!(withdraw.parent_collection_id, B256::ZERO);
        assert_eq!(withdraw.position_ids, vec![U256::from(1u64), U256::from(2u64)]);
        assert_eq!(withdraw.receiver, Address::repeat_byte(0xa1));
    }

    #[tokio::test]
    async fn test_missing_trigger_fails_before_lookup() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        let err = codec(&ledger)
            .encode_submit(&params(ScheduleIntent::new(true, None)))
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::MissingTriggerDate));
        assert_eq!(ledger.registry_lookups(), 0);
    }

    #[tokio::test]
    async fn test_past_trigger_is_encoded_verbatim() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        let intent = ScheduleIntent::new(true, Some(datetime!(1971-01-01 0:00 UTC)));
        let payload = codec(&ledger).encode_submit(&params(intent)).await.unwrap();
        let call = IAutomationCore::submitTaskCall::abi_decode(&payload, true).unwrap();
        assert_eq!(
            TaskCodec::decode_trigger_timestamp(&call._task.conditions[0].data).unwrap(),
            U256::from(31_536_000u64)
        );
    }

    #[test]
    fn test_pre_epoch_trigger_is_rejected() {
        let intent = ScheduleIntent::new(true, Some(datetime!(1969-12-31 23:59 UTC)));
        assert!(matches!(
            trigger_seconds(&intent),
            Err(AutomationError::TriggerOutOfRange(-60))
        ));
    }

    #[tokio::test]
    async fn test_missing_registry_entry_is_fatal() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        ledger.remove_registry_entry("conditionTime");
        let intent = ScheduleIntent::new(true, Some(datetime!(2021-03-06 0:00 UTC)));
        let err = codec(&ledger).encode_submit(&params(intent)).await.unwrap_err();
        assert!(matches!(err, AutomationError::AddressNotFound(key) if key == "conditionTime"));
    }

    #[test]
    fn test_withdraw_params_are_recovered_exactly() {
        let original = WithdrawParams {
            conditional_tokens: Address::repeat_byte(1),
            market: Address::repeat_byte(2),
            position_ids: vec![U256::from(7u64), U256::MAX],
            condition_id: B256::repeat_byte(3),
            parent_collection_id: B256::ZERO,
            collateral: Address::repeat_byte(4),
            receiver: Address::repeat_byte(5),
        };
        let payload = TaskCodec::encode_withdraw_params(&original);
        assert_eq!(&payload[..4], IActionWithdrawLiquidity::actionCall::SELECTOR.as_slice());
        assert_eq!(TaskCodec::decode_withdraw_params(&payload).unwrap(), original);
    }

    #[test]
    fn test_foreign_payloads_are_mismatches() {
        let short = TaskCodec::decode_withdraw_params(&[0x01, 0x02]).unwrap_err();
        assert!(matches!(short, AutomationError::DecodeMismatch { .. }));

        let mut payload = TaskCodec::encode_withdraw_params(&WithdrawParams {
            conditional_tokens: Address::ZERO,
            market: Address::ZERO,
            position_ids: vec![],
            condition_id: B256::ZERO,
            parent_collection_id: B256::ZERO,
            collateral: Address::ZERO,
            receiver: Address::ZERO,
        })
        .to_vec();
        payload[0] ^= 0xff;
        let wrong_selector = TaskCodec::decode_withdraw_params(&payload).unwrap_err();
        assert!(wrong_selector.to_string().contains("unexpected selector"));

        let truncated = TaskCodec::decode_trigger_timestamp(&[0u8; 8]).unwrap_err();
        assert!(matches!(
            truncated,
            AutomationError::DecodeMismatch { what: "time condition", .. }
        ));
    }

    #[test]
    fn test_cancel_passes_receipt_back_verbatim() {
        let record = withdrawal_record(
            7,
            PROXY,
            Address::repeat_byte(0x0a),
            TaskStatus::AwaitingExecution,
            10,
            20,
        );
        let payload = TaskCodec::encode_cancel(&record.task);
        let call = IAutomationCore::cancelTaskCall::abi_decode(&payload, true).unwrap();

        assert_eq!(call._TR, receipt_to_abi(&record.task));
        assert_eq!(call._TR.id, U256::from(7u64));
        assert_eq!(call._TR.userProxy, PROXY);
        assert_eq!(call._TR.tasks[0].actions[0].data, record.task.actions()[0].data);
    }

    #[test]
    fn test_decode_task_reports_schema() {
        let market = Address::repeat_byte(0x0a);
        let record = withdrawal_record(1, PROXY, market, TaskStatus::AwaitingExecution, 10, 1_234);
        let decoded = TaskCodec::decode_task(&record.task).unwrap();
        assert_eq!(decoded.schema, TaskSchema::V1);
        assert_eq!(decoded.trigger_at, U256::from(1_234u64));
        assert_eq!(decoded.withdraw.market, market);
    }

    #[tokio::test]
    async fn test_module_registration_check() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        let codec = codec(&ledger);
        assert!(!codec.is_module_registered(PROXY).await.unwrap());

        ledger.set_modules(PROXY, vec![Address::repeat_byte(0x77), MockLedger::CORE]);
        assert!(codec.is_module_registered(PROXY).await.unwrap());

        let enable = TaskCodec::encode_enable_module(MockLedger::CORE);
        let call = IProxyModules::enableModuleCall::abi_decode(&enable, true).unwrap();
        assert_eq!(call.module, MockLedger::CORE);
    }
}
