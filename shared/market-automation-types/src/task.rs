//! Scheduled-task records as registered with the automation network and mirrored by its index.
//!
//! This crate never owns task state: a `TaskReceiptWrapper` only reflects what the index last
//! reported. Field names follow the index schema through `serde` renames.

use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Deserializer, Serialize};

use crate::numeric;

/// How the automation executor invokes an action's target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum CallKind {
    Call = 0,
    DelegateCall = 1,
}

impl CallKind {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CallKind::Call),
            1 => Some(CallKind::DelegateCall),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "Call" | "call" => Some(CallKind::Call),
            "Delegatecall" | "DelegateCall" | "delegatecall" => Some(CallKind::DelegateCall),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for CallKind {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        numeric::enum_repr(d, "call kind", CallKind::from_name, CallKind::from_u8)
    }
}

/// Whether an action passes data to / receives data from its neighbours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum DataFlow {
    None = 0,
    In = 1,
    Out = 2,
    InAndOut = 3,
}

impl DataFlow {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(DataFlow::None),
            1 => Some(DataFlow::In),
            2 => Some(DataFlow::Out),
            3 => Some(DataFlow::InAndOut),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "None" => Some(DataFlow::None),
            "In" => Some(DataFlow::In),
            "Out" => Some(DataFlow::Out),
            "InAndOut" => Some(DataFlow::InAndOut),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for DataFlow {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        numeric::enum_repr(d, "data flow", DataFlow::from_name, DataFlow::from_u8)
    }
}

/// Lifecycle status as observed on the index. Transitions are externally driven.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "awaitingExec")]
    AwaitingExecution,
    #[serde(rename = "execSuccess")]
    ExecutionSucceeded,
    #[serde(rename = "execReverted")]
    ExecutionReverted,
    #[serde(rename = "canceled")]
    Canceled,
    #[serde(rename = "expired")]
    Expired,
}

impl TaskStatus {
    /// Only a task still waiting for execution counts as active.
    pub const fn is_active(self) -> bool {
        matches!(self, TaskStatus::AwaitingExecution)
    }
}

/// Payload schema a decoded task was validated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TaskSchema {
    /// Time condition `(uint256)` + withdraw action
    /// `(address,address,uint256[],bytes32,bytes32,address,address)`.
    V1,
}

impl TaskSchema {
    pub const CURRENT: TaskSchema = TaskSchema::V1;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub addr: Address,
    pub module: Address,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "inst")]
    pub instrument: Address,
    pub data: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "addr")]
    pub target: Address,
    pub data: Bytes,
    pub operation: CallKind,
    pub data_flow: DataFlow,
    #[serde(deserialize_with = "numeric::u256")]
    pub value: U256,
    pub terms_ok_check: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(deserialize_with = "numeric::u256")]
    pub self_provider_gas_limit: U256,
    #[serde(deserialize_with = "numeric::u256")]
    pub self_provider_gas_price_ceil: U256,
}

/// The automation network's receipt for a submitted task. Passed back verbatim to cancel it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    #[serde(deserialize_with = "numeric::u256")]
    pub id: U256,
    #[serde(rename = "userProxy")]
    pub proxy_address: Address,
    pub provider: Provider,
    #[serde(deserialize_with = "numeric::u256")]
    pub index: U256,
    pub tasks: Vec<Task>,
    /// Zero means the task never expires.
    #[serde(rename = "expiryDate", deserialize_with = "numeric::u256")]
    pub expiry: U256,
    #[serde(deserialize_with = "numeric::u256")]
    pub cycle_id: U256,
    #[serde(deserialize_with = "numeric::u256")]
    pub submissions_left: U256,
}

impl ScheduledTask {
    /// Conditions of the task currently in cycle (the first one).
    pub fn conditions(&self) -> &[Condition] {
        self.tasks.first().map(|t| t.conditions.as_slice()).unwrap_or_default()
    }

    /// Actions of the task currently in cycle (the first one).
    pub fn actions(&self) -> &[Action] {
        self.tasks.first().map(|t| t.actions.as_slice()).unwrap_or_default()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReceiptWrapper {
    #[serde(rename = "taskReceipt")]
    pub task: ScheduledTask,
    pub submission_hash: B256,
    pub status: TaskStatus,
    #[serde(deserialize_with = "numeric::u64")]
    pub submission_date: u64,
    #[serde(default, deserialize_with = "numeric::opt_u64")]
    pub execution_date: Option<u64>,
    #[serde(default, deserialize_with = "numeric::opt_b256")]
    pub execution_hash: Option<B256>,
    #[serde(default)]
    pub self_provided: bool,
}

impl TaskReceiptWrapper {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Arguments of the withdraw-liquidity action, in call order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WithdrawParams {
    pub conditional_tokens: Address,
    pub market: Address,
    pub position_ids: Vec<U256>,
    pub condition_id: B256,
    pub parent_collection_id: B256,
    pub collateral: Address,
    pub receiver: Address,
}
