//! Atomic transaction batches for prediction-market operations, with an optional scheduled
//! liquidity withdrawal registered on an external automation network.
//!
//! `TransactionBatchBuilder` is the entry point. It composes each operation from ledger
//! pre-checks, uses `TaskCodec` and `AddressRegistry` for the automation steps, and asks a
//! `TaskLookup` (normally `TaskDiscoveryClient`) whether a task is already active.

pub mod abi;
pub mod batch;
pub mod codec;
pub mod conditional;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod index;
pub mod ledger;
pub mod networks;
pub mod registry;
pub mod rpc;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
#[cfg(test)]
mod tests;

pub use market_automation_types as types;

pub use batch::TransactionBatchBuilder;
pub use codec::{DecodedTask, SubmitTaskParams, TaskCodec};
pub use config::{MarketContracts, Session};
pub use discovery::{
    DiscoveredTask, DiscoveryKey, DiscoverySnapshot, DiscoveryStatus, TaskDiscoveryClient,
    TaskLookup,
};
pub use errors::{AutomationError, Result};
pub use index::{GraphTaskIndex, TaskIndex};
pub use ledger::{BatchExecutor, LedgerReader, TxReceipt};
pub use networks::NetworkConfig;
pub use registry::{AddressRegistry, ContractName};
pub use rpc::RpcLedger;
