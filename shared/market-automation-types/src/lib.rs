//! Shared data model for scheduled liquidity withdrawals and ledger call batches.
//!
//! These types are consumed both by the batch orchestrator and by anything that reads the
//! automation index, so they carry no I/O and deserialize straight from the index's JSON.

pub mod calls;
pub mod intent;
mod numeric;
pub mod task;

pub use calls::{AtomicCall, Batch};
pub use intent::{ScheduleIntent, DEFAULT_LEAD_DAYS};
pub use task::{
    Action, CallKind, Condition, DataFlow, Provider, ScheduledTask, Task, TaskReceiptWrapper,
    TaskSchema, TaskStatus, WithdrawParams,
};
