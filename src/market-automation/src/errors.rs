use thiserror::Error;

/// Result type alias for automation and batch operations.
pub type Result<T> = std::result::Result<T, AutomationError>;

#[derive(Debug, Error)]
pub enum AutomationError {
    /// A named contract was absent from a registry lookup. Fatal to batch construction.
    #[error("address not found in registry: {0}")]
    AddressNotFound(String),

    /// Automation was requested without a resolved trigger date.
    #[error("scheduled withdrawal requested without a trigger date")]
    MissingTriggerDate,

    /// The trigger instant cannot be represented as an unsigned epoch timestamp.
    #[error("trigger timestamp {0} is before the unix epoch")]
    TriggerOutOfRange(i64),

    /// A stored payload does not parse against the expected schema.
    #[error("cannot decode {what}: {reason}")]
    DecodeMismatch { what: &'static str, reason: String },

    /// The task index could not be queried or answered with errors.
    #[error("task index unavailable: {0}")]
    IndexUnavailable(String),

    /// A ledger pre-check read failed.
    #[error("ledger read failed: {0}")]
    LedgerRead(String),

    /// A submitted batch reverted or could not be dispatched.
    #[error("ledger rejected batch: {0}")]
    LedgerRejected(String),

    /// The collaborator does not support this read.
    #[error("not implemented by this ledger provider: {0}")]
    NotImplemented(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl AutomationError {
    pub(crate) fn decode(what: &'static str, reason: impl ToString) -> Self {
        AutomationError::DecodeMismatch {
            what,
            reason: reason.to_string(),
        }
    }
}
