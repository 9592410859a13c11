use thiserror::Error;

/// The typed error surface for every Opossum store operation.
///
/// Every operation either fully succeeds or returns one of these kinds; there
/// is no partial-success variant. See the module docs on [`crate::store_trait::EventStore`]
/// for the propagation policy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Caller bug: empty batch, empty event type, or an invalid store/root name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Optimistic-concurrency conflict raised by the append-condition checker.
    #[error("append condition failed: {0}")]
    AppendConditionFailed(String),

    /// Sub-kind of [`StoreError::AppendConditionFailed`] used specifically for
    /// ledger-level staleness (the caller's `after_sequence_position` baseline
    /// no longer matches the current ledger).
    #[error("concurrency conflict: ledger advanced past position {expected}, now at {actual}")]
    ConcurrencyConflict { expected: u64, actual: u64 },

    /// The cross-process lock could not be acquired within the configured timeout.
    #[error("timed out waiting for lock at {path}")]
    LockTimeout { path: String },

    /// A caller-supplied cancellation token fired before the operation committed.
    #[error("operation cancelled")]
    Cancelled,

    /// An expected event file is missing at a committed position.
    #[error("event not found at position {0}")]
    NotFound(u64),

    /// An event file exists but could not be deserialized.
    #[error("corrupted payload at position {position}: {source}")]
    CorruptedPayload {
        position: u64,
        #[source]
        source: serde_json::Error,
    },

    /// Any other filesystem error not covered by a more specific kind above.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn append_condition_failed(message: impl Into<String>) -> Self {
        Self::AppendConditionFailed(message.into())
    }

    pub fn concurrency_conflict(expected: u64, actual: u64) -> Self {
        Self::ConcurrencyConflict { expected, actual }
    }

    pub fn lock_timeout(path: impl Into<String>) -> Self {
        Self::LockTimeout { path: path.into() }
    }

    pub fn corrupted_payload(position: u64, source: serde_json::Error) -> Self {
        Self::CorruptedPayload { position, source }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;
