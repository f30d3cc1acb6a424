//! Error types shared by the synchronization engines.

use pos_client::ProviderError;

/// Errors raised by repository calls and engine operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The caller's version of an order is stale, locally or on the provider.
    #[error("order version conflict (expected {expected})")]
    VersionConflict {
        /// Version the caller based its change on.
        expected: i64,
        /// Current version, when known.
        found: Option<i64>,
    },

    /// Input rejected before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced local record does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record (e.g. `retailer`).
        entity: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A provider payload could not be turned into canonical records.
    #[error("mapping failed: {0}")]
    Mapping(String),

    /// A unit of work stopped short; `kind` tells the scheduler what to do.
    #[error("{what} did not complete")]
    Incomplete {
        /// Unit that stopped.
        what: String,
        /// How the scheduler should treat it.
        kind: FailureKind,
    },

    /// Database failure.
    #[error("database error: {0}")]
    Db(#[from] diesel::result::Error),

    /// Infrastructure failure with context (timestamps, configuration...).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SyncError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Wrap a provider error from a versioned order call, surfacing a
    /// provider-side version rejection as [`SyncError::VersionConflict`].
    pub fn from_versioned_call(e: ProviderError, expected: i64) -> Self {
        match e {
            ProviderError::VersionConflict(_) => SyncError::VersionConflict {
                expected,
                found: None,
            },
            other => SyncError::Provider(other),
        }
    }

    /// Classify the failure for retry decisions.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Incomplete { kind, .. } => *kind,
            SyncError::Provider(ProviderError::AuthExpired(_)) => FailureKind::AuthExpired,
            SyncError::Provider(e) if e.is_transient() => FailureKind::Transient,
            SyncError::Db(diesel::result::Error::DatabaseError(_, info))
                if info.message().contains("locked") || info.message().contains("busy") =>
            {
                FailureKind::Transient
            }
            _ => FailureKind::Permanent,
        }
    }
}

/// How a failed unit of work should be treated by its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Retrying later may succeed (timeouts, 5xx, busy database).
    Transient,
    /// The retailer's token was rejected; retrying is pointless until it is refreshed.
    AuthExpired,
    /// Retrying the same input will fail the same way.
    Permanent,
}

impl FailureKind {
    pub fn is_retryable(self) -> bool {
        self == FailureKind::Transient
    }
}

/// Result type used throughout the repository and engines.
pub type SyncResult<T> = Result<T, SyncError>;
