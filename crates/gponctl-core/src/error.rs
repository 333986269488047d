// ── Core error types ──
//
// Domain errors from gponctl-core. Consumers never see SNMP error-status
// codes or HTTP bodies directly; the `From<gponctl_api::Error>` impl folds
// transport failures into the engine's taxonomy.

use thiserror::Error;

use crate::model::{AlarmId, OltId};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    /// The device did not respond. Retried next cycle.
    #[error("Device unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Device authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Malformed or unexpected reply. The OLT's cycle is aborted.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Unit enumeration aborted mid-walk; the whole list was discarded.
    #[error("Unit list aborted after {fetched} entries: {reason}")]
    PartialListFailure { fetched: usize, reason: String },

    #[error("Operation rejected by device: {message}")]
    Rejected { message: String },

    #[error("{operation} is not supported over {method}")]
    Unsupported { operation: String, method: String },

    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Store errors ─────────────────────────────────────────────────
    /// Transaction or commit failure; nothing was applied.
    #[error("Inventory write failed: {message}")]
    StoreWriteFailure { message: String },

    /// Reconciliation for one OLT rolled back.
    #[error("Sync failed for OLT {olt_id}: {cause}")]
    SyncFailed {
        olt_id: OltId,
        #[source]
        cause: Box<CoreError>,
    },

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("OLT not found: {id}")]
    OltNotFound { id: OltId },

    #[error("ONU not found: {identifier}")]
    UnitNotFound { identifier: String },

    #[error("Alarm not found: {id}")]
    AlarmNotFound { id: AlarmId },

    // ── Operation errors ─────────────────────────────────────────────
    /// Serial or position already taken.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Credential decryption failed: {message}")]
    Crypto { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures the next cycle may not repeat.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. }
                | Self::Timeout { .. }
                | Self::PartialListFailure { .. }
                | Self::StoreWriteFailure { .. }
                | Self::SyncFailed { .. }
        )
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        Self::StoreWriteFailure {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<gponctl_api::Error> for CoreError {
    fn from(err: gponctl_api::Error) -> Self {
        use gponctl_api::Error as Api;

        if err.is_unreachable() {
            return match err {
                Api::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
                other => CoreError::Unreachable {
                    reason: other.to_string(),
                },
            };
        }
        match err {
            Api::Authentication { message } => CoreError::AuthenticationFailed { message },
            Api::PartialList { fetched, reason } => CoreError::PartialListFailure { fetched, reason },
            Api::Rejected { message } => CoreError::Rejected { message },
            Api::Unsupported(operation) => CoreError::Unsupported {
                operation: operation.to_owned(),
                method: "this transport".into(),
            },
            Api::Http { status, message } => CoreError::Protocol {
                message: format!("HTTP {status}: {message}"),
            },
            Api::Deserialization { message, .. } => CoreError::Protocol { message },
            other => CoreError::Protocol {
                message: other.to_string(),
            },
        }
    }
}
