//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use gponctl_config::ConfigError;
use gponctl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const UNSUPPORTED: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Device ───────────────────────────────────────────────────────
    #[error("Device unreachable: {reason}")]
    #[diagnostic(
        code(gponctl::unreachable),
        help(
            "Check that the OLT is powered and reachable from this host.\n\
             The next poll cycle retries automatically."
        )
    )]
    Unreachable { reason: String },

    #[error("Device authentication failed: {message}")]
    #[diagnostic(
        code(gponctl::auth_failed),
        help(
            "Verify the OLT's SNMP community / v3 user, SSH or REST credentials.\n\
             Stored secrets are decrypted with the key from GPONCTL_ENCRYPTION_KEY or the keyring."
        )
    )]
    AuthFailed { message: String },

    #[error("Device rejected the operation: {message}")]
    #[diagnostic(code(gponctl::rejected))]
    Rejected { message: String },

    #[error("Unexpected device reply: {message}")]
    #[diagnostic(
        code(gponctl::protocol),
        help("Check the OID table in the [oids] config section for this vendor.")
    )]
    Protocol { message: String },

    #[error("{operation} is not supported over {method}")]
    #[diagnostic(
        code(gponctl::unsupported),
        help("Pick another transport with --method snmp|ssh|rest")
    )]
    Unsupported { operation: String, method: String },

    #[error("Operation timed out after {seconds}s")]
    #[diagnostic(
        code(gponctl::timeout),
        help("Raise engine.task_timeout_secs or the [timeouts] values in the config file.")
    )]
    Timeout { seconds: u64 },

    // ── Inventory ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(gponctl::not_found),
        help("Run: gponctl {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(code(gponctl::conflict))]
    Conflict { message: String },

    #[error("Inventory error: {message}")]
    #[diagnostic(code(gponctl::store))]
    Store { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gponctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(gponctl::config),
        help("Inspect the effective settings with: gponctl config show")
    )]
    Config(#[from] ConfigError),

    #[error("Cannot use stored credentials: {message}")]
    #[diagnostic(
        code(gponctl::crypto),
        help("Set GPONCTL_ENCRYPTION_KEY or run: gponctl config set-key")
    )]
    Crypto { message: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::Unsupported { .. } => exit_code::UNSUPPORTED,
            _ => exit_code::GENERAL,
        }
    }

    pub fn prompt(e: impl std::fmt::Display) -> Self {
        Self::Validation {
            field: "interactive".into(),
            reason: format!("prompt failed: {e}"),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unreachable { reason } => CliError::Unreachable { reason },

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::Protocol { message } => CliError::Protocol { message },

            CoreError::PartialListFailure { fetched, reason } => CliError::Unreachable {
                reason: format!("unit list aborted after {fetched} entries: {reason}"),
            },

            CoreError::Rejected { message } => CliError::Rejected { message },

            CoreError::Unsupported { operation, method } => {
                CliError::Unsupported { operation, method }
            }

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::StoreWriteFailure { message } => CliError::Store { message },

            CoreError::SyncFailed { olt_id, cause } => CliError::Store {
                message: format!("sync for OLT {olt_id} rolled back: {cause}"),
            },

            CoreError::OltNotFound { id } => CliError::NotFound {
                resource_type: "OLT".into(),
                identifier: id.to_string(),
                list_command: "olts list".into(),
            },

            CoreError::UnitNotFound { identifier } => CliError::NotFound {
                resource_type: "ONU".into(),
                identifier,
                list_command: "onus list".into(),
            },

            CoreError::AlarmNotFound { id } => CliError::NotFound {
                resource_type: "alarm".into(),
                identifier: id.to_string(),
                list_command: "alarms list".into(),
            },

            CoreError::Conflict { message } => CliError::Conflict { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Crypto { message } => CliError::Crypto { message },

            CoreError::Config { message } => CliError::Store { message },

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
