use thiserror::Error;

/// Top-level error type for the `gponctl-api` crate.
///
/// Covers every failure mode across all device transports:
/// UDP/SNMP, SSH-CLI, and the vendor REST API.
/// `gponctl-core` maps these into the engine's error taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Reachability ────────────────────────────────────────────────
    /// The device did not answer (connection refused, no route, no reply).
    #[error("Device {address} unreachable: {reason}")]
    Unreachable { address: String, reason: String },

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Authentication ──────────────────────────────────────────────
    /// Login or USM authentication failed.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// The device answered with something that could not be interpreted.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A table walk failed after some rows were already read.
    #[error("Unit enumeration aborted after {fetched} entries: {reason}")]
    PartialList { fetched: usize, reason: String },

    /// The device understood the request and refused it.
    #[error("Device rejected the operation: {message}")]
    Rejected { message: String },

    // ── SNMP ────────────────────────────────────────────────────────
    /// Non-zero error-status in a response PDU.
    #[error("SNMP error-status {status} at index {index}")]
    SnmpStatus { status: i64, index: i64 },

    // ── HTTP ────────────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Non-2xx answer from the vendor REST API.
    #[error("REST API error (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    // ── SSH ─────────────────────────────────────────────────────────
    /// libssh2 session failure.
    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// Socket-level I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Capability ──────────────────────────────────────────────────
    /// The transport has no way to perform this operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),
}

impl Error {
    /// Returns `true` if the device could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Unreachable { .. } | Self::Timeout { .. } => true,
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::HostUnreachable
                    | std::io::ErrorKind::NetworkUnreachable
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying next cycle.
    pub fn is_transient(&self) -> bool {
        self.is_unreachable() || matches!(self, Self::PartialList { .. })
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_unreachable_and_transient() {
        let err = Error::Timeout { timeout_secs: 5 };
        assert!(err.is_unreachable());
        assert!(err.is_transient());
    }

    #[test]
    fn partial_list_is_transient_but_reachable() {
        let err = Error::PartialList {
            fetched: 2,
            reason: "no response".into(),
        };
        assert!(!err.is_unreachable());
        assert!(err.is_transient());
    }

    #[test]
    fn rejection_is_final() {
        let err = Error::Rejected {
            message: "onu exists".into(),
        };
        assert!(!err.is_transient());
    }
}
