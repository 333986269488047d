// Per-call device addressing and credentials.
//
// Adapters are stateless: every call receives the full `DeviceTarget`
// with already-decrypted secrets. Secrets stay wrapped in `SecretString`
// so `Debug` output and tracing fields never reveal them.

use secrecy::SecretString;
use url::Url;

use crate::error::Error;
use crate::snmp::AuthProtocol;

/// Default vendor REST API port when no explicit endpoint is configured.
pub const DEFAULT_REST_PORT: u16 = 1661;

/// Everything an adapter needs to talk to one OLT.
#[derive(Debug, Clone)]
pub struct DeviceTarget {
    /// IP address or hostname.
    pub address: String,
    pub snmp: SnmpCredentials,
    pub ssh: SshCredentials,
    pub rest: RestCredentials,
}

impl DeviceTarget {
    /// Target with protocol defaults (v2c `public`, SSH `admin`, REST on port 1661).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            snmp: SnmpCredentials::default(),
            ssh: SshCredentials::default(),
            rest: RestCredentials::default(),
        }
    }
}

// ── SNMP ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnmpVersion {
    #[default]
    V2c,
    V3,
}

#[derive(Debug, Clone)]
pub struct SnmpCredentials {
    pub version: SnmpVersion,
    pub port: u16,
    /// v2c community string.
    pub community: SecretString,
    /// v3 USM user name.
    pub username: Option<String>,
    /// v3 passphrase, used for both authentication and privacy keys.
    pub password: Option<SecretString>,
    pub auth_protocol: AuthProtocol,
}

impl Default for SnmpCredentials {
    fn default() -> Self {
        Self {
            version: SnmpVersion::V2c,
            port: 161,
            community: SecretString::from("public"),
            username: None,
            password: None,
            auth_protocol: AuthProtocol::Sha1,
        }
    }
}

// ── SSH ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SshCredentials {
    pub port: u16,
    pub username: String,
    pub password: Option<SecretString>,
}

impl Default for SshCredentials {
    fn default() -> Self {
        Self {
            port: 22,
            username: "admin".into(),
            password: None,
        }
    }
}

// ── REST ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RestCredentials {
    /// Explicit API base URL; defaults to `http://{address}:1661`.
    pub endpoint: Option<String>,
    pub username: Option<String>,
    pub password: Option<SecretString>,
}

impl RestCredentials {
    /// Resolve the base URL for `address`, trimming any trailing slash.
    pub fn base_url(&self, address: &str) -> Result<Url, Error> {
        let raw = match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_owned(),
            _ => format!("http://{address}:{DEFAULT_REST_PORT}"),
        };
        Ok(Url::parse(&raw)?)
    }
}
