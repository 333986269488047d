// ── PPPoE account types ──

use argon2::Argon2;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::{PppoeAccountId, UnitId};
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PppoeStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

/// Credentials pushed to an ONU. The password is only ever held as a secret.
#[derive(Debug, Clone)]
pub struct PppoeCredentials {
    pub username: String,
    pub password: SecretString,
    pub service_name: Option<String>,
    pub vlan_id: Option<u16>,
}

/// Stored account, 1:1 with an ONU row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PppoeAccount {
    pub id: PppoeAccountId,
    pub unit_id: UnitId,
    pub username: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub status: PppoeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account write; the store keeps one account per unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PppoeAccountWrite {
    pub unit_id: UnitId,
    pub username: String,
    pub password_hash: String,
    pub service_name: Option<String>,
    pub vlan_id: Option<u16>,
    pub at: DateTime<Utc>,
}

impl PppoeAccountWrite {
    pub fn from_credentials(
        unit_id: UnitId,
        credentials: &PppoeCredentials,
        at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            unit_id,
            username: credentials.username.clone(),
            password_hash: hash_password(&credentials.password)?,
            service_name: credentials.service_name.clone(),
            vlan_id: credentials.vlan_id,
            at,
        })
    }
}

/// Hash a PPPoE password with Argon2id and a random salt.
pub fn hash_password(password: &SecretString) -> Result<String, CoreError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.expose_secret().as_bytes(), &salt)
        .map_err(|e| CoreError::Crypto {
            message: format!("password hashing failed: {e}"),
        })?;
    Ok(hash.to_string())
}

/// Check `password` against a value produced by [`hash_password`].
/// Anything that is not a valid PHC string never matches.
pub fn verify_password(password: &SecretString, stored: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.expose_secret().as_bytes(), &parsed)
        .is_ok()
}
