//! Decryption of device credentials stored in the inventory.
//!
//! Stored values are `base64(nonce || ciphertext)` under AES-256-GCM with a
//! 96-bit nonce. A value that does not decrypt is taken as plain text, which
//! keeps development inventories with clear-text passwords usable.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::CoreError;
use crate::model::StoredSecret;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// AES-256-GCM cipher for stored credentials.
///
/// Without a key every stored value is used as-is.
#[derive(Clone, Default)]
pub struct SecretCipher {
    cipher: Option<Aes256Gcm>,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher")
            .field("keyed", &self.cipher.is_some())
            .finish()
    }
}

impl SecretCipher {
    /// Build from key material: 32 bytes of base64, or any passphrase
    /// (stretched with SHA-256).
    pub fn new(key: &SecretString) -> Self {
        let material = key.expose_secret().trim();
        let bytes: [u8; 32] = match STANDARD.decode(material) {
            Ok(raw) if raw.len() == 32 => {
                let mut out = [0u8; 32];
                out.copy_from_slice(&raw);
                out
            }
            _ => Sha256::digest(material.as_bytes()).into(),
        };
        Self {
            cipher: Some(Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes))),
        }
    }

    /// A cipher that passes every stored value through.
    pub fn plaintext() -> Self {
        Self::default()
    }

    pub fn is_keyed(&self) -> bool {
        self.cipher.is_some()
    }

    /// Recover a credential. Never fails; see the module docs.
    pub fn reveal(&self, stored: &StoredSecret) -> SecretString {
        let value = stored.stored_value();
        match self.try_decrypt(value) {
            Some(clear) => SecretString::from(clear),
            None => {
                if self.cipher.is_some() {
                    debug!("stored credential is not ciphertext, using it as plain text");
                }
                SecretString::from(value.to_owned())
            }
        }
    }

    fn try_decrypt(&self, value: &str) -> Option<String> {
        let cipher = self.cipher.as_ref()?;
        let raw = STANDARD.decode(value.trim()).ok()?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return None;
        }
        let (nonce, body) = raw.split_at(NONCE_LEN);
        let clear = cipher.decrypt(Nonce::from_slice(nonce), body).ok()?;
        String::from_utf8(clear).ok()
    }

    /// Encrypt a credential for storage.
    pub fn seal(&self, clear: &SecretString) -> Result<StoredSecret, CoreError> {
        let cipher = self.cipher.as_ref().ok_or_else(|| CoreError::Crypto {
            message: "no encryption key configured".into(),
        })?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let body = cipher
            .encrypt(Nonce::from_slice(&nonce), clear.expose_secret().as_bytes())
            .map_err(|e| CoreError::Crypto {
                message: e.to_string(),
            })?;
        let mut out = Vec::with_capacity(NONCE_LEN + body.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&body);
        Ok(StoredSecret::new(STANDARD.encode(out)))
    }
}
