// ── SNMPv3 User-based Security Model ──
//
// Key localization (RFC 3414 A.2), HMAC-SHA authentication, AES-128-CFB
// privacy (RFC 3826), and the v3 message framing (RFC 3412). The same
// passphrase feeds both the authentication and the privacy key.

use aes::Aes128;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::Error;

use super::ber::{self, Reader, tag};
use super::pdu::Pdu;

const VERSION_3: i64 = 3;
const SECURITY_MODEL_USM: i64 = 3;
const MAX_MESSAGE_SIZE: i64 = 65_507;
const KEY_EXPANSION_BYTES: usize = 1_048_576;

pub(crate) const FLAG_AUTH: u8 = 0x01;
pub(crate) const FLAG_PRIV: u8 = 0x02;
pub(crate) const FLAG_REPORTABLE: u8 = 0x04;

/// usmStatsNotInTimeWindows.0
pub(crate) const NOT_IN_TIME_WINDOW: &str = "1.3.6.1.6.3.15.1.1.2.0";

type Aes128CfbEnc = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

/// USM authentication digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProtocol {
    /// usmHMACSHAAuthProtocol (HMAC-SHA-96).
    #[default]
    #[serde(rename = "sha", alias = "sha1")]
    Sha1,
    /// usmHMAC192SHA256AuthProtocol.
    Sha256,
}

impl AuthProtocol {
    /// Length of msgAuthenticationParameters on the wire.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Sha1 => 12,
            Self::Sha256 => 24,
        }
    }

    /// Expand a passphrase into a master key.
    pub fn password_to_key(self, password: &[u8]) -> Result<Vec<u8>, Error> {
        if password.is_empty() {
            return Err(Error::Authentication {
                message: "SNMPv3 passphrase is empty".into(),
            });
        }
        Ok(match self {
            Self::Sha1 => expand::<Sha1>(password),
            Self::Sha256 => expand::<Sha256>(password),
        })
    }

    /// Bind a master key to one authoritative engine.
    pub fn localize(self, master: &[u8], engine_id: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => localize::<Sha1>(master, engine_id),
            Self::Sha256 => localize::<Sha256>(master, engine_id),
        }
    }

    /// Truncated HMAC over a whole message.
    pub(crate) fn sign(self, key: &[u8], message: &[u8]) -> Result<Vec<u8>, Error> {
        let invalid = |_| Error::protocol("invalid HMAC key length");
        let mut digest = match self {
            Self::Sha1 => {
                let mut mac = Hmac::<Sha1>::new_from_slice(key).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
            Self::Sha256 => {
                let mut mac = Hmac::<Sha256>::new_from_slice(key).map_err(invalid)?;
                mac.update(message);
                mac.finalize().into_bytes().to_vec()
            }
        };
        digest.truncate(self.mac_len());
        Ok(digest)
    }
}

fn expand<D: Digest>(password: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    let mut block = [0u8; 64];
    let mut index = 0usize;
    for _ in 0..KEY_EXPANSION_BYTES / block.len() {
        for byte in &mut block {
            *byte = password[index % password.len()];
            index += 1;
        }
        hasher.update(block);
    }
    hasher.finalize().to_vec()
}

fn localize<D: Digest>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master);
    hasher.update(engine_id);
    hasher.update(master);
    hasher.finalize().to_vec()
}

// ── Localized keys ──────────────────────────────────────────────────

/// Keys derived for one (user, engine) pair.
#[derive(Clone)]
pub(crate) struct LocalizedKeys {
    pub protocol: AuthProtocol,
    pub auth: Vec<u8>,
    pub privacy: [u8; 16],
}

impl std::fmt::Debug for LocalizedKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKeys")
            .field("protocol", &self.protocol)
            .finish_non_exhaustive()
    }
}

impl LocalizedKeys {
    pub(crate) fn derive(
        protocol: AuthProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Result<Self, Error> {
        let master = protocol.password_to_key(password)?;
        let auth = protocol.localize(&master, engine_id);
        let mut privacy = [0u8; 16];
        privacy.copy_from_slice(&auth[..16]);
        Ok(Self {
            protocol,
            auth,
            privacy,
        })
    }
}

fn aes_iv(boots: u32, time: u32, salt: &[u8]) -> Result<[u8; 16], Error> {
    if salt.len() != 8 {
        return Err(Error::protocol(format!(
            "AES privacy parameters must be 8 bytes, got {}",
            salt.len()
        )));
    }
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&boots.to_be_bytes());
    iv[4..8].copy_from_slice(&time.to_be_bytes());
    iv[8..].copy_from_slice(salt);
    Ok(iv)
}

pub(crate) fn encrypt(
    key: &[u8; 16],
    boots: u32,
    time: u32,
    salt: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, Error> {
    let iv = aes_iv(boots, time, salt)?;
    let mut buf = plaintext.to_vec();
    Aes128CfbEnc::new_from_slices(key, &iv)
        .map_err(|_| Error::protocol("invalid AES key or IV length"))?
        .encrypt(&mut buf);
    Ok(buf)
}

pub(crate) fn decrypt(
    key: &[u8; 16],
    boots: u32,
    time: u32,
    salt: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let iv = aes_iv(boots, time, salt)?;
    let mut buf = ciphertext.to_vec();
    Aes128CfbDec::new_from_slices(key, &iv)
        .map_err(|_| Error::protocol("invalid AES key or IV length"))?
        .decrypt(&mut buf);
    Ok(buf)
}

// ── Message framing ─────────────────────────────────────────────────

/// UsmSecurityParameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SecurityParams {
    pub engine_id: Vec<u8>,
    pub boots: u32,
    pub time: u32,
    pub user_name: Vec<u8>,
    pub auth_params: Vec<u8>,
    pub priv_params: Vec<u8>,
}

/// Body of a v3 message: cleartext scoped PDU or its encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScopedBody {
    Plain(Pdu),
    Encrypted(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct V3Message {
    pub msg_id: i32,
    pub flags: u8,
    pub security: SecurityParams,
    pub context_engine_id: Vec<u8>,
    pub body: ScopedBody,
}

/// Encode a scoped PDU (contextEngineID, contextName, PDU).
pub(crate) fn encode_scoped_pdu(context_engine_id: &[u8], pdu: &Pdu) -> Vec<u8> {
    let mut out = Vec::new();
    ber::encode_constructed(&mut out, tag::SEQUENCE, |scoped| {
        ber::encode_octets(scoped, context_engine_id);
        ber::encode_octets(scoped, b"");
        pdu.encode(scoped);
    });
    out
}

pub(crate) fn decode_scoped_pdu(bytes: &[u8]) -> Result<(Vec<u8>, Pdu), Error> {
    let mut outer = Reader::new(bytes);
    let mut scoped = outer.expect(tag::SEQUENCE)?;
    let context_engine_id = scoped.read_octets()?.to_vec();
    let _context_name = scoped.read_octets()?;
    let pdu = Pdu::decode(&mut scoped)?;
    Ok((context_engine_id, pdu))
}

impl V3Message {
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        ber::encode_constructed(&mut out, tag::SEQUENCE, |msg| {
            ber::encode_integer(msg, tag::INTEGER, VERSION_3);
            ber::encode_constructed(msg, tag::SEQUENCE, |global| {
                ber::encode_integer(global, tag::INTEGER, i64::from(self.msg_id));
                ber::encode_integer(global, tag::INTEGER, MAX_MESSAGE_SIZE);
                ber::encode_octets(global, &[self.flags]);
                ber::encode_integer(global, tag::INTEGER, SECURITY_MODEL_USM);
            });
            let mut params = Vec::new();
            ber::encode_constructed(&mut params, tag::SEQUENCE, |usm| {
                let s = &self.security;
                ber::encode_octets(usm, &s.engine_id);
                ber::encode_integer(usm, tag::INTEGER, i64::from(s.boots));
                ber::encode_integer(usm, tag::INTEGER, i64::from(s.time));
                ber::encode_octets(usm, &s.user_name);
                ber::encode_octets(usm, &s.auth_params);
                ber::encode_octets(usm, &s.priv_params);
            });
            ber::encode_octets(msg, &params);
            match &self.body {
                ScopedBody::Plain(pdu) => {
                    msg.extend_from_slice(&encode_scoped_pdu(&self.context_engine_id, pdu));
                }
                ScopedBody::Encrypted(bytes) => ber::encode_octets(msg, bytes),
            }
        });
        out
    }

    /// Decode a v3 datagram. Also returns the absolute byte range of
    /// msgAuthenticationParameters for signature verification.
    pub(crate) fn decode(datagram: &[u8]) -> Result<(Self, std::ops::Range<usize>), Error> {
        let mut outer = Reader::new(datagram);
        let mut msg = outer.expect(tag::SEQUENCE)?;
        let version = msg.read_integer()?;
        if version != VERSION_3 {
            return Err(Error::protocol(format!(
                "expected SNMPv3 message, got version field {version}"
            )));
        }
        let mut global = msg.expect(tag::SEQUENCE)?;
        let msg_id = i32::try_from(global.read_integer()?)
            .map_err(|_| Error::protocol("msgID out of range"))?;
        let _max_size = global.read_integer()?;
        let flags = global.read_octets()?.first().copied().unwrap_or(0);
        let model = global.read_integer()?;
        if model != SECURITY_MODEL_USM {
            return Err(Error::protocol(format!("unsupported security model {model}")));
        }

        let mut params_reader = msg.expect(tag::OCTET_STRING)?;
        let mut usm = params_reader.expect(tag::SEQUENCE)?;
        let engine_id = usm.read_octets()?.to_vec();
        let boots = read_u32(&mut usm)?;
        let time = read_u32(&mut usm)?;
        let user_name = usm.read_octets()?.to_vec();
        let auth_reader = usm.expect(tag::OCTET_STRING)?;
        let auth_range = auth_reader.range();
        let auth_params = auth_reader.bytes().to_vec();
        let priv_params = usm.read_octets()?.to_vec();

        let (context_engine_id, body) = if msg.peek_tag()? == tag::OCTET_STRING {
            (Vec::new(), ScopedBody::Encrypted(msg.read_octets()?.to_vec()))
        } else {
            let mut scoped = msg.expect(tag::SEQUENCE)?;
            let ctx = scoped.read_octets()?.to_vec();
            let _context_name = scoped.read_octets()?;
            (ctx, ScopedBody::Plain(Pdu::decode(&mut scoped)?))
        };

        Ok((
            Self {
                msg_id,
                flags,
                security: SecurityParams {
                    engine_id,
                    boots,
                    time,
                    user_name,
                    auth_params,
                    priv_params,
                },
                context_engine_id,
                body,
            },
            auth_range,
        ))
    }
}

fn read_u32(reader: &mut Reader<'_>) -> Result<u32, Error> {
    let value = reader.read_integer()?;
    u32::try_from(value).map_err(|_| Error::protocol(format!("USM counter out of range: {value}")))
}

/// Sign an encoded message whose auth parameters are zero-filled.
pub(crate) fn sign_in_place(keys: &LocalizedKeys, message: &mut [u8]) -> Result<(), Error> {
    let (_, range) = V3Message::decode(message)?;
    if range.len() != keys.protocol.mac_len() {
        return Err(Error::protocol("authentication placeholder has wrong length"));
    }
    let mac = keys.protocol.sign(&keys.auth, message)?;
    message[range].copy_from_slice(&mac);
    Ok(())
}

/// Verify the HMAC of a received message.
pub(crate) fn verify(
    keys: &LocalizedKeys,
    datagram: &[u8],
    auth_range: std::ops::Range<usize>,
) -> Result<(), Error> {
    let received = datagram[auth_range.clone()].to_vec();
    let mut zeroed = datagram.to_vec();
    zeroed[auth_range].fill(0);
    let expected = keys.protocol.sign(&keys.auth, &zeroed)?;
    if received != expected {
        return Err(Error::Authentication {
            message: "SNMPv3 response failed HMAC verification".into(),
        });
    }
    Ok(())
}
