// SNMP PDUs, variable bindings, and the community (v2c) message wrapper.

use crate::error::Error;

use super::ber::{self, Reader, tag};
use super::oid::Oid;

const VERSION_2C: i64 = 1;

// ── Value ───────────────────────────────────────────────────────────

/// A decoded variable-binding value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// `true` for the v2 exception markers and NULL.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }

    /// Numeric view. Octet strings holding decimal text are accepted,
    /// since several vendors report gauges as `"23"`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Counter32(v) | Self::Gauge32(v) | Self::TimeTicks(v) => Some(i64::from(*v)),
            Self::Counter64(v) => i64::try_from(*v).ok(),
            Self::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Counter64(v) => Some(*v),
            other => other.as_i64().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Floating-point view, accepting `"41.5"`-style octet strings.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::OctetString(bytes) => std::str::from_utf8(bytes).ok()?.trim().parse().ok(),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    /// Textual view with trailing NULs and whitespace removed.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::OctetString(bytes) | Self::Opaque(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                Some(text.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_owned())
            }
            Self::ObjectId(oid) => Some(oid.to_string()),
            Self::IpAddress(ip) => Some(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
            other if other.is_absent() => None,
            other => other.as_i64().map(|v| v.to_string()),
        }
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Integer(v) => ber::encode_integer(out, tag::INTEGER, *v),
            Self::OctetString(bytes) => ber::encode_octets(out, bytes),
            Self::Null => ber::encode_null(out),
            Self::ObjectId(oid) => ber::encode_oid(out, oid),
            Self::IpAddress(ip) => ber::encode_tlv(out, tag::IP_ADDRESS, ip),
            Self::Counter32(v) => ber::encode_unsigned(out, tag::COUNTER32, u64::from(*v)),
            Self::Gauge32(v) => ber::encode_unsigned(out, tag::GAUGE32, u64::from(*v)),
            Self::TimeTicks(v) => ber::encode_unsigned(out, tag::TIMETICKS, u64::from(*v)),
            Self::Opaque(bytes) => ber::encode_tlv(out, tag::OPAQUE, bytes),
            Self::Counter64(v) => ber::encode_unsigned(out, tag::COUNTER64, *v),
            Self::NoSuchObject => ber::encode_tlv(out, tag::NO_SUCH_OBJECT, &[]),
            Self::NoSuchInstance => ber::encode_tlv(out, tag::NO_SUCH_INSTANCE, &[]),
            Self::EndOfMibView => ber::encode_tlv(out, tag::END_OF_MIB_VIEW, &[]),
        }
    }

    fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let (t, inner) = reader.read_tlv()?;
        let bytes = inner.bytes();
        let narrow = |v: u64| {
            u32::try_from(v).map_err(|_| Error::protocol(format!("32-bit value overflow: {v}")))
        };
        Ok(match t {
            tag::INTEGER => Self::Integer(ber::decode_integer(bytes)?),
            tag::OCTET_STRING => Self::OctetString(bytes.to_vec()),
            tag::NULL => Self::Null,
            tag::OBJECT_ID => Self::ObjectId(ber::decode_oid(bytes)?),
            tag::IP_ADDRESS => Self::IpAddress(
                bytes
                    .try_into()
                    .map_err(|_| Error::protocol("IpAddress must be 4 bytes"))?,
            ),
            tag::COUNTER32 => Self::Counter32(narrow(ber::decode_unsigned(bytes)?)?),
            tag::GAUGE32 => Self::Gauge32(narrow(ber::decode_unsigned(bytes)?)?),
            tag::TIMETICKS => Self::TimeTicks(narrow(ber::decode_unsigned(bytes)?)?),
            tag::OPAQUE => Self::Opaque(bytes.to_vec()),
            tag::COUNTER64 => Self::Counter64(ber::decode_unsigned(bytes)?),
            tag::NO_SUCH_OBJECT => Self::NoSuchObject,
            tag::NO_SUCH_INSTANCE => Self::NoSuchInstance,
            tag::END_OF_MIB_VIEW => Self::EndOfMibView,
            other => {
                return Err(Error::protocol(format!(
                    "unsupported value tag 0x{other:02x}"
                )));
            }
        })
    }
}

// ── VarBind ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: Value,
}

impl VarBind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }

    /// A request binding with a NULL value.
    pub fn null(oid: Oid) -> Self {
        Self::new(oid, Value::Null)
    }
}

// ── PDU ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    Get,
    GetNext,
    Response,
    Set,
    Report,
}

impl PduType {
    fn tag(self) -> u8 {
        match self {
            Self::Get => tag::GET_REQUEST,
            Self::GetNext => tag::GET_NEXT_REQUEST,
            Self::Response => tag::RESPONSE,
            Self::Set => tag::SET_REQUEST,
            Self::Report => tag::REPORT,
        }
    }

    fn from_tag(t: u8) -> Result<Self, Error> {
        Ok(match t {
            tag::GET_REQUEST => Self::Get,
            tag::GET_NEXT_REQUEST => Self::GetNext,
            tag::RESPONSE => Self::Response,
            tag::SET_REQUEST => Self::Set,
            tag::REPORT => Self::Report,
            other => return Err(Error::protocol(format!("unsupported PDU tag 0x{other:02x}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    pub fn request(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: 0,
            error_index: 0,
            varbinds,
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        ber::encode_constructed(out, self.pdu_type.tag(), |body| {
            ber::encode_integer(body, tag::INTEGER, i64::from(self.request_id));
            ber::encode_integer(body, tag::INTEGER, self.error_status);
            ber::encode_integer(body, tag::INTEGER, self.error_index);
            ber::encode_constructed(body, tag::SEQUENCE, |list| {
                for vb in &self.varbinds {
                    ber::encode_constructed(list, tag::SEQUENCE, |seq| {
                        ber::encode_oid(seq, &vb.oid);
                        vb.value.encode(seq);
                    });
                }
            });
        });
    }

    pub(crate) fn decode(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let (t, mut body) = reader.read_tlv()?;
        let pdu_type = PduType::from_tag(t)?;
        let request_id = i32::try_from(body.read_integer()?)
            .map_err(|_| Error::protocol("request-id out of range"))?;
        let error_status = body.read_integer()?;
        let error_index = body.read_integer()?;
        let mut list = body.expect(tag::SEQUENCE)?;
        let mut varbinds = Vec::new();
        while !list.is_empty() {
            let mut seq = list.expect(tag::SEQUENCE)?;
            let oid = seq.read_oid()?;
            let value = Value::decode(&mut seq)?;
            varbinds.push(VarBind { oid, value });
        }
        Ok(Self {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

// ── Community message (v2c) ─────────────────────────────────────────

pub(crate) fn encode_community(community: &[u8], pdu: &Pdu) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + pdu.varbinds.len() * 24);
    ber::encode_constructed(&mut out, tag::SEQUENCE, |msg| {
        ber::encode_integer(msg, tag::INTEGER, VERSION_2C);
        ber::encode_octets(msg, community);
        pdu.encode(msg);
    });
    out
}

pub(crate) fn decode_community(datagram: &[u8]) -> Result<Pdu, Error> {
    let mut outer = Reader::new(datagram);
    let mut msg = outer.expect(tag::SEQUENCE)?;
    let version = msg.read_integer()?;
    if version != VERSION_2C {
        return Err(Error::protocol(format!(
            "expected SNMPv2c message, got version field {version}"
        )));
    }
    let _community = msg.read_octets()?;
    Pdu::decode(&mut msg)
}
