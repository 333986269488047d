// BER encoding for the subset of ASN.1 that SNMP uses.
//
// Definite lengths only. The reader keeps absolute offsets into the
// original datagram so USM can locate and zero the authentication
// parameters in place.

use std::ops::Range;

use crate::error::Error;

use super::oid::Oid;

pub(crate) mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_ID: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
    pub const GET_REQUEST: u8 = 0xA0;
    pub const GET_NEXT_REQUEST: u8 = 0xA1;
    pub const RESPONSE: u8 = 0xA2;
    pub const SET_REQUEST: u8 = 0xA3;
    pub const REPORT: u8 = 0xA8;
}

// ── Encoding ────────────────────────────────────────────────────────

pub(crate) fn encode_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(u8::try_from(len).unwrap_or(0));
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | u8::try_from(significant.len()).unwrap_or(0));
    out.extend_from_slice(significant);
}

pub(crate) fn encode_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    encode_length(out, content.len());
    out.extend_from_slice(content);
}

/// Encode a constructed value whose body is produced by `body`.
pub(crate) fn encode_constructed(out: &mut Vec<u8>, tag: u8, body: impl FnOnce(&mut Vec<u8>)) {
    let mut inner = Vec::new();
    body(&mut inner);
    encode_tlv(out, tag, &inner);
}

pub(crate) fn encode_integer(out: &mut Vec<u8>, tag: u8, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Drop redundant sign bytes while keeping the sign bit intact.
    while start < bytes.len() - 1 {
        let (cur, next) = (bytes[start], bytes[start + 1]);
        let redundant = (cur == 0x00 && next & 0x80 == 0) || (cur == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    encode_tlv(out, tag, &bytes[start..]);
}

pub(crate) fn encode_unsigned(out: &mut Vec<u8>, tag: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take(bytes.len() - 1)
        .take_while(|b| **b == 0)
        .count();
    let mut content = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[skip..]);
    encode_tlv(out, tag, &content);
}

pub(crate) fn encode_octets(out: &mut Vec<u8>, bytes: &[u8]) {
    encode_tlv(out, tag::OCTET_STRING, bytes);
}

pub(crate) fn encode_null(out: &mut Vec<u8>) {
    encode_tlv(out, tag::NULL, &[]);
}

pub(crate) fn encode_oid(out: &mut Vec<u8>, oid: &Oid) {
    let arcs = oid.arcs();
    let mut content = Vec::with_capacity(arcs.len() + 4);
    let (first, rest) = match arcs {
        [a, b, rest @ ..] => (a * 40 + b, rest),
        [a] => (a * 40, &[][..]),
        [] => (0, &[][..]),
    };
    push_base128(&mut content, first);
    for arc in rest {
        push_base128(&mut content, *arc);
    }
    encode_tlv(out, tag::OBJECT_ID, &content);
}

fn push_base128(out: &mut Vec<u8>, mut value: u32) {
    let mut stack = [0u8; 5];
    let mut len = 0;
    loop {
        stack[len] = u8::try_from(value & 0x7F).unwrap_or(0);
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(stack[i] | continuation);
    }
}

// ── Decoding ────────────────────────────────────────────────────────

/// Cursor over a BER buffer. Sub-readers share the parent's buffer and
/// report absolute offsets.
#[derive(Debug, Clone)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.pos >= self.end
    }

    /// Remaining bytes of this reader.
    pub(crate) fn bytes(&self) -> &'a [u8] {
        &self.buf[self.pos..self.end]
    }

    /// Absolute range of the remaining bytes.
    pub(crate) fn range(&self) -> Range<usize> {
        self.pos..self.end
    }

    pub(crate) fn peek_tag(&self) -> Result<u8, Error> {
        if self.is_empty() {
            return Err(Error::protocol("unexpected end of BER data"));
        }
        Ok(self.buf[self.pos])
    }

    fn next_byte(&mut self) -> Result<u8, Error> {
        let byte = self.peek_tag()?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read one TLV and return its tag plus a reader over the contents.
    pub(crate) fn read_tlv(&mut self) -> Result<(u8, Reader<'a>), Error> {
        let tag = self.next_byte()?;
        let first = self.next_byte()?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 {
                return Err(Error::protocol("indefinite BER length"));
            }
            if count > 4 {
                return Err(Error::protocol(format!("BER length of {count} bytes")));
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = (len << 8) | usize::from(self.next_byte()?);
            }
            len
        };
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.end)
            .ok_or_else(|| Error::protocol("BER length exceeds buffer"))?;
        self.pos = end;
        Ok((
            tag,
            Reader {
                buf: self.buf,
                pos: start,
                end,
            },
        ))
    }

    pub(crate) fn expect(&mut self, expected: u8) -> Result<Reader<'a>, Error> {
        let (tag, inner) = self.read_tlv()?;
        if tag != expected {
            return Err(Error::protocol(format!(
                "expected BER tag 0x{expected:02x}, found 0x{tag:02x}"
            )));
        }
        Ok(inner)
    }

    pub(crate) fn read_integer(&mut self) -> Result<i64, Error> {
        let inner = self.expect(tag::INTEGER)?;
        decode_integer(inner.bytes())
    }

    pub(crate) fn read_octets(&mut self) -> Result<&'a [u8], Error> {
        Ok(self.expect(tag::OCTET_STRING)?.bytes())
    }

    pub(crate) fn read_oid(&mut self) -> Result<Oid, Error> {
        let inner = self.expect(tag::OBJECT_ID)?;
        decode_oid(inner.bytes())
    }
}

pub(crate) fn decode_integer(bytes: &[u8]) -> Result<i64, Error> {
    if bytes.is_empty() || bytes.len() > 8 {
        return Err(Error::protocol(format!(
            "INTEGER of {} bytes",
            bytes.len()
        )));
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for byte in bytes {
        value = (value << 8) | i64::from(*byte);
    }
    Ok(value)
}

pub(crate) fn decode_unsigned(bytes: &[u8]) -> Result<u64, Error> {
    let trimmed = match bytes {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if trimmed.is_empty() || trimmed.len() > 8 {
        return Err(Error::protocol(format!(
            "unsigned value of {} bytes",
            bytes.len()
        )));
    }
    Ok(trimmed
        .iter()
        .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte)))
}

pub(crate) fn decode_oid(bytes: &[u8]) -> Result<Oid, Error> {
    let mut subids = Vec::with_capacity(bytes.len() + 1);
    let mut current: u32 = 0;
    let mut pending = false;
    for byte in bytes {
        if current > (u32::MAX >> 7) {
            return Err(Error::protocol("OID arc overflow"));
        }
        current = (current << 7) | u32::from(byte & 0x7F);
        pending = true;
        if byte & 0x80 == 0 {
            subids.push(current);
            current = 0;
            pending = false;
        }
    }
    if pending || subids.is_empty() {
        return Err(Error::protocol("truncated OID"));
    }
    let first = subids.remove(0);
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = Vec::with_capacity(subids.len() + 2);
    arcs.push(a);
    arcs.push(b);
    arcs.extend(subids);
    Ok(Oid::new(arcs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn integer_bytes(value: i64) -> Vec<u8> {
        let mut out = Vec::new();
        encode_integer(&mut out, tag::INTEGER, value);
        out
    }

    #[test]
    fn integers_use_minimal_twos_complement() {
        assert_eq!(integer_bytes(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(integer_bytes(127), vec![0x02, 0x01, 0x7F]);
        assert_eq!(integer_bytes(128), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(integer_bytes(-1), vec![0x02, 0x01, 0xFF]);
        assert_eq!(integer_bytes(-129), vec![0x02, 0x02, 0xFF, 0x7F]);
    }

    #[test]
    fn negative_integers_decode() {
        assert_eq!(decode_integer(&[0xFF, 0x7F]).unwrap(), -129);
        assert_eq!(decode_integer(&[0xF7, 0x9A]).unwrap(), -2150);
    }

    #[test]
    fn unsigned_gets_leading_zero_when_high_bit_set() {
        let mut out = Vec::new();
        encode_unsigned(&mut out, tag::COUNTER32, 0xFFFF_FFFF);
        assert_eq!(out, vec![0x41, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decode_unsigned(&out[2..]).unwrap(), 0xFFFF_FFFF);
    }

    #[test]
    fn oid_encoding_matches_x690() {
        let oid: Oid = "1.3.6.1.4.1.3902".parse().unwrap();
        let mut out = Vec::new();
        encode_oid(&mut out, &oid);
        assert_eq!(out, vec![0x06, 0x07, 0x2B, 0x06, 0x01, 0x04, 0x01, 0x9E, 0x3E]);
        assert_eq!(decode_oid(&out[2..]).unwrap(), oid);
    }

    #[test]
    fn long_form_length() {
        let content = vec![0xAB; 300];
        let mut out = Vec::new();
        encode_tlv(&mut out, tag::OCTET_STRING, &content);
        assert_eq!(&out[..4], &[0x04, 0x82, 0x01, 0x2C]);
        let mut reader = Reader::new(&out);
        assert_eq!(reader.read_octets().unwrap().len(), 300);
        assert!(reader.is_empty());
    }

    #[test]
    fn nested_reader_reports_absolute_offsets() {
        let mut out = Vec::new();
        encode_constructed(&mut out, tag::SEQUENCE, |seq| {
            encode_integer(seq, tag::INTEGER, 3);
            encode_octets(seq, b"abc");
        });
        let mut outer = Reader::new(&out);
        let mut seq = outer.expect(tag::SEQUENCE).unwrap();
        assert_eq!(seq.read_integer().unwrap(), 3);
        let octets = seq.expect(tag::OCTET_STRING).unwrap();
        assert_eq!(&out[octets.range()], b"abc");
    }

    #[test]
    fn truncated_input_is_a_protocol_error() {
        let mut reader = Reader::new(&[0x04, 0x05, 0x61]);
        assert!(matches!(reader.read_tlv(), Err(Error::Protocol { .. })));
    }
}
