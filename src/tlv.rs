//! Type-length-value codec used for LSA content.
//!
//! Blocks follow the NDN packet format: a variable-length type number, a
//! variable-length length, then the value. Blocks are built inner-to-outer:
//! children are encoded first, then wrapped by their parent.
//!
//! ```text
//! var-number := n < 253          -> 1 byte
//!             | n <= u16::MAX    -> 0xFD + 2 bytes BE
//!             | n <= u32::MAX    -> 0xFE + 4 bytes BE
//!             | otherwise        -> 0xFF + 8 bytes BE
//! ```

use thiserror::Error;

/// TLV type numbers.
pub mod types {
    pub const NAME: u64 = 7;
    pub const NAME_COMPONENT: u64 = 8;
    pub const LSA: u64 = 128;
    pub const SEQUENCE_NUMBER: u64 = 130;
    pub const ADJACENCY_LSA: u64 = 131;
    pub const ADJACENCY: u64 = 132;
    pub const COORDINATE_LSA: u64 = 133;
    pub const COST_DOUBLE: u64 = 134;
    pub const HYPERBOLIC_RADIUS: u64 = 135;
    pub const HYPERBOLIC_ANGLE: u64 = 136;
    pub const NAME_LSA: u64 = 137;
    pub const EXPIRATION_TIME: u64 = 139;
    pub const URI: u64 = 141;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of buffer")]
    UnexpectedEof,
    #[error("unexpected TLV type {actual} (expected {expected})")]
    UnexpectedType { expected: u64, actual: u64 },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("{0} trailing bytes after block")]
    TrailingBytes(usize),
    #[error("invalid non-negative integer length: {0}")]
    InvalidIntegerLength(usize),
    #[error("invalid double length: {0}")]
    InvalidDoubleLength(usize),
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
    #[error("invalid expiration time: {0:?}")]
    InvalidTimestamp(String),
}

pub fn write_var_number(buf: &mut Vec<u8>, n: u64) {
    if n < 253 {
        buf.push(n as u8);
    } else if n <= u64::from(u16::MAX) {
        buf.push(0xFD);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= u64::from(u32::MAX) {
        buf.push(0xFE);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(0xFF);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Minimal big-endian encoding of a non-negative integer (1, 2, 4 or 8 bytes).
pub fn non_negative_integer_bytes(n: u64) -> Vec<u8> {
    if n <= u64::from(u8::MAX) {
        vec![n as u8]
    } else if n <= u64::from(u16::MAX) {
        (n as u16).to_be_bytes().to_vec()
    } else if n <= u64::from(u32::MAX) {
        (n as u32).to_be_bytes().to_vec()
    } else {
        n.to_be_bytes().to_vec()
    }
}

pub fn encode_block(tlv_type: u64, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len() + 4);
    write_var_number(&mut out, tlv_type);
    write_var_number(&mut out, value.len() as u64);
    out.extend_from_slice(value);
    out
}

/// Accumulates already-encoded child blocks, then wraps them in a parent.
#[derive(Debug, Default)]
pub struct Encoder {
    value: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block that is already TLV-encoded.
    pub fn append_encoded(&mut self, block: &[u8]) -> &mut Self {
        self.value.extend_from_slice(block);
        self
    }

    pub fn append(&mut self, tlv_type: u64, value: &[u8]) -> &mut Self {
        write_var_number(&mut self.value, tlv_type);
        write_var_number(&mut self.value, value.len() as u64);
        self.value.extend_from_slice(value);
        self
    }

    pub fn append_u64(&mut self, tlv_type: u64, n: u64) -> &mut Self {
        self.append(tlv_type, &non_negative_integer_bytes(n))
    }

    pub fn append_f64(&mut self, tlv_type: u64, v: f64) -> &mut Self {
        self.append(tlv_type, &v.to_bits().to_be_bytes())
    }

    pub fn append_str(&mut self, tlv_type: u64, s: &str) -> &mut Self {
        self.append(tlv_type, s.as_bytes())
    }

    /// Wraps everything appended so far in an outer block of `tlv_type`.
    pub fn finish(&self, tlv_type: u64) -> Vec<u8> {
        encode_block(tlv_type, &self.value)
    }
}

/// A decoded block borrowing its value from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub tlv_type: u64,
    pub value: &'a [u8],
}

impl<'a> Block<'a> {
    pub fn expect_type(self, expected: u64) -> Result<Self, DecodeError> {
        if self.tlv_type != expected {
            return Err(DecodeError::UnexpectedType {
                expected,
                actual: self.tlv_type,
            });
        }
        Ok(self)
    }

    /// Reader over the nested elements of this block.
    pub fn elements(&self) -> Reader<'a> {
        Reader::new(self.value)
    }

    pub fn as_u64(&self) -> Result<u64, DecodeError> {
        let v = self.value;
        match v.len() {
            1 => Ok(u64::from(v[0])),
            2 => Ok(u64::from(u16::from_be_bytes([v[0], v[1]]))),
            4 => Ok(u64::from(u32::from_be_bytes([v[0], v[1], v[2], v[3]]))),
            8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(v);
                Ok(u64::from_be_bytes(bytes))
            }
            n => Err(DecodeError::InvalidIntegerLength(n)),
        }
    }

    pub fn as_f64(&self) -> Result<f64, DecodeError> {
        if self.value.len() != 8 {
            return Err(DecodeError::InvalidDoubleLength(self.value.len()));
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.value);
        Ok(f64::from_bits(u64::from_be_bytes(bytes)))
    }

    pub fn as_str(&self) -> Result<&'a str, DecodeError> {
        std::str::from_utf8(self.value).map_err(|_| DecodeError::InvalidUtf8)
    }
}

/// Cursor over a byte slice of consecutive blocks.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).ok_or(DecodeError::UnexpectedEof)?;
        if end > self.buf.len() {
            return Err(DecodeError::UnexpectedEof);
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_var_number(&mut self) -> Result<u64, DecodeError> {
        let first = self.read_bytes(1)?[0];
        match first {
            0xFD => {
                let b = self.read_bytes(2)?;
                Ok(u64::from(u16::from_be_bytes([b[0], b[1]])))
            }
            0xFE => {
                let b = self.read_bytes(4)?;
                Ok(u64::from(u32::from_be_bytes([b[0], b[1], b[2], b[3]])))
            }
            0xFF => {
                let b = self.read_bytes(8)?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(b);
                Ok(u64::from_be_bytes(bytes))
            }
            n => Ok(u64::from(n)),
        }
    }

    /// Type of the next block without consuming it.
    pub fn peek_type(&self) -> Option<u64> {
        let mut lookahead = Reader {
            buf: self.buf,
            pos: self.pos,
        };
        lookahead.read_var_number().ok()
    }

    pub fn read_block(&mut self) -> Result<Block<'a>, DecodeError> {
        let tlv_type = self.read_var_number()?;
        let len = usize::try_from(self.read_var_number()?).map_err(|_| DecodeError::UnexpectedEof)?;
        let value = self.read_bytes(len)?;
        Ok(Block { tlv_type, value })
    }

    /// Reads the next block, failing with `MissingField` when it is absent or
    /// of another type.
    pub fn expect_block(&mut self, tlv_type: u64, field: &'static str) -> Result<Block<'a>, DecodeError> {
        match self.peek_type() {
            Some(t) if t == tlv_type => self.read_block(),
            _ => Err(DecodeError::MissingField(field)),
        }
    }

    pub fn expect_end(&self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

/// Decodes a buffer that must hold exactly one block of `tlv_type`.
pub fn decode_single(buf: &[u8], tlv_type: u64) -> Result<Block<'_>, DecodeError> {
    let mut reader = Reader::new(buf);
    let block = reader.read_block()?.expect_type(tlv_type)?;
    reader.expect_end()?;
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_number_widths() {
        let cases: [(u64, usize); 5] = [(0, 1), (252, 1), (253, 3), (70_000, 5), (u64::MAX, 9)];
        for (n, width) in cases {
            let mut buf = Vec::new();
            write_var_number(&mut buf, n);
            assert_eq!(buf.len(), width, "width for {}", n);
            assert_eq!(Reader::new(&buf).read_var_number().unwrap(), n);
        }
    }

    #[test]
    fn test_non_negative_integer_is_minimal() {
        assert_eq!(non_negative_integer_bytes(5), vec![5]);
        assert_eq!(non_negative_integer_bytes(256).len(), 2);
        assert_eq!(non_negative_integer_bytes(65_536).len(), 4);
        assert_eq!(non_negative_integer_bytes(1 << 40).len(), 8);
    }

    #[test]
    fn test_nested_blocks() {
        let mut inner = Encoder::new();
        inner.append_u64(types::SEQUENCE_NUMBER, 300).append_str(types::URI, "udp://a");
        let wire = inner.finish(types::LSA);

        let block = decode_single(&wire, types::LSA).unwrap();
        let mut elements = block.elements();
        let seq = elements.expect_block(types::SEQUENCE_NUMBER, "seq").unwrap();
        assert_eq!(seq.as_u64().unwrap(), 300);
        let uri = elements.expect_block(types::URI, "uri").unwrap();
        assert_eq!(uri.as_str().unwrap(), "udp://a");
        assert!(elements.expect_end().is_ok());
    }

    #[test]
    fn test_double_is_big_endian_ieee754() {
        let mut enc = Encoder::new();
        enc.append_f64(types::COST_DOUBLE, 1.0);
        let wire = enc.finish(types::ADJACENCY);
        // outer header (2) + inner header (2) + 8 bytes of 0x3FF0000000000000
        assert_eq!(&wire[4..], &[0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
        let block = decode_single(&wire, types::ADJACENCY).unwrap();
        let cost = block.elements().read_block().unwrap();
        assert_eq!(cost.as_f64().unwrap(), 1.0);
    }

    #[test]
    fn test_truncated_input() {
        let wire = encode_block(types::URI, b"abcdef");
        let err = decode_single(&wire[..wire.len() - 1], types::URI).unwrap_err();
        assert_eq!(err, DecodeError::UnexpectedEof);
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut wire = encode_block(types::URI, b"x");
        wire.push(0);
        assert_eq!(decode_single(&wire, types::URI).unwrap_err(), DecodeError::TrailingBytes(1));
    }

    #[test]
    fn test_missing_field() {
        let wire = encode_block(types::URI, b"x");
        let mut reader = Reader::new(&wire);
        assert_eq!(
            reader.expect_block(types::SEQUENCE_NUMBER, "seq").unwrap_err(),
            DecodeError::MissingField("seq")
        );
    }
}
