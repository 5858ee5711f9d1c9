//! Low-level protobuf wire format reading.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! Group wire types (3/4) are deprecated and rejected as unsupported.

use crate::error::{Error, Result};
use crate::MAX_FIELD_NUMBER;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl WireType {
    fn from_tag_bits(value: u8, offset: usize) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::unsupported_wire_type(value, offset)),
        }
    }
}

/// Cursor over one wire-format message frame.
///
/// All read methods advance the position and report errors with the offset
/// of the failing byte, relative to the start of the frame.
#[derive(Debug)]
pub struct WireReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Creates a reader over a frame.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte offset within the frame
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True when the frame is fully consumed
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes left to read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Decodes one varint, at most 10 bytes for a 64-bit value.
    pub fn read_varint(&mut self) -> Result<u64> {
        let start = self.pos;
        let mut result: u64 = 0;
        let mut shift = 0;

        while let Some(&byte) = self.data.get(self.pos) {
            if self.pos - start >= 10 {
                return Err(Error::varint_decode(start));
            }
            self.pos += 1;
            result |= ((byte & 0x7F) as u64) << shift;
            shift += 7;

            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }

        Err(Error::varint_decode(start))
    }

    /// Decodes a tag into (field number, wire type).
    pub fn read_tag(&mut self) -> Result<(u32, WireType)> {
        let offset = self.pos;
        let tag = self.read_varint()?;
        let wire_type = WireType::from_tag_bits((tag & 0x07) as u8, offset)?;
        let field_number = (tag >> 3) as u32;

        if field_number == 0 || field_number > MAX_FIELD_NUMBER {
            return Err(Error::InvalidFieldNumber {
                number: field_number,
                max: MAX_FIELD_NUMBER,
            });
        }

        Ok((field_number, wire_type))
    }

    /// Reads 4 little-endian bytes.
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let bytes = self.take(4, "not enough bytes for I32")?;
        Ok(u32::from_le_bytes(bytes.try_into().expect("4-byte slice")))
    }

    /// Reads 8 little-endian bytes.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let bytes = self.take(8, "not enough bytes for I64")?;
        Ok(u64::from_le_bytes(bytes.try_into().expect("8-byte slice")))
    }

    /// Reads a length prefix and returns the delimited slice.
    pub fn read_len_prefixed(&mut self) -> Result<&'a [u8]> {
        let offset = self.pos;
        let length = self.read_varint()?;
        if length > self.remaining() as u64 {
            return Err(Error::malformed_wire_data(
                offset,
                format!(
                    "length {} exceeds remaining {} bytes",
                    length,
                    self.remaining()
                ),
            ));
        }
        self.take(length as usize, "not enough bytes for LEN field")
    }

    fn take(&mut self, count: usize, context: &str) -> Result<&'a [u8]> {
        if self.remaining() < count {
            return Err(Error::malformed_wire_data(self.pos, context.to_string()));
        }
        let slice = &self.data[self.pos..self.pos + count];
        self.pos += count;
        Ok(slice)
    }
}

/// Decodes a zigzag-encoded 32-bit value.
pub fn decode_zigzag32(value: u64) -> i32 {
    let n = value as u32;
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

/// Decodes a zigzag-encoded 64-bit value.
pub fn decode_zigzag64(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_varint_single_byte() {
        let mut reader = WireReader::new(&[0x08]);
        assert_eq!(reader.read_varint().unwrap(), 8);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_varint_multi_byte() {
        let mut reader = WireReader::new(&[0xAC, 0x02]);
        assert_eq!(reader.read_varint().unwrap(), 300);
        assert_eq!(reader.position(), 2);
    }

    #[test]
    fn test_read_varint_max() {
        // Maximum 64-bit varint (all 1s)
        let data = [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_varint().unwrap(), u64::MAX);
    }

    #[test]
    fn test_read_varint_truncated() {
        let mut reader = WireReader::new(&[0x80, 0x80]);
        assert!(matches!(
            reader.read_varint(),
            Err(Error::VarintDecode { offset: 0 })
        ));
    }

    #[test]
    fn test_read_tag() {
        // Field 1, wire type 0
        let mut reader = WireReader::new(&[0x08]);
        assert_eq!(reader.read_tag().unwrap(), (1, WireType::Varint));

        // Field 2, wire type 2
        let mut reader = WireReader::new(&[0x12]);
        assert_eq!(reader.read_tag().unwrap(), (2, WireType::Len));
    }

    #[test]
    fn test_read_tag_rejects_field_zero() {
        // Field 0 is invalid
        let mut reader = WireReader::new(&[0x00, 0x01]);
        assert!(matches!(
            reader.read_tag(),
            Err(Error::InvalidFieldNumber { number: 0, .. })
        ));
    }

    #[test]
    fn test_read_tag_rejects_wire_type_7() {
        let mut reader = WireReader::new(&[0x0F]);
        assert!(matches!(
            reader.read_tag(),
            Err(Error::UnsupportedWireType { value: 7, .. })
        ));
    }

    #[test]
    fn test_read_len_prefixed() {
        let data = [0x05, b'h', b'e', b'l', b'l', b'o'];
        let mut reader = WireReader::new(&data);
        assert_eq!(reader.read_len_prefixed().unwrap(), b"hello");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_len_prefixed_past_end() {
        let mut reader = WireReader::new(&[0x05, b'h', b'i']);
        assert!(matches!(
            reader.read_len_prefixed(),
            Err(Error::MalformedWireData { offset: 0, .. })
        ));
    }

    #[test]
    fn test_read_fixed_widths() {
        let mut reader = WireReader::new(&[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(reader.read_fixed32().unwrap(), 0x04030201);

        let mut reader = WireReader::new(&[1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(reader.read_fixed64().unwrap(), 1);

        let mut reader = WireReader::new(&[0x01, 0x02]);
        assert!(reader.read_fixed32().is_err());
    }

    #[test]
    fn test_decode_zigzag() {
        assert_eq!(decode_zigzag32(0), 0);
        assert_eq!(decode_zigzag32(1), -1);
        assert_eq!(decode_zigzag32(2), 1);
        assert_eq!(decode_zigzag32(3), -2);
        assert_eq!(decode_zigzag64(4294967294), 2147483647);
        assert_eq!(decode_zigzag64(4294967295), -2147483648);
    }
}
