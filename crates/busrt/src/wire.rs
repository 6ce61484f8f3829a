// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed packet header shared by every datagram on the bus.
//!
//! # Layout (36 bytes)
//!
//! ```text
//! offset  size  field
//!      0     4  kind            (carries the byte-order marker)
//!      4     4  transmitter_id
//!      8     4  proc_id
//!     12     4  memb_id.proc_id
//!     16     4  memb_id.time
//!     20     4  seq
//!     24     4  token_round
//!     28     4  conf_hash
//!     32     2  data_len
//!     34     2  packet_index
//! ```
//!
//! Integers are written in the sender's byte order unless an order is
//! chosen explicitly. The marker bits in `kind` are both set by a
//! little-endian writer and both clear for big-endian, letting a receiver
//! detect a mismatch and swap every field before using any of them.

use std::fmt;

/// Marker bits embedded in `kind`.
pub const ENDIAN_MARKER: u32 = 0x8000_0080;

/// Encoded header size.
pub const PACKET_HEADER_LEN: usize = 36;

/// Byte order used on the wire by one sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub const fn native() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }

    const fn marker(self) -> u32 {
        match self {
            Self::Little => ENDIAN_MARKER,
            Self::Big => 0,
        }
    }

    fn put_u32(self, buf: &mut [u8], v: u32) {
        let bytes = match self {
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        };
        buf[..4].copy_from_slice(&bytes);
    }

    fn put_u16(self, buf: &mut [u8], v: u16) {
        let bytes = match self {
            Self::Little => v.to_le_bytes(),
            Self::Big => v.to_be_bytes(),
        };
        buf[..2].copy_from_slice(&bytes);
    }

    fn get_u32(self, buf: &[u8]) -> u32 {
        let bytes = [buf[0], buf[1], buf[2], buf[3]];
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }

    fn get_u16(self, buf: &[u8]) -> u16 {
        let bytes = [buf[0], buf[1]];
        match self {
            Self::Little => u16::from_le_bytes(bytes),
            Self::Big => u16::from_be_bytes(bytes),
        }
    }
}

/// Header decode/validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Buffer shorter than the header.
    Truncated { len: usize },
    /// `kind` carries only one of the two marker bits.
    BadMarker(u32),
    /// Received size disagrees with header plus `data_len`.
    LengthMismatch { received: usize, expected: usize },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { len } => {
                write!(f, "{} bytes is shorter than the {} byte header", len, PACKET_HEADER_LEN)
            }
            Self::BadMarker(kind) => write!(f, "corrupt byte-order marker in kind {:#010x}", kind),
            Self::LengthMismatch { received, expected } => {
                write!(f, "received {} bytes, header announces {}", received, expected)
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Membership (configuration) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MembershipId {
    pub proc_id: u32,
    pub time: u32,
}

/// Decoded packet header. `kind` never includes the marker bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketHeader {
    pub kind: u32,
    pub transmitter_id: u32,
    pub proc_id: u32,
    pub memb_id: MembershipId,
    pub seq: u32,
    pub token_round: u32,
    pub conf_hash: u32,
    pub data_len: u16,
    pub packet_index: u16,
}

impl PacketHeader {
    /// Encode in the native byte order.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, WireError> {
        self.encode_with(ByteOrder::native(), buf)
    }

    pub fn encode_with(&self, order: ByteOrder, buf: &mut [u8]) -> Result<usize, WireError> {
        if buf.len() < PACKET_HEADER_LEN {
            return Err(WireError::Truncated { len: buf.len() });
        }
        let kind = (self.kind & !ENDIAN_MARKER) | order.marker();
        order.put_u32(&mut buf[0..], kind);
        order.put_u32(&mut buf[4..], self.transmitter_id);
        order.put_u32(&mut buf[8..], self.proc_id);
        order.put_u32(&mut buf[12..], self.memb_id.proc_id);
        order.put_u32(&mut buf[16..], self.memb_id.time);
        order.put_u32(&mut buf[20..], self.seq);
        order.put_u32(&mut buf[24..], self.token_round);
        order.put_u32(&mut buf[28..], self.conf_hash);
        order.put_u16(&mut buf[32..], self.data_len);
        order.put_u16(&mut buf[34..], self.packet_index);
        Ok(PACKET_HEADER_LEN)
    }

    /// Decode, correcting for the sender's byte order.
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        Self::decode_with_order(buf).map(|(h, _)| h)
    }

    /// Decode and also report the byte order the sender used.
    pub fn decode_with_order(buf: &[u8]) -> Result<(Self, ByteOrder), WireError> {
        if buf.len() < PACKET_HEADER_LEN {
            return Err(WireError::Truncated { len: buf.len() });
        }
        // Both marker bytes sit at the ends of the word, so they read the same in either order.
        let probe = ByteOrder::native().get_u32(buf);
        let order = match probe & ENDIAN_MARKER {
            ENDIAN_MARKER => ByteOrder::Little,
            0 => ByteOrder::Big,
            _ => return Err(WireError::BadMarker(probe)),
        };

        let header = Self {
            kind: order.get_u32(&buf[0..]) & !ENDIAN_MARKER,
            transmitter_id: order.get_u32(&buf[4..]),
            proc_id: order.get_u32(&buf[8..]),
            memb_id: MembershipId {
                proc_id: order.get_u32(&buf[12..]),
                time: order.get_u32(&buf[16..]),
            },
            seq: order.get_u32(&buf[20..]),
            token_round: order.get_u32(&buf[24..]),
            conf_hash: order.get_u32(&buf[28..]),
            data_len: order.get_u16(&buf[32..]),
            packet_index: order.get_u16(&buf[34..]),
        };
        Ok((header, order))
    }

    /// Check a received datagram size against this header.
    pub fn validate_len(&self, received: usize) -> Result<(), WireError> {
        let expected = PACKET_HEADER_LEN + usize::from(self.data_len);
        if received != expected {
            return Err(WireError::LengthMismatch { received, expected });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PacketHeader {
        PacketHeader {
            kind: 0x0000_0004,
            transmitter_id: 0x0a00_0001,
            proc_id: 0x0a00_0002,
            memb_id: MembershipId {
                proc_id: 0x0a00_0001,
                time: 1_700_000_000,
            },
            seq: 42,
            token_round: 7,
            conf_hash: 0xdead_beef,
            data_len: 1200,
            packet_index: 3,
        }
    }

    #[test]
    fn test_foreign_byte_order_is_corrected() {
        let header = sample();
        let mut little = [0u8; PACKET_HEADER_LEN];
        let mut big = [0u8; PACKET_HEADER_LEN];
        header.encode_with(ByteOrder::Little, &mut little).expect("encode");
        header.encode_with(ByteOrder::Big, &mut big).expect("encode");
        assert_ne!(little, big);

        let (from_little, order) = PacketHeader::decode_with_order(&little).expect("decode");
        assert_eq!(order, ByteOrder::Little);
        let (from_big, order) = PacketHeader::decode_with_order(&big).expect("decode");
        assert_eq!(order, ByteOrder::Big);
        assert_eq!(from_little, header);
        assert_eq!(from_big, header);
    }

    #[test]
    fn test_marker_layout() {
        let header = PacketHeader {
            kind: 0x10,
            ..PacketHeader::default()
        };
        let mut buf = [0u8; PACKET_HEADER_LEN];
        header.encode_with(ByteOrder::Little, &mut buf).expect("encode");
        assert_eq!(&buf[..4], &[0x90, 0x00, 0x00, 0x80]);

        header.encode_with(ByteOrder::Big, &mut buf).expect("encode");
        assert_eq!(&buf[..4], &[0x00, 0x00, 0x00, 0x10]);
    }

    #[test]
    fn test_marker_bits_stripped_from_kind() {
        let header = PacketHeader {
            kind: ENDIAN_MARKER | 0x2,
            ..PacketHeader::default()
        };
        let mut buf = [0u8; PACKET_HEADER_LEN];
        header.encode(&mut buf).expect("encode");
        assert_eq!(PacketHeader::decode(&buf).expect("decode").kind, 0x2);
    }

    #[test]
    fn test_rejections() {
        let mut buf = [0u8; PACKET_HEADER_LEN];
        assert_eq!(
            PacketHeader::decode(&buf[..20]),
            Err(WireError::Truncated { len: 20 })
        );
        assert_eq!(
            sample().encode(&mut buf[..35]),
            Err(WireError::Truncated { len: 35 })
        );

        buf[0] = 0x80;
        assert!(matches!(PacketHeader::decode(&buf), Err(WireError::BadMarker(_))));
    }

    #[test]
    fn test_validate_len() {
        let header = sample();
        assert!(header.validate_len(PACKET_HEADER_LEN + 1200).is_ok());
        assert_eq!(
            header.validate_len(100),
            Err(WireError::LengthMismatch {
                received: 100,
                expected: 1236
            })
        );
    }
}
