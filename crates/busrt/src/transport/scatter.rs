// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Borrowed segment lists making up one bus packet.

use super::TransportError;
use crate::config::{MAX_PACKET_SIZE, MAX_SCATTER_ELEMENTS};

/// Ordered byte segments sent as a single datagram.
///
/// Holds at most `MAX_SCATTER_ELEMENTS` segments totalling at most
/// `MAX_PACKET_SIZE` bytes.
#[derive(Debug, Default, Clone)]
pub struct Scatter<'a> {
    segments: Vec<&'a [u8]>,
    total: usize,
}

impl<'a> Scatter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: &[&'a [u8]]) -> Result<Self, TransportError> {
        let mut scatter = Self {
            segments: Vec::with_capacity(segments.len()),
            total: 0,
        };
        for &seg in segments {
            scatter.push(seg)?;
        }
        Ok(scatter)
    }

    /// Append one segment; the packet is left unchanged on error.
    pub fn push(&mut self, segment: &'a [u8]) -> Result<(), TransportError> {
        if self.segments.len() == MAX_SCATTER_ELEMENTS {
            return Err(TransportError::TooManySegments {
                count: self.segments.len() + 1,
                max: MAX_SCATTER_ELEMENTS,
            });
        }
        let total = self.total + segment.len();
        if total > MAX_PACKET_SIZE {
            return Err(TransportError::PacketTooLarge {
                len: total,
                max: MAX_PACKET_SIZE,
            });
        }
        self.segments.push(segment);
        self.total = total;
        Ok(())
    }

    pub fn segments(&self) -> &[&'a [u8]] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Combined length of all segments.
    pub fn total_len(&self) -> usize {
        self.total
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.total = 0;
    }
}

/// Copy `src` across `segments` in order; returns the bytes placed.
pub(crate) fn scatter_copy(src: &[u8], segments: &mut [&mut [u8]]) -> usize {
    let mut offset = 0;
    for seg in segments.iter_mut() {
        if offset == src.len() {
            break;
        }
        let n = seg.len().min(src.len() - offset);
        seg[..n].copy_from_slice(&src[offset..offset + n]);
        offset += n;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_limits() {
        let big = [0u8; MAX_PACKET_SIZE];
        let mut scatter = Scatter::new();
        scatter.push(&big[..1000]).expect("fits");
        let err = scatter.push(&big[..473]).expect_err("over the packet size");
        assert!(matches!(err, TransportError::PacketTooLarge { len: 1473, .. }));
        assert_eq!(scatter.total_len(), 1000);
        scatter.push(&big[..472]).expect("exactly full");
        assert_eq!(scatter.total_len(), MAX_PACKET_SIZE);
    }

    #[test]
    fn test_segment_cap() {
        let empty: &[u8] = &[];
        let mut scatter = Scatter::new();
        for _ in 0..MAX_SCATTER_ELEMENTS {
            scatter.push(empty).expect("within cap");
        }
        assert!(matches!(
            scatter.push(empty),
            Err(TransportError::TooManySegments { .. })
        ));
        assert_eq!(scatter.len(), MAX_SCATTER_ELEMENTS);
    }

    #[test]
    fn test_scatter_copy_spans_segments() {
        let mut a = [0u8; 3];
        let mut b = [0u8; 2];
        let mut c = [0u8; 4];
        let placed = {
            let mut segs: [&mut [u8]; 3] = [&mut a, &mut b, &mut c];
            scatter_copy(b"abcdefg", &mut segs)
        };
        assert_eq!(placed, 7);
        assert_eq!(&a, b"abc");
        assert_eq!(&b, b"de");
        assert_eq!(&c[..2], b"fg");
    }
}
