// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Generic Type-Length-Value codec kernel (C3), reused by every service's
//! payload codec.
//!
//! A TLV is `(tag: u8, length: u16 little-endian, value: bytes[length])`.
//! The single most important property here is that a decoder built on top
//! of [`TlvReader`] can skip any tag it doesn't recognize by construction:
//! it just keeps calling `next()` until it finds the tag it wants (or runs
//! out of buffer), so a modem that adds new TLVs to a message never breaks
//! an existing decoder.

use std::fmt;

/// One decoded TLV: a tag and a borrowed slice of its value bytes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// The buffer ended in the middle of a TLV header or a TLV's declared
/// value region ran past the end of the buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TlvError;

impl fmt::Display for TlvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("truncated TLV")
    }
}

impl std::error::Error for TlvError {}

/// Walks a byte slice one TLV at a time.
pub struct TlvReader<'a> {
    buf: &'a [u8],
}

impl<'a> TlvReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        TlvReader { buf }
    }

    /// The bytes not yet consumed, i.e. everything after the last TLV
    /// returned by `next()`.
    pub fn remaining(&self) -> &'a [u8] {
        self.buf
    }

    /// Returns the next TLV, `Ok(None)` at a clean end-of-buffer, or an
    /// error if the buffer is truncated mid-TLV.
    pub fn next(&mut self) -> Result<Option<Tlv<'a>>, TlvError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        if self.buf.len() < 3 {
            return Err(TlvError);
        }
        let tag = self.buf[0];
        let len = u16::from_le_bytes([self.buf[1], self.buf[2]]) as usize;
        let rest = &self.buf[3..];
        if rest.len() < len {
            return Err(TlvError);
        }
        let (value, remainder) = rest.split_at(len);
        self.buf = remainder;
        Ok(Some(Tlv { tag, value }))
    }

    /// Finds the first TLV matching `tag`, skipping (not failing on) every
    /// other tag along the way. Returns `Ok(None)` if the buffer is
    /// exhausted without a match.
    pub fn find(mut self, tag: u8) -> Result<Option<&'a [u8]>, TlvError> {
        while let Some(tlv) = self.next()? {
            if tlv.tag == tag {
                return Ok(Some(tlv.value));
            }
        }
        Ok(None)
    }
}

/// Iterates every TLV in `buf`, collecting them in wire order. Convenience
/// wrapper over [`TlvReader`] for callers (and tests) that want the whole
/// sequence rather than a single tag.
pub fn iter(buf: &[u8]) -> Result<Vec<Tlv<'_>>, TlvError> {
    let mut reader = TlvReader::new(buf);
    let mut out = Vec::new();
    while let Some(tlv) = reader.next()? {
        out.push(tlv);
    }
    Ok(out)
}

/// Encodes a single TLV.
pub fn build(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + value.len());
    out.push(tag);
    out.extend_from_slice(&(value.len() as u16).to_le_bytes());
    out.extend_from_slice(value);
    out
}

/// Concatenates a sequence of TLVs into a single outbound byte buffer,
/// preserving the order they were given in.
pub fn build_all<'a>(tlvs: impl IntoIterator<Item = (u8, &'a [u8])>) -> Vec<u8> {
    let mut out = Vec::new();
    for (tag, value) in tlvs {
        out.extend_from_slice(&build(tag, value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_tlv_round_trips() {
        let encoded = build(0x01, b"hello");
        let decoded = iter(&encoded).unwrap();
        assert_eq!(decoded, vec![Tlv { tag: 0x01, value: b"hello" }]);
    }

    #[test]
    fn empty_buffer_terminates_cleanly() {
        assert_eq!(iter(&[]).unwrap(), vec![]);
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert!(iter(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn truncated_value_is_an_error() {
        // declares a 5-byte value but only supplies 2
        assert!(iter(&[0x01, 0x05, 0x00, 0xAA, 0xBB]).is_err());
    }

    #[test]
    fn find_skips_unrelated_tags() {
        let encoded = build_all(vec![(0xAA, &b"noise"[..]), (0x1E, &[10, 0, 0, 1][..])]);
        let found = TlvReader::new(&encoded).find(0x1E).unwrap();
        assert_eq!(found, Some(&[10, 0, 0, 1][..]));
    }

    proptest! {
        #[test]
        fn build_then_iter_is_identity(tags_and_values in prop::collection::vec((any::<u8>(), prop::collection::vec(any::<u8>(), 0..32)), 0..16)) {
            let refs: Vec<(u8, &[u8])> = tags_and_values.iter().map(|(t, v)| (*t, v.as_slice())).collect();
            let encoded = build_all(refs);
            let decoded = iter(&encoded).unwrap();
            let expected: Vec<Tlv<'_>> = tags_and_values.iter().map(|(t, v)| Tlv { tag: *t, value: v.as_slice() }).collect();
            prop_assert_eq!(decoded, expected);
        }

        #[test]
        fn unknown_tag_insertion_does_not_change_a_known_lookup(
            known_value in prop::collection::vec(any::<u8>(), 0..16),
            noise in prop::collection::vec((any::<u8>(), prop::collection::vec(any::<u8>(), 0..16)), 0..8),
        ) {
            // tag 0x7F is reserved for the "known" TLV in this test; the
            // noise tags are constrained away from it so the left-identity
            // property being tested (does inserting *other* tags change
            // what we find for 0x7F) isn't vacuous.
            let noise: Vec<(u8, Vec<u8>)> = noise.into_iter().filter(|(t, _)| *t != 0x7F).collect();

            let mut with_noise: Vec<(u8, &[u8])> = noise.iter().map(|(t, v)| (*t, v.as_slice())).collect();
            with_noise.push((0x7F, known_value.as_slice()));
            let encoded_with_noise = build_all(with_noise);

            let encoded_without_noise = build(0x7F, &known_value);

            let a = TlvReader::new(&encoded_with_noise).find(0x7F).unwrap();
            let b = TlvReader::new(&encoded_without_noise).find(0x7F).unwrap();
            prop_assert_eq!(a, b);
        }
    }
}
