// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The outer QMUX envelope (C2): framing, not payload semantics.
//!
//! ```text
//! 0x01
//! uint16_le  length          # byte_count(header_after_length) + 2
//! uint8      flags
//! uint8      service_id
//! uint8      client_id
//! uint8      request_type
//! uintN_le   transaction_id  # N = 8 if service_id == 0 (control) else 16
//! uint16_le  message_id
//! uint16_le  tlv_area_len
//! <tlv_area_len bytes of TLVs>
//! ```
//!
//! This module only knows how to turn that shape into bytes and back. It
//! does not own a socket, a buffer across reads, or a transaction table;
//! see `qmi-transport` for the stateful half.

use std::fmt;

pub const SENTINEL: u8 = 0x01;
const RESPONSE_FLAG: u8 = 0x01;
const INDICATION_FLAG: u8 = 0x02;

/// Control messages (service id 0) use a 1-byte transaction id; every
/// other service uses 2 bytes, little-endian. The two ranges are disjoint
/// so a collision between a control and a service transaction can never
/// happen (invariant 3 of the data model).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ServiceClass {
    Control,
    Service,
}

impl ServiceClass {
    pub fn of(service_id: u8) -> Self {
        if service_id == 0 {
            ServiceClass::Control
        } else {
            ServiceClass::Service
        }
    }

    pub fn transaction_id_width(self) -> usize {
        match self {
            ServiceClass::Control => 1,
            ServiceClass::Service => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameKind {
    Response,
    Indication,
}

/// A fully decoded inbound QMUX frame. `tlv_area` is everything after the
/// message id and TLV-area length, left untouched for the per-request or
/// per-indication decoder to consume.
#[derive(Debug, Eq, PartialEq)]
pub struct RawFrame<'a> {
    pub kind: FrameKind,
    pub service_id: u8,
    pub client_id: u8,
    pub transaction_id: u16,
    pub message_id: u16,
    pub tlv_area: &'a [u8],
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QmuxDecodeError {
    BadSentinel,
    /// Buffer passed to `decode_frame` was not exactly one whole frame.
    LengthMismatch,
    Truncated,
    /// The transaction-id width implied by `service_id` didn't leave the
    /// rest of the header self-consistent (invariant 6).
    BadTransactionIdWidth,
}

impl fmt::Display for QmuxDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            QmuxDecodeError::BadSentinel => "missing 0x01 sentinel",
            QmuxDecodeError::LengthMismatch => "frame length did not match buffer",
            QmuxDecodeError::Truncated => "frame truncated",
            QmuxDecodeError::BadTransactionIdWidth => "transaction id width mismatch",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for QmuxDecodeError {}

/// If `buf` begins a frame, returns the total number of bytes that frame
/// will occupy once complete (`length + 1`, per invariant 5). Returns
/// `None` if `buf` doesn't yet contain the 3-byte sentinel+length prefix
/// needed to know that, which tells the accumulator to wait for more
/// bytes rather than treating this as an error.
pub fn frame_len_hint(buf: &[u8]) -> Result<Option<usize>, QmuxDecodeError> {
    if buf.is_empty() {
        return Ok(None);
    }
    if buf[0] != SENTINEL {
        return Err(QmuxDecodeError::BadSentinel);
    }
    if buf.len() < 3 {
        return Ok(None);
    }
    let length = u16::from_le_bytes([buf[1], buf[2]]) as usize;
    Ok(Some(length + 1))
}

/// Encodes an outbound frame. `payload_chunks` is scatter/gather input (a
/// list of byte slices, each already containing a well-formed
/// message-id + TLV-area-length + TLV-area) so that callers with a large
/// payload never have to pay for an intermediate concatenation; this
/// function performs the only concatenation, directly into the returned
/// buffer.
pub fn encode_frame(
    service_id: u8,
    client_id: u8,
    transaction_id: u16,
    payload_chunks: &[&[u8]],
) -> Vec<u8> {
    let class = ServiceClass::of(service_id);
    let width = class.transaction_id_width();
    let payload_len: usize = payload_chunks.iter().map(|c| c.len()).sum();
    let header_after_length_len = 1 + 1 + 1 + 1 + width + payload_len;
    let length = (header_after_length_len + 2) as u16;

    let mut out = Vec::with_capacity(3 + header_after_length_len);
    out.push(SENTINEL);
    out.extend_from_slice(&length.to_le_bytes());
    out.push(0x00); // flags: requests are never indications or responses
    out.push(service_id);
    out.push(client_id);
    out.push(0x00); // request_type
    match class {
        ServiceClass::Control => out.push(transaction_id as u8),
        ServiceClass::Service => out.extend_from_slice(&transaction_id.to_le_bytes()),
    }
    for chunk in payload_chunks {
        out.extend_from_slice(chunk);
    }
    out
}

/// Decodes exactly one frame. `buf` must be precisely `length + 1` bytes,
/// as produced by `frame_len_hint`; the accumulator in `qmi-transport` is
/// responsible for slicing that much off the front of its read buffer
/// before calling this.
pub fn decode_frame(buf: &[u8]) -> Result<RawFrame<'_>, QmuxDecodeError> {
    if buf.first() != Some(&SENTINEL) {
        return Err(QmuxDecodeError::BadSentinel);
    }
    if buf.len() < 3 {
        return Err(QmuxDecodeError::Truncated);
    }
    let length = u16::from_le_bytes([buf[1], buf[2]]) as usize;
    if buf.len() != length + 1 {
        return Err(QmuxDecodeError::LengthMismatch);
    }
    if buf.len() < 7 {
        return Err(QmuxDecodeError::Truncated);
    }
    let flags = buf[3];
    let service_id = buf[4];
    let client_id = buf[5];
    let _request_type = buf[6];

    let class = ServiceClass::of(service_id);
    let width = class.transaction_id_width();
    let tid_start = 7;
    let tid_end = tid_start + width;
    if buf.len() < tid_end {
        return Err(QmuxDecodeError::BadTransactionIdWidth);
    }
    let transaction_id = match class {
        ServiceClass::Control => buf[tid_start] as u16,
        ServiceClass::Service => u16::from_le_bytes([buf[tid_start], buf[tid_start + 1]]),
    };

    let rest = &buf[tid_end..];
    if rest.len() < 4 {
        return Err(QmuxDecodeError::Truncated);
    }
    let message_id = u16::from_le_bytes([rest[0], rest[1]]);
    let tlv_area_len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
    let tlv_area = &rest[4..];
    // The TLV-area length is the authoritative count of what follows; any
    // mismatch (short or with trailing bytes) is the "declared length zero
    // but header claims a TLV body" family of edge case in §8.
    if tlv_area.len() != tlv_area_len {
        return Err(QmuxDecodeError::Truncated);
    }

    if flags & !(RESPONSE_FLAG | INDICATION_FLAG) != 0 {
        log::warn!("qmux: unrecognized flag bits {flags:#04x}, ignoring them");
    }
    let kind =
        if flags & INDICATION_FLAG != 0 { FrameKind::Indication } else { FrameKind::Response };

    Ok(RawFrame { kind, service_id, client_id, transaction_id, message_id, tlv_area })
}
