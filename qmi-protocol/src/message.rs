// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The decoded message record (§3) and the generic-result-TLV convention
//! that every response (but not every indication) carries.

use crate::error::QmiErrorCode;
use crate::qmux::{FrameKind, RawFrame};
use crate::tlv::TlvReader;

/// Tag of the generic "result" TLV: a 4-byte value of two little-endian
/// `u16`s, `(qmi_result, qmi_error)`.
const RESULT_TLV_TAG: u8 = 0x02;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MessageKind {
    Response,
    Indication,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Success,
    Failure(QmiErrorCode),
}

/// A fully decoded QMUX message with the generic result TLV (if any)
/// already peeled off. `message` is whatever TLVs remain for a
/// per-request or per-indication decoder to consume.
#[derive(Debug)]
pub struct DecodedMessage<'a> {
    pub kind: MessageKind,
    pub service_id: u8,
    pub client_id: u8,
    pub transaction_id: u16,
    pub message_id: u16,
    pub outcome: Outcome,
    pub message: &'a [u8],
}

impl<'a> DecodedMessage<'a> {
    pub fn from_raw_frame(frame: RawFrame<'a>) -> Self {
        let kind = match frame.kind {
            FrameKind::Response => MessageKind::Response,
            FrameKind::Indication => MessageKind::Indication,
        };
        let (outcome, message) = split_result_tlv(frame.tlv_area);
        DecodedMessage {
            kind,
            service_id: frame.service_id,
            client_id: frame.client_id,
            transaction_id: frame.transaction_id,
            message_id: frame.message_id,
            outcome,
            message,
        }
    }
}

/// Peels the leading result TLV off `tlv_area`, if present, returning the
/// resolved outcome and the remainder. A message with no result TLV (most
/// indications) is treated as `Success` with the full buffer intact,
/// since "outcome" doesn't apply to them.
fn split_result_tlv(tlv_area: &[u8]) -> (Outcome, &[u8]) {
    let mut reader = TlvReader::new(tlv_area);
    match reader.next() {
        Ok(Some(tlv)) if tlv.tag == RESULT_TLV_TAG && tlv.value.len() == 4 => {
            let qmi_result = u16::from_le_bytes([tlv.value[0], tlv.value[1]]);
            let qmi_error = u16::from_le_bytes([tlv.value[2], tlv.value[3]]);
            let outcome = if qmi_result == 0 {
                Outcome::Success
            } else {
                Outcome::Failure(QmiErrorCode::from_u16(qmi_error))
            };
            (outcome, reader.remaining())
        }
        _ => (Outcome::Success, tlv_area),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qmux;

    fn payload(message_id: u16, tlvs: &[u8]) -> Vec<u8> {
        let mut p = Vec::new();
        p.extend_from_slice(&message_id.to_le_bytes());
        p.extend_from_slice(&(tlvs.len() as u16).to_le_bytes());
        p.extend_from_slice(tlvs);
        p
    }

    #[test]
    fn success_result_tlv_strips_cleanly() {
        let result_tlv = crate::tlv::build(RESULT_TLV_TAG, &[0, 0, 0, 0]);
        let extra = crate::tlv::build(0x10, b"payload");
        let mut tlvs = result_tlv;
        tlvs.extend_from_slice(&extra);
        let framed = qmux::encode_frame(1, 2, 5, &[&payload(0x20, &tlvs)]);
        let raw = qmux::decode_frame(&framed).unwrap();
        let decoded = DecodedMessage::from_raw_frame(raw);
        assert_eq!(decoded.outcome, Outcome::Success);
        assert_eq!(decoded.message, extra.as_slice());
    }

    #[test]
    fn failure_result_tlv_carries_qmi_error_code() {
        // result=1, error=0x000C per §8 scenario 5
        let result_tlv = crate::tlv::build(RESULT_TLV_TAG, &[1, 0, 0x0C, 0x00]);
        let framed = qmux::encode_frame(1, 2, 5, &[&payload(0x20, &result_tlv)]);
        let raw = qmux::decode_frame(&framed).unwrap();
        let decoded = DecodedMessage::from_raw_frame(raw);
        assert_eq!(decoded.outcome, Outcome::Failure(QmiErrorCode::IncorrectPin));
    }

    #[test]
    fn indication_without_result_tlv_keeps_full_body() {
        let body = crate::tlv::build(0x01, b"evt");
        let mut framed = qmux::encode_frame(3, 1, 9, &[&payload(0x22, &body)]);
        framed[3] = 0x02; // indication flag
        let raw = qmux::decode_frame(&framed).unwrap();
        let decoded = DecodedMessage::from_raw_frame(raw);
        assert_eq!(decoded.kind, MessageKind::Indication);
        assert_eq!(decoded.message, body.as_slice());
    }
}
