// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error taxonomy for the QMUX transport (C8).
//!
//! Every call a caller submits terminates in either a decoded value or one
//! of the kinds below. A `TransportError` never reached the modem; a
//! `QmiErrorCode` is the modem's own symbolic result, carried by the
//! generic "result" TLV on a failure response.

use std::fmt;

/// Transport-level failure kinds. These describe something that happened
/// on the host side of the device, never a modem-reported result.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransportError {
    /// The call's deadline elapsed before a response or failure arrived.
    Timeout,
    /// The outbound write to the device failed; the transaction was rolled
    /// back and never reached the wire.
    WriteError,
    /// The device was closed (EOF/hang-up) while a call was outstanding.
    DeviceClosed,
    /// A frame could not be parsed as a well-formed QMUX envelope, or its
    /// transaction-id width did not match its service class.
    DecodeError,
    /// The response's shape did not match what the request's decoder
    /// expected (the decoder itself reported this; the transport forwards
    /// it verbatim).
    UnexpectedResponse,
    /// The reactor was shut down while the call was outstanding.
    Shutdown,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TransportError::Timeout => "call timed out",
            TransportError::WriteError => "write to device failed",
            TransportError::DeviceClosed => "device closed",
            TransportError::DecodeError => "malformed QMUX frame",
            TransportError::UnexpectedResponse => "response decode failed",
            TransportError::Shutdown => "reactor shut down",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for TransportError {}

/// Symbolic QMI result codes carried by the generic result TLV (tag
/// `0x02`) on a failure response. Numeric values follow the `qmi_error`
/// table published by the QMI specification; `Unknown` is the
/// forward-compatibility catch-all for any code this table doesn't yet
/// name, so that a firmware update introducing a new code never turns
/// into a decode error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum QmiErrorCode {
    None,
    MalformedMsg,
    NoMemory,
    Internal,
    Aborted,
    ClientIdsExhausted,
    UnabortableTransaction,
    InvalidClientId,
    NoThresholdsProvided,
    InvalidHandle,
    InvalidProfile,
    InvalidPinId,
    IncorrectPin,
    NoNetworkFound,
    CallFailed,
    OutOfCall,
    NotProvisioned,
    MissingArg,
    ArgTooLong,
    InvalidTransactionId,
    DeviceInUse,
    NetworkNotReady,
    WlanRadioOff,
    QmiNotReady,
    InvalidArg,
    InvalidIndex,
    NoEntry,
    DeviceStorageFull,
    DeviceNotReady,
    NetworkNotProvisioned,
    NetworkMissingArg,
    DeviceBadSignal,
    PoorlyFormedArg,
    /// End-of-list sentinel used by service-layer iterators (e.g. profile
    /// or PDP-context enumeration) to signal "no more entries", rather
    /// than a true internal error.
    ExtendedInternal,
    /// A numeric code this table does not (yet) name.
    Unknown(u16),
}

impl QmiErrorCode {
    /// Decodes the little-endian `qmi_error` field of a failure response.
    pub fn from_u16(code: u16) -> Self {
        match code {
            0x0000 => QmiErrorCode::None,
            0x0001 => QmiErrorCode::MalformedMsg,
            0x0002 => QmiErrorCode::NoMemory,
            0x0003 => QmiErrorCode::Internal,
            0x0004 => QmiErrorCode::Aborted,
            0x0005 => QmiErrorCode::ClientIdsExhausted,
            0x0006 => QmiErrorCode::UnabortableTransaction,
            0x0007 => QmiErrorCode::InvalidClientId,
            0x0008 => QmiErrorCode::NoThresholdsProvided,
            0x0009 => QmiErrorCode::InvalidHandle,
            0x000A => QmiErrorCode::InvalidProfile,
            0x000B => QmiErrorCode::InvalidPinId,
            0x000C => QmiErrorCode::IncorrectPin,
            0x000D => QmiErrorCode::NoNetworkFound,
            0x000E => QmiErrorCode::CallFailed,
            0x000F => QmiErrorCode::OutOfCall,
            0x0010 => QmiErrorCode::NotProvisioned,
            0x0011 => QmiErrorCode::MissingArg,
            0x0013 => QmiErrorCode::ArgTooLong,
            0x0016 => QmiErrorCode::InvalidTransactionId,
            0x0017 => QmiErrorCode::DeviceInUse,
            0x0018 => QmiErrorCode::NetworkNotReady,
            0x0019 => QmiErrorCode::WlanRadioOff,
            0x001A => QmiErrorCode::QmiNotReady,
            0x001B => QmiErrorCode::InvalidArg,
            0x001C => QmiErrorCode::InvalidIndex,
            0x001D => QmiErrorCode::NoEntry,
            0x001E => QmiErrorCode::DeviceStorageFull,
            0x001F => QmiErrorCode::DeviceNotReady,
            0x0020 => QmiErrorCode::NetworkNotProvisioned,
            0x0021 => QmiErrorCode::NetworkMissingArg,
            0x0022 => QmiErrorCode::DeviceBadSignal,
            0x0023 => QmiErrorCode::PoorlyFormedArg,
            0x0033 => QmiErrorCode::ExtendedInternal,
            other => QmiErrorCode::Unknown(other),
        }
    }

    /// Re-encodes to the numeric wire value, primarily for tests and logs.
    pub fn to_u16(self) -> u16 {
        match self {
            QmiErrorCode::None => 0x0000,
            QmiErrorCode::MalformedMsg => 0x0001,
            QmiErrorCode::NoMemory => 0x0002,
            QmiErrorCode::Internal => 0x0003,
            QmiErrorCode::Aborted => 0x0004,
            QmiErrorCode::ClientIdsExhausted => 0x0005,
            QmiErrorCode::UnabortableTransaction => 0x0006,
            QmiErrorCode::InvalidClientId => 0x0007,
            QmiErrorCode::NoThresholdsProvided => 0x0008,
            QmiErrorCode::InvalidHandle => 0x0009,
            QmiErrorCode::InvalidProfile => 0x000A,
            QmiErrorCode::InvalidPinId => 0x000B,
            QmiErrorCode::IncorrectPin => 0x000C,
            QmiErrorCode::NoNetworkFound => 0x000D,
            QmiErrorCode::CallFailed => 0x000E,
            QmiErrorCode::OutOfCall => 0x000F,
            QmiErrorCode::NotProvisioned => 0x0010,
            QmiErrorCode::MissingArg => 0x0011,
            QmiErrorCode::ArgTooLong => 0x0013,
            QmiErrorCode::InvalidTransactionId => 0x0016,
            QmiErrorCode::DeviceInUse => 0x0017,
            QmiErrorCode::NetworkNotReady => 0x0018,
            QmiErrorCode::WlanRadioOff => 0x0019,
            QmiErrorCode::QmiNotReady => 0x001A,
            QmiErrorCode::InvalidArg => 0x001B,
            QmiErrorCode::InvalidIndex => 0x001C,
            QmiErrorCode::NoEntry => 0x001D,
            QmiErrorCode::DeviceStorageFull => 0x001E,
            QmiErrorCode::DeviceNotReady => 0x001F,
            QmiErrorCode::NetworkNotProvisioned => 0x0020,
            QmiErrorCode::NetworkMissingArg => 0x0021,
            QmiErrorCode::DeviceBadSignal => 0x0022,
            QmiErrorCode::PoorlyFormedArg => 0x0023,
            QmiErrorCode::ExtendedInternal => 0x0033,
            QmiErrorCode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for QmiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QmiErrorCode::Unknown(code) => write!(f, "qmi error {code:#06x}"),
            known => write!(f, "{known:?} ({:#06x})", known.to_u16()),
        }
    }
}

impl std::error::Error for QmiErrorCode {}

/// The uniform shape every call resolves to: a decoded value, or one of
/// the two error families. The caller cannot tell from the shape alone
/// which family fired; the variant carries that.
#[derive(Debug)]
pub enum CallError {
    Transport(TransportError),
    Qmi(QmiErrorCode),
    /// The request's own `decode` function rejected the payload. Carries
    /// whatever the decoder produced, forwarded verbatim.
    Decode(String),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallError::Transport(e) => write!(f, "{e}"),
            CallError::Qmi(e) => write!(f, "{e}"),
            CallError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for CallError {}

impl From<TransportError> for CallError {
    fn from(e: TransportError) -> Self {
        CallError::Transport(e)
    }
}

impl From<QmiErrorCode> for CallError {
    fn from(e: QmiErrorCode) -> Self {
        CallError::Qmi(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip() {
        for code in [0x0000, 0x0002, 0x000C, 0x0016, 0x0033] {
            let parsed = QmiErrorCode::from_u16(code);
            assert!(!matches!(parsed, QmiErrorCode::Unknown(_)));
            assert_eq!(parsed.to_u16(), code);
        }
    }

    #[test]
    fn unrecognized_code_is_unknown_not_a_decode_failure() {
        let parsed = QmiErrorCode::from_u16(0xBEEF);
        assert_eq!(parsed, QmiErrorCode::Unknown(0xBEEF));
        assert_eq!(parsed.to_u16(), 0xBEEF);
    }

    #[test]
    fn scenario_5_invalid_pin_maps_to_a_stable_symbolic_kind() {
        // §8 scenario 5: result=1, error=0x000C must map to *some* stable
        // symbolic kind, not fall through to Unknown.
        assert_eq!(QmiErrorCode::from_u16(0x000C), QmiErrorCode::IncorrectPin);
    }
}
