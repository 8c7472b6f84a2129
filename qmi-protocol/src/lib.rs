// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire format, TLV codec, and error taxonomy for QMUX/QMI.
//!
//! This crate has no I/O and no notion of a reactor; see `qmi-transport`
//! for the stateful transport built on top of it. Everything here is
//! synchronous and independently unit-testable, matching the split
//! between a service's wire types and the task that actually owns the
//! device.

pub mod error;
pub mod message;
pub mod qmux;
pub mod request;
pub mod tlv;

pub use error::{CallError, QmiErrorCode, TransportError};
pub use message::{DecodedMessage, MessageKind, Outcome};
pub use qmux::ServiceClass;
pub use request::Request;
