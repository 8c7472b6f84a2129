// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The indication dispatcher (C6): routes unsolicited, non-transaction
//! frames to whatever subscriber callback was installed at construction.
//!
//! Per-service indication bodies are out of scope here; this just hands
//! the subscriber the header fields and the raw remaining TLV bytes. A
//! subscriber callback that panics must never take the reactor down with
//! it, so the invocation is wrapped in `catch_unwind`.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use qmi_protocol::DecodedMessage;

/// An indication with its framing-level fields already pulled out. The
/// TLV body is still raw: a service codec layered on top decides what to
/// do with it.
#[derive(Debug)]
pub struct RawIndication<'a> {
    pub service_id: u8,
    pub client_id: u8,
    pub message_id: u16,
    pub message: &'a [u8],
}

pub type IndicationCallback = Arc<dyn Fn(RawIndication<'_>) + Send + Sync>;

pub(crate) fn dispatch(callback: Option<&IndicationCallback>, decoded: &DecodedMessage<'_>) {
    let Some(callback) = callback else {
        log::trace!("qmi-transport: indication dropped, no subscriber installed");
        return;
    };
    let indication = RawIndication {
        service_id: decoded.service_id,
        client_id: decoded.client_id,
        message_id: decoded.message_id,
        message: decoded.message,
    };
    if catch_unwind(AssertUnwindSafe(|| callback(indication))).is_err() {
        log::warn!("qmi-transport: subscriber callback panicked handling an indication, dropped");
    }
}
