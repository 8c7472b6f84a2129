// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The request/response contract (C7): the only shape a service codec
//! needs to produce to be usable over this transport.

use crate::error::CallError;

/// A uniform request descriptor. `payload` is opaque to the transport
/// beyond its length: it already carries the 16-bit little-endian message
/// id, 16-bit TLV-area length, and TLV body that `qmux::encode_frame`
/// expects as its payload chunk. `decode` converts a successful response's
/// remaining TLVs (the result TLV already stripped) into `T`.
///
/// Because this is the only coupling between the transport and a
/// service's payload semantics, a service codec can be exercised
/// end-to-end by calling `decode` directly on known-good bytes, with no
/// transport involved at all.
pub struct Request<T> {
    pub service_id: u8,
    pub payload: Vec<u8>,
    pub decode: Box<dyn Fn(&[u8]) -> Result<T, CallError> + Send + Sync>,
}

impl<T> Request<T> {
    pub fn new(
        service_id: u8,
        payload: Vec<u8>,
        decode: impl Fn(&[u8]) -> Result<T, CallError> + Send + Sync + 'static,
    ) -> Self {
        Request { service_id, payload, decode: Box::new(decode) }
    }
}
