// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The stateful QMUX transport: a reactor task that owns the device
//! channel, the per-transaction-id call table, and indication dispatch,
//! built on the pure wire format and codec in `qmi-protocol`.
//!
//! A caller never touches the device directly. It calls
//! [`spawn`](reactor::spawn) once to get a [`ReactorHandle`], then uses
//! [`ReactorHandle::call`] to send a [`qmi_protocol::Request`] and await
//! its decoded response.

mod device;
mod indication;
mod reactor;
mod transaction;

pub use indication::{IndicationCallback, RawIndication};
pub use reactor::{spawn, ReactorConfig, ReactorHandle};
