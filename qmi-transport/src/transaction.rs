// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The transaction table (C4): maps an outstanding transaction id to the
//! closure that will turn its eventual response (or transport failure)
//! into whatever the caller's `await` resolves to.
//!
//! Control (service id 0) and service transactions share one `u16` key
//! space, but `allocate` only ever hands out ids in the disjoint ranges
//! `1..=255` (control) and `256..=65535` (service), so the two classes can
//! never collide by construction.

use std::collections::HashMap;

use qmi_protocol::{CallError, Outcome, ServiceClass};
use tokio::task::JoinHandle;

/// What a completed transaction resolves its waiter with.
pub(crate) enum CallResult {
    Decoded(Outcome, Vec<u8>),
    Failed(qmi_protocol::TransportError),
}

pub(crate) type Completer = Box<dyn FnOnce(CallResult) + Send>;

struct Entry {
    completer: Completer,
    timer: JoinHandle<()>,
}

pub(crate) struct TransactionTable {
    entries: HashMap<u16, Entry>,
    last_control: u8,
    last_service: u16,
}

impl TransactionTable {
    pub(crate) fn new() -> Self {
        TransactionTable { entries: HashMap::new(), last_control: 0, last_service: 255 }
    }

    /// Allocates the next transaction id for `class`, wrapping within that
    /// class's range. Does not check for in-use ids: at 254 outstanding
    /// control calls (or 65,279 service calls) something upstream is
    /// already badly wrong, so a debug-only assertion catches it instead
    /// of silently overwriting an entry.
    pub(crate) fn allocate(&mut self, class: ServiceClass) -> u16 {
        let id = match class {
            ServiceClass::Control => {
                self.last_control = if self.last_control >= 255 { 1 } else { self.last_control + 1 };
                self.last_control as u16
            }
            ServiceClass::Service => {
                self.last_service = if self.last_service >= 65535 { 256 } else { self.last_service + 1 };
                self.last_service
            }
        };
        debug_assert!(
            !self.entries.contains_key(&id),
            "transaction id {id} reallocated while still outstanding"
        );
        id
    }

    pub(crate) fn install(&mut self, id: u16, completer: Completer, timer: JoinHandle<()>) {
        self.entries.insert(id, Entry { completer, timer });
    }

    /// Resolves `id` with a decoded response (success or QMI-level
    /// failure). Returns `false` if `id` names no outstanding call, e.g. a
    /// late or duplicate response.
    pub(crate) fn complete(&mut self, id: u16, outcome: Outcome, message: Vec<u8>) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                entry.timer.abort();
                (entry.completer)(CallResult::Decoded(outcome, message));
                true
            }
            None => false,
        }
    }

    /// Resolves `id` with a transport-level failure (timeout, write
    /// failure, device closed, shutdown) rather than a decoded response.
    pub(crate) fn fail(&mut self, id: u16, err: qmi_protocol::TransportError) {
        if let Some(entry) = self.entries.remove(&id) {
            entry.timer.abort();
            (entry.completer)(CallResult::Failed(err));
        }
    }

    /// Fails every outstanding transaction, e.g. on shutdown or when the
    /// device channel itself is gone and there's nothing left to wait for.
    pub(crate) fn fail_all(&mut self, err: qmi_protocol::TransportError) {
        for (_, entry) in self.entries.drain() {
            entry.timer.abort();
            (entry.completer)(CallResult::Failed(err));
        }
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Converts a `CallResult` into the `Result<T, CallError>` a caller's
/// `decode` produces, the last step before handing it to the waiter.
pub(crate) fn resolve<T>(
    result: CallResult,
    decode: &(dyn Fn(&[u8]) -> Result<T, CallError> + Send + Sync),
) -> Result<T, CallError> {
    match result {
        CallResult::Decoded(Outcome::Success, message) => decode(&message),
        CallResult::Decoded(Outcome::Failure(code), _message) => Err(CallError::Qmi(code)),
        CallResult::Failed(err) => Err(CallError::Transport(err)),
    }
}
