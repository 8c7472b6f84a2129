// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The driver/reactor (C5): a single task that owns the device channel,
//! the QMUX accumulation buffer, and the transaction table, and is the
//! only place in this crate that ever touches the device.
//!
//! Everything else (`call`, `shutdown`) is a message sent across an
//! unbounded channel into this task, mirroring the request/IPC pattern
//! used elsewhere in this tree: callers never share mutable state with
//! the reactor, they hand it a message and wait for a reply.

use std::path::PathBuf;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use qmi_protocol::{CallError, DecodedMessage, MessageKind, Request, ServiceClass, TransportError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::device::DeviceChannel;
use crate::indication::{self, IndicationCallback};
use crate::transaction::{resolve, CallResult, Completer, TransactionTable};

/// The time between failed reopen attempts once the device has closed.
const REOPEN_BACKOFF: Duration = Duration::from_millis(500);
/// A call's outer safety-net wait is twice its own timeout, so the
/// reactor's own `{timeout, tid}` always has the chance to fire first and
/// produce the more specific `TransportError::Timeout` outcome.
const OUTER_WAIT_FACTOR: u32 = 2;

pub struct ReactorConfig {
    pub name: String,
    pub device_path: PathBuf,
    pub indication_callback: Option<IndicationCallback>,
}

enum ReactorEvent {
    Call {
        service_id: u8,
        client_id: u8,
        payload: Vec<u8>,
        timeout: Duration,
        completer: Completer,
    },
    Timeout(u16),
    Shutdown,
}

/// A cheap, cloneable handle to a running reactor. Dropping every handle
/// does not stop the reactor; call [`ReactorHandle::shutdown`] explicitly.
#[derive(Clone)]
pub struct ReactorHandle {
    events_tx: mpsc::UnboundedSender<ReactorEvent>,
}

impl ReactorHandle {
    /// Submits `request` on behalf of `client_id` and waits for its
    /// decoded response, a QMI-level failure, or a transport error.
    pub async fn call<T: Send + 'static>(
        &self,
        client_id: u8,
        request: Request<T>,
        timeout: Duration,
    ) -> Result<T, CallError> {
        let Request { service_id, payload, decode } = request;
        let (tx, rx) = oneshot::channel::<Result<T, CallError>>();
        let completer: Completer = Box::new(move |result: CallResult| {
            let _ = tx.send(resolve(result, decode.as_ref()));
        });

        self.events_tx
            .send(ReactorEvent::Call { service_id, client_id, payload, timeout, completer })
            .map_err(|_| CallError::Transport(TransportError::Shutdown))?;

        match tokio::time::timeout(timeout * OUTER_WAIT_FACTOR, rx).await {
            Ok(Ok(result)) => result,
            // the oneshot sender was dropped without sending, which only
            // happens if the reactor task itself died mid-flight
            Ok(Err(_)) => Err(CallError::Transport(TransportError::Shutdown)),
            // the reactor's own timer should always fire first; this is
            // the safety net for a reactor that's gone catatonic
            Err(_elapsed) => Err(CallError::Transport(TransportError::Timeout)),
        }
    }

    /// Asks the reactor to stop. Every outstanding call resolves with
    /// `TransportError::Shutdown`.
    pub fn shutdown(&self) {
        let _ = self.events_tx.send(ReactorEvent::Shutdown);
    }
}

/// Spawns the reactor task and returns a handle to it.
pub fn spawn(config: ReactorConfig) -> ReactorHandle {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let handle = ReactorHandle { events_tx: events_tx.clone() };
    tokio::spawn(run(config, events_rx, events_tx));
    handle
}

async fn run(
    config: ReactorConfig,
    mut events_rx: mpsc::UnboundedReceiver<ReactorEvent>,
    events_tx: mpsc::UnboundedSender<ReactorEvent>,
) {
    let mut table = TransactionTable::new();
    let mut device = open_logged(&config).await;
    let mut read_buf = BytesMut::with_capacity(4096);
    let mut scratch = [0u8; 4096];

    loop {
        if device.is_none() {
            tokio::select! {
                event = events_rx.recv() => {
                    if !handle_event(event, &mut table, &mut device, &config, &events_tx).await {
                        return;
                    }
                }
                () = tokio::time::sleep(REOPEN_BACKOFF) => {
                    device = open_logged(&config).await;
                }
            }
            continue;
        }

        tokio::select! {
            event = events_rx.recv() => {
                if !handle_event(event, &mut table, &mut device, &config, &events_tx).await {
                    return;
                }
            }
            read_result = device.as_mut().unwrap().read(&mut scratch) => {
                match read_result {
                    Ok(0) => {
                        log::warn!("{}: device closed", config.name);
                        device = None;
                        // Pending transactions are left in the table: their
                        // timers are still armed and will fire normally
                        // (§5 "Reconnect semantics", §9). Only new calls
                        // submitted while `device` is `None` are failed
                        // outright, in `handle_call` below.
                    }
                    Ok(n) => {
                        read_buf.extend_from_slice(&scratch[..n]);
                        drain_frames(&mut read_buf, &mut table, &config);
                    }
                    Err(e) => {
                        log::error!("{}: read error: {e}", config.name);
                        device = None;
                    }
                }
            }
        }
    }
}

/// Handles one event from the channel. Returns `false` when the reactor
/// should stop.
async fn handle_event(
    event: Option<ReactorEvent>,
    table: &mut TransactionTable,
    device: &mut Option<DeviceChannel>,
    config: &ReactorConfig,
    events_tx: &mpsc::UnboundedSender<ReactorEvent>,
) -> bool {
    match event {
        Some(ReactorEvent::Call { service_id, client_id, payload, timeout, completer }) => {
            handle_call(table, device, config, events_tx, service_id, client_id, payload, timeout, completer)
                .await;
            true
        }
        Some(ReactorEvent::Timeout(tid)) => {
            table.fail(tid, TransportError::Timeout);
            true
        }
        Some(ReactorEvent::Shutdown) | None => {
            log::info!("{}: shutting down", config.name);
            table.fail_all(TransportError::Shutdown);
            false
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_call(
    table: &mut TransactionTable,
    device: &mut Option<DeviceChannel>,
    config: &ReactorConfig,
    events_tx: &mpsc::UnboundedSender<ReactorEvent>,
    service_id: u8,
    client_id: u8,
    payload: Vec<u8>,
    timeout: Duration,
    completer: Completer,
) {
    let class = ServiceClass::of(service_id);
    let tid = table.allocate(class);

    let timer = {
        let events_tx = events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = events_tx.send(ReactorEvent::Timeout(tid));
        })
    };
    table.install(tid, completer, timer);

    let Some(dev) = device.as_mut() else {
        table.fail(tid, TransportError::DeviceClosed);
        return;
    };

    let framed = qmi_protocol::qmux::encode_frame(service_id, client_id, tid, &[&payload]);
    if let Err(e) = dev.write_all_vectored(&[&framed]).await {
        log::error!("{}: write failed: {e}", config.name);
        *device = None;
        table.fail(tid, TransportError::WriteError);
    }
}

/// Peels complete frames off the front of `buf`, routing each one, until
/// what's left is either empty or not yet a whole frame.
fn drain_frames(buf: &mut BytesMut, table: &mut TransactionTable, config: &ReactorConfig) {
    loop {
        match qmi_protocol::qmux::frame_len_hint(buf) {
            Ok(None) => return,
            Ok(Some(len)) => {
                if buf.len() < len {
                    return;
                }
                let frame = buf.split_to(len);
                match qmi_protocol::qmux::decode_frame(&frame) {
                    Ok(raw) => route(DecodedMessage::from_raw_frame(raw), table, config),
                    Err(e) => {
                        log::warn!("{}: dropping malformed frame: {e}", config.name);
                    }
                }
            }
            Err(e) => {
                // resync by dropping one byte of garbage rather than
                // getting stuck forever on a bad sentinel
                log::warn!("{}: {e}, resyncing", config.name);
                buf.advance(1);
                if buf.is_empty() {
                    return;
                }
            }
        }
    }
}

fn route(decoded: DecodedMessage<'_>, table: &mut TransactionTable, config: &ReactorConfig) {
    match decoded.kind {
        MessageKind::Indication => indication::dispatch(config.indication_callback.as_ref(), &decoded),
        MessageKind::Response => {
            let message = decoded.message.to_vec();
            if !table.complete(decoded.transaction_id, decoded.outcome, message) {
                log::warn!(
                    "{}: response for unknown or already-resolved transaction {}",
                    config.name,
                    decoded.transaction_id
                );
            }
        }
    }
}

async fn open_logged(config: &ReactorConfig) -> Option<DeviceChannel> {
    match DeviceChannel::open(&config.device_path).await {
        Ok(dev) => {
            log::info!("{}: opened {}", config.name, config.device_path.display());
            Some(dev)
        }
        Err(e) => {
            log::error!("{}: failed to open {}: {e}", config.name, config.device_path.display());
            None
        }
    }
}
