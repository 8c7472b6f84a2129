// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Exercises the reactor against a real non-blocking character device: one
//! side of a pseudo-terminal pair. The master side plays the part of the
//! modem; the reactor opens the slave's path exactly as it would a cdc-wdm
//! node.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use nix::fcntl::OFlag;
use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt, PtyMaster};

use qmi_protocol::qmux;
use qmi_protocol::{tlv, CallError, QmiErrorCode, Request};
use qmi_transport::{spawn, ReactorConfig};

fn open_pty_pair() -> (PtyMaster, PathBuf) {
    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).expect("posix_openpt");
    grantpt(&master).expect("grantpt");
    unlockpt(&master).expect("unlockpt");
    let path = ptsname_r(&master).expect("ptsname_r");
    (master, PathBuf::from(path))
}

fn payload(message_id: u16, tlvs: &[u8]) -> Vec<u8> {
    let mut p = Vec::new();
    p.extend_from_slice(&message_id.to_le_bytes());
    p.extend_from_slice(&(tlvs.len() as u16).to_le_bytes());
    p.extend_from_slice(tlvs);
    p
}

fn result_tlv(qmi_result: u16, qmi_error: u16) -> Vec<u8> {
    let mut v = Vec::with_capacity(4);
    v.extend_from_slice(&qmi_result.to_le_bytes());
    v.extend_from_slice(&qmi_error.to_le_bytes());
    tlv::build(0x02, &v)
}

fn u32_request() -> Request<u32> {
    Request::new(1, payload(0x0020, &[]), |bytes| {
        <[u8; 4]>::try_from(bytes)
            .map(u32::from_le_bytes)
            .map_err(|_| CallError::Decode("expected 4 bytes".into()))
    })
}

/// Reads one outbound frame off the master side and hands back its
/// decoded transaction id, blocking off the async runtime so the reactor
/// (on another worker thread) is free to actually write it.
async fn read_outbound_transaction_id(mut master: PtyMaster) -> (PtyMaster, u16) {
    tokio::task::spawn_blocking(move || {
        let mut buf = [0u8; 256];
        let n = master.read(&mut buf).expect("read outbound request");
        let raw = qmux::decode_frame(&buf[..n]).expect("valid outbound frame");
        let tid = raw.transaction_id;
        (master, tid)
    })
    .await
    .unwrap()
}

fn write_blocking(mut master: PtyMaster, bytes: Vec<u8>) -> PtyMaster {
    master.write_all(&bytes).expect("write to device");
    master
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_call_receives_its_matching_response() {
    let (master, path) = open_pty_pair();
    let handle = spawn(ReactorConfig { name: "test".into(), device_path: path, indication_callback: None });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let call = tokio::spawn({
        let handle = handle.clone();
        async move { handle.call(7, u32_request(), Duration::from_secs(5)).await }
    });

    let (master, tid) = read_outbound_transaction_id(master).await;

    let value = 0xDEAD_BEEFu32;
    let mut body = result_tlv(0, 0);
    body.extend_from_slice(&value.to_le_bytes());
    let response = qmux::encode_frame(1, 7, tid, &[&payload(0x0020, &body)]);
    let master = tokio::task::spawn_blocking(move || write_blocking(master, response)).await.unwrap();
    drop(master);

    assert_eq!(call.await.unwrap().unwrap(), value);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_failure_response_maps_to_its_symbolic_qmi_error_code() {
    let (master, path) = open_pty_pair();
    let handle = spawn(ReactorConfig { name: "test".into(), device_path: path, indication_callback: None });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let call = tokio::spawn({
        let handle = handle.clone();
        async move { handle.call(7, u32_request(), Duration::from_secs(5)).await }
    });

    let (master, tid) = read_outbound_transaction_id(master).await;

    // result=1, error=0x000C: scenario 5, incorrect PIN
    let body = result_tlv(1, 0x000C);
    let response = qmux::encode_frame(1, 7, tid, &[&payload(0x0020, &body)]);
    let master = tokio::task::spawn_blocking(move || write_blocking(master, response)).await.unwrap();
    drop(master);

    match call.await.unwrap() {
        Err(CallError::Qmi(QmiErrorCode::IncorrectPin)) => {}
        other => panic!("expected a symbolic IncorrectPin failure, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_call_with_no_response_times_out() {
    let (master, path) = open_pty_pair();
    let handle = spawn(ReactorConfig { name: "test".into(), device_path: path, indication_callback: None });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let result = handle.call(7, u32_request(), Duration::from_millis(200)).await;
    assert!(matches!(result, Err(CallError::Transport(qmi_protocol::TransportError::Timeout))));

    // keep the master end alive for the duration of the test so the
    // reactor's writes never themselves fail
    drop(master);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn a_pending_call_survives_device_closure_and_still_times_out() {
    // §5 "Reconnect semantics": on a device-closed event the transaction
    // table is left intact so in-flight timers still fire, rather than
    // every pending call being failed immediately with `DeviceClosed`.
    let (master, path) = open_pty_pair();
    let handle = spawn(ReactorConfig { name: "test".into(), device_path: path, indication_callback: None });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let call = tokio::spawn({
        let handle = handle.clone();
        async move { handle.call(7, u32_request(), Duration::from_millis(300)).await }
    });
    // let the request actually reach the (simulated) modem before hanging up
    let (master, _tid) = read_outbound_transaction_id(master).await;
    drop(master);

    // the call's own timer, not an immediate `DeviceClosed`, resolves it
    assert!(matches!(
        call.await.unwrap(),
        Err(CallError::Transport(qmi_protocol::TransportError::Timeout))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn an_indication_reaches_the_subscriber_without_any_outstanding_call() {
    use std::sync::{Arc, Mutex};

    let seen: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let (master, path) = open_pty_pair();
    let handle = spawn(ReactorConfig {
        name: "test".into(),
        device_path: path,
        indication_callback: Some(Arc::new(move |ind: qmi_transport::RawIndication<'_>| {
            seen_clone.lock().unwrap().push(ind.message_id);
        })),
    });
    tokio::time::sleep(Duration::from_millis(150)).await;

    let event_tlv = tlv::build(0x01, b"registered");
    let mut framed = qmux::encode_frame(3, 1, 9, &[&payload(0x0022, &event_tlv)]);
    framed[3] = 0x02; // indication flag
    let master = tokio::task::spawn_blocking(move || write_blocking(master, framed)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(master);
    let _ = handle; // keep the reactor alive for the whole test

    assert_eq!(*seen.lock().unwrap(), vec![0x0022]);
}
