mod common;

use std::time::Duration;

use common::{frame, mock};
use uds_tester::can::{AsyncCanAdapter, Identifier};
use uds_tester::{Error, StreamExt};

static BULK_NUM_FRAMES_ASYNC: u64 = 0x1000;
static BULK_ASYNC_TIMEOUT_MS: u64 = 5000;

/// Sends a large number of frames to the adapter, and awaits them simultaneously.
/// This tests the functionality in [`AsyncCanAdapter`] to resolve the future when the frame is handed to the driver.
async fn bulk_send(adapter: &AsyncCanAdapter) -> Vec<uds_tester::can::Frame> {
    let mut frames = vec![];

    for i in 0..BULK_NUM_FRAMES_ASYNC {
        frames.push(frame(0x123, &i.to_be_bytes()));
    }

    let r = frames.iter().map(|frame| adapter.send(frame));
    let results = tokio::time::timeout(
        Duration::from_millis(BULK_ASYNC_TIMEOUT_MS),
        futures::future::join_all(r),
    )
    .await
    .unwrap();

    assert!(results.iter().all(|r| r.is_ok()));
    frames
}

#[tokio::test]
async fn mock_bulk_send_in_order() {
    let (adapter, handle) = mock();
    let adapter = AsyncCanAdapter::new(adapter);

    let frames = bulk_send(&adapter).await;
    assert_eq!(handle.sent(), frames);
}

#[tokio::test]
async fn send_failure_reaches_sender() {
    let (adapter, handle) = mock();
    handle.fail_on(2);
    let adapter = AsyncCanAdapter::new(adapter);

    assert_eq!(adapter.send(&frame(0x7e0, &[0x02, 0x10, 0x03])).await, Ok(()));
    assert!(matches!(
        adapter.send(&frame(0x7e0, &[0x02, 0x3e, 0x00])).await,
        Err(Error::TransportSend(_))
    ));
    assert_eq!(adapter.send(&frame(0x7e0, &[0x02, 0x3e, 0x00])).await, Ok(()));
    assert_eq!(handle.sent().len(), 2);
}

#[tokio::test]
async fn subscribers_see_all_frames() {
    let (adapter, handle) = mock();
    let adapter = AsyncCanAdapter::new(adapter);

    let mut all = adapter.recv();
    let mut filtered = adapter.recv_filter(|f| f.id == Identifier::Standard(0x7e8));

    handle.inject(frame(0x100, &[0x01]));
    handle.inject(frame(0x7e8, &[0x02, 0x7e, 0x00]));

    let timeout = Duration::from_millis(500);
    let first = tokio::time::timeout(timeout, all.next()).await.unwrap().unwrap();
    let second = tokio::time::timeout(timeout, all.next()).await.unwrap().unwrap();
    assert_eq!(first.data, vec![0x01]);
    assert_eq!(second.data, vec![0x02, 0x7e, 0x00]);
    assert!(second.timestamp >= first.timestamp);

    let response = tokio::time::timeout(timeout, filtered.next()).await.unwrap().unwrap();
    assert_eq!(response.data, vec![0x02, 0x7e, 0x00]);
}

#[tokio::test]
async fn close_ends_streams_and_sends() {
    let (adapter, handle) = mock();
    let adapter = AsyncCanAdapter::new(adapter);
    let mut stream = adapter.recv();

    assert!(adapter.close());
    assert!(!adapter.close());
    assert!(adapter.is_closed());
    assert_eq!(handle.closes(), 1);

    let end = tokio::time::timeout(Duration::from_millis(500), stream.next()).await.unwrap();
    assert!(end.is_none());
    assert_eq!(adapter.send(&frame(0x7e0, &[0x02, 0x3e, 0x00])).await, Err(Error::Disconnected));

    drop(adapter);
    assert_eq!(handle.closes(), 1);
}

#[tokio::test]
async fn driver_disconnect_closes_adapter() {
    let (adapter, handle) = mock();
    let adapter = AsyncCanAdapter::new(adapter);
    let mut stream = adapter.recv();

    handle.disconnect();

    let end = tokio::time::timeout(Duration::from_millis(500), stream.next()).await.unwrap();
    assert!(end.is_none());
    assert_eq!(handle.closes(), 1);
}

#[cfg(feature = "test-vcan")]
#[tokio::test]
#[serial_test::serial]
async fn vcan_bulk_send_async() {
    let adapter = uds_tester::socketcan::SocketCan::new_async("vcan0").unwrap();
    bulk_send(&adapter).await;
}

#[cfg(feature = "test-vcan")]
#[tokio::test]
#[serial_test::serial]
async fn vcan_receive_from_other_socket() {
    let sender = uds_tester::socketcan::SocketCan::new_async("vcan0").unwrap();
    let receiver = uds_tester::socketcan::SocketCan::new_async("vcan0").unwrap();
    let mut stream = receiver.recv_filter(|f| f.id == Identifier::Standard(0x7e8));

    let sent = frame(0x7e8, &[0x06, 0x50, 0x03, 0x00, 0x32, 0x01, 0xf4]);
    sender.send(&sent).await.unwrap();

    let received = tokio::time::timeout(Duration::from_millis(500), stream.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received.data, sent.data);
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
#[tokio::test]
#[serial_test::serial]
async fn socketcan_open_nonexistent() {
    let e = uds_tester::socketcan::SocketCan::new("doestnotexist");

    match e {
        Err(Error::NotFound) => {}
        _ => panic!("Expected NotFound error"),
    }
}
