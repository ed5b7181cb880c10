mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{frame, mock, payload, test_config, TEST_INTERVAL};
use uds_tester::can::{AdapterConfig, AsyncCanAdapter, Identifier};
use uds_tester::session::{MemorySink, RunState, SessionController};
use uds_tester::Error;

static START_SESSION: [u8; 2] = [0x10, 0x03];
static TESTER_PRESENT: [u8; 2] = [0x3e, 0x00];

fn controller() -> (SessionController, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (SessionController::new(test_config(), sink.clone()), sink)
}

#[tokio::test]
async fn session_start_then_keepalives() {
    let (adapter, handle) = mock();
    let (controller, _) = controller();

    let result = controller
        .run_with_adapter(AsyncCanAdapter::new(adapter), tokio::time::sleep(TEST_INTERVAL * 7 / 2))
        .await;
    assert_eq!(result, Ok(()));

    let sent = handle.sent();
    assert!(!sent.is_empty());
    assert_eq!(payload(&sent[0]), START_SESSION);
    assert!(sent.iter().all(|f| f.id == Identifier::Standard(0x7e0)));

    let keepalives = sent[1..].iter().filter(|f| payload(f) == TESTER_PRESENT).count();
    assert_eq!(keepalives, sent.len() - 1);
    assert!((3..=4).contains(&keepalives), "{} keepalives", keepalives);

    assert_eq!(handle.closes(), 1);
}

#[tokio::test]
async fn keepalive_failure_is_not_fatal() {
    let (adapter, handle) = mock();
    // Attempt 1 is the session start, attempt 3 the second Tester Present
    handle.fail_on(3);
    let (controller, sink) = controller();

    let result = controller
        .run_with_adapter(AsyncCanAdapter::new(adapter), tokio::time::sleep(TEST_INTERVAL * 9 / 2))
        .await;
    assert_eq!(result, Ok(()));

    let lines = sink.lines();
    let error = lines
        .iter()
        .position(|l| l.starts_with("Error: TesterPresent failed"))
        .expect("failure reported");
    assert!(lines[error + 1..].iter().any(|l| l.starts_with("Tx ")), "{:#?}", lines);

    let keepalives = handle.sent().iter().filter(|f| payload(f) == TESTER_PRESENT).count();
    assert!(keepalives >= 2, "{} keepalives", keepalives);
}

#[tokio::test]
async fn session_start_failure() {
    let (adapter, handle) = mock();
    handle.fail_on(1);
    let (controller, sink) = controller();

    let result = controller
        .run_with_adapter(AsyncCanAdapter::new(adapter), std::future::pending())
        .await;

    assert!(matches!(result, Err(Error::TransportSend(_))), "{:?}", result);
    assert!(handle.sent().is_empty());
    assert_eq!(handle.closes(), 1);
    assert!(sink.lines().iter().any(|l| l.starts_with("Error: StartExtendedSession failed")));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let (adapter, handle) = mock();
    let state = RunState::new(AsyncCanAdapter::new(adapter));

    assert!(state.is_running());
    assert!(state.shutdown());
    assert!(!state.shutdown());
    assert!(!state.is_running());
    assert!(state.adapter().is_closed());

    drop(state);
    assert_eq!(handle.closes(), 1);
}

#[tokio::test]
async fn interrupt_during_send() {
    let (adapter, handle) = mock();
    // First Tester Present hangs in the driver well past the interrupt
    handle.slow_on(2, TEST_INTERVAL * 3);
    let (controller, _) = controller();

    let interrupt_at = TEST_INTERVAL * 3 / 2;
    let start = Instant::now();
    let result = controller
        .run_with_adapter(
            AsyncCanAdapter::with_grace(adapter, Duration::from_millis(50)),
            tokio::time::sleep(interrupt_at),
        )
        .await;

    assert_eq!(result, Ok(()));
    assert!(start.elapsed() < interrupt_at + TEST_INTERVAL, "took {:?}", start.elapsed());

    // The detached driver thread still releases the device once the send returns
    tokio::time::sleep(TEST_INTERVAL * 3).await;
    assert_eq!(handle.closes(), 1);
}

#[tokio::test]
async fn interrupt_during_session_start() {
    let (adapter, handle) = mock();
    // The session start request hangs in the driver
    handle.slow_on(1, TEST_INTERVAL * 10);
    let (controller, sink) = controller();

    let interrupt_at = TEST_INTERVAL;
    let start = Instant::now();
    let result = controller
        .run_with_adapter(
            AsyncCanAdapter::with_grace(adapter, Duration::from_millis(50)),
            tokio::time::sleep(interrupt_at),
        )
        .await;

    assert_eq!(result, Ok(()));
    assert!(start.elapsed() < interrupt_at + TEST_INTERVAL, "took {:?}", start.elapsed());
    assert!(sink.lines().iter().all(|l| !l.starts_with("Tx ")));
}

#[tokio::test]
async fn shutdown_with_hung_driver_is_bounded() {
    let (adapter, handle) = mock();
    handle.slow_on(1, TEST_INTERVAL * 10);
    let state = RunState::new(AsyncCanAdapter::with_grace(adapter, Duration::from_millis(50)));

    let stuck = tokio::time::timeout(
        Duration::from_millis(20),
        state.adapter().send(&frame(0x7e0, &[0x02, 0x3e, 0x00])),
    )
    .await;
    assert!(stuck.is_err());

    let start = Instant::now();
    assert!(state.shutdown());
    assert!(start.elapsed() < TEST_INTERVAL * 2, "took {:?}", start.elapsed());
}

#[tokio::test]
async fn received_frames_are_printed() {
    let (adapter, handle) = mock();
    let (controller, sink) = controller();

    // Frames broadcast before the listener subscribes are not replayed
    let inject = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(TEST_INTERVAL / 2).await;
        inject.inject(frame(0x7e8, &[0x06, 0x50, 0x03, 0x00, 0x32, 0x01, 0xf4]));
        inject.inject(frame(0x123, &[0xde, 0xad]));
    });

    let result = controller
        .run_with_adapter(AsyncCanAdapter::new(adapter), tokio::time::sleep(TEST_INTERVAL * 2))
        .await;
    assert_eq!(result, Ok(()));

    let lines = sink.lines();
    let rx: Vec<&String> = lines.iter().filter(|l| l.starts_with("Rx ")).collect();
    assert_eq!(rx.len(), 2, "{:#?}", lines);
    assert!(rx[1].ends_with("123      [2] DE AD"));
}

#[tokio::test]
async fn output_lines_are_whole() {
    let mut config = test_config();
    config.keepalive_interval = Duration::from_millis(20);
    let sink = Arc::new(MemorySink::new());
    let controller = SessionController::new(config, sink.clone());

    let sim = uds_tester::can::adapter_config::SimulationConfig {
        interval: Duration::from_millis(2),
        playback: None,
    };
    let result = controller
        .run(&AdapterConfig::Simulated(sim), tokio::time::sleep(Duration::from_millis(300)))
        .await;
    assert_eq!(result, Ok(()));

    let lines = sink.lines();
    assert!(lines.iter().any(|l| l.starts_with("Tx ")));
    assert!(lines.iter().any(|l| l.starts_with("Rx ")));
    for line in &lines {
        assert!(!line.contains('\n'), "{:?}", line);
        assert!(line.starts_with("Tx ") || line.starts_with("Rx "), "{:?}", line);
    }
}

#[tokio::test]
async fn disconnect_ends_session() {
    let (adapter, handle) = mock();
    let (controller, _) = controller();

    let disconnect = handle.clone();
    tokio::spawn(async move {
        tokio::time::sleep(TEST_INTERVAL * 3 / 2).await;
        disconnect.disconnect();
    });

    let start = Instant::now();
    let result = controller
        .run_with_adapter(AsyncCanAdapter::new(adapter), std::future::pending())
        .await;

    assert_eq!(result, Err(Error::Disconnected));
    assert!(start.elapsed() < TEST_INTERVAL * 5);
    assert_eq!(handle.closes(), 1);
}

#[tokio::test]
async fn invalid_config_does_not_open() {
    let mut config = test_config();
    config.keepalive_interval = Duration::ZERO;
    let controller = SessionController::new(config, Arc::new(MemorySink::new()));

    let result = controller
        .run(&AdapterConfig::Simulated(Default::default()), std::future::pending())
        .await;
    assert!(matches!(result, Err(Error::Config(_))));
}

#[cfg(feature = "test-vcan")]
#[tokio::test]
#[serial_test::serial]
async fn vcan_session() {
    let (controller, sink) = controller();

    let result = controller
        .run(
            &AdapterConfig::SocketCAN(Some("vcan0".to_owned())),
            tokio::time::sleep(TEST_INTERVAL * 5 / 2),
        )
        .await;
    assert_eq!(result, Ok(()));

    let tx = sink.lines().iter().filter(|l| l.starts_with("Tx ")).count();
    assert!(tx >= 2, "{} requests sent", tx);
}
