#![allow(dead_code)]
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use uds_tester::can::{CanAdapter, Frame, Identifier};
use uds_tester::session::SessionConfig;
use uds_tester::Error;

#[derive(Default)]
struct MockState {
    sent: Vec<Frame>,
    attempts: usize,
    fail_on: Vec<usize>,
    slow_on: Vec<usize>,
    send_delay: Duration,
    rx: VecDeque<Frame>,
    disconnected: bool,
    closes: usize,
}

/// In-memory CAN adapter. Records sent frames, fails or delays selected send attempts and returns injected frames from `recv`.
/// Send attempts are counted from 1 across the whole lifetime of the adapter.
pub struct MockAdapter {
    state: Arc<Mutex<MockState>>,
}

/// Test side of a [`MockAdapter`], usable after the adapter moved into its background thread.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<MockState>>,
}

pub fn mock() -> (MockAdapter, MockHandle) {
    let state = Arc::new(Mutex::new(MockState::default()));
    (
        MockAdapter { state: state.clone() },
        MockHandle { state },
    )
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHandle {
    /// Make send attempt `n` fail with a transport error.
    pub fn fail_on(&self, n: usize) {
        lock(&self.state).fail_on.push(n);
    }

    /// Make send attempt `n` block the adapter thread for `delay`.
    pub fn slow_on(&self, n: usize, delay: Duration) {
        let mut state = lock(&self.state);
        state.slow_on.push(n);
        state.send_delay = delay;
    }

    pub fn inject(&self, frame: Frame) {
        lock(&self.state).rx.push_back(frame);
    }

    /// Every following `recv` reports the device as gone.
    pub fn disconnect(&self) {
        lock(&self.state).disconnected = true;
    }

    pub fn sent(&self) -> Vec<Frame> {
        lock(&self.state).sent.clone()
    }

    pub fn closes(&self) -> usize {
        lock(&self.state).closes
    }
}

impl CanAdapter for MockAdapter {
    fn send(&mut self, frames: &mut VecDeque<Frame>) -> uds_tester::Result<()> {
        while let Some(frame) = frames.front() {
            let (fail, delay) = {
                let mut state = lock(&self.state);
                if state.disconnected {
                    return Err(Error::Disconnected);
                }
                state.attempts += 1;
                let attempt = state.attempts;
                let delay = state.slow_on.contains(&attempt).then_some(state.send_delay);
                (state.fail_on.contains(&attempt), delay)
            };

            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }

            if fail {
                return Err(Error::TransportSend("injected failure".to_owned()));
            }

            lock(&self.state).sent.push(frame.clone());
            frames.pop_front();
        }
        Ok(())
    }

    fn recv(&mut self) -> uds_tester::Result<Vec<Frame>> {
        let mut state = lock(&self.state);
        if state.disconnected {
            return Err(Error::Disconnected);
        }
        Ok(state.rx.drain(..).collect())
    }

    fn close(&mut self) {
        lock(&self.state).closes += 1;
    }
}

/// Short interval so a few keepalive periods fit in a test.
pub const TEST_INTERVAL: Duration = Duration::from_millis(100);

pub fn test_config() -> SessionConfig {
    let mut config = SessionConfig::new(0x7e0);
    config.keepalive_interval = TEST_INTERVAL;
    config
}

pub fn frame(id: u32, data: &[u8]) -> Frame {
    Frame::new(0, Identifier::Standard(id), data).unwrap()
}

/// UDS payload carried in a single frame, without the PCI byte.
pub fn payload(frame: &Frame) -> Vec<u8> {
    uds_tester::uds::single_frame_payload(frame)
        .map(|p| p.to_vec())
        .unwrap_or_default()
}
