//! Sends the session start request once, then Tester Present on a fixed period.
use std::sync::atomic::{AtomicUsize, Ordering};

use strum_macros::Display;
use tokio::sync::watch;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::{CancelToken, OutputSink, SessionConfig};
use crate::can::AsyncCanAdapter;
use crate::error::Error;
use crate::summary::hex_bytes;
use crate::uds::{encode, DiagnosticRequest};
use crate::Result;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum SchedulerState {
    Idle,
    Starting,
    Running,
    /// Terminal, no further sends
    Stopped,
}

/// Send counters, mostly useful for tests and the final log line.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct KeepaliveStats {
    pub session_starts: usize,
    pub tester_presents: usize,
    pub poll_requests: usize,
    pub send_errors: usize,
}

/// Keepalive state machine `Idle -> Starting -> Running -> Stopped`.
pub struct KeepaliveScheduler<'a> {
    adapter: &'a AsyncCanAdapter,
    config: &'a SessionConfig,
    sink: &'a dyn OutputSink,
    state: watch::Sender<SchedulerState>,
    session_starts: AtomicUsize,
    tester_presents: AtomicUsize,
    poll_requests: AtomicUsize,
    send_errors: AtomicUsize,
}

impl<'a> KeepaliveScheduler<'a> {
    pub fn new(adapter: &'a AsyncCanAdapter, config: &'a SessionConfig, sink: &'a dyn OutputSink) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            adapter,
            config,
            sink,
            state,
            session_starts: AtomicUsize::new(0),
            tester_presents: AtomicUsize::new(0),
            poll_requests: AtomicUsize::new(0),
            send_errors: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> KeepaliveStats {
        KeepaliveStats {
            session_starts: self.session_starts.load(Ordering::Relaxed),
            tester_presents: self.tester_presents.load(Ordering::Relaxed),
            poll_requests: self.poll_requests.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }

    fn set_state(&self, state: SchedulerState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!("Keepalive {} -> {}", previous, state);
        }
    }

    /// Encode and send one request, then print it.
    async fn send_request(&self, request: DiagnosticRequest) -> Result<()> {
        let frame = encode(request, self.config);
        self.adapter.send(&frame).await?;

        self.sink.emit(&format!(
            "Tx {} {}: [{}] {}",
            crate::obd::ecu_name(frame.id),
            request.description(self.config.request_id),
            frame.dlc(),
            hex_bytes(&frame.data)
        ));

        Ok(())
    }

    fn report_error(&self, request: DiagnosticRequest, e: &Error) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
        error!("{:?} failed: {}", request, e);
        self.sink.emit(&format!("Error: {:?} failed: {}", request, e));
    }

    /// `Idle -> Starting -> Running`. The session start request is sent exactly once and not retried; on failure the scheduler stops and the error is returned.
    pub async fn start(&self) -> Result<()> {
        if self.state() != SchedulerState::Idle {
            return Ok(());
        }

        self.set_state(SchedulerState::Starting);
        info!("Starting extended diagnostic session on {:?}", self.config.request_identifier());

        match self.send_request(DiagnosticRequest::StartExtendedSession).await {
            Ok(()) => {
                self.session_starts.fetch_add(1, Ordering::Relaxed);
                self.set_state(SchedulerState::Running);
                Ok(())
            }
            Err(e) => {
                self.report_error(DiagnosticRequest::StartExtendedSession, &e);
                self.set_state(SchedulerState::Stopped);
                Err(e)
            }
        }
    }

    /// One keepalive period: wait for the tick, send Tester Present, then the poll requests.
    /// Only a disconnect is returned as an error, other send failures are reported and skipped.
    async fn tick(&self, ticker: &mut Interval) -> Result<()> {
        ticker.tick().await;

        match self.send_request(DiagnosticRequest::TesterPresent).await {
            Ok(()) => {
                self.tester_presents.fetch_add(1, Ordering::Relaxed);
            }
            Err(Error::Disconnected) => return Err(Error::Disconnected),
            Err(e) => self.report_error(DiagnosticRequest::TesterPresent, &e),
        }

        for (i, request) in self.config.poll.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.poll_gap).await;
            }

            match self.send_request(*request).await {
                Ok(()) => {
                    self.poll_requests.fetch_add(1, Ordering::Relaxed);
                }
                Err(Error::Disconnected) => return Err(Error::Disconnected),
                Err(e) => self.report_error(*request, &e),
            }
        }

        Ok(())
    }

    /// `Running -> Stopped`. Sends Tester Present every `keepalive_interval` until cancelled. Cancellation also interrupts a send in flight.
    /// Returns [`Error::Disconnected`] when the transport goes away.
    pub async fn keepalive(&self, mut cancel: CancelToken) -> Result<()> {
        if self.state() != SchedulerState::Running {
            return Ok(());
        }

        let interval = self.config.keepalive_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Sending Tester Present every {:?}", interval);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(()),
                result = self.tick(&mut ticker) => {
                    if let Err(e) = result {
                        error!("Keepalive stopped: {}", e);
                        break Err(e);
                    }
                }
            }
        };

        self.set_state(SchedulerState::Stopped);
        debug!("Keepalive finished: {:?}", self.stats());
        result
    }

    /// Start the session and keep it alive until cancelled. Cancellation also interrupts the session start request.
    pub async fn run(&self, mut cancel: CancelToken) -> Result<()> {
        if cancel.is_cancelled() {
            self.set_state(SchedulerState::Stopped);
            return Ok(());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Cancelled during session start");
                self.set_state(SchedulerState::Stopped);
                return Ok(());
            }
            result = self.start() => result?,
        }

        self.keepalive(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::can::adapter_config::SimulationConfig;
    use crate::session::{Cancellation, MemorySink};
    use crate::sim::SimulatedCan;
    use std::time::Duration;

    fn adapter() -> AsyncCanAdapter {
        AsyncCanAdapter::new(SimulatedCan::new(&SimulationConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn start_once() {
        let adapter = adapter();
        let config = SessionConfig::new(0x7e0);
        let sink = MemorySink::new();
        let scheduler = KeepaliveScheduler::new(&adapter, &config, &sink);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert_eq!(scheduler.stats().session_starts, 1);

        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Tx --> ECM"), "{}", lines[0]);
        assert!(lines[0].ends_with("[3] 02 10 03"), "{}", lines[0]);
    }

    #[tokio::test]
    async fn cancel_stops() {
        let adapter = adapter();
        let mut config = SessionConfig::new(0x7e0);
        config.keepalive_interval = Duration::from_millis(20);
        let sink = MemorySink::new();
        let scheduler = KeepaliveScheduler::new(&adapter, &config, &sink);
        let mut states = scheduler.subscribe();

        let cancellation = Cancellation::new();
        let token = cancellation.token();
        let run = scheduler.run(token);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(70)).await;
            cancellation.cancel();
        };

        let (result, _) = tokio::join!(run, stop);
        assert_eq!(result, Ok(()));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(states.has_changed().unwrap());

        let stats = scheduler.stats();
        assert!((2..=4).contains(&stats.tester_presents), "{:?}", stats);
        assert_eq!(stats.send_errors, 0);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let adapter = adapter();
        let config = SessionConfig::new(0x7e0);
        let sink = MemorySink::new();
        let scheduler = KeepaliveScheduler::new(&adapter, &config, &sink);

        let cancellation = Cancellation::new();
        cancellation.cancel();
        assert_eq!(scheduler.run(cancellation.token()).await, Ok(()));
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(sink.lines().is_empty());

        // Stopped is terminal
        scheduler.start().await.unwrap();
        assert_eq!(scheduler.stats().session_starts, 0);
    }
}
