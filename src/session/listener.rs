//! Prints every received frame and watches for the ECU's answer to the session request.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{debug, error, info, warn};

use super::{CancelToken, OutputSink, SessionConfig};
use crate::can::Frame;
use crate::error::Error;
use crate::uds::{self, NegativeResponseCode, ServiceIdentifier, SessionType};
use crate::{Result, Stream, StreamExt};

/// What the ECU said about the session request, as far as we have seen.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No response seen yet
    Unknown,
    /// Positive response `50 03`
    Active,
    /// Negative response `7F 10 NRC`
    Rejected(NegativeResponseCode),
}

/// Observes all traffic. No filtering on arbitration ID.
pub struct ReceiveListener<'a> {
    config: &'a SessionConfig,
    sink: &'a dyn OutputSink,
    received: AtomicUsize,
    status: Mutex<SessionStatus>,
}

impl<'a> ReceiveListener<'a> {
    pub fn new(config: &'a SessionConfig, sink: &'a dyn OutputSink) -> Self {
        Self {
            config,
            sink,
            received: AtomicUsize::new(0),
            status: Mutex::new(SessionStatus::Unknown),
        }
    }

    pub fn received(&self) -> usize {
        self.received.load(Ordering::Relaxed)
    }

    pub fn session_status(&self) -> SessionStatus {
        match self.status.lock() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn set_session_status(&self, status: SessionStatus) {
        match self.status.lock() {
            Ok(mut current) => *current = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }

    /// Handle one inbound frame: print its summary and check it for a session response.
    pub fn on_frame(&self, frame: &Frame) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.sink.emit(&format!("Rx {}", crate::summary::summarize(frame)));

        if frame.bus == self.config.bus && frame.id == self.config.response_identifier() {
            self.check_session_response(frame);
        }
    }

    fn check_session_response(&self, frame: &Frame) {
        let Some(payload) = uds::single_frame_payload(frame) else {
            return;
        };

        let sid = ServiceIdentifier::DiagnosticSessionControl as u8;
        match uds::check_response(sid, Some(SessionType::Extended as u8), payload) {
            Ok(_) => {
                if self.session_status() != SessionStatus::Active {
                    info!("Extended diagnostic session active");
                }
                self.set_session_status(SessionStatus::Active);
            }
            Err(uds::Error::NegativeResponse(NegativeResponseCode::RequestCorrectlyReceivedResponsePending)) => {
                debug!("Received Response Pending");
            }
            Err(uds::Error::NegativeResponse(code)) => {
                warn!("Extended session request rejected: {:?}", code);
                self.sink
                    .emit(&format!("Error: {}", crate::obd::describe_negative(sid, code)));
                self.set_session_status(SessionStatus::Rejected(code));
            }
            Err(uds::Error::InvalidSubFunction(session)) => {
                warn!("ECU switched to session {:#04x} instead of extended", session);
            }
            // Answers to other services, e.g. Tester Present
            Err(_) => {}
        }
    }

    /// Consume the subscription until cancelled. Returns [`Error::Disconnected`] if the transport closes the stream.
    pub async fn run<S>(&self, mut stream: S, mut cancel: CancelToken) -> Result<()>
    where
        S: Stream<Item = Frame> + Unpin,
    {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Listener stopped after {} frames", self.received());
                    return Ok(());
                }
                frame = stream.next() => match frame {
                    Some(frame) => self.on_frame(&frame),
                    None => {
                        error!("Receive channel closed");
                        return Err(Error::Disconnected);
                    }
                }
            }
        }
    }
}
