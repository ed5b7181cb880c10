//! Diagnostic session: keeps an ECU in the Extended Diagnostic Session and monitors the bus.
//!
//! The [`SessionController`] owns the transport and composes the [`KeepaliveScheduler`], which sends `10 03` once and `3E 00` periodically, with the [`ReceiveListener`], which prints every received frame.

pub mod controller;
pub mod keepalive;
pub mod listener;

use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;

use crate::can::Identifier;
use crate::error::Error;
use crate::uds::DiagnosticRequest;
use crate::Result;

pub use controller::{RunState, SessionController};
pub use keepalive::{KeepaliveScheduler, KeepaliveStats, SchedulerState};
pub use listener::{ReceiveListener, SessionStatus};

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_POLL_GAP: Duration = Duration::from_millis(50);

/// Response ID belonging to a request ID: `+ 8` for 11 bit IDs, last two bytes swapped for 29 bit normal fixed addressing.
pub fn default_response_id(request_id: u32, extended: bool) -> Identifier {
    if extended {
        let bytes = request_id.to_be_bytes();
        Identifier::Extended(u32::from_be_bytes([bytes[0], bytes[1], bytes[3], bytes[2]]))
    } else {
        Identifier::Standard(request_id.wrapping_add(8))
    }
}

/// Session parameters. Built once at startup and not changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// The bus index for adapters supporting multiple CAN busses
    pub bus: u8,
    /// Arbitration ID of outgoing requests
    pub request_id: u32,
    /// Arbitration ID the ECU answers on. Derived from the request ID when not set.
    pub response_id: Option<u32>,
    /// Period of Tester Present requests
    pub keepalive_interval: Duration,
    /// Send 29 bit identifiers
    pub extended_ids: bool,
    /// Pad requests to 8 bytes with this byte
    pub padding: Option<u8>,
    /// Requests sent after every Tester Present
    pub poll: Vec<DiagnosticRequest>,
    /// Gap between consecutive poll requests
    pub poll_gap: Duration,
}

impl SessionConfig {
    pub fn new(request_id: u32) -> Self {
        Self {
            bus: 0,
            request_id,
            response_id: None,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            extended_ids: request_id > 0x7ff,
            padding: None,
            poll: vec![],
            poll_gap: DEFAULT_POLL_GAP,
        }
    }

    pub fn request_identifier(&self) -> Identifier {
        Identifier::new(self.request_id, self.extended_ids)
    }

    pub fn response_identifier(&self) -> Identifier {
        match self.response_id {
            Some(id) => Identifier::new(id, self.extended_ids),
            None => default_response_id(self.request_id, self.extended_ids),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.request_identifier().is_valid() {
            return Err(Error::Config(format!(
                "request ID {:#x} does not fit a {} bit identifier",
                self.request_id,
                if self.extended_ids { 29 } else { 11 }
            )));
        }

        if !self.response_identifier().is_valid() {
            return Err(Error::Config(format!(
                "response ID {:?} out of range",
                self.response_identifier()
            )));
        }

        if self.keepalive_interval.is_zero() {
            return Err(Error::Config("keepalive interval must be greater than zero".to_owned()));
        }

        Ok(())
    }
}

/// Where the text output goes. One call per event; implementations must write each line atomically.
pub trait OutputSink: Send + Sync {
    fn emit(&self, line: &str);
}

/// Writes lines to stdout.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&self, line: &str) {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", line);
    }
}

/// Collects lines in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl OutputSink for MemorySink {
    fn emit(&self, line: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(line.to_owned()),
            Err(poisoned) => poisoned.into_inner().push(line.to_owned()),
        }
    }
}

/// Owner side of a cooperative cancellation signal.
pub struct Cancellation {
    sender: watch::Sender<bool>,
}

impl Cancellation {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken(self.sender.subscribe())
    }

    /// Signal all tokens. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a [`Cancellation`].
#[derive(Clone)]
pub struct CancelToken(watch::Receiver<bool>);

impl CancelToken {
    /// Resolves once cancelled, or when the [`Cancellation`] is dropped.
    pub async fn cancelled(&mut self) {
        let _ = self.0.wait_for(|cancelled| *cancelled).await;
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}
