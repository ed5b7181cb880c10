//! Simulated CAN bus for offline testing and development.
//!
//! Generates random OBD-II Mode 01 responses on `0x7E8`, or replays a text log cyclically. Each log line holds a hex arbitration ID followed by the data bytes, e.g. `7E8 04 41 0C 1A F8`.
//! Session Control and Tester Present requests get a positive response, so a session can be exercised without hardware.

use std::collections::VecDeque;
use std::path::Path;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::can::adapter_config::SimulationConfig;
use crate::can::{CanAdapter, Frame, Identifier};
use crate::error::Error;
use crate::uds::{self, ServiceIdentifier, POSITIVE_RESPONSE};
use crate::Result;

const SIM_RESPONSE_ID: u32 = 0x7e8;
const SIM_PIDS: [u8; 7] = [0x04, 0x05, 0x0b, 0x0c, 0x0d, 0x11, 0x46];

/// Parse a text log into frames. Blank lines and lines with fewer than two fields are skipped.
pub fn parse_log(text: &str) -> Vec<Frame> {
    let mut frames = vec![];

    for (lineno, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }

        let parsed = u32::from_str_radix(parts[0], 16).ok().and_then(|id| {
            let data: Option<Vec<u8>> = parts[1..].iter().map(|b| u8::from_str_radix(b, 16).ok()).collect();
            data.and_then(|data| Frame::new(0, id.into(), &data).ok())
        });

        match parsed {
            Some(frame) => frames.push(frame),
            None => warn!("Skipping malformed log line {}: {:?}", lineno + 1, line),
        }
    }

    frames
}

/// Simulated bus implementing [`CanAdapter`].
pub struct SimulatedCan {
    interval: Duration,
    last: Instant,
    playback: Vec<Frame>,
    idx: usize,
    rng: StdRng,
    responses: VecDeque<Frame>,
}

impl SimulatedCan {
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let playback = match &config.playback {
            Some(path) => Self::load_log(path)?,
            None => vec![],
        };

        Ok(Self {
            interval: config.interval,
            last: Instant::now(),
            playback,
            idx: 0,
            rng: StdRng::from_entropy(),
            responses: VecDeque::new(),
        })
    }

    fn load_log(path: &Path) -> Result<Vec<Frame>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::TransportOpen(format!("failed to load log {}: {}", path.display(), e)))?;
        Ok(parse_log(&text))
    }

    fn next_frame(&mut self) -> Frame {
        if !self.playback.is_empty() {
            let frame = self.playback[self.idx % self.playback.len()].clone();
            self.idx += 1;
            return frame;
        }

        let pid = SIM_PIDS[self.rng.gen_range(0..SIM_PIDS.len())];
        let data = if pid == 0x0c {
            // RPM needs 2 bytes
            vec![0x04, 0x41, pid, self.rng.gen(), self.rng.gen()]
        } else {
            vec![0x03, 0x41, pid, self.rng.gen()]
        };

        // 5 data bytes always fit in a classic frame
        Frame {
            bus: 0,
            id: Identifier::Standard(SIM_RESPONSE_ID),
            data,
            timestamp: Duration::ZERO,
        }
    }

    /// Queue the answer a cooperative ECU would give to a single-frame request.
    fn respond(&mut self, request: &Frame) {
        let Some(payload) = uds::single_frame_payload(request) else {
            return;
        };

        let response: Option<Vec<u8>> = match payload {
            [sid, session] if *sid == ServiceIdentifier::DiagnosticSessionControl as u8 => {
                // P2 = 50 ms, P2* = 5000 ms
                Some(vec![sid | POSITIVE_RESPONSE, *session, 0x00, 0x32, 0x01, 0xf4])
            }
            [sid, sub] if *sid == ServiceIdentifier::TesterPresent as u8 && *sub == 0x00 => {
                Some(vec![sid | POSITIVE_RESPONSE, 0x00])
            }
            _ => None,
        };

        if let Some(response) = response {
            let mut data = vec![response.len() as u8];
            data.extend(response);

            let id = match request.id {
                Identifier::Standard(id) => Identifier::Standard((id + 8) & 0x7ff),
                Identifier::Extended(id) => crate::session::default_response_id(id, true),
            };

            if let Ok(frame) = Frame::new(request.bus, id, &data) {
                self.responses.push_back(frame);
            }
        }
    }
}

impl CanAdapter for SimulatedCan {
    fn send(&mut self, frames: &mut VecDeque<Frame>) -> Result<()> {
        while let Some(frame) = frames.pop_front() {
            debug!("Simulated TX {:?}", frame);
            self.respond(&frame);
        }
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<Frame>> {
        let mut frames: Vec<Frame> = self.responses.drain(..).collect();

        if self.last.elapsed() >= self.interval {
            self.last = Instant::now();
            frames.push(self.next_frame());
        }

        Ok(frames)
    }

    fn close(&mut self) {
        debug!("Simulated bus shut down");
    }
}
