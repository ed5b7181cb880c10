//! Generic CAN types and traits

pub mod adapter;
pub mod adapter_config;
pub mod async_can;

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

pub use adapter::open;
pub use adapter_config::AdapterConfig;
pub use async_can::AsyncCanAdapter;

/// Maximum payload of a classic CAN frame
pub const CAN_MAX_DLEN: usize = 8;

/// Identifier for a CAN frame
#[derive(Copy, Clone, PartialOrd, Eq, PartialEq, Hash)]
pub enum Identifier {
    Standard(u32),
    Extended(u32),
}

impl Identifier {
    /// Build an identifier from a raw arbitration ID, forcing the 29-bit format when `extended` is set.
    pub fn new(id: u32, extended: bool) -> Identifier {
        if extended {
            Identifier::Extended(id)
        } else {
            Identifier::Standard(id)
        }
    }

    pub fn is_standard(&self) -> bool {
        match self {
            Identifier::Standard(_) => true,
            Identifier::Extended(_) => false,
        }
    }
    pub fn is_extended(&self) -> bool {
        !self.is_standard()
    }

    /// Check the raw ID fits the 11 or 29 bit range of the format.
    pub fn is_valid(&self) -> bool {
        match *self {
            Identifier::Standard(id) => id <= 0x7ff,
            Identifier::Extended(id) => id <= 0x1fffffff,
        }
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Extended(id) => write!(f, "0x{:08x}", id),
            Identifier::Standard(id) => write!(f, "0x{:03x}", id),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Extended(id) => write!(f, "{:08X}", id),
            Identifier::Standard(id) => write!(f, "{:03X}", id),
        }
    }
}

impl From<u32> for Identifier {
    fn from(id: u32) -> Identifier {
        if id <= 0x7ff {
            Identifier::Standard(id)
        } else {
            Identifier::Extended(id)
        }
    }
}

impl From<Identifier> for u32 {
    fn from(val: Identifier) -> u32 {
        match val {
            Identifier::Standard(id) => id,
            Identifier::Extended(id) => id,
        }
    }
}

/// A CAN frame
#[derive(Clone, PartialEq)]
pub struct Frame {
    /// The bus index for adapters supporting multiple CAN busses
    pub bus: u8,
    /// Arbitration ID
    pub id: Identifier,
    /// Frame Data
    pub data: Vec<u8>,
    /// Monotonic receive time, relative to when the adapter was opened. Zero for frames built locally.
    pub timestamp: Duration,
}
impl Unpin for Frame {}

impl Frame {
    pub fn new(bus: u8, id: Identifier, data: &[u8]) -> Result<Frame, crate::error::Error> {
        if data.len() > CAN_MAX_DLEN {
            return Err(crate::error::Error::MalformedFrame);
        }

        if !id.is_valid() {
            return Err(crate::error::Error::MalformedFrame);
        }

        Ok(Frame {
            bus,
            id,
            data: data.to_vec(),
            timestamp: Duration::ZERO,
        })
    }

    /// Same frame, stamped with a receive time.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Frame {
        self.timestamp = timestamp;
        self
    }

    /// Data Length Code. Equal to the payload length for classic CAN.
    pub fn dlc(&self) -> usize {
        self.data.len()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("bus", &self.bus)
            .field("id", &self.id)
            .field("data", &hex::encode(&self.data))
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

/// Trait for a Blocking CAN Adapter
pub trait CanAdapter {
    /// Write frames from the front of the queue. Frames that were handed to the hardware are popped; frames that could not be written yet stay queued.
    fn send(&mut self, frames: &mut VecDeque<Frame>) -> crate::Result<()>;
    /// Read all frames that arrived since the last call. Must not block.
    fn recv(&mut self) -> crate::Result<Vec<Frame>>;
    /// Release the underlying device. Called exactly once, from the processing thread, when the async wrapper shuts down.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_compare() {
        assert_eq!(true, Identifier::Standard(0x123) < Identifier::Standard(0x124));
        assert_eq!(true, Identifier::Standard(0x7ff) > Identifier::Standard(0x100));

        // Extended IDs always have lower priority than standard IDs
        assert_eq!(true, Identifier::Extended(0x1) > Identifier::Standard(0x100));
    }

    #[test]
    fn id_display() {
        assert_eq!(Identifier::Standard(0x7e0).to_string(), "7E0");
        assert_eq!(Identifier::Extended(0x18da00f1).to_string(), "18DA00F1");
        assert_eq!(format!("{:?}", Identifier::Standard(0x7e8)), "0x7e8");
    }

    #[test]
    fn frame_validation() {
        assert!(Frame::new(0, Identifier::Standard(0x7ff), &[0; 8]).is_ok());
        assert_eq!(
            Frame::new(0, Identifier::Standard(0x800), &[]),
            Err(crate::Error::MalformedFrame)
        );
        assert_eq!(
            Frame::new(0, Identifier::Extended(0x2000_0000), &[]),
            Err(crate::Error::MalformedFrame)
        );
        assert_eq!(
            Frame::new(0, Identifier::Standard(0x123), &[0; 9]),
            Err(crate::Error::MalformedFrame)
        );
    }

    #[test]
    fn identifier_from_raw() {
        assert_eq!(Identifier::from(0x7e0), Identifier::Standard(0x7e0));
        assert_eq!(Identifier::from(0x18da00f1), Identifier::Extended(0x18da00f1));
        assert_eq!(Identifier::new(0x7e0, true), Identifier::Extended(0x7e0));
        assert_eq!(u32::from(Identifier::Extended(0x1234)), 0x1234);
    }
}
