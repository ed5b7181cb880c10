//! Unified Diagnostic Services (UDS) requests, implements the parts of ISO 14229 needed to hold a diagnostic session open.
//! Requests always fit a single CAN frame, so ISO-TP (ISO 15765-2) framing is limited to single frames: one PCI byte carrying the payload length, followed by the payload.
//! ## Example
//! ```rust
//! use uds_tester::session::SessionConfig;
//! use uds_tester::uds::{encode, single_frame_payload, DiagnosticRequest};
//!
//! let config = SessionConfig::new(0x7e0);
//! let frame = encode(DiagnosticRequest::TesterPresent, &config);
//! assert_eq!(frame.data, vec![0x02, 0x3e, 0x00]);
//! assert_eq!(single_frame_payload(&frame), Some(&[0x3e, 0x00][..]));
//! ```

mod constants;
mod error;

use crate::can::{Frame, Identifier, CAN_MAX_DLEN};
use crate::session::SessionConfig;
pub use constants::*;
pub use error::{Error, NegativeResponseCode};

/// ISO-TP single frame PCI, upper nibble
const SINGLE_FRAME: u8 = 0x00;
const FRAME_TYPE_MASK: u8 = 0xf0;

/// The requests this tool sends. Each maps to exactly one CAN frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DiagnosticRequest {
    /// 0x10 0x03 - Diagnostic Session Control, Extended Diagnostic Session
    StartExtendedSession,
    /// 0x3E 0x00 - Tester Present, keeps a non-default session alive
    TesterPresent,
    /// OBD-II PID request, e.g. Mode 01 PID 0x0C for engine speed
    ReadPid { service: u8, pid: u8 },
    /// 0x22 - Read Data By Identifier with a 16 bit DID
    ReadDid { did: u16 },
}

impl DiagnosticRequest {
    /// UDS payload, without ISO-TP framing.
    pub fn payload(&self) -> Vec<u8> {
        match *self {
            DiagnosticRequest::StartExtendedSession => vec![
                ServiceIdentifier::DiagnosticSessionControl as u8,
                SessionType::Extended as u8,
            ],
            DiagnosticRequest::TesterPresent => vec![
                ServiceIdentifier::TesterPresent as u8,
                TESTER_PRESENT_ZERO_SUB_FUNCTION,
            ],
            DiagnosticRequest::ReadPid { service, pid } => vec![service, pid],
            DiagnosticRequest::ReadDid { did } => {
                let mut payload = vec![ServiceIdentifier::ReadDataByIdentifier as u8];
                payload.extend(did.to_be_bytes());
                payload
            }
        }
    }

    /// Human readable name, used in the `Tx` output lines.
    pub fn description(&self, request_id: u32) -> String {
        match *self {
            DiagnosticRequest::StartExtendedSession => "Diagnostic Session Control (Extended Session)".to_owned(),
            DiagnosticRequest::TesterPresent => "Tester Present".to_owned(),
            DiagnosticRequest::ReadPid { pid, .. } => crate::obd::pid_name(request_id, pid)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("PID {:02X}", pid)),
            DiagnosticRequest::ReadDid { did } => crate::obd::did_name(request_id, did)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("DID {:04X}", did)),
        }
    }
}

/// Build the CAN frame for a request. Pure and deterministic.
///
/// The config is expected to have passed [`SessionConfig::validate`]: the request ID must fit the selected ID format.
pub fn encode(request: DiagnosticRequest, config: &SessionConfig) -> Frame {
    let payload = request.payload();

    let mut data = vec![SINGLE_FRAME | payload.len() as u8];
    data.extend(&payload);
    if let Some(padding) = config.padding {
        data.resize(CAN_MAX_DLEN, padding);
    }

    Frame {
        bus: config.bus,
        id: Identifier::new(config.request_id, config.extended_ids),
        data,
        timestamp: std::time::Duration::ZERO,
    }
}

/// Extract the UDS payload from an ISO-TP single frame. Returns `None` for other frame types or inconsistent lengths.
pub fn single_frame_payload(frame: &Frame) -> Option<&[u8]> {
    let pci = *frame.data.first()?;
    if pci & FRAME_TYPE_MASK != SINGLE_FRAME {
        return None;
    }

    let len = (pci & 0x0f) as usize;
    if len == 0 || len >= frame.data.len() {
        return None;
    }

    Some(&frame.data[1..=len])
}

/// A response payload as sent back by an ECU.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Response<'a> {
    /// Service ID of the request, and the data following the response SID
    Positive { service: u8, data: &'a [u8] },
    Negative { service: u8, code: NegativeResponseCode },
}

/// Classify a UDS payload. Returns `None` when it is a request rather than a response, or too short to tell.
pub fn parse_response(payload: &[u8]) -> Option<Response<'_>> {
    let sid = *payload.first()?;

    if sid == NEGATIVE_RESPONSE {
        if payload.len() < 3 {
            return None;
        }
        return Some(Response::Negative {
            service: payload[1],
            code: payload[2].into(),
        });
    }

    if sid & POSITIVE_RESPONSE != 0 {
        return Some(Response::Positive {
            service: sid & !POSITIVE_RESPONSE,
            data: &payload[1..],
        });
    }

    None
}

/// Verify a response belongs to the given request, handling negative responses. Returns the data after the echoed sub function.
pub fn check_response(sid: u8, sub_function: Option<u8>, payload: &[u8]) -> Result<&[u8], Error> {
    match parse_response(payload) {
        Some(Response::Negative { service, code }) if service == sid => Err(Error::NegativeResponse(code)),
        Some(Response::Negative { service, .. }) => Err(Error::InvalidServiceId(service)),
        Some(Response::Positive { service, data }) => {
            if service != sid {
                return Err(Error::InvalidServiceId(service | POSITIVE_RESPONSE));
            }

            match sub_function {
                Some(sub_function) => match data.first() {
                    Some(&b) if b == sub_function => Ok(&data[1..]),
                    Some(&b) => Err(Error::InvalidSubFunction(b)),
                    None => Err(Error::InvalidResponseLength),
                },
                None => Ok(data),
            }
        }
        None => Err(Error::InvalidResponseLength),
    }
}
