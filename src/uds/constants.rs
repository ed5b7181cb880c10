//! Constants for the UDS requests.
use strum_macros::{Display, FromRepr};

pub static POSITIVE_RESPONSE: u8 = 0x40;
pub static NEGATIVE_RESPONSE: u8 = 0x7f;

/// Service Identifiers (SIDs) as defined in ISO 14229, and the OBD-II modes used for polling.
#[derive(Debug, PartialEq, Copy, Clone, FromRepr, Display)]
#[repr(u8)]
pub enum ServiceIdentifier {
    /// OBD-II Mode 01, Show Current Data
    ShowCurrentData = 0x01,
    DiagnosticSessionControl = 0x10,
    EcuReset = 0x11,
    ReadDataByIdentifier = 0x22,
    SecurityAccess = 0x27,
    TesterPresent = 0x3e,
    NegativeResponse = 0x7f,
}

/// Session types for Diagnostic Session Control (0x10)
#[derive(Debug, PartialEq, Copy, Clone, FromRepr, Display)]
#[repr(u8)]
pub enum SessionType {
    Default = 0x01,
    Programming = 0x02,
    Extended = 0x03,
    SafetySystem = 0x04,
}

/// Tester Present sub function requesting a response
pub static TESTER_PRESENT_ZERO_SUB_FUNCTION: u8 = 0x00;
