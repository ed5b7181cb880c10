//! Human readable annotation of frames seen on a GM powertrain bus: ECU names, OBD-II Mode 01 PIDs and manufacturer DIDs.
//!
//! Every decoder is total: payloads that are too short decode to `None` and the caller falls back to raw hex.

mod tables;

use crate::can::{Frame, Identifier};
use crate::uds::{self, NegativeResponseCode, Response, ServiceIdentifier, SessionType};

pub use tables::{Parameter, DID_LIST, ECU_NAMES, PID_LIST};

/// Bit 3 of a diagnostic arbitration ID separates requests (clear) from responses (set).
const RESPONSE_BIT: u32 = 0x08;

/// SDM accelerometer broadcast
const SDM_ID: u32 = 0x0c9;

/// 29 bit normal fixed addressing, physical: `18DA <target> <source>`
const EXTENDED_PHYSICAL_PREFIX: u32 = 0x18da;

pub fn decode_pressure(data: &[u8]) -> Option<String> {
    Some(format!("{} kPa", data.first()?))
}

pub fn decode_rpm(data: &[u8]) -> Option<String> {
    let raw = u16::from_be_bytes([*data.first()?, *data.get(1)?]);
    Some(format!("{:.0} rpm", raw as f32 / 4.0))
}

pub fn decode_speed(data: &[u8]) -> Option<String> {
    Some(format!("{} km/h", data.first()?))
}

pub fn decode_percent(data: &[u8]) -> Option<String> {
    Some(format!("{:.1} %", *data.first()? as f32 * 100.0 / 255.0))
}

pub fn decode_temp(data: &[u8]) -> Option<String> {
    Some(format!("{} °C", *data.first()? as i16 - 40))
}

pub fn decode_voltage(data: &[u8]) -> Option<String> {
    Some(format!("{:.1} V", *data.first()? as f32 / 10.0))
}

pub fn decode_yes_no(data: &[u8]) -> Option<String> {
    Some(if *data.first()? != 0 { "Yes" } else { "No" }.to_owned())
}

/// 16 bit big-endian value in tenths of a percent
pub fn decode_percent_tenths(data: &[u8]) -> Option<String> {
    let raw = u16::from_be_bytes([*data.first()?, *data.get(1)?]);
    Some(format!("{:.1}%", raw as f32 / 10.0))
}

pub fn decode_active(data: &[u8]) -> Option<String> {
    Some(if *data.first()? != 0 { "Active" } else { "Inactive" }.to_owned())
}

pub fn decode_generic(data: &[u8]) -> Option<String> {
    Some(crate::summary::hex_bytes(data))
}

fn lookup(table: &'static [Parameter], ecu: u32, id: u16) -> Option<&'static Parameter> {
    table.iter().find(|p| p.ecu == ecu && p.id == id)
}

/// Name of an OBD-II PID requested from the ECU at `request_id`.
pub fn pid_name(request_id: u32, pid: u8) -> Option<&'static str> {
    lookup(PID_LIST, request_id, pid as u16).map(|p| p.name)
}

/// Name of a UDS DID read from the ECU at `request_id`.
pub fn did_name(request_id: u32, did: u16) -> Option<&'static str> {
    lookup(DID_LIST, request_id, did).map(|p| p.name)
}

/// Direction arrow and module name for an arbitration ID, e.g. `<-- ECM` for `0x7E8`. Unknown IDs render as hex.
pub fn ecu_name(id: Identifier) -> String {
    let raw = u32::from(id);
    let dir = if raw & RESPONSE_BIT != 0 { "<--" } else { "-->" };

    let name = ECU_NAMES
        .iter()
        .find(|(ecu, _)| *ecu == raw & !RESPONSE_BIT)
        .or_else(|| ECU_NAMES.iter().find(|(ecu, _)| *ecu == raw | RESPONSE_BIT))
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| id.to_string());

    format!("{} {}", dir, name)
}

fn decode_sdm(data: &[u8]) -> Option<String> {
    if data.len() < 7 {
        return Some("Invalid SDM frame length".to_owned());
    }

    let long_accel = i16::from_be_bytes([data[0], data[1]]) as f32 * 0.01;
    let lat_accel = i16::from_be_bytes([data[2], data[3]]) as f32 * 0.01;
    let yaw_rate = data[4] as i8 as f32 * 1.5;
    let status = data[5];
    let counter = data[6];

    let ignition_on = status & 0x40 != 0;
    let crash = status & 0x08 != 0;

    Some(format!(
        "Longitudinal={:+.2} m/s², Lateral={:+.2} m/s², Yaw={:+.1}°/s, Ignition={}, Crash={}, Counter={}",
        long_accel,
        lat_accel,
        yaw_rate,
        if ignition_on { "On" } else { "Off" },
        if crash { "Yes" } else { "No" },
        counter
    ))
}

fn describe_parameter(table: &'static [Parameter], ecu: u32, id: u16, value: &[u8], fallback: String) -> String {
    match lookup(table, ecu, id) {
        Some(param) => match (param.decode)(value) {
            Some(value) => format!("{}: {}", param.name, value),
            None => format!("{}: {}", param.name, crate::summary::hex_bytes(value)),
        },
        None => fallback,
    }
}

fn describe_response(request_id: u32, payload: &[u8]) -> Option<String> {
    match uds::parse_response(payload)? {
        Response::Negative { service, code } => Some(describe_negative(service, code)),
        Response::Positive { service, data } => match ServiceIdentifier::from_repr(service)? {
            ServiceIdentifier::ShowCurrentData => {
                let (&pid, value) = data.split_first()?;
                Some(describe_parameter(
                    PID_LIST,
                    request_id,
                    pid as u16,
                    value,
                    format!("PID {:02X} Raw {}", pid, crate::summary::hex_bytes(value)),
                ))
            }
            ServiceIdentifier::ReadDataByIdentifier => {
                if data.len() < 2 {
                    return None;
                }
                let did = u16::from_be_bytes([data[0], data[1]]);
                let value = &data[2..];
                Some(describe_parameter(
                    DID_LIST,
                    request_id,
                    did,
                    value,
                    format!("DID {:04X} Raw {}", did, crate::summary::hex_bytes(value)),
                ))
            }
            ServiceIdentifier::DiagnosticSessionControl => {
                let session = *data.first()?;
                match SessionType::from_repr(session) {
                    Some(session) => Some(format!("Session Control OK: {} session", session)),
                    None => Some(format!("Session Control OK: session {:02X}", session)),
                }
            }
            ServiceIdentifier::TesterPresent => Some("Tester Present OK".to_owned()),
            _ => None,
        },
    }
}

/// Text for a negative response, e.g. `Negative Response to 10: ConditionsNotCorrect`.
pub fn describe_negative(service: u8, code: NegativeResponseCode) -> String {
    format!("Negative Response to {:02X}: {:?}", service, code)
}

/// Whether `id` is a diagnostic response address: `7E8..=7EF`, the GM alternate range `77x` with bit 3 set, or `18DAxxxx`.
/// Broadcast frames are never decoded as UDS, even when bit 3 of their ID is set.
pub fn is_diagnostic_response(id: Identifier) -> bool {
    match id {
        Identifier::Standard(raw) => raw & RESPONSE_BIT != 0 && (raw & !0x0f == 0x7e0 || raw & !0x0f == 0x770),
        Identifier::Extended(raw) => raw >> 16 == EXTENDED_PHYSICAL_PREFIX,
    }
}

/// Decode a frame into a short human readable description, when it is one we know about.
pub fn describe(frame: &Frame) -> Option<String> {
    let raw = u32::from(frame.id);

    if frame.id.is_standard() && raw == SDM_ID {
        return decode_sdm(&frame.data);
    }

    if !is_diagnostic_response(frame.id) {
        return None;
    }

    let payload = uds::single_frame_payload(frame)?;
    describe_response(raw & !RESPONSE_BIT, payload)
}
