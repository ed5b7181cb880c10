//! One-line text rendering of frames.
use crate::can::Frame;

/// Uppercase hex bytes separated by spaces, e.g. `02 3E 00`.
pub fn hex_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<String>>()
        .join(" ")
}

/// Summarize a frame: timestamp in seconds, arbitration ID, DLC and data bytes, followed by a decoded annotation when the frame is recognised.
/// Never fails; unknown or malformed frames render as raw hex.
pub fn summarize(frame: &Frame) -> String {
    let mut line = format!(
        "{:>12.6}  {:<8} [{}] {}",
        frame.timestamp.as_secs_f64(),
        frame.id.to_string(),
        frame.dlc(),
        hex_bytes(&frame.data)
    );

    if let Some(description) = crate::obd::describe(frame) {
        line.push_str(&format!("  {}  {}", crate::obd::ecu_name(frame.id), description));
    }

    line
}
