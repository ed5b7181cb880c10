//! Known ECUs, PIDs and DIDs.
use super::{
    decode_active, decode_generic, decode_percent, decode_percent_tenths, decode_pressure, decode_rpm, decode_speed,
    decode_temp, decode_voltage, decode_yes_no,
};

/// A PID or DID served by one ECU, addressed by the ECU's request ID.
pub struct Parameter {
    pub ecu: u32,
    pub id: u16,
    pub name: &'static str,
    pub decode: fn(&[u8]) -> Option<String>,
}

const fn param(ecu: u32, id: u16, name: &'static str, decode: fn(&[u8]) -> Option<String>) -> Parameter {
    Parameter { ecu, id, name, decode }
}

/// OBD-II Mode 01 PIDs
pub static PID_LIST: &[Parameter] = &[
    param(0x7e0, 0x04, "Calculated Engine Load", decode_percent),
    param(0x7e0, 0x05, "ECT", decode_temp),
    param(0x7e0, 0x06, "STFT B1", decode_percent),
    param(0x7e0, 0x07, "LTFT B1", decode_percent),
    param(0x7e0, 0x08, "STFT B2", decode_percent),
    param(0x7e0, 0x09, "LTFT B2", decode_percent),
    param(0x7e0, 0x0a, "FP", decode_pressure),
    param(0x7e0, 0x0b, "MAP", decode_pressure),
    param(0x7e0, 0x0c, "RPM", decode_rpm),
    param(0x7e0, 0x0d, "VSS", decode_speed),
    param(0x7e0, 0x0e, "Timing Advance", decode_generic),
    param(0x7e0, 0x0f, "Intake Air Temperature", decode_temp),
    param(0x7e0, 0x10, "MAF", decode_generic),
    param(0x7e0, 0x11, "TPS", decode_percent),
    param(0x7e0, 0x1f, "Run Time Since Engine Start", decode_generic),
    param(0x7e0, 0x21, "Distance with MIL On", decode_generic),
    param(0x7e0, 0x2f, "Fuel Level Input", decode_percent),
    param(0x7e0, 0x33, "Barometric Pressure", decode_pressure),
    param(0x7e0, 0x46, "AAT", decode_temp),
    param(0x7e0, 0x5c, "Engine Oil Temperature", decode_temp),
    param(0x7e0, 0x5e, "Engine Fuel Rate", decode_generic),
];

/// UDS Data Identifiers read with service 0x22
pub static DID_LIST: &[Parameter] = &[
    param(0x7e0, 0x1000, "ECU Identification", decode_generic),
    param(0x7e0, 0x1001, "VIN", decode_generic),
    param(0x7e0, 0x1003, "Calibration ID", decode_generic),
    param(0x7e0, 0x1005, "ECU Serial Number", decode_generic),
    param(0x7e0, 0x1010, "ECU Software Version", decode_generic),
    param(0x7e0, 0x1100, "Engine Speed", decode_rpm),
    param(0x7e0, 0x1101, "Vehicle Speed", decode_speed),
    param(0x7e0, 0x1102, "Throttle Position", decode_percent),
    param(0x7e0, 0x1103, "Intake Manifold Pressure", decode_pressure),
    param(0x7e0, 0x1104, "Engine Load", decode_percent),
    param(0x7e0, 0x1105, "Mass Air Flow", decode_generic),
    param(0x7e0, 0x1106, "Intake Air Temperature", decode_temp),
    param(0x7e0, 0x1107, "Coolant Temperature", decode_temp),
    param(0x7e0, 0x1108, "Barometric Pressure", decode_pressure),
    param(0x7e0, 0x1110, "Fuel Rail Pressure", decode_pressure),
    param(0x7e0, 0x1111, "Fuel Pump Command", decode_percent),
    param(0x7e0, 0x1112, "Oil Pressure", decode_pressure),
    param(0x7e0, 0x1113, "Oil Temperature", decode_temp),
    // AFM
    param(0x7e0, 0x1900, "AFM Active Cylinders Mask", decode_generic),
    param(0x7e0, 0x1901, "AFM Mode Active", decode_yes_no),
    param(0x7e0, 0x1902, "AFM Commanded State", decode_yes_no),
    param(0x7e0, 0x1903, "AFM Transition Counter", decode_generic),
    param(0x7e0, 0x1910, "AFM Fault Status", decode_generic),
    param(0x7e0, 0x1911, "AFM Enable Criteria Satisfied", decode_yes_no),
    // Transmission and chassis
    param(0x7e0, 0x2000, "Gear Position", decode_generic),
    param(0x7e0, 0x2001, "Trans Oil Temp", decode_temp),
    param(0x7e0, 0x2003, "VSS", decode_speed),
    param(0x7e0, 0x2010, "Brake Pedal Pos", decode_percent),
    param(0x7e0, 0x2011, "Accel Pedal Pos", decode_percent),
    // Environmental
    param(0x7e0, 0x3000, "Ambient Temp", decode_temp),
    param(0x7e0, 0x3001, "Battery Voltage", decode_voltage),
    param(0x7e0, 0x3002, "Alternator Load", decode_percent),
    param(0x7e0, 0x3003, "Odometer", decode_generic),
    // GM alternate
    param(0x7e0, 0xf40c, "GM Engine Load (Alt)", decode_percent_tenths),
    param(0x7e0, 0xf41f, "GM AFM Active", decode_active),
];

/// Module names by request ID, plus the GM broadcast frames seen on the powertrain bus.
pub static ECU_NAMES: &[(u32, &str)] = &[
    (0x7e0, "ECM"),
    (0x7e1, "TCM"),
    (0x7e2, "ABS / EBCM"),
    (0x7e3, "SRS / Airbag Module"),
    (0x7e4, "BCM"),
    (0x7e5, "IPC"),
    (0x7e6, "HVAC"),
    (0x7e7, "Gateway"),
    // GM alternate diagnostic addresses
    (0x77e, "ECM (alt)"),
    (0x77f, "TCM (alt)"),
    (0x771, "ABS (alt)"),
    (0x772, "SRS (alt)"),
    (0x773, "BCM (alt)"),
    (0x774, "IPC (alt)"),
    (0x775, "HVAC (alt)"),
    (0x776, "Gateway (alt)"),
    // Broadcast
    (0x0c9, "SDM"),
    (0x0f9, "BCM / Gateway Keepalive"),
    (0x199, "ECM Torque / Throttle Position"),
    (0x19d, "ECM Accelerator Pedal / Torque Request"),
    (0x12a, "ECM Fuel / Airflow Data"),
    (0x138, "ECM Lambda / AFR Sensor Data"),
    (0x17d, "Transmission / Torque Converter Status"),
    (0x17f, "Transmission / Gear Status"),
    (0x1cb, "BCM / Lighting / Accessory Data"),
    (0x1cd, "IPC Display Data"),
    (0x1e9, "ECM Engine Data"),
    (0x1eb, "ECM Cruise / Idle Control"),
    (0x1ed, "ECM Engine Load / Knock Info"),
    (0x2f9, "ABS / Wheel Speed Data"),
    (0x348, "Chassis Sensor Cluster"),
    (0x34a, "Chassis / Yaw / Accel Data"),
    (0x3c9, "SDM"),
    (0x3e9, "ECM Misc Sensor Data"),
    (0x3f9, "ECM Sensor Fusion Data"),
    (0x3fb, "ECM / Fuel Trim Info"),
    (0x3fd, "IPC / Cluster Keepalive"),
    (0x4c9, "ABS Brake Pressure Data"),
    (0x4d9, "ABS / Yaw Sensor Data"),
    (0x4e9, "Steering Angle / Column Sensor"),
    (0x528, "Transfer Case / 4WD Control"),
    (0x52a, "Suspension / Ride Height / Damping"),
];
