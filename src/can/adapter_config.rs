use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SIM_INTERVAL_MS: u64 = 100;

/// Selects and configures the adapter opened by [`crate::can::open`].
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterConfig {
    /// Best effort adapter configuration. Will choose the first available SocketCAN interface.
    Any,

    /// SocketCAN adapter configuration.
    /// We currently don't support setting the bitrate for SocketCAN, as it is usually set by the system.
    /// If no interface is provided, it will use the first available interface.
    SocketCAN(Option<String>),

    /// Simulated bus, no hardware required.
    Simulated(SimulationConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Time between generated frames.
    pub interval: Duration,
    /// Text log to replay cyclically instead of generating random OBD-II responses.
    pub playback: Option<PathBuf>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            interval: Duration::from_millis(DEFAULT_SIM_INTERVAL_MS),
            playback: None,
        }
    }
}
