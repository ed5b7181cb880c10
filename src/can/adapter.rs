//! Convenience functions to get a CAN adapter.
use crate::can::{AdapterConfig, AsyncCanAdapter};
use crate::error::Error;
use crate::Result;

use tracing::info;

/// Interfaces probed, in order, when no SocketCAN interface is named.
#[cfg(all(target_os = "linux", feature = "socketcan"))]
const DEFAULT_INTERFACES: [&str; 2] = ["can0", "vcan0"];

/// Open the adapter described by `config`. This is the only place a transport is created; closing it is up to the owner of the returned [`AsyncCanAdapter`].
pub fn open(config: &AdapterConfig) -> Result<AsyncCanAdapter> {
    match config {
        AdapterConfig::Simulated(sim) => {
            let adapter = crate::sim::SimulatedCan::new(sim)?;
            info!("Connected to simulated CAN bus");
            Ok(AsyncCanAdapter::new(adapter))
        }
        AdapterConfig::SocketCAN(Some(iface)) => open_socketcan(iface),
        AdapterConfig::SocketCAN(None) | AdapterConfig::Any => open_first(),
    }
}

#[cfg(all(target_os = "linux", feature = "socketcan"))]
fn open_socketcan(iface: &str) -> Result<AsyncCanAdapter> {
    crate::socketcan::SocketCan::new_async(iface)
}

#[cfg(not(all(target_os = "linux", feature = "socketcan")))]
fn open_socketcan(iface: &str) -> Result<AsyncCanAdapter> {
    Err(Error::TransportOpen(format!(
        "cannot open {}: SocketCAN requires Linux and the 'socketcan' feature",
        iface
    )))
}

fn open_first() -> Result<AsyncCanAdapter> {
    #[cfg(all(target_os = "linux", feature = "socketcan"))]
    {
        // TODO: iterate over all available SocketCAN adapters to also find things like can1
        for iface in DEFAULT_INTERFACES {
            if let Ok(socket) = crate::socketcan::SocketCan::new_async(iface) {
                return Ok(socket);
            }
        }
    }

    Err(Error::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_simulated() {
        let adapter = open(&AdapterConfig::Simulated(Default::default())).unwrap();
        assert!(!adapter.is_closed());
        assert!(adapter.close());
        assert!(adapter.is_closed());
    }

    #[test]
    fn open_missing_playback() {
        let config = crate::can::adapter_config::SimulationConfig {
            playback: Some("/nonexistent/trace.log".into()),
            ..Default::default()
        };

        match open(&AdapterConfig::Simulated(config)) {
            Err(Error::TransportOpen(_)) => {}
            _ => panic!("Expected TransportOpen error"),
        }
    }
}
