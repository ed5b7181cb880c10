//! Configuration file handling
//!
//! The file is TOML. All sections and keys are optional. Polling is off unless `[[session.poll]]` entries are given;
//! `config.example.toml` in the repository polls the usual set of engine PIDs and GM DIDs.
//!
//! ```toml
//! [interface]
//! kind = "socketcan"
//! channel = "can0"
//!
//! [session]
//! request_id = 0x7E0
//! keepalive_interval_ms = 2000
//!
//! [[session.poll]]
//! service = 0x01
//! pid = 0x0C
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::can::adapter_config::SimulationConfig;
use crate::can::AdapterConfig;
use crate::error::Error;
use crate::session::{SessionConfig, DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_POLL_GAP};
use crate::uds::{DiagnosticRequest, ServiceIdentifier};
use crate::Result;

/// Default physical request ID of the engine control module
pub const DEFAULT_REQUEST_ID: u32 = 0x7e0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// First interface that can be opened
    #[default]
    Any,
    SocketCan,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterfaceSection {
    pub kind: InterfaceKind,
    /// SocketCAN interface name, e.g. `can0`
    pub channel: Option<String>,
}

/// One polled value. Service `0x22` reads a 16 bit DID, any other service an 8 bit PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollRequest {
    pub service: u8,
    pub pid: u16,
}

impl TryFrom<PollRequest> for DiagnosticRequest {
    type Error = Error;
    fn try_from(poll: PollRequest) -> Result<Self> {
        if poll.service == ServiceIdentifier::ReadDataByIdentifier as u8 {
            return Ok(DiagnosticRequest::ReadDid { did: poll.pid });
        }

        let pid = u8::try_from(poll.pid).map_err(|_| {
            Error::Config(format!(
                "PID {:#x} for service {:#04x} does not fit in one byte",
                poll.pid, poll.service
            ))
        })?;

        Ok(DiagnosticRequest::ReadPid {
            service: poll.service,
            pid,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSection {
    pub bus: Option<u8>,
    pub request_id: Option<u32>,
    pub response_id: Option<u32>,
    pub keepalive_interval_ms: Option<u64>,
    pub extended_ids: Option<bool>,
    pub padding: Option<u8>,
    pub poll_gap_ms: Option<u64>,
    pub poll: Vec<PollRequest>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationSection {
    pub interval_ms: Option<u64>,
    pub playback: Option<PathBuf>,
}

/// Contents of the configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub interface: InterfaceSection,
    pub session: SessionSection,
    pub simulation: SimulationSection,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a specific path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("failed to parse {}: {}", path.display(), msg)),
            e => e,
        })
    }

    /// Load the default config file if there is one, otherwise defaults.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/uds-tester/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("uds-tester").join("config.toml"))
    }

    pub fn adapter_config(&self, simulate: bool) -> AdapterConfig {
        let kind = if simulate {
            InterfaceKind::Simulated
        } else {
            self.interface.kind
        };

        match kind {
            InterfaceKind::Any => match &self.interface.channel {
                Some(channel) => AdapterConfig::SocketCAN(Some(channel.clone())),
                None => AdapterConfig::Any,
            },
            InterfaceKind::SocketCan => AdapterConfig::SocketCAN(self.interface.channel.clone()),
            InterfaceKind::Simulated => {
                let defaults = SimulationConfig::default();
                AdapterConfig::Simulated(SimulationConfig {
                    interval: self
                        .simulation
                        .interval_ms
                        .map(Duration::from_millis)
                        .unwrap_or(defaults.interval),
                    playback: self.simulation.playback.clone(),
                })
            }
        }
    }

    /// Build and validate the session configuration.
    pub fn session_config(&self) -> Result<SessionConfig> {
        let session = &self.session;
        let request_id = session.request_id.unwrap_or(DEFAULT_REQUEST_ID);

        let mut config = SessionConfig::new(request_id);
        config.bus = session.bus.unwrap_or(0);
        config.response_id = session.response_id;
        config.keepalive_interval = session
            .keepalive_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL);
        if let Some(extended_ids) = session.extended_ids {
            config.extended_ids = extended_ids;
        }
        config.padding = session.padding;
        config.poll_gap = session.poll_gap_ms.map(Duration::from_millis).unwrap_or(DEFAULT_POLL_GAP);
        config.poll = session
            .poll
            .iter()
            .map(|poll| DiagnosticRequest::try_from(*poll))
            .collect::<Result<Vec<_>>>()?;

        config.validate()?;
        Ok(config)
    }
}
