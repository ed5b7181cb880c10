//! Contains the main error type for the library.
use thiserror::Error;

/// The main error type for the library. Errors from the UDS layer are contained by this error.
#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Not Found")]
    NotFound,
    #[error("Malformed Frame")]
    MalformedFrame,
    #[error("Timeout")]
    Timeout,
    /// The transport closed its channel, e.g. because the device was unplugged. Terminal.
    #[error("Transport Disconnected")]
    Disconnected,
    #[error("Failed to open transport: {0}")]
    TransportOpen(String),
    #[error("Failed to send frame: {0}")]
    TransportSend(String),
    #[error("Failed to receive frame: {0}")]
    TransportReceive(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    UDSError(crate::uds::Error),
}

impl From<tokio_stream::Elapsed> for Error {
    fn from(_: tokio_stream::Elapsed) -> Error {
        Error::Timeout
    }
}

impl From<crate::uds::Error> for Error {
    fn from(e: crate::uds::Error) -> Error {
        Error::UDSError(e)
    }
}
