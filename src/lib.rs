//! # The UDS Tester Crate
//! Opens a CAN interface, puts an ECU into the Extended Diagnostic Session (`10 03`), keeps that session alive with periodic Tester Present (`3E 00`) requests and prints a one-line summary of every frame seen on the bus.
//!
//! ## Session Example
//!
//! The following opens the simulated adapter, runs a session until Ctrl+C is pressed and prints all frames to stdout.
//!
//! ```rust,no_run
//! use uds_tester::can::AdapterConfig;
//! use uds_tester::session::{SessionConfig, SessionController, StdoutSink};
//! use std::sync::Arc;
//!
//! async fn session_example() -> uds_tester::Result<()> {
//!     let adapter_config = AdapterConfig::Simulated(Default::default());
//!     let config = SessionConfig::new(0x7e0);
//!     let controller = SessionController::new(config, Arc::new(StdoutSink));
//!
//!     controller
//!         .run(&adapter_config, async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await
//! }
//! ```
//!
//! ## Async CAN Example
//!
//! The adapters are fully async. Every call to `recv` creates an independent subscription to all received frames.
//!
//! ```rust,no_run
//! use uds_tester::StreamExt;
//! async fn can_example() {
//!     let adapter = uds_tester::can::open(&uds_tester::can::AdapterConfig::Any).unwrap();
//!     let mut stream = adapter.recv();
//!
//!     while let Some(frame) = stream.next().await {
//!         println!("{}", uds_tester::summary::summarize(&frame));
//!     }
//! }
//! ```
//!
//! ## Suported adapters
//!  - SocketCAN (Linux only, feature `socketcan`)
//!  - Simulated bus generating OBD-II responses, or replaying a text log
//!

pub mod can;
pub mod config;
mod error;
pub mod obd;
pub mod session;
pub mod sim;
pub mod summary;
pub mod uds;

pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub use tokio_stream::{Stream, StreamExt};

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;
