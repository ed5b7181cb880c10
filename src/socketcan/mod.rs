//! This module provides a [`CanAdapter`] implementation for a raw Linux SocketCAN socket.
use crate::can::AsyncCanAdapter;
use crate::can::CanAdapter;
use crate::error::Error;
use crate::Result;

use std::collections::VecDeque;
use std::io::ErrorKind;
use tracing::{debug, info};

mod frame;
mod socket;

pub use socket::CanSocket;

/// Errors after which the interface is gone for good, e.g. a USB adapter was unplugged.
fn is_disconnect(e: &std::io::Error) -> bool {
    matches!(e.raw_os_error(), Some(libc::ENETDOWN) | Some(libc::ENODEV) | Some(libc::ENXIO))
}

/// Adapter for a [`CanSocket`].
pub struct SocketCan {
    iface: String,
    socket: Option<CanSocket>,
}

impl SocketCan {
    pub fn new(iface: &str) -> Result<Self> {
        if CanSocket::interface_index(iface).is_err() {
            return Err(Error::NotFound);
        }

        let open = || -> std::io::Result<CanSocket> {
            let socket = CanSocket::open(iface)?;
            socket.set_nonblocking(true)?;
            socket.set_loopback(true)?;
            // Our own requests are printed by the sender, don't echo them back.
            socket.set_recv_own_msgs(false)?;
            Ok(socket)
        };

        let socket = open().map_err(|e| Error::TransportOpen(format!("{}: {}", iface, e)))?;

        Ok(Self {
            iface: iface.to_owned(),
            socket: Some(socket),
        })
    }

    pub fn new_async(iface: &str) -> Result<AsyncCanAdapter> {
        let socket = SocketCan::new(iface)?;

        info!("Connected to SocketCan {}", iface);
        Ok(AsyncCanAdapter::new(socket))
    }

    fn socket(&self) -> Result<&CanSocket> {
        self.socket.as_ref().ok_or(Error::Disconnected)
    }
}

impl CanAdapter for SocketCan {
    fn send(&mut self, frames: &mut VecDeque<crate::can::Frame>) -> Result<()> {
        let socket = self.socket()?;

        while let Some(frame) = frames.front() {
            let to_send: libc::can_frame = frame.into();

            match socket.write_frame(&to_send) {
                Ok(()) => {
                    frames.pop_front();
                }
                // Socket buffer full, keep the rest queued for the next iteration
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.raw_os_error() == Some(libc::ENOBUFS) => break,
                Err(e) if is_disconnect(&e) => return Err(Error::Disconnected),
                Err(e) => return Err(Error::TransportSend(e.to_string())),
            }
        }

        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<crate::can::Frame>> {
        let socket = self.socket()?;
        let mut frames = vec![];

        loop {
            match socket.read_frame() {
                Ok(raw) => {
                    if !frame::is_data_frame(&raw) {
                        continue;
                    }
                    match crate::can::Frame::try_from(raw) {
                        Ok(frame) => frames.push(frame),
                        Err(e) => debug!("Dropping frame: {}", e),
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if is_disconnect(&e) => return Err(Error::Disconnected),
                Err(e) => {
                    if frames.is_empty() {
                        return Err(Error::TransportReceive(e.to_string()));
                    }
                    break;
                }
            }
        }

        Ok(frames)
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            info!("Closed SocketCan {}", self.iface);
        }
    }
}
