//! Low Level SocketCAN code
//! Code based on https://github.com/socketcan-rs/socketcan-rs
use libc::{
    c_int, c_void, can_frame, sa_family_t, sockaddr_can, socklen_t, AF_CAN, CAN_RAW, CAN_RAW_LOOPBACK,
    CAN_RAW_RECV_OWN_MSGS, SOL_CAN_RAW,
};
use std::ffi::CString;
use std::io::{Read, Write};
use std::os::fd::AsRawFd;

use super::frame::can_frame_default;

pub struct CanSocket(socket2::Socket);

fn as_bytes<T: Sized>(val: &T) -> &[u8] {
    let sz = std::mem::size_of::<T>();
    unsafe { std::slice::from_raw_parts::<'_, u8>(val as *const _ as *const u8, sz) }
}

fn as_bytes_mut<T: Sized>(val: &mut T) -> &mut [u8] {
    let sz = std::mem::size_of::<T>();
    unsafe { std::slice::from_raw_parts_mut(val as *mut _ as *mut u8, sz) }
}

fn if_nametoindex(ifname: &str) -> std::io::Result<u32> {
    let name = CString::new(ifname).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    match unsafe { libc::if_nametoindex(name.as_ptr()) } {
        0 => Err(std::io::Error::last_os_error()),
        idx => Ok(idx),
    }
}

impl CanSocket {
    /// Resolve the interface index. Fails with `NotFound` style OS errors when the interface does not exist.
    pub fn interface_index(ifname: &str) -> std::io::Result<u32> {
        if_nametoindex(ifname)
    }

    pub fn open(ifname: &str) -> std::io::Result<Self> {
        let mut addr: sockaddr_can = unsafe { std::mem::zeroed() };
        addr.can_family = AF_CAN as sa_family_t;
        addr.can_ifindex = if_nametoindex(ifname)? as c_int;

        // Convert into sockaddr_storage
        let bytes = as_bytes(&addr);
        let len = bytes.len();
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        as_bytes_mut(&mut storage)[..len].copy_from_slice(bytes);
        let sock_addr = unsafe { socket2::SockAddr::new(storage, len as socklen_t) };

        let af_can = socket2::Domain::from(AF_CAN);
        let can_raw = socket2::Protocol::from(CAN_RAW);

        let sock = socket2::Socket::new_raw(af_can, socket2::Type::RAW, Some(can_raw))?;
        sock.bind(&sock_addr)?;
        Ok(Self(sock))
    }

    pub fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
        self.as_raw_socket().set_nonblocking(nonblocking)
    }

    pub fn set_loopback(&self, enabled: bool) -> std::io::Result<()> {
        let loopback = c_int::from(enabled);
        self.set_socket_option(SOL_CAN_RAW, CAN_RAW_LOOPBACK, &loopback)
    }

    pub fn set_recv_own_msgs(&self, enabled: bool) -> std::io::Result<()> {
        let recv_own_msgs = c_int::from(enabled);
        self.set_socket_option(SOL_CAN_RAW, CAN_RAW_RECV_OWN_MSGS, &recv_own_msgs)
    }

    /// Read a single classic CAN frame.
    pub fn read_frame(&self) -> std::io::Result<can_frame> {
        let mut frame = can_frame_default();
        let n = (&self.0).read(as_bytes_mut(&mut frame))?;
        if n != std::mem::size_of::<can_frame>() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("short read of {} bytes", n),
            ));
        }
        Ok(frame)
    }

    /// Write a single classic CAN frame.
    pub fn write_frame(&self, frame: &can_frame) -> std::io::Result<()> {
        let n = (&self.0).write(as_bytes(frame))?;
        if n != std::mem::size_of::<can_frame>() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write of {} bytes", n),
            ));
        }
        Ok(())
    }

    fn as_raw_socket(&self) -> &socket2::Socket {
        &self.0
    }

    fn as_raw_fd(&self) -> std::os::fd::RawFd {
        self.0.as_raw_fd()
    }

    fn set_socket_option<T>(&self, level: c_int, name: c_int, val: &T) -> std::io::Result<()> {
        let ret = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                level,
                name,
                val as *const _ as *const c_void,
                std::mem::size_of::<T>() as socklen_t,
            )
        };

        match ret {
            0 => Ok(()),
            _ => Err(std::io::Error::last_os_error()),
        }
    }
}
