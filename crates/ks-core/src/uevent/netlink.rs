//! Netlink kernel uevent socket.
//!
//! Linux delivers uevents over an `AF_NETLINK` multicast socket with the
//! `NETLINK_KOBJECT_UEVENT` protocol. The socket joins every multicast
//! group and carries a generous receive buffer so bursts around device
//! state changes are not dropped.

#![cfg(target_os = "linux")]

use super::listener::DatagramSource;
use std::io;
use std::mem;

const RCV_BUF_BYTES: libc::c_int = 64 * 1024;

/// Blocking netlink uevent socket.
pub struct NetlinkUeventSocket {
    fd: libc::c_int,
}

impl NetlinkUeventSocket {
    pub fn open() -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_DGRAM | libc::SOCK_CLOEXEC,
                libc::NETLINK_KOBJECT_UEVENT,
            )
        };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_RCVBUF,
                (&RCV_BUF_BYTES as *const libc::c_int).cast(),
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
        addr.nl_pid = std::process::id();
        addr.nl_groups = 0xffff_ffff;

        let rc = unsafe {
            libc::bind(
                fd,
                (&addr as *const libc::sockaddr_nl).cast(),
                mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        Ok(Self { fd })
    }
}

impl DatagramSource for NetlinkUeventSocket {
    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::recv(self.fd, buf.as_mut_ptr().cast(), buf.len(), 0) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
    }
}

impl Drop for NetlinkUeventSocket {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}
