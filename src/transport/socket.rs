//! Non-blocking UDP transport over tokio.
//!
//! Sockets are registered with the tokio reactor, so binding must happen
//! inside a runtime. All I/O is `try_*`: the event loop polls every tick
//! and never awaits a single socket. Kernel buffers are enlarged to
//! [`UDP_BUF_SIZE`] so a full ARQ window fits in flight.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use super::{Transport, TransportError, TransportResult};
use crate::core::UDP_BUF_SIZE;

/// UDP transport for one session.
#[derive(Debug)]
pub struct UdpTransport {
    /// The underlying socket, once bound.
    socket: Option<UdpSocket>,
    /// Remote peer address.
    remote: Option<SocketAddr>,
    /// Local IP used for binds.
    bind_ip: IpAddr,
    /// Requested kernel send and receive buffer size.
    buffer_size: usize,
}

impl Default for UdpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl UdpTransport {
    /// Create an unbound transport listening on all interfaces once bound.
    pub fn new() -> Self {
        Self::with_bind_ip(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    /// Create an unbound transport that binds to `ip`.
    pub fn with_bind_ip(ip: IpAddr) -> Self {
        Self {
            socket: None,
            remote: None,
            bind_ip: ip,
            buffer_size: UDP_BUF_SIZE,
        }
    }

    /// Request `size` bytes of kernel send and receive buffer.
    ///
    /// Takes effect on the next bind; the OS may cap it.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    fn bind_to(&mut self, addr: SocketAddr) -> TransportResult<()> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        if let Err(err) = socket.set_recv_buffer_size(self.buffer_size) {
            warn!(size = self.buffer_size, %err, "could not size receive buffer");
        }
        if let Err(err) = socket.set_send_buffer_size(self.buffer_size) {
            warn!(size = self.buffer_size, %err, "could not size send buffer");
        }
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;

        let socket = UdpSocket::from_std(socket.into())?;
        debug!(local = ?socket.local_addr().ok(), "udp transport bound");
        self.socket = Some(socket);
        Ok(())
    }

    /// Bind an ephemeral port in the remote's address family.
    fn bind_ephemeral(&mut self, remote: SocketAddr) -> TransportResult<()> {
        let ip = match (remote, self.bind_ip) {
            (SocketAddr::V6(_), IpAddr::V4(v4)) if v4.is_unspecified() => {
                IpAddr::V6(Ipv6Addr::UNSPECIFIED)
            }
            (_, ip) => ip,
        };
        self.bind_to(SocketAddr::new(ip, 0))
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: &[u8]) -> TransportResult<()> {
        let remote = self.remote.ok_or(TransportError::NoRemote)?;
        if self.socket.is_none() {
            self.bind_ephemeral(remote)?;
        }
        let socket = self.socket.as_ref().ok_or(TransportError::NotBound)?;
        socket.try_send_to(datagram, remote)?;
        Ok(())
    }

    fn set_remote(&mut self, addr: SocketAddr) {
        self.remote = Some(addr);
    }

    fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn bind(&mut self, port: u16) -> TransportResult<()> {
        self.bind_to(SocketAddr::new(self.bind_ip, port))
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    fn poll_recv(&mut self, buf: &mut [u8]) -> TransportResult<Option<(usize, SocketAddr)>> {
        let Some(socket) = self.socket.as_ref() else {
            return Ok(None);
        };
        match socket.try_recv_from(buf) {
            Ok((len, addr)) => Ok(Some((len, addr))),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
