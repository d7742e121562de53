//! In-process datagram network.
//!
//! A lossless, in-order stand-in for UDP: each bound endpoint owns an
//! inbox, and a send appends to the destination's inbox. Everything is
//! single-threaded, so the shared state lives in `Rc<RefCell<_>>`.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::rc::Rc;

use tracing::trace;

use super::{Transport, TransportError, TransportResult};

/// First port handed out for ephemeral binds.
const EPHEMERAL_PORT_BASE: u16 = 40_000;

#[derive(Debug, Default)]
struct NetworkInner {
    inboxes: HashMap<SocketAddr, VecDeque<(SocketAddr, Vec<u8>)>>,
    next_port: u16,
    lossy: bool,
    delivered: u64,
}

/// Shared handle to an in-memory network.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Rc<RefCell<NetworkInner>>,
}

impl MemoryNetwork {
    /// Create an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unbound transport attached to this network.
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport {
            network: self.clone(),
            local: None,
            remote: None,
        }
    }

    /// Drop every datagram sent while `lossy` is set.
    pub fn set_lossy(&self, lossy: bool) {
        self.inner.borrow_mut().lossy = lossy;
    }

    /// Number of datagrams waiting at `addr`.
    pub fn pending(&self, addr: SocketAddr) -> usize {
        self.inner
            .borrow()
            .inboxes
            .get(&addr)
            .map_or(0, VecDeque::len)
    }

    /// Total datagrams delivered to any inbox so far.
    pub fn delivered(&self) -> u64 {
        self.inner.borrow().delivered
    }

    fn bind(&self, port: u16) -> TransportResult<SocketAddr> {
        let mut inner = self.inner.borrow_mut();
        let port = if port == 0 {
            let mut candidate = EPHEMERAL_PORT_BASE.saturating_add(inner.next_port);
            while inner.inboxes.contains_key(&loopback(candidate)) {
                candidate = candidate.wrapping_add(1).max(EPHEMERAL_PORT_BASE);
            }
            inner.next_port = candidate - EPHEMERAL_PORT_BASE + 1;
            candidate
        } else {
            port
        };

        let addr = loopback(port);
        if inner.inboxes.contains_key(&addr) {
            return Err(io::Error::from(io::ErrorKind::AddrInUse).into());
        }
        inner.inboxes.insert(addr, VecDeque::new());
        Ok(addr)
    }

    fn unbind(&self, addr: SocketAddr) {
        self.inner.borrow_mut().inboxes.remove(&addr);
    }

    fn deliver(&self, from: SocketAddr, to: SocketAddr, datagram: &[u8]) -> TransportResult<()> {
        let mut inner = self.inner.borrow_mut();
        if inner.lossy {
            trace!(%from, %to, len = datagram.len(), "memory network dropped datagram");
            return Ok(());
        }
        let inbox = inner
            .inboxes
            .get_mut(&to)
            .ok_or(TransportError::Unreachable)?;
        inbox.push_back((from, datagram.to_vec()));
        inner.delivered += 1;
        Ok(())
    }

    fn recv(&self, addr: SocketAddr) -> Option<(SocketAddr, Vec<u8>)> {
        self.inner
            .borrow_mut()
            .inboxes
            .get_mut(&addr)
            .and_then(VecDeque::pop_front)
    }
}

fn loopback(port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

/// One endpoint on a [`MemoryNetwork`].
#[derive(Debug)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    local: Option<SocketAddr>,
    remote: Option<SocketAddr>,
}

impl Transport for MemoryTransport {
    fn send(&mut self, datagram: &[u8]) -> TransportResult<()> {
        let to = self.remote.ok_or(TransportError::NoRemote)?;
        let from = match self.local {
            Some(addr) => addr,
            None => {
                let addr = self.network.bind(0)?;
                self.local = Some(addr);
                addr
            }
        };
        self.network.deliver(from, to, datagram)
    }

    fn set_remote(&mut self, addr: SocketAddr) {
        self.remote = Some(addr);
    }

    fn remote(&self) -> Option<SocketAddr> {
        self.remote
    }

    fn bind(&mut self, port: u16) -> TransportResult<()> {
        if let Some(addr) = self.local.take() {
            self.network.unbind(addr);
        }
        self.local = Some(self.network.bind(port)?);
        Ok(())
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.local
    }

    fn poll_recv(&mut self, buf: &mut [u8]) -> TransportResult<Option<(usize, SocketAddr)>> {
        let Some(local) = self.local else {
            return Ok(None);
        };
        let Some((from, datagram)) = self.network.recv(local) else {
            return Ok(None);
        };
        // Truncate like a real datagram socket would.
        let len = datagram.len().min(buf.len());
        buf[..len].copy_from_slice(&datagram[..len]);
        Ok(Some((len, from)))
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        if let Some(addr) = self.local.take() {
            self.network.unbind(addr);
        }
    }
}
