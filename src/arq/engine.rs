//! KCP-backed ARQ engine.
//!
//! [`KcpArq`] drives a [`kcp::Kcp`] control block in nodelay mode: 10 ms
//! internal interval, fast resend after two duplicate acks, congestion
//! control off. The engine's millisecond clock starts at the first
//! [`advance`](Arq::advance) and wraps with it.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use kcp::Kcp;
use tracing::{trace, warn};

use super::{Arq, ArqError, ArqResult};
use crate::core::{KCP_CONV, KCP_FAST_RESEND, KCP_INTERVAL_MS, MAX_SENDING_LEN, SessionConfig};

/// Datagrams written by the control block, waiting to be polled.
#[derive(Clone, Default)]
struct Outbox(Rc<RefCell<VecDeque<Vec<u8>>>>);

impl Write for Outbox {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().push_back(buf.to_vec());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Default ARQ engine for sessions.
pub struct KcpArq {
    kcp: Kcp<Outbox>,
    outbox: Outbox,
    /// Instant the engine clock counts from, set on first advance.
    epoch: Option<Instant>,
    /// Inbound data arrived since the last flush, so acks are owed.
    ack_pending: bool,
}

impl fmt::Debug for KcpArq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KcpArq")
            .field("wait_snd", &self.kcp.wait_snd())
            .field("queued_output", &self.outbox.0.borrow().len())
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

impl KcpArq {
    /// Create an engine emitting datagrams of at most `mtu` bytes with a
    /// send and receive window of `window` segments.
    pub fn new(mtu: usize, window: u16) -> Self {
        let outbox = Outbox::default();
        let mut kcp = Kcp::new(KCP_CONV, outbox.clone());
        kcp.set_nodelay(true, KCP_INTERVAL_MS, KCP_FAST_RESEND, true);
        kcp.set_wndsize(window, window);
        if let Err(err) = kcp.set_mtu(mtu) {
            warn!(mtu, %err, "mtu rejected, keeping engine default");
        }

        Self {
            kcp,
            outbox,
            epoch: None,
            ack_pending: false,
        }
    }

    /// Create an engine from session settings.
    pub fn from_config(config: &SessionConfig) -> Self {
        let window = u16::try_from(config.window).unwrap_or(u16::MAX);
        Self::new(config.mtu, window)
    }

    fn clock(&self, now: Instant) -> u32 {
        match self.epoch {
            Some(epoch) => now.saturating_duration_since(epoch).as_millis() as u32,
            None => 0,
        }
    }
}

impl Arq for KcpArq {
    fn submit(&mut self, message: &[u8]) -> ArqResult<()> {
        if message.len() > MAX_SENDING_LEN {
            return Err(ArqError::TooLarge {
                size: message.len(),
                max: MAX_SENDING_LEN,
            });
        }
        self.kcp.send(message).map_err(ArqError::Refused)?;
        Ok(())
    }

    fn feed(&mut self, datagram: &[u8]) -> ArqResult<()> {
        self.kcp.input(datagram).map_err(ArqError::Malformed)?;
        self.ack_pending = true;
        Ok(())
    }

    fn poll_due_time(&self, now: Instant) -> Instant {
        if self.epoch.is_none() || self.ack_pending {
            return now;
        }
        let wait = self.kcp.check(self.clock(now));
        now + Duration::from_millis(u64::from(wait))
    }

    fn advance(&mut self, now: Instant) {
        self.epoch.get_or_insert(now);
        let current = self.clock(now);

        if let Err(err) = self.kcp.update(current) {
            warn!(%err, "engine update failed");
            return;
        }
        if self.ack_pending {
            self.ack_pending = false;
            if let Err(err) = self.kcp.flush() {
                warn!(%err, "engine flush failed");
            }
        }
    }

    fn drain(&mut self, buf: &mut Vec<u8>) -> Option<usize> {
        let size = self.kcp.peeksize().ok()?;
        buf.clear();
        buf.resize(size, 0);

        match self.kcp.recv(buf) {
            Ok(len) => {
                buf.truncate(len);
                Some(len)
            }
            Err(err) => {
                trace!(%err, "nothing to drain");
                buf.clear();
                None
            }
        }
    }

    fn pending_unacked(&self) -> usize {
        self.kcp.wait_snd()
    }

    fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.outbox.0.borrow_mut().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipe(from: &mut KcpArq, to: &mut KcpArq) -> usize {
        let mut count = 0;
        while let Some(datagram) = from.poll_transmit() {
            to.feed(&datagram).unwrap();
            count += 1;
        }
        count
    }

    fn outputs(engine: &mut KcpArq) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| engine.poll_transmit()).collect()
    }

    #[test]
    fn test_transfer_and_ack() {
        let now = Instant::now();
        let mut a = KcpArq::new(200, 128);
        let mut b = KcpArq::new(200, 128);

        let message: Vec<u8> = (0..5000u32).map(|i| i as u8).collect();
        a.submit(&message).unwrap();
        assert!(a.pending_unacked() > 1);

        a.advance(now);
        assert!(pipe(&mut a, &mut b) > 1);

        let mut buf = Vec::new();
        assert_eq!(b.drain(&mut buf), Some(5000));
        assert_eq!(buf, message);
        assert_eq!(b.drain(&mut buf), None);

        b.advance(now);
        pipe(&mut b, &mut a);
        assert_eq!(a.pending_unacked(), 0);
    }

    #[test]
    fn test_out_of_order_reassembly() {
        let now = Instant::now();
        let mut a = KcpArq::new(60, 128);
        let mut b = KcpArq::new(60, 128);

        let message: Vec<u8> = (0..200u8).collect();
        a.submit(&message).unwrap();
        a.advance(now);

        let segments = outputs(&mut a);
        assert!(segments.len() > 1);

        let mut buf = Vec::new();
        for datagram in segments.iter().rev() {
            assert_eq!(b.drain(&mut buf), None);
            b.feed(datagram).unwrap();
        }
        assert_eq!(b.drain(&mut buf), Some(200));
        assert_eq!(buf, message);
    }

    #[test]
    fn test_retransmit_after_loss() {
        let now = Instant::now();
        let mut a = KcpArq::new(200, 128);
        let mut b = KcpArq::new(200, 128);

        a.submit(b"lost once").unwrap();
        a.advance(now);
        assert_eq!(outputs(&mut a).len(), 1);

        a.advance(now + Duration::from_millis(300));
        assert!(pipe(&mut a, &mut b) >= 1);

        let mut buf = Vec::new();
        assert_eq!(b.drain(&mut buf), Some(9));
        assert_eq!(buf, b"lost once");
    }

    #[test]
    fn test_duplicate_delivered_once() {
        let now = Instant::now();
        let mut a = KcpArq::new(200, 128);
        let mut b = KcpArq::new(200, 128);

        a.submit(b"once").unwrap();
        a.advance(now);
        let datagram = a.poll_transmit().unwrap();
        b.feed(&datagram).unwrap();
        b.feed(&datagram).unwrap();

        let mut buf = Vec::new();
        assert_eq!(b.drain(&mut buf), Some(4));
        assert_eq!(b.drain(&mut buf), None);
    }

    #[test]
    fn test_submit_too_large() {
        let mut a = KcpArq::new(200, 128);
        assert!(matches!(
            a.submit(&vec![0u8; MAX_SENDING_LEN + 1]),
            Err(ArqError::TooLarge { .. })
        ));
        assert_eq!(a.pending_unacked(), 0);
    }

    #[test]
    fn test_malformed_input() {
        let mut a = KcpArq::new(200, 128);
        assert!(a.feed(&[1, 2, 3]).unwrap_err().is_malformed());
    }

    #[test]
    fn test_due_time() {
        let now = Instant::now();
        let mut a = KcpArq::new(200, 128);
        let mut b = KcpArq::new(200, 128);

        // Never advanced: due at once.
        assert_eq!(a.poll_due_time(now), now);

        a.advance(now);
        assert_eq!(a.poll_due_time(now), now + Duration::from_millis(10));

        // Owed acknowledgments make the engine due immediately.
        b.submit(b"ping").unwrap();
        b.advance(now);
        pipe(&mut b, &mut a);
        assert_eq!(a.poll_due_time(now), now);

        a.advance(now);
        assert!(a.poll_due_time(now) > now);
        pipe(&mut a, &mut b);
        assert_eq!(b.pending_unacked(), 0);
    }
}
