//! End-to-end session scenarios over the in-memory network.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use kcpuv::prelude::*;

const SERVER_PORT: u16 = 9000;
const STEP: Duration = Duration::from_millis(10);

struct Harness {
    ctx: Context,
    net: MemoryNetwork,
    server: SessionId,
    client: SessionId,
    received: Rc<RefCell<Vec<u8>>>,
    deliveries: Rc<Cell<usize>>,
    now: Instant,
}

impl Harness {
    fn new(config: ContextConfig) -> Self {
        let net = MemoryNetwork::new();
        let mut ctx = Context::new(config);
        let now = Instant::now();

        let received = Rc::new(RefCell::new(Vec::new()));
        let deliveries = Rc::new(Cell::new(0));

        let server = ctx.create_at(net.transport(), now);
        let sink = received.clone();
        let count = deliveries.clone();
        ctx.session_mut(server)
            .unwrap()
            .listen(SERVER_PORT, move |_, data| {
                sink.borrow_mut().extend_from_slice(data);
                count.set(count.get() + 1);
            })
            .unwrap();

        let client = ctx.create_at(net.transport(), now);
        ctx.session_mut(client)
            .unwrap()
            .initiate("127.0.0.1", SERVER_PORT)
            .unwrap();

        Self {
            ctx,
            net,
            server,
            client,
            received,
            deliveries,
            now,
        }
    }

    fn step(&mut self) {
        self.ctx.poll_inbound(self.now);
        self.ctx.tick(self.now);
        self.now += STEP;
    }

    /// Step until `done` holds, giving up after `max` steps.
    fn run_until(&mut self, max: usize, mut done: impl FnMut(&Self) -> bool) -> bool {
        for _ in 0..max {
            if done(self) {
                return true;
            }
            self.step();
        }
        done(self)
    }

    fn send(&mut self, id: SessionId, data: &[u8]) {
        let now = self.now;
        self.ctx.session_mut(id).unwrap().send_at(data, now);
    }

    fn close(&mut self, id: SessionId) {
        let now = self.now;
        self.ctx.session_mut(id).unwrap().close_at(now);
    }

    /// Count close and before-close handler runs on both sessions.
    fn watch_close(&mut self) -> (Rc<RefCell<Vec<(SessionId, SessionState)>>>, Rc<Cell<usize>>) {
        let closes = Rc::new(RefCell::new(Vec::new()));
        let before = Rc::new(Cell::new(0));
        for id in [self.server, self.client] {
            let log = closes.clone();
            let count = before.clone();
            let session = self.ctx.session_mut(id).unwrap();
            session.set_before_close(move |_| count.set(count.get() + 1));
            session.bind_close(move |s| log.borrow_mut().push((s.id(), s.state())));
        }
        (closes, before)
    }

    fn state(&self, id: SessionId) -> Option<SessionState> {
        self.ctx.session(id).map(Session::state)
    }

    /// Exchange one message so both sides are `Ready`.
    fn establish(&mut self) {
        self.send(self.client, b"hello");
        let client = self.client;
        let server = self.server;
        assert!(self.run_until(20, |h| {
            h.state(client) == Some(SessionState::Ready)
                && h.state(server) == Some(SessionState::Ready)
        }));
        assert_eq!(&*self.received.borrow(), b"hello");
        self.received.borrow_mut().clear();
    }
}

#[test]
fn test_large_payload_delivered_in_order() {
    let mut h = Harness::new(ContextConfig::default());
    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();

    h.send(h.client, &payload);
    let expected = payload.len();
    assert!(h.run_until(50, |h| h.received.borrow().len() >= expected));

    assert_eq!(*h.received.borrow(), payload);
    assert_eq!(h.state(h.server), Some(SessionState::Ready));
    assert!(h.ctx.session(h.server).unwrap().remote().is_some());
}

#[test]
fn test_many_sends_concatenate_exactly() {
    let mut h = Harness::new(ContextConfig::default());
    h.establish();

    let mut expected = Vec::new();
    for i in 0..40u32 {
        let message = vec![i as u8; 1000 + i as usize * 997];
        expected.extend_from_slice(&message);
        h.send(h.client, &message);
        h.step();
    }

    let total = expected.len();
    assert!(h.run_until(100, |h| h.received.borrow().len() >= total));
    assert_eq!(*h.received.borrow(), expected);
}

#[test]
fn test_graceful_close_handshake() {
    let mut h = Harness::new(ContextConfig::default());
    h.establish();

    let (closes, before) = h.watch_close();

    h.close(h.client);
    assert_eq!(h.state(h.client), Some(SessionState::Fin));

    assert!(h.run_until(100, |h| h.ctx.is_empty()));

    let closes = closes.borrow();
    assert_eq!(closes.len(), 2);
    assert!(closes.contains(&(h.server, SessionState::WaitFree)));
    assert!(closes.contains(&(h.client, SessionState::WaitFree)));
    assert_eq!(before.get(), 2);

    // Nothing more fires once both are gone.
    for _ in 0..10 {
        h.step();
    }
    assert_eq!(closes.len(), 2);
}

#[test]
fn test_data_before_close_is_delivered() {
    let mut h = Harness::new(ContextConfig::default());
    h.establish();

    h.send(h.client, b"last words");
    h.close(h.client);

    assert!(h.run_until(100, |h| h.ctx.is_empty()));
    assert_eq!(&*h.received.borrow(), b"last words");
}

#[test]
fn test_close_before_first_tick_reaches_peer() {
    let mut h = Harness::new(ContextConfig::default());
    let (closes, before) = h.watch_close();

    // Active opener sends and closes before hearing anything back.
    h.send(h.client, b"bye");
    h.close(h.client);
    assert_eq!(h.state(h.client), Some(SessionState::Fin));

    assert!(h.run_until(100, |h| h.ctx.is_empty()));
    assert_eq!(&*h.received.borrow(), b"bye");

    let closes = closes.borrow();
    assert_eq!(closes.len(), 2);
    assert!(closes.contains(&(h.server, SessionState::WaitFree)));
    assert!(closes.contains(&(h.client, SessionState::WaitFree)));
    assert_eq!(before.get(), 2);
}

#[test]
fn test_simultaneous_close() {
    let mut h = Harness::new(ContextConfig::default());
    h.establish();
    let (closes, before) = h.watch_close();

    h.close(h.client);
    h.close(h.server);
    assert_eq!(h.state(h.client), Some(SessionState::Fin));
    assert_eq!(h.state(h.server), Some(SessionState::Fin));

    assert!(h.run_until(100, |h| h.ctx.is_empty()));
    for _ in 0..10 {
        h.step();
    }

    let closes = closes.borrow();
    assert_eq!(closes.len(), 2);
    assert!(closes.contains(&(h.server, SessionState::WaitFree)));
    assert!(closes.contains(&(h.client, SessionState::WaitFree)));
    assert_eq!(before.get(), 2);
}

#[test]
fn test_heartbeat_keeps_idle_session_alive() {
    let config = ContextConfigBuilder::new()
        .heartbeat_interval(Duration::from_millis(100))
        .session(SessionConfigBuilder::new().timeout(Duration::from_millis(500)).build())
        .build();
    let mut h = Harness::new(config);
    h.establish();

    let client_send_ts = h.ctx.session(h.client).unwrap().send_ts();
    let deliveries = h.deliveries.get();

    // Idle for four timeouts' worth of ticks.
    for _ in 0..200 {
        h.step();
    }

    assert_eq!(h.state(h.client), Some(SessionState::Ready));
    assert_eq!(h.state(h.server), Some(SessionState::Ready));
    assert!(h.ctx.session(h.client).unwrap().send_ts() > client_send_ts);
    assert_eq!(h.deliveries.get(), deliveries);
}

#[test]
fn test_vanished_peer_times_out() {
    let config = ContextConfigBuilder::new()
        .heartbeat_interval(Duration::from_millis(100))
        .session(SessionConfigBuilder::new().timeout(Duration::from_secs(1)).build())
        .build();
    let mut h = Harness::new(config);
    h.establish();

    let closed = Rc::new(Cell::new(0));
    let count = closed.clone();
    h.ctx
        .session_mut(h.server)
        .unwrap()
        .bind_close(move |_| count.set(count.get() + 1));

    let client = h.client;
    assert!(h.ctx.destroy(client));
    let last_heard = h.ctx.session(h.server).unwrap().recv_ts();

    let server = h.server;
    assert!(h.run_until(200, |h| h.ctx.session(server).is_none()));
    assert_eq!(closed.get(), 1);
    assert!(h.now >= last_heard + Duration::from_secs(1));
}

#[test]
fn test_lost_datagrams_are_retransmitted() {
    let mut h = Harness::new(ContextConfig::default());
    h.establish();

    h.net.set_lossy(true);
    h.send(h.client, b"through the storm");
    for _ in 0..5 {
        h.step();
    }
    assert!(h.received.borrow().is_empty());

    h.net.set_lossy(false);
    assert!(h.run_until(200, |h| !h.received.borrow().is_empty()));
    assert_eq!(&*h.received.borrow(), b"through the storm");
}

#[cfg(feature = "crypto")]
#[test]
fn test_encrypted_session() {
    let mut h = Harness::new(ContextConfig::default());
    for id in [h.server, h.client] {
        h.ctx.session_mut(id).unwrap().init_crypto(b"pre-shared key").unwrap();
    }

    let payload = vec![0x5a; 70_000];
    h.send(h.client, &payload);
    assert!(h.run_until(50, |h| h.received.borrow().len() >= 70_000));
    assert_eq!(*h.received.borrow(), payload);
}

#[cfg(feature = "crypto")]
#[test]
fn test_key_mismatch_never_connects() {
    let mut h = Harness::new(ContextConfig::default());
    h.ctx.session_mut(h.server).unwrap().init_crypto(b"server key").unwrap();
    h.ctx.session_mut(h.client).unwrap().init_crypto(b"client key").unwrap();

    h.send(h.client, b"hello");
    for _ in 0..20 {
        h.step();
    }

    assert_eq!(h.state(h.server), Some(SessionState::WaitPassively));
    assert!(h.ctx.session(h.server).unwrap().remote().is_none());
    assert!(h.received.borrow().is_empty());
}
