//! Timer-driven event loop over tokio.
//!
//! The loop owns a [`Context`] and, once per tick interval, polls every
//! session's transport and then runs the tick driver. Sessions hold
//! non-`Send` handlers, so the loop runs on the task that owns it (a
//! current-thread runtime or a `LocalSet`).

use std::future::Future;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::core::ContextConfig;
use crate::session::Context;

/// Drives a [`Context`] at its configured tick interval.
#[derive(Debug)]
pub struct EventLoop {
    context: Context,
}

impl EventLoop {
    /// Create a loop over a fresh context.
    pub fn new(config: ContextConfig) -> Self {
        Self::with_context(Context::new(config))
    }

    /// Create a loop over an existing context.
    pub fn with_context(mut context: Context) -> Self {
        context.initialize();
        Self { context }
    }

    /// The driven context.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// The driven context, mutably.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.context
    }

    /// Give the context back without tearing it down.
    pub fn into_context(self) -> Context {
        self.context
    }

    /// Run one iteration: deliver inbound datagrams, then tick.
    ///
    /// Returns the number of sessions finalized.
    pub fn turn(&mut self, now: std::time::Instant) -> usize {
        let received = self.context.poll_inbound(now);
        if received > 0 {
            debug!(received, "inbound datagrams delivered");
        }
        self.context.tick(now)
    }

    /// Tick until `shutdown` resolves, then tear the context down.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = time::interval(self.context.config().tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(sessions = self.context.len(), "event loop started");
        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => break,

                tick = interval.tick() => {
                    self.turn(tick.into_std());
                }
            }
        }

        let dropped = self.context.teardown();
        info!(dropped, "event loop stopped");
    }

    /// Tick until every session has been finalized.
    pub async fn run_until_idle(&mut self) {
        let mut interval = time::interval(self.context.config().tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.context.is_empty() {
            let tick = interval.tick().await;
            self.turn(tick.into_std());
        }
        debug!("event loop idle");
    }
}
