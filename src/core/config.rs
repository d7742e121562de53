//! Session and context configuration.

use std::time::Duration;

use super::constants::{
    DEFAULT_TIMEOUT, HEARTBEAT_INTERVAL, INIT_WND_SIZE, MAX_CHUNK_PAYLOAD, MIN_MTU, MTU_DEF,
    SESSION_BUFFER_SIZE, TIMER_INTERVAL,
};

/// Per-session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Inactivity budget; `Duration::ZERO` disables the timeout for this session.
    pub timeout: Duration,

    /// Reassembly buffer capacity in bytes.
    pub buffer_size: usize,

    /// Maximum datagram size produced by the ARQ engine.
    pub mtu: usize,

    /// ARQ send/receive window in segments.
    pub window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            buffer_size: SESSION_BUFFER_SIZE,
            mtu: MTU_DEF,
            window: INIT_WND_SIZE,
        }
    }
}

/// Builder for a [`SessionConfig`].
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inactivity timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the reassembly buffer capacity.
    ///
    /// The capacity always stays above the largest chunk payload, so a
    /// single chunk can start a fresh accumulation window.
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size.max(MAX_CHUNK_PAYLOAD + 1);
        self
    }

    /// Set the ARQ datagram size, clamped to what the engine accepts.
    pub fn mtu(mut self, mtu: usize) -> Self {
        self.config.mtu = mtu.clamp(MIN_MTU, u16::MAX as usize);
        self
    }

    /// Set the ARQ window size in segments.
    pub fn window(mut self, window: usize) -> Self {
        self.config.window = window.clamp(1, u16::MAX as usize);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> SessionConfig {
        self.config
    }
}

/// Configuration for a [`Context`](crate::session::Context) and the
/// event loop driving it.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Whether session timeouts are enforced by the tick driver.
    pub enforce_timeout: bool,

    /// Whether idle ready sessions emit keepalives.
    pub heartbeat: bool,

    /// Idle time before a keepalive is sent.
    pub heartbeat_interval: Duration,

    /// Interval between ticks when run by the event loop.
    pub tick_interval: Duration,

    /// Defaults applied to sessions created through the context.
    pub session: SessionConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enforce_timeout: true,
            heartbeat: true,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            tick_interval: TIMER_INTERVAL,
            session: SessionConfig::default(),
        }
    }
}

/// Builder for a [`ContextConfig`].
#[derive(Debug, Default)]
pub struct ContextConfigBuilder {
    config: ContextConfig,
}

impl ContextConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable timeout enforcement.
    pub fn enforce_timeout(mut self, enabled: bool) -> Self {
        self.config.enforce_timeout = enabled;
        self
    }

    /// Enable or disable keepalives.
    pub fn heartbeat(mut self, enabled: bool) -> Self {
        self.config.heartbeat = enabled;
        self
    }

    /// Set the keepalive interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self
    }

    /// Set the tick interval.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval;
        self
    }

    /// Set the default session configuration.
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ContextConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.buffer_size, SESSION_BUFFER_SIZE);
        assert_eq!(config.mtu, MTU_DEF);
        assert!(config.buffer_size > MAX_CHUNK_PAYLOAD);
    }

    #[test]
    fn test_buffer_size_clamped() {
        let config = SessionConfigBuilder::new().buffer_size(16).build();
        assert_eq!(config.buffer_size, MAX_CHUNK_PAYLOAD + 1);

        let config = SessionConfigBuilder::new().buffer_size(1 << 20).build();
        assert_eq!(config.buffer_size, 1 << 20);
    }

    #[test]
    fn test_engine_limits_clamped() {
        let config = SessionConfigBuilder::new().mtu(8).window(0).build();
        assert_eq!(config.mtu, MIN_MTU);
        assert_eq!(config.window, 1);

        let config = SessionConfigBuilder::new().window(1 << 20).build();
        assert_eq!(config.window, u16::MAX as usize);
    }

    #[test]
    fn test_context_builder() {
        let config = ContextConfigBuilder::new()
            .enforce_timeout(false)
            .heartbeat(false)
            .heartbeat_interval(Duration::from_secs(1))
            .tick_interval(Duration::from_millis(20))
            .session(SessionConfigBuilder::new().timeout(Duration::from_secs(5)).build())
            .build();

        assert!(!config.enforce_timeout);
        assert!(!config.heartbeat);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert_eq!(config.tick_interval, Duration::from_millis(20));
        assert_eq!(config.session.timeout, Duration::from_secs(5));
    }
}
