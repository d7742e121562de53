//! Protocol constants for the kcpuv session layer.
//!
//! Wire-level values are part of the protocol and MUST NOT be changed
//! without changing the peer as well. Timing values are defaults that the
//! configuration types may override.

use std::time::Duration;

// =============================================================================
// CHUNK HEADER
// =============================================================================

/// Per-chunk nonce length in bytes.
pub const NONCE_LENGTH: usize = 8;

/// Command tag length in bytes.
pub const PROTOCOL_OVERHEAD: usize = 1;

/// Full chunk header size (nonce + command tag).
pub const OVERHEAD: usize = NONCE_LENGTH + PROTOCOL_OVERHEAD;

// =============================================================================
// COMMANDS
// =============================================================================

/// Keepalive no-op.
pub const CMD_NOO: u8 = 0x01;

/// Application payload follows the header.
pub const CMD_PUSH: u8 = 0x02;

/// Graceful close request.
pub const CMD_FIN: u8 = 0x03;

/// Close acknowledgment.
pub const CMD_FIN_ACK: u8 = 0x04;

// =============================================================================
// SIZES
// =============================================================================

/// Largest chunk (header included) handed to the ARQ engine in one submit.
pub const MAX_SENDING_LEN: usize = 65536;

/// Largest application payload carried by one chunk.
pub const MAX_CHUNK_PAYLOAD: usize = MAX_SENDING_LEN - OVERHEAD;

/// Size of the shared scratch buffer used while draining the ARQ engine.
pub const BUFFER_LEN: usize = MAX_SENDING_LEN;

/// Default per-session reassembly buffer capacity.
pub const SESSION_BUFFER_SIZE: usize = 4 * MAX_SENDING_LEN;

/// Default maximum datagram size produced by the ARQ engine.
pub const MTU_DEF: usize = 1400 - OVERHEAD;

/// Default ARQ send/receive window, in segments.
pub const INIT_WND_SIZE: usize = 2048;

/// Smallest datagram size the ARQ engine accepts.
pub const MIN_MTU: usize = 50;

/// Receive buffer size used when polling transports.
pub const UDP_RECV_BUFFER_SIZE: usize = 65535;

/// Kernel send and receive buffer size requested for UDP sockets.
pub const UDP_BUF_SIZE: usize = 4 * 1024 * 1024;

// =============================================================================
// KCP ENGINE
// =============================================================================

/// Conversation id shared by both ends of every session.
pub const KCP_CONV: u32 = 0;

/// Engine flush interval in nodelay mode, in milliseconds.
pub const KCP_INTERVAL_MS: i32 = 10;

/// Duplicate acknowledgments that trigger a fast resend.
pub const KCP_FAST_RESEND: i32 = 2;

// =============================================================================
// TIMING
// =============================================================================

/// Interval at which the event loop runs the tick driver.
pub const TIMER_INTERVAL: Duration = Duration::from_millis(10);

/// Default inactivity budget before a session is forcibly closed.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Idle time after which a ready session emits a keepalive.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(5_000);

// =============================================================================
// CRYPTO
// =============================================================================

/// XChaCha20 nonce size.
pub const AEAD_NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// Derived session key size.
pub const SESSION_KEY_SIZE: usize = 32;

/// Salt words mixed into key derivation.
pub const KEY_SALT: [u32; 2] = [1, 2];
