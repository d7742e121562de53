//! kcpuv - Session Layer
//!
//! - [`SessionState`]: the forward-only lifecycle
//! - [`RecvBuffer`]: reassembly with flush-then-replace on overflow
//! - [`Session`]: command protocol over one ARQ engine
//! - [`Registry`]: arena of sessions addressed by [`SessionId`]
//! - [`Context`]: owner of the registry and the tick driver

mod buffer;
mod context;
mod registry;
#[allow(clippy::module_inception)]
mod session;
mod state;

pub use buffer::RecvBuffer;
pub use context::Context;
pub use registry::{Registry, SessionId};
pub use session::{BeforeCloseHandler, CloseHandler, MessageHandler, Session};
pub use state::SessionState;
