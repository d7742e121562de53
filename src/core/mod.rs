//! Core constants, configuration, and error types.
//!
//! Everything else in the crate builds on these definitions.

pub mod config;
pub mod constants;
pub mod error;

pub use config::*;
pub use constants::*;
pub use error::*;
