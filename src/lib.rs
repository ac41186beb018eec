//! hwpipe-client - coordinator for remote hardware media pipelines
//!
//! This crate drives a multi-stage remote media-processing pipeline from the
//! client side: raw input flows through a fixed sequence of remote stages
//! (extraction, transform, transfer), each exposed as a request/response
//! endpoint. The crate owns the hard parts of that protocol:
//! - a bounded sliding window over the input, so a unit split across a chunk
//!   boundary is never lost
//! - the continue/flush state machine, including the end-of-input drain of
//!   every stage in order
//! - strided 3-plane frame I/O between device layouts and packed files
//!
//! ## Transport layer
//! Transports live in separate crates: this crate defines the
//! [`stage::StageClient`] and [`stage::DeviceClient`] traits a transport
//! implements, and never sees the wire schema.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coordinator;
pub mod io;
pub mod planes;
pub mod stage;
pub mod stages;
pub mod window;

mod error;
pub use error::{Error, Result};

/// Initialize logging for binaries and tests that embed this crate
///
/// Call once at startup; respects `RUST_LOG`, defaulting to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("hwpipe client initialized");
    Ok(())
}
