//! Shared logging and TLS plumbing for the relay and SDN binaries.
//!
//! Kept deliberately small: this workspace runs a single transport (HTTPS via `axum-server`)
//! rather than the matrix of QUIC/WebTransport backends a general-purpose MoQ toolkit supports.

pub mod log;
pub mod tls;

pub use log::Log;
pub use tls::Tls;
