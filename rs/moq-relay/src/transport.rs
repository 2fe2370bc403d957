//! Integration seam for the concrete QUIC/WebTransport stack.
//!
//! The wire encoding of the publish/subscribe protocol and the transport it rides on are out of
//! scope for this crate (spec §1): the relay only ever consumes the abstract
//! [`moq_relay_core::session::Session`] family. [`Unconfigured`] is the placeholder wired into
//! `main` so the binary links and runs its control plane (SDN registration, announce heartbeat,
//! remote fetch bookkeeping, HTTP health surface) without a transport plugged in; a real
//! deployment swaps it for a crate that dials/accepts actual QUIC or WebTransport sessions.

use std::sync::Arc;

use moq_relay_core::{
	error::{Error, Result},
	session::Session,
};

use crate::{fetcher::Dialer, server::Listener};

pub struct Unconfigured;

#[async_trait::async_trait]
impl Listener for Unconfigured {
	async fn accept(&mut self) -> Result<Arc<dyn Session>> {
		// No transport integration is wired in; block forever rather than busy-loop erroring.
		std::future::pending().await
	}
}

#[async_trait::async_trait]
impl Dialer for Unconfigured {
	async fn dial(&self, _next_hop_address: &str) -> Result<Arc<dyn Session>> {
		Err(Error::transport(std::io::Error::new(
			std::io::ErrorKind::Unsupported,
			"no transport integration configured: plug in a concrete Dialer",
		)))
	}
}
