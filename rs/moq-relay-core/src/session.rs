use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::{error::Result, path::PathOwned, ring::GroupSequence};

/// A publisher's advertisement of a broadcast path on a session.
///
/// `active` flips false (and `cancel` fires) when the advertising session withdraws the
/// announcement or disconnects; a [`crate::mux::RelayHandler`] built on top of a stale
/// announcement should tear itself down.
#[derive(Clone)]
pub struct Announcement {
	pub path: PathOwned,
	active: std::sync::Arc<std::sync::atomic::AtomicBool>,
	cancel: CancellationToken,
}

impl Announcement {
	pub fn new(path: PathOwned) -> Self {
		Self {
			path,
			active: std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true)),
			cancel: CancellationToken::new(),
		}
	}

	pub fn is_active(&self) -> bool {
		self.active.load(std::sync::atomic::Ordering::Acquire)
	}

	/// Mark withdrawn and wake anything waiting on [`Self::cancelled`].
	pub fn withdraw(&self) {
		self.active.store(false, std::sync::atomic::Ordering::Release);
		self.cancel.cancel();
	}

	pub async fn cancelled(&self) {
		self.cancel.cancelled().await
	}

	pub fn cancellation_token(&self) -> CancellationToken {
		self.cancel.clone()
	}
}

/// The relay's view of a connected endpoint (publisher or downstream subscriber), abstracted
/// over whatever QUIC/WebTransport stack actually terminates the connection.
///
/// Implementations are provided outside this crate; the core only consumes this interface.
#[async_trait::async_trait]
pub trait Session: Send + Sync {
	/// Accept announcements matching `prefix` from the remote peer, yielding one [`Peer`] per
	/// connection attempt.
	async fn accept_announce(&self, prefix: &str) -> Result<Box<dyn Peer>>;

	/// Open an outbound subscription for `(path, track)` on this session.
	async fn subscribe(&self, path: PathOwned, track: crate::path::TrackName) -> Result<Box<dyn TrackReader>>;

	/// Close the underlying transport with an application-level error code.
	fn close_with_error(&self, code: u32, text: &str);

	/// Cancelled when the underlying transport goes away.
	fn context(&self) -> CancellationToken;
}

/// The remote side of an accepted session, yielding announcements as they arrive.
#[async_trait::async_trait]
pub trait Peer: Send {
	/// Return the next announcement, or `None` once the peer has no more to offer (session
	/// ended or iterator exhausted).
	async fn next_announcement(&mut self) -> Option<Announcement>;
}

/// Consumer side of an upstream track: yields complete groups in arrival order.
#[async_trait::async_trait]
pub trait TrackReader: Send {
	async fn accept_group(&mut self, cancel: &CancellationToken) -> Result<Option<Box<dyn GroupReader>>>;
}

/// Consumer side of one group: yields frames in arrival order.
#[async_trait::async_trait]
pub trait GroupReader: Send {
	fn sequence(&self) -> GroupSequence;

	/// Returns `Ok(None)` once the group is exhausted (producer closed it cleanly).
	async fn read_frame(&mut self) -> Result<Option<Bytes>>;
}

/// Producer side of a downstream track, handed to `egress` for one subscriber.
pub trait TrackWriter: Send {
	fn open_group_at(&mut self, seq: GroupSequence) -> Result<Box<dyn GroupWriter>>;

	fn close_with_error(&mut self, code: u32);

	/// Cancelled when the downstream subscriber goes away.
	fn context(&self) -> CancellationToken;
}

/// Producer side of one group.
pub trait GroupWriter: Send {
	fn write_frame(&mut self, frame: Bytes) -> Result<()>;

	fn close(&mut self);
}
