use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicI64, AtomicU64, Ordering},
		Arc,
	},
	time::{Duration, Instant},
};

use moq_relay_core::{
	mux::{RelayHandler, TrackMux},
	pool::FramePool,
	session::Session,
};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::announce::AnnounceClient;

/// Accepts inbound transport connections and hands each one to the relay as a [`Session`].
/// Fulfilled by a concrete QUIC/WebTransport integration outside this crate.
#[async_trait::async_trait]
pub trait Listener: Send {
	async fn accept(&mut self) -> moq_relay_core::error::Result<Arc<dyn Session>>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Health {
	Healthy,
	Degraded,
	Unhealthy,
}

pub struct StatusSnapshot {
	pub active_connections: i64,
	pub uptime: std::time::Duration,
	pub health: Health,
}

struct PeerInfo {
	connected_at: Instant,
	#[allow(dead_code)]
	session: Arc<dyn Session>,
}

/// Owns the local track multiplexer and peer registry; accepts inbound sessions, registers a
/// [`RelayHandler`] per announcement received, and optionally mirrors announcements to the SDN.
pub struct RelayServer {
	mux: Arc<TrackMux>,
	announce: Option<Arc<AnnounceClient>>,
	frame_pool: Arc<FramePool>,
	group_cache_size: usize,
	peers: RwLock<HashMap<String, PeerInfo>>,
	peer_counter: AtomicU64,
	active_connections: AtomicI64,
	started_at: Instant,
}

impl RelayServer {
	pub fn new(mux: Arc<TrackMux>, announce: Option<Arc<AnnounceClient>>, frame_pool: Arc<FramePool>, group_cache_size: usize) -> Self {
		Self {
			mux,
			announce,
			frame_pool,
			group_cache_size,
			peers: RwLock::new(HashMap::new()),
			peer_counter: AtomicU64::new(0),
			active_connections: AtomicI64::new(0),
			started_at: Instant::now(),
		}
	}

	pub fn mux(&self) -> &Arc<TrackMux> {
		&self.mux
	}

	pub fn status(&self) -> StatusSnapshot {
		let active_connections = self.active_connections.load(Ordering::Acquire);
		let health = if active_connections < 0 { Health::Unhealthy } else { Health::Healthy };
		StatusSnapshot {
			active_connections,
			uptime: self.started_at.elapsed(),
			health,
		}
	}

	/// Stop accepting new sessions and wait up to `deadline` for in-flight sessions to drain.
	///
	/// Callers are expected to cancel the `CancellationToken` passed to [`Self::listen_and_serve`]
	/// separately (or share one between the two) — this only bounds the drain wait.
	pub async fn shutdown(&self, deadline: Duration) {
		let start = Instant::now();
		while self.active_connections.load(Ordering::Acquire) > 0 {
			if start.elapsed() >= deadline {
				tracing::warn!(
					active_connections = self.active_connections.load(Ordering::Acquire),
					"relay shutdown deadline reached with sessions still active"
				);
				return;
			}
			tokio::time::sleep(Duration::from_millis(20)).await;
		}
	}

	/// Drive `listener` until it returns an error (transport listener gone) or `shutdown` fires.
	pub async fn listen_and_serve(self: Arc<Self>, mut listener: impl Listener, shutdown: CancellationToken) {
		loop {
			tokio::select! {
				accepted = listener.accept() => {
					match accepted {
						Ok(session) => {
							let this = self.clone();
							tokio::spawn(async move { this.handle_session(session).await; });
						}
						Err(err) => {
							tracing::warn!(%err, "listener accept failed, stopping");
							return;
						}
					}
				}
				_ = shutdown.cancelled() => {
					tracing::info!("relay server shutting down, no longer accepting sessions");
					return;
				}
			}
		}
	}

	async fn handle_session(self: Arc<Self>, session: Arc<dyn Session>) {
		let peer_id = format!("peer-{}", self.peer_counter.fetch_add(1, Ordering::Relaxed));
		self.active_connections.fetch_add(1, Ordering::AcqRel);
		self.peers.write().insert(
			peer_id.clone(),
			PeerInfo {
				connected_at: Instant::now(),
				session: session.clone(),
			},
		);

		tracing::info!(peer = %peer_id, "session accepted");

		match session.accept_announce("").await {
			Ok(mut peer) => {
				while let Some(announcement) = peer.next_announcement().await {
					self.install_announcement(session.clone(), announcement);
				}
			}
			Err(err) => {
				tracing::warn!(peer = %peer_id, %err, "accept_announce failed");
			}
		}

		self.peers.write().remove(&peer_id);
		self.active_connections.fetch_sub(1, Ordering::AcqRel);
		tracing::info!(peer = %peer_id, "session closed");
	}

	fn install_announcement(self: &Arc<Self>, session: Arc<dyn Session>, announcement: moq_relay_core::session::Announcement) {
		let path = announcement.path.clone();
		let cancel = announcement.cancellation_token();

		let handler = Arc::new(
			RelayHandler::new(announcement, Some(session), self.frame_pool.clone())
				.with_group_cache_size(self.group_cache_size),
		);

		self.mux.register(path.clone(), handler);

		if let Some(announce) = self.announce.clone() {
			let register_path = path.clone();
			tokio::spawn(async move { announce.register(register_path).await });
		}

		let this = self.clone();
		tokio::spawn(async move {
			cancel.cancelled().await;
			this.mux.unregister(&path);
			if let Some(announce) = this.announce.clone() {
				announce.deregister(&path).await;
			}
		});
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use moq_relay_core::{
		error::Result,
		path::{PathOwned, TrackName},
		session::{Announcement, Peer},
	};

	use super::*;

	fn test_server() -> Arc<RelayServer> {
		Arc::new(RelayServer::new(Arc::new(TrackMux::new()), None, Arc::new(FramePool::default()), 100))
	}

	#[tokio::test]
	async fn status_starts_healthy_with_no_connections() {
		let server = test_server();
		let status = server.status();
		assert_eq!(status.active_connections, 0);
		assert_eq!(status.health, Health::Healthy);
	}

	#[tokio::test]
	async fn shutdown_returns_immediately_when_idle() {
		let server = test_server();
		let start = Instant::now();
		server.shutdown(Duration::from_secs(5)).await;
		assert!(start.elapsed() < Duration::from_secs(1), "shutdown must not wait out the full deadline when idle");
	}

	struct FakePeer {
		announcements: Vec<Announcement>,
	}

	#[async_trait::async_trait]
	impl Peer for FakePeer {
		async fn next_announcement(&mut self) -> Option<Announcement> {
			if self.announcements.is_empty() {
				None
			} else {
				Some(self.announcements.remove(0))
			}
		}
	}

	struct FakeSession {
		announcement: std::sync::Mutex<Option<Announcement>>,
	}

	#[async_trait::async_trait]
	impl Session for FakeSession {
		async fn accept_announce(&self, _prefix: &str) -> Result<Box<dyn Peer>> {
			let announcement = self.announcement.lock().unwrap().take().into_iter().collect();
			Ok(Box::new(FakePeer { announcements: announcement }))
		}

		async fn subscribe(&self, _path: PathOwned, _track: TrackName) -> Result<Box<dyn moq_relay_core::session::TrackReader>> {
			unimplemented!("not exercised by this test")
		}

		fn close_with_error(&self, _code: u32, _text: &str) {}

		fn context(&self) -> CancellationToken {
			CancellationToken::new()
		}
	}

	struct FakeListener {
		sessions: Vec<Arc<dyn Session>>,
	}

	#[async_trait::async_trait]
	impl Listener for FakeListener {
		async fn accept(&mut self) -> Result<Arc<dyn Session>> {
			if self.sessions.is_empty() {
				std::future::pending().await
			} else {
				Ok(self.sessions.remove(0))
			}
		}
	}

	#[tokio::test]
	async fn accepting_a_session_installs_a_handler_that_is_removed_on_withdraw() {
		let server = test_server();
		let path = PathOwned::new("/live/a");
		let announcement = Announcement::new(path.clone());
		let cancel = announcement.cancellation_token();

		let session: Arc<dyn Session> = Arc::new(FakeSession { announcement: std::sync::Mutex::new(Some(announcement)) });
		let listener = FakeListener { sessions: vec![session] };
		let shutdown = CancellationToken::new();

		let mux = server.mux().clone();
		let serve_task = tokio::spawn(server.clone().listen_and_serve(listener, shutdown.clone()));

		// Give the accept loop a moment to install the announcement's handler.
		for _ in 0..50 {
			if mux.contains(&path) {
				break;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		assert!(mux.contains(&path), "handler must be registered after the announcement arrives");

		cancel.cancel();
		for _ in 0..50 {
			if !mux.contains(&path) {
				break;
			}
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
		assert!(!mux.contains(&path), "withdrawing the announcement must unregister the handler");

		shutdown.cancel();
		serve_task.await.unwrap();
	}
}
