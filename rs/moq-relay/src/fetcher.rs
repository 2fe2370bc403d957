use std::{collections::HashMap, sync::Arc, time::Duration};

use moq_relay_core::{
	path::PathOwned,
	pool::FramePool,
	session::{Announcement, Session},
	mux::{RelayHandler, TrackMux},
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::announce::AnnounceClient;

/// Default remote-fetch poll period.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Dials an outbound session to a next-hop relay address. Fulfilled by a concrete
/// QUIC/WebTransport integration outside this crate.
#[async_trait::async_trait]
pub trait Dialer: Send + Sync {
	async fn dial(&self, next_hop_address: &str) -> moq_relay_core::error::Result<Arc<dyn Session>>;
}

struct SessionEntry {
	session: Arc<dyn Session>,
	ref_count: usize,
}

struct TrackedRemote {
	next_hop_address: String,
	cancel: CancellationToken,
}

/// Control loop that discovers remotely-hosted broadcasts via the SDN, dials the next hop
/// toward them, and installs a local [`RelayHandler`] so local subscribers are unaware the
/// content is not locally published.
pub struct RemoteFetcher {
	announce: Arc<AnnounceClient>,
	mux: Arc<TrackMux>,
	dialer: Arc<dyn Dialer>,
	self_relay: String,
	poll_interval: Duration,
	group_cache_size: usize,
	frame_pool: Arc<FramePool>,
	sessions: Mutex<HashMap<String, SessionEntry>>,
	tracked: Mutex<HashMap<PathOwned, TrackedRemote>>,
}

impl RemoteFetcher {
	pub fn new(
		announce: Arc<AnnounceClient>,
		mux: Arc<TrackMux>,
		dialer: Arc<dyn Dialer>,
		self_relay: String,
		group_cache_size: usize,
		frame_pool: Arc<FramePool>,
	) -> Self {
		Self {
			announce,
			mux,
			dialer,
			self_relay,
			poll_interval: DEFAULT_POLL_INTERVAL,
			group_cache_size,
			frame_pool,
			sessions: Mutex::new(HashMap::new()),
			tracked: Mutex::new(HashMap::new()),
		}
	}

	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	pub async fn run(&self, cancel: CancellationToken) {
		let mut ticker = tokio::time::interval(self.poll_interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = cancel.cancelled() => return,
			}

			if let Err(err) = self.poll_once().await {
				tracing::warn!(%err, "remote fetch poll failed");
			}
		}
	}

	async fn poll_once(&self) -> anyhow::Result<()> {
		let entries = self.announce.list_all().await?;

		let mut remote_set: HashMap<PathOwned, String> = HashMap::new();
		for entry in entries {
			if entry.relay == self.self_relay {
				continue;
			}
			remote_set.entry(PathOwned::new(entry.broadcast_path)).or_insert(entry.relay);
		}

		for (path, relay) in remote_set.iter() {
			let already_tracked = self.tracked.lock().contains_key(path);
			if already_tracked || self.mux.contains(path) {
				continue;
			}
			self.install(path, relay).await;
		}

		let stale: Vec<PathOwned> =
			self.tracked.lock().keys().filter(|path| !remote_set.contains_key(*path)).cloned().collect();

		for path in stale {
			self.uninstall(&path).await;
		}

		Ok(())
	}

	async fn install(&self, path: &PathOwned, relay: &str) {
		let route = match self.announce.route(&self.self_relay, relay).await {
			Ok(route) => route,
			Err(err) => {
				tracing::debug!(%err, %path, relay, "route lookup failed, skipping for now");
				return;
			}
		};

		let Some(next_hop_address) = route.next_hop_address.filter(|addr| !addr.is_empty()) else {
			tracing::debug!(%path, relay, "route has no next-hop address, skipping");
			return;
		};

		let session = match self.get_or_dial(&next_hop_address).await {
			Ok(session) => session,
			Err(err) => {
				tracing::warn!(%err, %next_hop_address, "dial failed");
				return;
			}
		};

		let announcement = Announcement::new(path.clone());
		let cancel = announcement.cancellation_token();
		let handler = Arc::new(
			RelayHandler::new(announcement, Some(session), self.frame_pool.clone())
				.with_group_cache_size(self.group_cache_size),
		);

		self.mux.register(path.clone(), handler);
		self.tracked.lock().insert(path.clone(), TrackedRemote { next_hop_address, cancel });
	}

	async fn uninstall(&self, path: &PathOwned) {
		let tracked = self.tracked.lock().remove(path);
		if let Some(tracked) = tracked {
			tracked.cancel.cancel();
			self.mux.unregister(path);
			self.release(&tracked.next_hop_address);
		}
	}

	/// Get-or-dial a session for `address`, serialized by releasing the lock around the actual
	/// dial I/O: a concurrent winner of the race keeps its session, the loser's dial result is
	/// dropped (double-create loses the later session).
	async fn get_or_dial(&self, address: &str) -> moq_relay_core::error::Result<Arc<dyn Session>> {
		if let Some(entry) = self.sessions.lock().get_mut(address) {
			entry.ref_count += 1;
			return Ok(entry.session.clone());
		}

		let dialed = self.dialer.dial(address).await?;

		let mut sessions = self.sessions.lock();
		let session = match sessions.get_mut(address) {
			Some(entry) => {
				entry.ref_count += 1;
				entry.session.clone()
			}
			None => {
				sessions.insert(address.to_string(), SessionEntry { session: dialed.clone(), ref_count: 1 });
				dialed
			}
		};
		Ok(session)
	}

	fn release(&self, address: &str) {
		let mut sessions = self.sessions.lock();
		let Some(entry) = sessions.get_mut(address) else { return };
		entry.ref_count -= 1;
		if entry.ref_count == 0 {
			if let Some(entry) = sessions.remove(address) {
				entry.session.close_with_error(0, "remote fetcher: no longer referenced");
			}
		}
	}
}
