use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;

use crate::{
	error::{Error, Result},
	path::{PathOwned, TrackName},
	pool::FramePool,
	ring::DEFAULT_GROUP_CACHE_SIZE,
	session::{Announcement, Session, TrackWriter},
	track::TrackDistributor,
};

/// Application-level close code written to a downstream writer when a requested track has no
/// serving [`RelayHandler`].
pub const TRACK_NOT_FOUND: u32 = 1;

/// Everything the relay knows about one broadcast path: the announcement that created it, the
/// (possibly absent) upstream session it is backed by, and one [`TrackDistributor`] per track
/// name requested so far.
///
/// Created when an [`Announcement`] is accepted; torn down when the announcement withdraws or
/// its session ends. Exclusively owned by the [`TrackMux`] entry that holds it — distributors it
/// creates are only ever reached through `self`.
pub struct RelayHandler {
	announcement: Announcement,
	session: Option<Arc<dyn Session>>,
	distributors: RwLock<HashMap<TrackName, Arc<TrackDistributor>>>,
	group_cache_size: usize,
	frame_pool: Arc<FramePool>,
}

impl RelayHandler {
	pub fn new(announcement: Announcement, session: Option<Arc<dyn Session>>, frame_pool: Arc<FramePool>) -> Self {
		Self {
			announcement,
			session,
			distributors: RwLock::new(HashMap::new()),
			group_cache_size: DEFAULT_GROUP_CACHE_SIZE,
			frame_pool,
		}
	}

	pub fn with_group_cache_size(mut self, size: usize) -> Self {
		self.group_cache_size = size;
		self
	}

	pub fn announcement(&self) -> &Announcement {
		&self.announcement
	}

	pub fn frame_pool(&self) -> &Arc<FramePool> {
		&self.frame_pool
	}

	fn is_servable(&self) -> bool {
		self.announcement.is_active() && self.session.is_some()
	}

	/// Look up or create the distributor for `track`. Does not itself start ingest; the caller
	/// (see [`Self::serve_track`]) is responsible for starting ingest the first time a
	/// distributor is created.
	fn distributor_for(&self, track: &str) -> (Arc<TrackDistributor>, bool) {
		if let Some(existing) = self.distributors.read().get(track) {
			return (existing.clone(), false);
		}

		let mut distributors = self.distributors.write();
		if let Some(existing) = distributors.get(track) {
			return (existing.clone(), false);
		}
		let fresh = Arc::new(TrackDistributor::new(self.group_cache_size));
		distributors.insert(track.to_string(), fresh.clone());
		(fresh, true)
	}

	/// Serve one downstream subscriber for `(path, track)`: resolves or creates the track's
	/// distributor, subscribes upstream on first use, and drives `egress` until the writer's
	/// context is cancelled.
	pub async fn serve_track(self: &Arc<Self>, path: PathOwned, track: TrackName, writer: &mut dyn TrackWriter) {
		if !self.is_servable() {
			writer.close_with_error(TRACK_NOT_FOUND);
			return;
		}

		let (distributor, created) = self.distributor_for(&track);

		if created {
			let session = self.session.clone().expect("is_servable checked session above");
			let handler = self.clone();
			let path_for_ingest = path.clone();
			let track_for_ingest = track.clone();
			let cancel = self.announcement.cancellation_token();
			let distributor = distributor.clone();
			tokio::spawn(async move {
				match session.subscribe(path_for_ingest.clone(), track_for_ingest.clone()).await {
					Ok(source) => {
						let handler_for_close = handler.clone();
						let track_for_close = track_for_ingest.clone();
						distributor
							.ingest(cancel, source, move || {
								handler_for_close.distributors.write().remove(&track_for_close);
							})
							.await;
					}
					Err(err) => {
						tracing::warn!(%err, path = %path_for_ingest, track = %track_for_ingest, "upstream subscribe failed");
						handler.distributors.write().remove(&track_for_ingest);
					}
				}
			});
		}

		let mut sub = distributor.subscribe();
		distributor.egress(writer, &mut sub).await;
		distributor.unsubscribe(sub.id());
	}
}

/// Registry of active [`RelayHandler`]s keyed by broadcast path.
///
/// Used both by the relay server (one entry per locally-announced path) and by the remote
/// fetcher (one entry per remotely-sourced path it has installed). `register`/`unregister` form
/// an explicit pair rather than a blocking "publish until cancelled" call, so the fetcher can
/// unregister a path the moment the SDN stops advertising it.
#[derive(Default)]
pub struct TrackMux {
	handlers: RwLock<HashMap<PathOwned, Arc<RelayHandler>>>,
}

impl TrackMux {
	pub fn new() -> Self {
		Self::default()
	}

	/// Install `handler` at `path`, replacing whatever was there before.
	pub fn register(&self, path: PathOwned, handler: Arc<RelayHandler>) {
		self.handlers.write().insert(path, handler);
	}

	/// Remove the handler at `path` if present.
	pub fn unregister(&self, path: &PathOwned) {
		self.handlers.write().remove(path);
	}

	pub fn lookup(&self, path: &PathOwned) -> Option<Arc<RelayHandler>> {
		self.handlers.read().get(path).cloned()
	}

	pub fn contains(&self, path: &PathOwned) -> bool {
		self.handlers.read().contains_key(path)
	}

	pub fn len(&self) -> usize {
		self.handlers.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Resolve `(path, track)` against `mux` and drive one subscriber's egress, matching the
/// server's inbound `ServeTrack` contract in full (look up, check servability, subscribe,
/// egress).
pub async fn serve_track(mux: &TrackMux, path: PathOwned, track: TrackName, writer: &mut dyn TrackWriter) -> Result<()> {
	match mux.lookup(&path) {
		Some(handler) => {
			handler.serve_track(path, track, writer).await;
			Ok(())
		}
		None => {
			writer.close_with_error(TRACK_NOT_FOUND);
			Err(Error::NotFound)
		}
	}
}
